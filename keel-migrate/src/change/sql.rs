//! Raw SQL changes, inline and file backed.

use serde::{Deserialize, Serialize};

use super::{Change, ChangeContext};
use crate::checksum::{Checksum, ChecksumVersion, NormalizeOptions};
use crate::dialect::Dialect;
use crate::error::MigrateResult;
use crate::sql_text::{split_statements, strip_comments, strip_trailing_delimiter};
use crate::statement::{RawSql, SqlStatement};
use crate::validation::ValidationErrors;

fn default_true() -> bool {
    true
}

fn dbms_list(dbms: &Option<String>) -> Vec<String> {
    dbms.iter().cloned().collect()
}

/// Delimiter as written after each piece; word delimiters go on their own line.
fn rendered_delimiter(delimiter: Option<&str>) -> Option<String> {
    let delimiter = delimiter?.trim();
    if delimiter.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(format!("\n{}", delimiter))
    } else {
        Some(delimiter.to_string())
    }
}

fn raw_statements(sql: &str, options: &NormalizeOptions) -> Vec<SqlStatement> {
    let text = if options.strip_comments {
        strip_comments(sql)
    } else {
        sql.to_string()
    };
    let end_delimiter = rendered_delimiter(options.end_delimiter.as_deref());

    let pieces = if options.split_statements {
        split_statements(&text, options.delimiter())
    } else {
        let single = strip_trailing_delimiter(&text, options.delimiter()).trim();
        if single.is_empty() {
            Vec::new()
        } else {
            vec![single.to_string()]
        }
    };

    pieces
        .into_iter()
        .map(|sql| {
            SqlStatement::RawSql(RawSql {
                sql,
                end_delimiter: end_delimiter.clone(),
            })
        })
        .collect()
}

/// Inline SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SqlChange {
    #[serde(default)]
    pub sql: String,
    #[serde(default = "default_true")]
    pub split_statements: bool,
    #[serde(default)]
    pub strip_comments: bool,
    pub end_delimiter: Option<String>,
    pub dbms: Option<String>,
    pub comment: Option<String>,
}

impl SqlChange {
    /// Split on `;`, comments kept.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            split_statements: true,
            strip_comments: false,
            end_delimiter: None,
            dbms: None,
            comment: None,
        }
    }

    /// Restrict to the given `dbms` list.
    pub fn with_dbms(mut self, dbms: impl Into<String>) -> Self {
        self.dbms = Some(dbms.into());
        self
    }

    fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            end_delimiter: self.end_delimiter.clone(),
            split_statements: self.split_statements,
            strip_comments: self.strip_comments,
        }
    }
}

#[async_trait::async_trait]
impl Change for SqlChange {
    fn change_type(&self) -> &'static str {
        "sql"
    }

    fn dbms(&self) -> Vec<String> {
        dbms_list(&self.dbms)
    }

    fn checksum(&self, _ctx: &ChangeContext<'_>, version: ChecksumVersion) -> MigrateResult<Checksum> {
        Ok(Checksum::compute_sql(&self.sql, version, &self.options()))
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("sql", Some(self.sql.as_str()));
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(raw_statements(&self.sql, &self.options()))
    }

    fn confirmation_message(&self) -> String {
        "Custom SQL executed".to_string()
    }

    fn short_description(&self) -> String {
        match &self.comment {
            Some(comment) => format!("sql: {}", comment),
            None => "sql".to_string(),
        }
    }
}

/// SQL read from a file through the resource accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SqlFileChange {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub relative_to_changelog_file: bool,
    pub encoding: Option<String>,
    #[serde(default = "default_true")]
    pub split_statements: bool,
    #[serde(default)]
    pub strip_comments: bool,
    pub end_delimiter: Option<String>,
    pub dbms: Option<String>,
}

impl SqlFileChange {
    /// Read `path` from the accessor roots.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            relative_to_changelog_file: false,
            encoding: None,
            split_statements: true,
            strip_comments: false,
            end_delimiter: None,
            dbms: None,
        }
    }

    /// Resolve `path` against the declaring changelog's directory.
    pub fn relative_to_changelog(mut self) -> Self {
        self.relative_to_changelog_file = true;
        self
    }

    fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            end_delimiter: self.end_delimiter.clone(),
            split_statements: self.split_statements,
            strip_comments: self.strip_comments,
        }
    }

    /// File content, or `None` when missing and the context tolerates it.
    fn content(&self, ctx: &ChangeContext<'_>) -> MigrateResult<Option<String>> {
        let relative_to = if self.relative_to_changelog_file {
            ctx.changelog_path
        } else {
            None
        };
        match ctx.resources.read_to_string(&self.path, relative_to) {
            Ok(content) => Ok(Some(content)),
            Err(e) if ctx.continue_on_error => {
                tracing::warn!(path = %self.path, error = %e, "SQL file unavailable, continuing");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl Change for SqlFileChange {
    fn change_type(&self) -> &'static str {
        "sqlFile"
    }

    fn dbms(&self) -> Vec<String> {
        dbms_list(&self.dbms)
    }

    fn checksum(&self, ctx: &ChangeContext<'_>, version: ChecksumVersion) -> MigrateResult<Checksum> {
        let content = self.content(ctx)?.unwrap_or_default();
        Ok(Checksum::compute_sql(&content, version, &self.options()))
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("path", Some(self.path.as_str()));
        errors
    }

    fn generate_statements(&self, ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(match self.content(ctx)? {
            Some(content) => raw_statements(&content, &self.options()),
            None => Vec::new(),
        })
    }

    fn confirmation_message(&self) -> String {
        format!("SQL in file {} executed", self.path)
    }

    fn short_description(&self) -> String {
        format!("sqlFile path={}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use crate::resource::InMemoryResourceAccessor;
    use pretty_assertions::assert_eq;

    fn texts(statements: &[SqlStatement]) -> Vec<String> {
        statements
            .iter()
            .map(|s| match s {
                SqlStatement::RawSql(raw) => raw.sql.clone(),
                other => panic!("unexpected statement {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_sql_change_splits_statements() {
        let dialect = Dialect::postgres();
        let resources = InMemoryResourceAccessor::new();
        let ctx = ChangeContext::new(&dialect, &resources);

        let change = SqlChange::new("INSERT INTO t VALUES ('a;b');\nINSERT INTO t VALUES ('c');");
        assert_eq!(
            texts(&change.generate_statements(&ctx).unwrap()),
            vec!["INSERT INTO t VALUES ('a;b')", "INSERT INTO t VALUES ('c')"]
        );

        let mut whole = change.clone();
        whole.split_statements = false;
        assert_eq!(
            texts(&whole.generate_statements(&ctx).unwrap()),
            vec!["INSERT INTO t VALUES ('a;b');\nINSERT INTO t VALUES ('c')"]
        );
    }

    #[test]
    fn test_sql_checksum_ignores_formatting() {
        let dialect = Dialect::postgres();
        let resources = InMemoryResourceAccessor::new();
        let ctx = ChangeContext::new(&dialect, &resources);

        let plain = SqlChange::new("CREATE TABLE t (id INT)");
        let noisy = SqlChange::new("-- the table\nCREATE   TABLE t\n    (id INT); /* done */\n\n");
        let edited = SqlChange::new("CREATE TABLE t (id BIGINT)");

        let v9 = ChecksumVersion::V9;
        assert_eq!(plain.checksum(&ctx, v9).unwrap(), noisy.checksum(&ctx, v9).unwrap());
        assert_ne!(plain.checksum(&ctx, v9).unwrap(), edited.checksum(&ctx, v9).unwrap());
    }

    #[test]
    fn test_sql_file_relative_to_changelog() {
        let dialect = Dialect::sqlite();
        let resources = InMemoryResourceAccessor::new()
            .with_file("db/sql/seed.sql", "INSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2);");
        let ctx = ChangeContext::new(&dialect, &resources).with_changelog_path("db/changelog.yaml");

        let change = SqlFileChange::new("sql/seed.sql").relative_to_changelog();
        assert_eq!(change.generate_statements(&ctx).unwrap().len(), 2);
        assert_eq!(
            change.checksum(&ctx, ChecksumVersion::V9).unwrap(),
            SqlChange::new("INSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2);")
                .checksum(&ctx, ChecksumVersion::V9)
                .unwrap()
        );
    }

    #[test]
    fn test_missing_sql_file() {
        let dialect = Dialect::sqlite();
        let resources = InMemoryResourceAccessor::new();
        let change = SqlFileChange::new("missing.sql");

        let strict = ChangeContext::new(&dialect, &resources);
        assert!(matches!(
            change.generate_statements(&strict),
            Err(MigrationError::ResourceNotFound(_))
        ));

        let lenient = strict.with_continue_on_error(true);
        assert!(change.generate_statements(&lenient).unwrap().is_empty());
        assert_eq!(
            change.checksum(&lenient, ChecksumVersion::V9).unwrap(),
            Checksum::compute("", ChecksumVersion::V9)
        );
    }

    #[test]
    fn test_word_delimiter_on_own_line() {
        let dialect = Dialect::mssql();
        let resources = InMemoryResourceAccessor::new();
        let ctx = ChangeContext::new(&dialect, &resources);
        let mut change = SqlChange::new("SELECT 1\nGO\nSELECT 2\nGO");
        change.end_delimiter = Some("GO".into());

        let statements = change.generate_statements(&ctx).unwrap();
        assert_eq!(texts(&statements), vec!["SELECT 1", "SELECT 2"]);
        let SqlStatement::RawSql(first) = &statements[0] else {
            unreachable!()
        };
        assert_eq!(first.end_delimiter.as_deref(), Some("\nGO"));
    }

    #[test]
    fn test_sql_has_no_inverse() {
        assert!(SqlChange::new("SELECT 1").compute_inverse().is_none());
        assert!(SqlFileChange::new("a.sql").compute_inverse().is_none());
    }
}
