//! ANSI generators used when no dialect override applies, plus shared rendering helpers.

use crate::dialect::{Capability, Dialect, DialectFamily};
use crate::error::{MigrateResult, MigrationError};
use crate::statement::{AddColumn, ColumnDef, CreateTable, ObjectName, Sql, SqlStatement, StatementKind};
use crate::validation::ValidationErrors;

use super::{GeneratorChain, SqlGenerator, in_family};

/// How a dialect spells a generated identity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AutoIncrementStyle {
    /// `GENERATED BY DEFAULT AS IDENTITY`.
    Identity,
    /// `SERIAL` / `BIGSERIAL` types.
    Serial,
    /// `AUTO_INCREMENT`.
    AutoIncrement,
    /// `IDENTITY(1,1)`.
    MssqlIdentity,
    /// `PRIMARY KEY AUTOINCREMENT` on the column itself.
    SqliteInline,
}

pub(crate) fn table_name(dialect: &Dialect, table: &ObjectName) -> String {
    dialect.quote_object(table.schema.as_deref(), &table.name)
}

pub(crate) fn mismatch(generator: &str, statement: &SqlStatement) -> MigrationError {
    MigrationError::other(format!(
        "generator '{}' cannot render '{}'",
        generator,
        statement.kind()
    ))
}

pub(crate) fn column_definition(column: &ColumnDef, dialect: &Dialect, style: AutoIncrementStyle) -> String {
    let mut data_type = column.data_type.clone();
    if column.auto_increment && style == AutoIncrementStyle::Serial {
        data_type = match column.data_type.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" | "INT4" => "SERIAL".to_string(),
            "BIGINT" | "INT8" => "BIGSERIAL".to_string(),
            "SMALLINT" | "INT2" => "SMALLSERIAL".to_string(),
            _ => data_type,
        };
    }

    let mut parts = vec![dialect.quote_identifier(&column.name), data_type];

    if column.auto_increment {
        match style {
            AutoIncrementStyle::Identity => parts.push("GENERATED BY DEFAULT AS IDENTITY".to_string()),
            AutoIncrementStyle::AutoIncrement => parts.push("AUTO_INCREMENT".to_string()),
            AutoIncrementStyle::MssqlIdentity => parts.push("IDENTITY(1,1)".to_string()),
            AutoIncrementStyle::Serial | AutoIncrementStyle::SqliteInline => {}
        }
    }

    if !column.nullable && !column.primary_key {
        parts.push("NOT NULL".to_string());
    }

    if column.unique && !column.primary_key {
        parts.push("UNIQUE".to_string());
    }

    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {}", default));
    }

    parts.join(" ")
}

pub(crate) fn create_table_sql(stmt: &CreateTable, dialect: &Dialect, style: AutoIncrementStyle) -> Sql {
    let pk: Vec<&ColumnDef> = stmt.columns.iter().filter(|c| c.primary_key).collect();
    let inline_pk = style == AutoIncrementStyle::SqliteInline && pk.len() == 1 && pk[0].auto_increment;

    let mut definitions = Vec::new();
    for column in &stmt.columns {
        let mut definition = column_definition(column, dialect, style);
        if inline_pk && column.primary_key {
            definition.push_str(" PRIMARY KEY AUTOINCREMENT");
        }
        definitions.push(definition);
    }

    if !pk.is_empty() && !inline_pk {
        let columns: Vec<String> = pk.iter().map(|c| dialect.quote_identifier(&c.name)).collect();
        definitions.push(format!("PRIMARY KEY ({})", columns.join(", ")));
    }

    let if_not_exists = if stmt.if_not_exists && dialect.supports(Capability::IfExists) {
        "IF NOT EXISTS "
    } else {
        ""
    };

    Sql::new(format!(
        "CREATE TABLE {}{} ({})",
        if_not_exists,
        table_name(dialect, &stmt.table),
        definitions.join(", ")
    ))
    .affecting(&stmt.table)
}

pub(crate) fn add_column_sql(
    stmt: &AddColumn,
    dialect: &Dialect,
    style: AutoIncrementStyle,
    keyword: &str,
) -> Sql {
    Sql::new(format!(
        "ALTER TABLE {} {} {}",
        table_name(dialect, &stmt.table),
        keyword,
        column_definition(&stmt.column, dialect, style)
    ))
    .affecting(&stmt.table)
}

pub(crate) fn validate_create_table(stmt: &CreateTable) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.check_required("tableName", Some(&stmt.table.name));
    errors.check_not_empty("columns", &stmt.columns);
    for column in &stmt.columns {
        errors.check_required("column.name", Some(&column.name));
        errors.check_required("column.type", Some(&column.data_type));
    }
    errors
}

/// Generic `CREATE TABLE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateTableGenerator;

impl SqlGenerator for CreateTableGenerator {
    fn name(&self) -> &'static str {
        "createTable"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::CreateTable
    }

    fn validate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> ValidationErrors {
        let mut errors = match statement {
            SqlStatement::CreateTable(stmt) => validate_create_table(stmt),
            _ => ValidationErrors::new(),
        };
        errors.merge(chain.validate(statement, dialect));
        errors
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        match statement {
            SqlStatement::CreateTable(stmt) => Ok(vec![create_table_sql(stmt, dialect, AutoIncrementStyle::Identity)]),
            other => Err(mismatch(self.name(), other)),
        }
    }
}

/// Generic `DROP TABLE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropTableGenerator;

impl SqlGenerator for DropTableGenerator {
    fn name(&self) -> &'static str {
        "dropTable"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::DropTable
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::DropTable(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };

        let mut sql = String::from("DROP TABLE ");
        if stmt.if_exists && dialect.supports(Capability::IfExists) {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&table_name(dialect, &stmt.table));
        if stmt.cascade {
            sql.push_str(" CASCADE");
        }
        Ok(vec![Sql::new(sql).affecting(&stmt.table)])
    }
}

/// Generic table rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameTableGenerator;

impl SqlGenerator for RenameTableGenerator {
    fn name(&self) -> &'static str {
        "renameTable"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::RenameTable
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::RenameTable(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        Ok(vec![
            Sql::new(format!(
                "ALTER TABLE {} RENAME TO {}",
                table_name(dialect, &stmt.table),
                dialect.quote_identifier(&stmt.new_name)
            ))
            .affecting(&stmt.table)
            .affecting(&stmt.new_name),
        ])
    }
}

/// Generic `ADD COLUMN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddColumnGenerator;

impl SqlGenerator for AddColumnGenerator {
    fn name(&self) -> &'static str {
        "addColumn"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::AddColumn
    }

    fn validate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let SqlStatement::AddColumn(stmt) = statement {
            errors.check_required("column.name", Some(&stmt.column.name));
            errors.check_required("column.type", Some(&stmt.column.data_type));
            if stmt.column.primary_key {
                errors.add_warning("adding a primary key column to an existing table may fail on populated tables");
            }
        }
        errors.merge(chain.validate(statement, dialect));
        errors
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        match statement {
            SqlStatement::AddColumn(stmt) => Ok(vec![add_column_sql(stmt, dialect, AutoIncrementStyle::Identity, "ADD COLUMN")]),
            other => Err(mismatch(self.name(), other)),
        }
    }
}

/// Generic `DROP COLUMN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropColumnGenerator;

impl SqlGenerator for DropColumnGenerator {
    fn name(&self) -> &'static str {
        "dropColumn"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::DropColumn
    }

    fn validate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if !dialect.supports(Capability::DropColumn) {
            errors.add_error(format!("dropping columns is not supported on {}", dialect));
        }
        errors.merge(chain.validate(statement, dialect));
        errors
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::DropColumn(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        Ok(vec![
            Sql::new(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                table_name(dialect, &stmt.table),
                dialect.quote_identifier(&stmt.column)
            ))
            .affecting(&stmt.table),
        ])
    }
}

/// Generic column rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameColumnGenerator;

impl SqlGenerator for RenameColumnGenerator {
    fn name(&self) -> &'static str {
        "renameColumn"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::RenameColumn
    }

    fn validate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if !dialect.supports(Capability::RenameColumn) {
            errors.add_error(format!("renaming columns is not supported on {}", dialect));
        }
        errors.merge(chain.validate(statement, dialect));
        errors
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::RenameColumn(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        Ok(vec![
            Sql::new(format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                table_name(dialect, &stmt.table),
                dialect.quote_identifier(&stmt.old_name),
                dialect.quote_identifier(&stmt.new_name)
            ))
            .affecting(&stmt.table),
        ])
    }
}

/// Generic `CREATE INDEX`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateIndexGenerator;

impl SqlGenerator for CreateIndexGenerator {
    fn name(&self) -> &'static str {
        "createIndex"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::CreateIndex
    }

    fn validate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let SqlStatement::CreateIndex(stmt) = statement {
            errors.check_required("indexName", Some(&stmt.name));
            errors.check_not_empty("columns", &stmt.columns);
        }
        errors.merge(chain.validate(statement, dialect));
        errors
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::CreateIndex(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        let columns: Vec<String> = stmt.columns.iter().map(|c| dialect.quote_identifier(c)).collect();
        Ok(vec![
            Sql::new(format!(
                "CREATE {}INDEX {} ON {} ({})",
                if stmt.unique { "UNIQUE " } else { "" },
                dialect.quote_identifier(&stmt.name),
                table_name(dialect, &stmt.table),
                columns.join(", ")
            ))
            .affecting(&stmt.name)
            .affecting(&stmt.table),
        ])
    }
}

/// Generic `DROP INDEX`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropIndexGenerator;

impl SqlGenerator for DropIndexGenerator {
    fn name(&self) -> &'static str {
        "dropIndex"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::DropIndex
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::DropIndex(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        Ok(vec![
            Sql::new(format!(
                "DROP INDEX {}",
                dialect.quote_object(stmt.table.schema.as_deref(), &stmt.name)
            ))
            .affecting(&stmt.name),
        ])
    }
}

/// Generic `SET NOT NULL`. SQLite cannot alter column nullability at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddNotNullGenerator;

impl SqlGenerator for AddNotNullGenerator {
    fn name(&self) -> &'static str {
        "addNotNullConstraint"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::AddNotNullConstraint
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        !in_family(dialect, DialectFamily::Sqlite)
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::AddNotNullConstraint(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        let table = table_name(dialect, &stmt.table);
        let column = dialect.quote_identifier(&stmt.column);

        let mut sql = Vec::new();
        if let Some(value) = &stmt.default_null_value {
            sql.push(
                Sql::new(format!("UPDATE {} SET {} = {} WHERE {} IS NULL", table, column, value, column))
                    .affecting(&stmt.table),
            );
        }
        sql.push(
            Sql::new(format!("ALTER TABLE {} ALTER COLUMN {} SET NOT NULL", table, column))
                .affecting(&stmt.table),
        );
        Ok(sql)
    }
}

/// Passes literal SQL through.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSqlGenerator;

impl SqlGenerator for RawSqlGenerator {
    fn name(&self) -> &'static str {
        "rawSql"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::RawSql
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::RawSql(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        let delimiter = stmt
            .end_delimiter
            .clone()
            .unwrap_or_else(|| dialect.statement_delimiter().to_string());
        Ok(vec![Sql::new(stmt.sql.trim()).with_delimiter(delimiter)])
    }
}

/// Renders script comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentGenerator;

impl SqlGenerator for CommentGenerator {
    fn name(&self) -> &'static str {
        "comment"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::Comment
    }

    fn generate(&self, statement: &SqlStatement, _dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        match statement {
            SqlStatement::Comment(stmt) => Ok(vec![Sql::comment(&stmt.text)]),
            other => Err(mismatch(self.name(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DatabaseKind;
    use crate::sqlgen::GeneratorRegistry;
    use crate::statement::{AddNotNullConstraint, CreateIndex, DropTable, RenameColumn};
    use pretty_assertions::assert_eq;

    fn render(statement: SqlStatement, dialect: &Dialect) -> Vec<String> {
        GeneratorRegistry::standard()
            .generate(&statement, dialect)
            .unwrap()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn users_table() -> CreateTable {
        CreateTable {
            table: ObjectName::new("users"),
            columns: vec![
                ColumnDef::new("id", "INTEGER").primary_key().auto_increment(),
                ColumnDef::new("email", "VARCHAR(255)").not_null().unique(),
                ColumnDef::new("active", "BOOLEAN").default_value("TRUE"),
            ],
            if_not_exists: false,
        }
    }

    #[test]
    fn test_generic_create_table() {
        let sql = render(SqlStatement::CreateTable(users_table()), &Dialect::new(DatabaseKind::H2));
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"users\" (\"id\" INTEGER GENERATED BY DEFAULT AS IDENTITY, \
                 \"email\" VARCHAR(255) NOT NULL UNIQUE, \"active\" BOOLEAN DEFAULT TRUE, \
                 PRIMARY KEY (\"id\"));"
            ]
        );
    }

    #[test]
    fn test_drop_table_if_exists_depends_on_capability() {
        let stmt = SqlStatement::DropTable(DropTable {
            table: ObjectName::new("t"),
            if_exists: true,
            cascade: true,
        });
        assert_eq!(render(stmt.clone(), &Dialect::postgres()), vec!["DROP TABLE IF EXISTS \"t\" CASCADE;"]);
        assert_eq!(render(stmt, &Dialect::new(DatabaseKind::Generic)), vec!["DROP TABLE \"t\" CASCADE;"]);
    }

    #[test]
    fn test_rename_column_generic() {
        let stmt = SqlStatement::RenameColumn(RenameColumn {
            table: ObjectName::qualified("app", "users"),
            old_name: "mail".into(),
            new_name: "email".into(),
            data_type: None,
        });
        assert_eq!(
            render(stmt, &Dialect::postgres()),
            vec!["ALTER TABLE \"app\".\"users\" RENAME COLUMN \"mail\" TO \"email\";"]
        );
    }

    #[test]
    fn test_create_index_unique() {
        let stmt = SqlStatement::CreateIndex(CreateIndex {
            name: "idx_users_email".into(),
            table: ObjectName::new("users"),
            columns: vec!["email".into()],
            unique: true,
        });
        assert_eq!(
            render(stmt, &Dialect::postgres()),
            vec!["CREATE UNIQUE INDEX \"idx_users_email\" ON \"users\" (\"email\");"]
        );
    }

    #[test]
    fn test_add_not_null_with_backfill() {
        let stmt = SqlStatement::AddNotNullConstraint(AddNotNullConstraint {
            table: ObjectName::new("users"),
            column: "email".into(),
            data_type: None,
            default_null_value: Some("''".into()),
        });
        assert_eq!(
            render(stmt, &Dialect::postgres()),
            vec![
                "UPDATE \"users\" SET \"email\" = '' WHERE \"email\" IS NULL;",
                "ALTER TABLE \"users\" ALTER COLUMN \"email\" SET NOT NULL;",
            ]
        );
    }

    #[test]
    fn test_add_not_null_unsupported_on_sqlite() {
        let stmt = SqlStatement::AddNotNullConstraint(AddNotNullConstraint {
            table: ObjectName::new("users"),
            column: "email".into(),
            data_type: None,
            default_null_value: None,
        });
        let err = GeneratorRegistry::standard()
            .generate(&stmt, &Dialect::sqlite())
            .unwrap_err();
        assert!(matches!(err, MigrationError::UnsupportedStatement { .. }));
    }

    #[test]
    fn test_raw_sql_keeps_custom_delimiter() {
        let stmt = SqlStatement::RawSql(crate::statement::RawSql {
            sql: "  EXEC p  ".into(),
            end_delimiter: Some("\nGO".into()),
        });
        assert_eq!(render(stmt, &Dialect::mssql()), vec!["EXEC p\nGO"]);
    }

    #[test]
    fn test_create_table_validation() {
        let stmt = SqlStatement::CreateTable(CreateTable {
            table: ObjectName::new(""),
            columns: vec![],
            if_not_exists: false,
        });
        let errors = GeneratorRegistry::standard().validate(&stmt, &Dialect::new(DatabaseKind::H2));
        assert_eq!(errors.errors().len(), 2);
    }
}
