//! SQLite overrides.

use crate::dialect::{Dialect, DialectFamily};
use crate::error::MigrateResult;
use crate::statement::{DropTable, Sql, SqlStatement, StatementKind};
use crate::validation::ValidationErrors;

use super::standard::{AutoIncrementStyle, create_table_sql, mismatch};
use super::{GeneratorChain, Specificity, SqlGenerator, in_family};

fn is_sqlite(dialect: &Dialect) -> bool {
    in_family(dialect, DialectFamily::Sqlite)
}

/// `CREATE TABLE` with an inline `INTEGER PRIMARY KEY AUTOINCREMENT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCreateTableGenerator;

impl SqlGenerator for SqliteCreateTableGenerator {
    fn name(&self) -> &'static str {
        "sqliteCreateTable"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::CreateTable
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_sqlite(dialect)
    }

    fn validate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let SqlStatement::CreateTable(stmt) = statement {
            let auto: Vec<_> = stmt.columns.iter().filter(|c| c.auto_increment).collect();
            let pk = stmt.columns.iter().filter(|c| c.primary_key).count();
            if auto.iter().any(|c| !c.primary_key) || (!auto.is_empty() && pk > 1) {
                errors.add_error("sqlite only supports autoIncrement on a single-column primary key");
            }
        }
        errors.merge(chain.validate(statement, dialect));
        errors
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        match statement {
            SqlStatement::CreateTable(stmt) => Ok(vec![create_table_sql(stmt, dialect, AutoIncrementStyle::SqliteInline)]),
            other => Err(mismatch(self.name(), other)),
        }
    }
}

/// `DROP TABLE` without `CASCADE`, which SQLite does not parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDropTableGenerator;

impl SqlGenerator for SqliteDropTableGenerator {
    fn name(&self) -> &'static str {
        "sqliteDropTable"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::DropTable
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_sqlite(dialect)
    }

    fn warn(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> Vec<String> {
        let mut warnings = chain.warn(statement, dialect);
        if let SqlStatement::DropTable(stmt) = statement {
            if stmt.cascade {
                warnings.push(format!("cascadeConstraints is ignored on {}", dialect));
            }
        }
        warnings
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::DropTable(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        let without_cascade = SqlStatement::DropTable(DropTable {
            cascade: false,
            ..stmt.clone()
        });
        chain.generate(&without_cascade, dialect)
    }
}

/// `DROP COLUMN`, available from SQLite 3.35.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDropColumnGenerator;

impl SqlGenerator for SqliteDropColumnGenerator {
    fn name(&self) -> &'static str {
        "sqliteDropColumn"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::DropColumn
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_sqlite(dialect)
    }

    fn validate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if dialect.has_version() && !dialect.is_at_least(3, 35) {
            errors.add_error(format!("dropping columns requires sqlite 3.35 or later, found {}", dialect));
        }
        errors.merge(chain.validate(statement, dialect));
        errors
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        chain.generate(statement, dialect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlgen::GeneratorRegistry;
    use crate::statement::{ColumnDef, CreateTable, DropColumn, ObjectName};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inline_autoincrement() {
        let stmt = SqlStatement::CreateTable(CreateTable {
            table: ObjectName::new("t"),
            columns: vec![
                ColumnDef::new("id", "INTEGER").primary_key().auto_increment(),
                ColumnDef::new("name", "TEXT").not_null(),
            ],
            if_not_exists: false,
        });
        let sql = GeneratorRegistry::standard().generate(&stmt, &Dialect::sqlite()).unwrap();
        assert_eq!(
            sql[0].text,
            "CREATE TABLE \"t\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" TEXT NOT NULL)"
        );
    }

    #[test]
    fn test_drop_table_strips_cascade_and_warns() {
        let stmt = SqlStatement::DropTable(DropTable {
            table: ObjectName::new("t"),
            if_exists: true,
            cascade: true,
        });
        let registry = GeneratorRegistry::standard();
        let sql = registry.generate(&stmt, &Dialect::sqlite()).unwrap();
        assert_eq!(sql[0].text, "DROP TABLE IF EXISTS \"t\"");
        assert_eq!(registry.warn(&stmt, &Dialect::sqlite()).len(), 1);
    }

    #[test]
    fn test_drop_column_version_check() {
        let stmt = SqlStatement::DropColumn(DropColumn {
            table: ObjectName::new("t"),
            column: "c".into(),
        });
        let registry = GeneratorRegistry::standard();
        assert!(registry.validate(&stmt, &Dialect::sqlite().with_version(3, 34)).has_errors());
        assert!(!registry.validate(&stmt, &Dialect::sqlite().with_version(3, 45)).has_errors());

        let sql = registry.generate(&stmt, &Dialect::sqlite()).unwrap();
        assert_eq!(sql[0].text, "ALTER TABLE \"t\" DROP COLUMN \"c\"");
    }
}
