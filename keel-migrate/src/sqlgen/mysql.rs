//! MySQL and MariaDB overrides.

use crate::dialect::{Dialect, DialectFamily};
use crate::error::MigrateResult;
use crate::statement::{Sql, SqlStatement, StatementKind};
use crate::validation::ValidationErrors;

use super::standard::{AutoIncrementStyle, add_column_sql, create_table_sql, mismatch, table_name};
use super::{GeneratorChain, Specificity, SqlGenerator, in_family};

fn is_mysql(dialect: &Dialect) -> bool {
    in_family(dialect, DialectFamily::MySql)
}

/// Servers before 8.0 have no `RENAME COLUMN` and need the full definition.
fn needs_change_syntax(dialect: &Dialect) -> bool {
    dialect.has_version() && !dialect.is_at_least(8, 0)
}

/// `CREATE TABLE` with `AUTO_INCREMENT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlCreateTableGenerator;

impl SqlGenerator for MySqlCreateTableGenerator {
    fn name(&self) -> &'static str {
        "mysqlCreateTable"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::CreateTable
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mysql(dialect)
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        match statement {
            SqlStatement::CreateTable(stmt) => Ok(vec![create_table_sql(stmt, dialect, AutoIncrementStyle::AutoIncrement)]),
            other => Err(mismatch(self.name(), other)),
        }
    }
}

/// `ADD COLUMN` with `AUTO_INCREMENT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlAddColumnGenerator;

impl SqlGenerator for MySqlAddColumnGenerator {
    fn name(&self) -> &'static str {
        "mysqlAddColumn"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::AddColumn
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mysql(dialect)
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        match statement {
            SqlStatement::AddColumn(stmt) => Ok(vec![add_column_sql(stmt, dialect, AutoIncrementStyle::AutoIncrement, "ADD COLUMN")]),
            other => Err(mismatch(self.name(), other)),
        }
    }
}

/// Column rename using `CHANGE` on servers before 8.0.
///
/// With an unknown server version the output depends on the live server, so the
/// statement cannot be rendered offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlRenameColumnGenerator;

impl SqlGenerator for MySqlRenameColumnGenerator {
    fn name(&self) -> &'static str {
        "mysqlRenameColumn"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::RenameColumn
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mysql(dialect)
    }

    fn is_volatile(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        !dialect.has_version()
    }

    fn validate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let SqlStatement::RenameColumn(stmt) = statement {
            if needs_change_syntax(dialect) && stmt.data_type.is_none() {
                errors.add_error(format!("columnDataType is required to rename a column on {}", dialect));
            }
        }
        errors.merge(chain.validate(statement, dialect));
        errors
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::RenameColumn(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        if !needs_change_syntax(dialect) {
            return chain.generate(statement, dialect);
        }
        let data_type = stmt.data_type.as_deref().unwrap_or_default();
        Ok(vec![
            Sql::new(format!(
                "ALTER TABLE {} CHANGE {} {} {}",
                table_name(dialect, &stmt.table),
                dialect.quote_identifier(&stmt.old_name),
                dialect.quote_identifier(&stmt.new_name),
                data_type
            ))
            .affecting(&stmt.table),
        ])
    }
}

/// `DROP INDEX ... ON table`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDropIndexGenerator;

impl SqlGenerator for MySqlDropIndexGenerator {
    fn name(&self) -> &'static str {
        "mysqlDropIndex"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::DropIndex
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mysql(dialect)
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::DropIndex(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        Ok(vec![
            Sql::new(format!(
                "DROP INDEX {} ON {}",
                dialect.quote_identifier(&stmt.name),
                table_name(dialect, &stmt.table)
            ))
            .affecting(&stmt.name),
        ])
    }
}

/// NOT NULL via `MODIFY`, which restates the column type.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlAddNotNullGenerator;

impl SqlGenerator for MySqlAddNotNullGenerator {
    fn name(&self) -> &'static str {
        "mysqlAddNotNullConstraint"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::AddNotNullConstraint
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mysql(dialect)
    }

    fn validate(&self, statement: &SqlStatement, _dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let SqlStatement::AddNotNullConstraint(stmt) = statement {
            errors.check_required("columnDataType", stmt.data_type.as_deref());
        }
        errors
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
            Sql::new(format!(
                "ALTER TABLE {} MODIFY {} {} NOT NULL",
                table,
                column,
                stmt.data_type.as_deref().unwrap_or_default()
            ))
            .affecting(&stmt.table),
        );
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlgen::GeneratorRegistry;
    use crate::statement::{AddNotNullConstraint, ColumnDef, CreateTable, DropIndex, ObjectName, RenameColumn};
    use pretty_assertions::assert_eq;

    fn rename(data_type: Option<&str>) -> SqlStatement {
        SqlStatement::RenameColumn(RenameColumn {
            table: ObjectName::new("users"),
            old_name: "mail".into(),
            new_name: "email".into(),
            data_type: data_type.map(String::from),
        })
    }

    #[test]
    fn test_auto_increment() {
        let stmt = SqlStatement::CreateTable(CreateTable {
            table: ObjectName::new("t"),
            columns: vec![ColumnDef::new("id", "INT").primary_key().auto_increment()],
            if_not_exists: false,
        });
        let sql = GeneratorRegistry::standard().generate(&stmt, &Dialect::mysql()).unwrap();
        assert_eq!(sql[0].text, "CREATE TABLE `t` (`id` INT AUTO_INCREMENT, PRIMARY KEY (`id`))");
    }

    #[test]
    fn test_rename_column_by_version() {
        let registry = GeneratorRegistry::standard();

        let modern = registry.generate(&rename(None), &Dialect::mysql().with_version(8, 0)).unwrap();
        assert_eq!(modern[0].text, "ALTER TABLE `users` RENAME COLUMN `mail` TO `email`");

        let old = Dialect::mysql().with_version(5, 7);
        let legacy = registry.generate(&rename(Some("VARCHAR(255)")), &old).unwrap();
        assert_eq!(legacy[0].text, "ALTER TABLE `users` CHANGE `mail` `email` VARCHAR(255)");

        assert!(registry.validate(&rename(None), &old).has_errors());
        assert!(!registry.validate(&rename(None), &Dialect::mysql().with_version(8, 0)).has_errors());
    }

    #[test]
    fn test_rename_column_volatile_without_version() {
        let registry = GeneratorRegistry::standard();
        assert!(registry.is_volatile(&rename(None), &Dialect::mysql()));
        assert!(!registry.is_volatile(&rename(None), &Dialect::mysql().with_version(8, 0)));
        assert!(!registry.is_volatile(&rename(None), &Dialect::postgres()));
    }

    #[test]
    fn test_drop_index_on_table() {
        let stmt = SqlStatement::DropIndex(DropIndex {
            name: "idx".into(),
            table: ObjectName::new("users"),
        });
        let sql = GeneratorRegistry::standard().generate(&stmt, &Dialect::mysql()).unwrap();
        assert_eq!(sql[0].text, "DROP INDEX `idx` ON `users`");
    }

    #[test]
    fn test_add_not_null_requires_type() {
        let stmt = SqlStatement::AddNotNullConstraint(AddNotNullConstraint {
            table: ObjectName::new("users"),
            column: "email".into(),
            data_type: None,
            default_null_value: None,
        });
        assert!(GeneratorRegistry::standard().validate(&stmt, &Dialect::mysql()).has_errors());
    }
}
