//! SQL Server overrides.

use crate::dialect::{Dialect, DialectFamily};
use crate::error::MigrateResult;
use crate::statement::{ObjectName, Sql, SqlStatement, StatementKind};
use crate::validation::ValidationErrors;

use super::standard::{AutoIncrementStyle, add_column_sql, create_table_sql, mismatch, table_name};
use super::{GeneratorChain, Specificity, SqlGenerator, in_family};

fn is_mssql(dialect: &Dialect) -> bool {
    in_family(dialect, DialectFamily::SqlServer)
}

/// Unquoted `schema.name` for `sp_rename` arguments.
fn rename_target(table: &ObjectName) -> String {
    table.to_string().replace('\'', "''")
}

/// `CREATE TABLE` with `IDENTITY(1,1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlCreateTableGenerator;

impl SqlGenerator for MssqlCreateTableGenerator {
    fn name(&self) -> &'static str {
        "mssqlCreateTable"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::CreateTable
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mssql(dialect)
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        match statement {
            SqlStatement::CreateTable(stmt) => Ok(vec![create_table_sql(stmt, dialect, AutoIncrementStyle::MssqlIdentity)]),
            other => Err(mismatch(self.name(), other)),
        }
    }
}

/// `ALTER TABLE ... ADD` (no `COLUMN` keyword).
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlAddColumnGenerator;

impl SqlGenerator for MssqlAddColumnGenerator {
    fn name(&self) -> &'static str {
        "mssqlAddColumn"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::AddColumn
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mssql(dialect)
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        match statement {
            SqlStatement::AddColumn(stmt) => Ok(vec![add_column_sql(stmt, dialect, AutoIncrementStyle::MssqlIdentity, "ADD")]),
            other => Err(mismatch(self.name(), other)),
        }
    }
}

/// Table rename through `sp_rename`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlRenameTableGenerator;

impl SqlGenerator for MssqlRenameTableGenerator {
    fn name(&self) -> &'static str {
        "mssqlRenameTable"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::RenameTable
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mssql(dialect)
    }

    fn generate(&self, statement: &SqlStatement, _dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::RenameTable(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        Ok(vec![
            Sql::new(format!(
                "EXEC sp_rename '{}', '{}'",
                rename_target(&stmt.table),
                stmt.new_name.replace('\'', "''")
            ))
            .affecting(&stmt.table)
            .affecting(&stmt.new_name),
        ])
    }
}

/// Column rename through `sp_rename`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlRenameColumnGenerator;

impl SqlGenerator for MssqlRenameColumnGenerator {
    fn name(&self) -> &'static str {
        "mssqlRenameColumn"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::RenameColumn
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mssql(dialect)
    }

    fn generate(&self, statement: &SqlStatement, _dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let SqlStatement::RenameColumn(stmt) = statement else {
            return Err(mismatch(self.name(), statement));
        };
        Ok(vec![
            Sql::new(format!(
                "EXEC sp_rename '{}.{}', '{}', 'COLUMN'",
                rename_target(&stmt.table),
                stmt.old_name.replace('\'', "''"),
                stmt.new_name.replace('\'', "''")
            ))
            .affecting(&stmt.table),
        ])
    }
}

/// `DROP INDEX ... ON table`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDropIndexGenerator;

impl SqlGenerator for MssqlDropIndexGenerator {
    fn name(&self) -> &'static str {
        "mssqlDropIndex"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::DropIndex
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mssql(dialect)
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

/// NOT NULL via `ALTER COLUMN`, which restates the column type.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlAddNotNullGenerator;

impl SqlGenerator for MssqlAddNotNullGenerator {
    fn name(&self) -> &'static str {
        "mssqlAddNotNullConstraint"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::AddNotNullConstraint
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_mssql(dialect)
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
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
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
    use crate::statement::{AddColumn, ColumnDef, RenameColumn, RenameTable};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_identity_column() {
        let stmt = SqlStatement::AddColumn(AddColumn {
            table: ObjectName::qualified("dbo", "orders"),
            column: ColumnDef::new("id", "INT").not_null().auto_increment(),
        });
        let sql = GeneratorRegistry::standard().generate(&stmt, &Dialect::mssql()).unwrap();
        assert_eq!(sql[0].text, "ALTER TABLE [dbo].[orders] ADD [id] INT IDENTITY(1,1) NOT NULL");
    }

    #[test]
    fn test_sp_rename() {
        let registry = GeneratorRegistry::standard();
        let table = SqlStatement::RenameTable(RenameTable {
            table: ObjectName::qualified("dbo", "orders"),
            new_name: "purchases".into(),
        });
        assert_eq!(
            registry.generate(&table, &Dialect::mssql()).unwrap()[0].text,
            "EXEC sp_rename 'dbo.orders', 'purchases'"
        );

        let column = SqlStatement::RenameColumn(RenameColumn {
            table: ObjectName::new("orders"),
            old_name: "qty".into(),
            new_name: "quantity".into(),
            data_type: None,
        });
        assert_eq!(
            registry.generate(&column, &Dialect::mssql()).unwrap()[0].text,
            "EXEC sp_rename 'orders.qty', 'quantity', 'COLUMN'"
        );
    }
}
