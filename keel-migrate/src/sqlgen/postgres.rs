//! PostgreSQL overrides: identity columns become `SERIAL` types.

use crate::dialect::{Dialect, DialectFamily};
use crate::error::MigrateResult;
use crate::statement::{Sql, SqlStatement, StatementKind};

use super::standard::{AutoIncrementStyle, add_column_sql, create_table_sql, mismatch};
use super::{GeneratorChain, Specificity, SqlGenerator, in_family};

/// `CREATE TABLE` with `SERIAL` identity columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresCreateTableGenerator;

impl SqlGenerator for PostgresCreateTableGenerator {
    fn name(&self) -> &'static str {
        "postgresCreateTable"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::CreateTable
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        in_family(dialect, DialectFamily::Postgres)
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        match statement {
            SqlStatement::CreateTable(stmt) => Ok(vec![create_table_sql(stmt, dialect, AutoIncrementStyle::Serial)]),
            other => Err(mismatch(self.name(), other)),
        }
    }
}

/// `ADD COLUMN` with `SERIAL` identity columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresAddColumnGenerator;

impl SqlGenerator for PostgresAddColumnGenerator {
    fn name(&self) -> &'static str {
        "postgresAddColumn"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::AddColumn
    }

    fn specificity(&self) -> Specificity {
        Specificity::Family
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        in_family(dialect, DialectFamily::Postgres)
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, _chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        match statement {
            SqlStatement::AddColumn(stmt) => Ok(vec![add_column_sql(stmt, dialect, AutoIncrementStyle::Serial, "ADD COLUMN")]),
            other => Err(mismatch(self.name(), other)),
        }
    }
}
