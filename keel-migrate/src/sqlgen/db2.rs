//! DB2 table reorganization.
//!
//! DB2 LUW leaves a table in "reorg pending" state after some `ALTER TABLE`
//! statements. This generator sits in front of every `ALTER TABLE` shaped
//! generator, lets the chain render the alteration, then appends the reorg call.

use crate::dialect::{Capability, DatabaseKind, Dialect};
use crate::error::MigrateResult;
use crate::statement::{Sql, SqlStatement, StatementKind};

use super::{GeneratorChain, Specificity, SqlGenerator, is_kind};

/// Appends `REORG TABLE` after any alter-table statement on DB2.
#[derive(Debug, Clone, Copy, Default)]
pub struct Db2ReorgTableGenerator;

impl SqlGenerator for Db2ReorgTableGenerator {
    fn name(&self) -> &'static str {
        "db2ReorgTable"
    }

    fn statement_kind(&self) -> StatementKind {
        StatementKind::AlterTable
    }

    fn specificity(&self) -> Specificity {
        Specificity::Dialect
    }

    fn supports(&self, _statement: &SqlStatement, dialect: &Dialect) -> bool {
        is_kind(dialect, DatabaseKind::Db2) && dialect.supports(Capability::ReorgAfterAlter)
    }

    fn generate(&self, statement: &SqlStatement, dialect: &Dialect, chain: &mut GeneratorChain<'_>) -> MigrateResult<Vec<Sql>> {
        let mut sql = chain.generate(statement, dialect)?;
        if let Some(table) = statement.table() {
            let target = match &table.schema {
                Some(schema) => format!("{}.{}", schema, table.name),
                None => table.name.clone(),
            };
            sql.push(
                Sql::new(format!(
                    "CALL SYSPROC.ADMIN_CMD('REORG TABLE {}')",
                    target.to_ascii_uppercase().replace('\'', "''")
                ))
                .affecting(table),
            );
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlgen::GeneratorRegistry;
    use crate::statement::{AddColumn, ColumnDef, CreateIndex, ObjectName};
    use pretty_assertions::assert_eq;

    fn add_column() -> SqlStatement {
        SqlStatement::AddColumn(AddColumn {
            table: ObjectName::qualified("app", "users"),
            column: ColumnDef::new("email", "VARCHAR(255)"),
        })
    }

    #[test]
    fn test_reorg_appended_after_generic_alter() {
        let sql = GeneratorRegistry::standard()
            .generate(&add_column(), &Dialect::db2())
            .unwrap();
        let texts: Vec<&str> = sql.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "ALTER TABLE \"app\".\"users\" ADD COLUMN \"email\" VARCHAR(255)",
                "CALL SYSPROC.ADMIN_CMD('REORG TABLE APP.USERS')",
            ]
        );
    }

    #[test]
    fn test_no_reorg_when_capability_disabled() {
        let dialect = Dialect::db2().without_capability(Capability::ReorgAfterAlter);
        let sql = GeneratorRegistry::standard().generate(&add_column(), &dialect).unwrap();
        assert_eq!(sql.len(), 1);
    }

    #[test]
    fn test_no_reorg_for_non_alter_statements() {
        let stmt = SqlStatement::CreateIndex(CreateIndex {
            name: "idx".into(),
            table: ObjectName::new("users"),
            columns: vec!["email".into()],
            unique: false,
        });
        let sql = GeneratorRegistry::standard().generate(&stmt, &Dialect::db2()).unwrap();
        assert_eq!(sql.len(), 1);
    }

    #[test]
    fn test_no_reorg_on_db2z() {
        let sql = GeneratorRegistry::standard()
            .generate(&add_column(), &Dialect::new(DatabaseKind::Db2z))
            .unwrap();
        assert_eq!(sql.len(), 1);
    }
}
