//! Statement execution.

use std::fmt::Write as _;

use parking_lot::Mutex;

use crate::changeset::ChangeSetId;
use crate::error::MigrateResult;
use crate::statement::Sql;

/// The SQL of one changeset, executed as one logical unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionUnit {
    /// Owning changeset.
    pub changeset: ChangeSetId,
    /// Changeset description, for script headers.
    pub description: String,
    /// Fragments in execution order.
    pub sql: Vec<Sql>,
    /// Whether the fragments must share one transaction.
    pub run_in_transaction: bool,
}

impl ExecutionUnit {
    pub fn new(changeset: ChangeSetId, sql: Vec<Sql>) -> Self {
        Self {
            changeset,
            description: String::new(),
            sql,
            run_in_transaction: true,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the transaction policy.
    pub fn with_transaction(mut self, run_in_transaction: bool) -> Self {
        self.run_in_transaction = run_in_transaction;
        self
    }

    /// Fragments that reach the database.
    pub fn executable(&self) -> impl Iterator<Item = &Sql> {
        self.sql.iter().filter(|s| !s.is_comment())
    }
}

/// Executes units against a live connection or renders them.
///
/// A unit either succeeds as a whole or fails; a failing unit must leave no
/// committed statements behind when it runs in a transaction.
#[async_trait::async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(&self, unit: &ExecutionUnit) -> MigrateResult<()>;

    /// Whether output is rendered rather than executed.
    fn is_offline(&self) -> bool {
        false
    }
}

/// Renders units into a SQL script instead of executing them.
#[derive(Debug, Default)]
pub struct SqlScriptExecutor {
    script: Mutex<String>,
}

impl SqlScriptExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script rendered so far.
    pub fn script(&self) -> String {
        self.script.lock().clone()
    }

    /// Take the script, leaving it empty.
    pub fn take_script(&self) -> String {
        std::mem::take(&mut *self.script.lock())
    }

    /// Append a free-form comment line.
    pub fn comment(&self, text: &str) {
        let _ = writeln!(self.script.lock(), "{}", Sql::comment(text));
    }
}

#[async_trait::async_trait]
impl StatementExecutor for SqlScriptExecutor {
    async fn execute(&self, unit: &ExecutionUnit) -> MigrateResult<()> {
        let mut script = self.script.lock();
        let _ = writeln!(script, "-- Changeset {}", unit.changeset);
        if !unit.description.is_empty() {
            let _ = writeln!(script, "-- {}", unit.description);
        }
        for sql in &unit.sql {
            let _ = writeln!(script, "{}", sql);
        }
        script.push('\n');
        Ok(())
    }

    fn is_offline(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_script_rendering() {
        let executor = SqlScriptExecutor::new();
        let unit = ExecutionUnit::new(
            ChangeSetId::new("c.yaml", "1", "alice"),
            vec![
                Sql::comment("seed data"),
                Sql::new("INSERT INTO t VALUES (1)"),
                Sql::new("EXEC p").with_delimiter("\nGO"),
            ],
        )
        .with_description("sql");

        executor.execute(&unit).await.unwrap();
        assert_eq!(
            executor.take_script(),
            "-- Changeset c.yaml::1::alice\n-- sql\n-- seed data\nINSERT INTO t VALUES (1);\nEXEC p\nGO\n\n"
        );
        assert!(executor.script().is_empty());
        assert!(executor.is_offline());
        assert_eq!(unit.executable().count(), 2);
    }
}
