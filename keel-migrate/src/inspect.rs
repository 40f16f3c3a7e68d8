//! Live schema inspection used by `check_status`.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::error::MigrateResult;
use crate::statement::ObjectName;

/// Answers existence questions about the target schema.
///
/// Only consulted for status reporting, never for the execution decision.
#[async_trait::async_trait]
pub trait SchemaInspector: Send + Sync {
    /// Whether a table exists.
    async fn table_exists(&self, table: &ObjectName) -> MigrateResult<bool>;

    /// Whether a column exists on a table.
    async fn column_exists(&self, table: &ObjectName, column: &str) -> MigrateResult<bool>;

    /// Whether an index exists.
    async fn index_exists(&self, table: &ObjectName, index: &str) -> MigrateResult<bool>;
}

/// A fixed, in-memory picture of a schema.
#[derive(Debug, Default)]
pub struct SnapshotInspector {
    tables: RwLock<HashSet<String>>,
    columns: RwLock<HashSet<(String, String)>>,
    indexes: RwLock<HashSet<String>>,
}

impl SnapshotInspector {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table with its columns.
    pub fn with_table(self, table: &str, columns: &[&str]) -> Self {
        self.tables.write().insert(table.to_ascii_lowercase());
        let mut known = self.columns.write();
        for column in columns {
            known.insert((table.to_ascii_lowercase(), column.to_ascii_lowercase()));
        }
        drop(known);
        self
    }

    /// Add an index.
    pub fn with_index(self, index: &str) -> Self {
        self.indexes.write().insert(index.to_ascii_lowercase());
        self
    }
}

#[async_trait::async_trait]
impl SchemaInspector for SnapshotInspector {
    async fn table_exists(&self, table: &ObjectName) -> MigrateResult<bool> {
        Ok(self.tables.read().contains(&table.name.to_ascii_lowercase()))
    }

    async fn column_exists(&self, table: &ObjectName, column: &str) -> MigrateResult<bool> {
        let key = (table.name.to_ascii_lowercase(), column.to_ascii_lowercase());
        Ok(self.columns.read().contains(&key))
    }

    async fn index_exists(&self, _table: &ObjectName, index: &str) -> MigrateResult<bool> {
        Ok(self.indexes.read().contains(&index.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_inspector() {
        let inspector = SnapshotInspector::new()
            .with_table("Users", &["id", "Email"])
            .with_index("idx_users_email");
        let users = ObjectName::new("users");

        assert!(inspector.table_exists(&users).await.unwrap());
        assert!(!inspector.table_exists(&ObjectName::new("orders")).await.unwrap());
        assert!(inspector.column_exists(&users, "email").await.unwrap());
        assert!(!inspector.column_exists(&users, "name").await.unwrap());
        assert!(inspector.index_exists(&users, "IDX_USERS_EMAIL").await.unwrap());
    }
}
