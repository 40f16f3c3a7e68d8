//! SQLite connection, statement executor and schema inspector.

use std::sync::Arc;

use keel_migrate::statement::ObjectName;
use keel_migrate::{Dialect, ExecutionUnit, MigrateResult, SchemaInspector, StatementExecutor};
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};

/// A SQLite database acting as history store, executor and inspector.
///
/// Clones share the same background connection.
#[derive(Clone)]
pub struct SqliteDatabase {
    pub(crate) conn: Connection,
    pub(crate) config: Arc<SqliteConfig>,
    dialect: Dialect,
}

impl SqliteDatabase {
    /// Open the database and apply the configured pragmas.
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        config.validate()?;

        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path).await?,
        };

        let init_sql = config.init_sql();
        let version = conn
            .call(move |conn| {
                conn.execute_batch(&init_sql)?;
                Ok(conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0))?)
            })
            .await?;

        let dialect = match parse_version(&version) {
            Some((major, minor)) => Dialect::sqlite().with_version(major, minor),
            None => Dialect::sqlite(),
        };
        info!(path = %config.path_str(), version = %version, "opened SQLite database");

        Ok(Self {
            conn,
            config: Arc::new(config),
            dialect,
        })
    }

    /// Open a private in-memory database.
    pub async fn memory() -> SqliteResult<Self> {
        Self::open(SqliteConfig::memory()).await
    }

    /// Dialect of the connected server, with its version.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Get the inner connection.
    pub fn inner(&self) -> &Connection {
        &self.conn
    }

    /// Run a query returning one integer.
    pub async fn query_i64(&self, sql: &str) -> SqliteResult<i64> {
        let sql = sql.to_string();
        debug!(sql = %sql, "Executing scalar query");

        self.conn
            .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get::<_, i64>(0))?))
            .await
            .map_err(SqliteError::from)
    }

    async fn count(&self, sql: &'static str, args: Vec<String>) -> SqliteResult<bool> {
        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(sql, rusqlite::params_from_iter(args.iter()), |row| row.get(0))?;
                Ok(count > 0)
            })
            .await
            .map_err(SqliteError::from)
    }
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("path", &self.config.path_str())
            .field("dialect", &self.dialect.to_string())
            .finish()
    }
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

#[async_trait::async_trait]
impl StatementExecutor for SqliteDatabase {
    async fn execute(&self, unit: &ExecutionUnit) -> MigrateResult<()> {
        let statements: Vec<String> = unit.executable().map(|sql| sql.text.clone()).collect();
        if statements.is_empty() {
            return Ok(());
        }

        let in_transaction = unit.run_in_transaction;
        debug!(
            changeset = %unit.changeset,
            statements = statements.len(),
            in_transaction,
            "executing changeset on SQLite"
        );

        // A failed statement is reported with its text; dropping the
        // transaction rolls back everything before it.
        let failed = self
            .conn
            .call(move |conn| {
                if in_transaction {
                    let tx = conn.transaction()?;
                    for sql in &statements {
                        if let Err(e) = tx.execute_batch(sql) {
                            return Ok(Some((sql.clone(), e.to_string())));
                        }
                    }
                    tx.commit()?;
                } else {
                    for sql in &statements {
                        if let Err(e) = conn.execute_batch(sql) {
                            return Ok(Some((sql.clone(), e.to_string())));
                        }
                    }
                }
                Ok(None)
            })
            .await
            .map_err(SqliteError::from)?;

        match failed {
            Some((sql, message)) => Err(SqliteError::statement(sql, message).into()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl SchemaInspector for SqliteDatabase {
    async fn table_exists(&self, table: &ObjectName) -> MigrateResult<bool> {
        Ok(self
            .count(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                vec![table.name.clone()],
            )
            .await?)
    }

    async fn column_exists(&self, table: &ObjectName, column: &str) -> MigrateResult<bool> {
        Ok(self
            .count(
                "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2 COLLATE NOCASE",
                vec![table.name.clone(), column.to_string()],
            )
            .await?)
    }

    async fn index_exists(&self, _table: &ObjectName, index: &str) -> MigrateResult<bool> {
        Ok(self
            .count(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1 COLLATE NOCASE",
                vec![index.to_string()],
            )
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_migrate::{ChangeSetId, Sql};
    use pretty_assertions::assert_eq;

    fn unit(id: &str, sql: &[&str]) -> ExecutionUnit {
        ExecutionUnit::new(
            ChangeSetId::new("c.yaml", id, "alice"),
            sql.iter().map(|s| Sql::new(*s)).collect(),
        )
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("3.46.0"), Some((3, 46)));
        assert_eq!(parse_version("garbage"), None);
    }

    #[tokio::test]
    async fn test_open_reports_version() {
        let db = SqliteDatabase::memory().await.unwrap();
        assert!(db.dialect().is_at_least(3, 0));
        assert_eq!(db.query_i64("SELECT 40 + 2").await.unwrap(), 42);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_open_refuses_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"keel-\xff.db"));
        let err = SqliteDatabase::open(SqliteConfig::file(&path)).await.unwrap_err();
        assert!(matches!(err, SqliteError::Config(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_unit_rolls_back() {
        let db = SqliteDatabase::memory().await.unwrap();
        db.execute(&unit("1", &["CREATE TABLE t (id INTEGER PRIMARY KEY)"])).await.unwrap();

        let err = db
            .execute(&unit("2", &["INSERT INTO t (id) VALUES (1)", "INSERT INTO missing VALUES (1)"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert_eq!(db.query_i64("SELECT COUNT(*) FROM t").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_transactional_unit_keeps_earlier_statements() {
        let db = SqliteDatabase::memory().await.unwrap();
        db.execute(&unit("1", &["CREATE TABLE t (id INTEGER PRIMARY KEY)"])).await.unwrap();

        let partial = unit("2", &["INSERT INTO t (id) VALUES (1)", "INSERT INTO missing VALUES (1)"]).with_transaction(false);
        assert!(db.execute(&partial).await.is_err());
        assert_eq!(db.query_i64("SELECT COUNT(*) FROM t").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_inspector() {
        let db = SqliteDatabase::memory().await.unwrap();
        db.execute(&unit(
            "1",
            &["CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT)", "CREATE INDEX users_email ON users (email)"],
        ))
        .await
        .unwrap();

        let users = ObjectName::new("USERS");
        assert!(db.table_exists(&users).await.unwrap());
        assert!(db.column_exists(&users, "email").await.unwrap());
        assert!(!db.column_exists(&users, "name").await.unwrap());
        assert!(db.index_exists(&users, "users_email").await.unwrap());
        assert!(!db.table_exists(&ObjectName::new("orders")).await.unwrap());
    }
}
