//! Execution history and changelog lock tables.

use chrono::{DateTime, Utc};
use keel_migrate::{
    ChangeSetId, Checksum, ExecType, ExecutionHistoryStore, ExecutionLock, ExecutionRecord, MigrateResult,
    MigrationError,
};
use rusqlite::params;
use tracing::{debug, warn};

use crate::database::SqliteDatabase;
use crate::error::{SqliteError, SqliteResult};

const COLUMNS: &str = "id, author, filename, date_executed, order_executed, exec_type, checksum, \
                       description, comments, tag, deployment_id, engine_version";

/// A history row as stored, before decoding.
struct StoredRecord {
    id: String,
    author: String,
    filename: String,
    date_executed: String,
    order_executed: i64,
    exec_type: String,
    checksum: Option<String>,
    description: Option<String>,
    comments: Option<String>,
    tag: Option<String>,
    deployment_id: Option<String>,
    engine_version: Option<String>,
}

impl StoredRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author: row.get(1)?,
            filename: row.get(2)?,
            date_executed: row.get(3)?,
            order_executed: row.get(4)?,
            exec_type: row.get(5)?,
            checksum: row.get(6)?,
            description: row.get(7)?,
            comments: row.get(8)?,
            tag: row.get(9)?,
            deployment_id: row.get(10)?,
            engine_version: row.get(11)?,
        })
    }

    fn decode(self) -> SqliteResult<ExecutionRecord> {
        let checksum = self
            .checksum
            .as_deref()
            .map(Checksum::parse)
            .transpose()
            .map_err(|e| SqliteError::deserialization(e.to_string()))?;
        let executed_at = DateTime::parse_from_rfc3339(&self.date_executed)
            .map_err(|e| SqliteError::deserialization(format!("date_executed '{}': {}", self.date_executed, e)))?
            .with_timezone(&Utc);
        let exec_type = self
            .exec_type
            .parse::<ExecType>()
            .map_err(|e| SqliteError::deserialization(e.to_string()))?;

        Ok(ExecutionRecord {
            identity: ChangeSetId::new(self.filename, self.id, self.author),
            checksum,
            executed_at,
            sequence: self.order_executed,
            exec_type,
            description: self.description.unwrap_or_default(),
            comments: self.comments,
            tag: self.tag,
            deployment_id: self.deployment_id.unwrap_or_default(),
            engine_version: self.engine_version.unwrap_or_default(),
        })
    }
}

impl SqliteDatabase {
    fn history_table(&self) -> &str {
        &self.config.history_table
    }

    fn sequence_table(&self) -> String {
        format!("{}_seq", self.config.history_table)
    }

    fn lock_table(&self) -> &str {
        &self.config.lock_table
    }

    fn init_history_sql(&self) -> String {
        format!(
            r#"
CREATE TABLE IF NOT EXISTS "{history}" (
    id TEXT NOT NULL,
    author TEXT NOT NULL,
    filename TEXT NOT NULL,
    date_executed TEXT NOT NULL,
    order_executed INTEGER NOT NULL,
    exec_type TEXT NOT NULL,
    checksum TEXT,
    description TEXT,
    comments TEXT,
    tag TEXT,
    deployment_id TEXT,
    engine_version TEXT,
    PRIMARY KEY (filename, id, author)
);

CREATE TABLE IF NOT EXISTS "{sequence}" (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_value INTEGER NOT NULL
);
INSERT OR IGNORE INTO "{sequence}" (id, last_value) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS "{lock}" (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    locked INTEGER NOT NULL DEFAULT 0,
    locked_by TEXT,
    locked_at TEXT
);
INSERT OR IGNORE INTO "{lock}" (id, locked) VALUES (1, 0);
"#,
            history = self.history_table(),
            sequence = self.sequence_table(),
            lock = self.lock_table(),
        )
    }

    async fn query_records(&self, sql: String, args: Vec<String>) -> SqliteResult<Vec<ExecutionRecord>> {
        let stored = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), StoredRecord::from_row)?;
                let results: Result<Vec<_>, _> = rows.collect();
                Ok(results?)
            })
            .await?;
        stored.into_iter().map(StoredRecord::decode).collect()
    }
}

#[async_trait::async_trait]
impl ExecutionHistoryStore for SqliteDatabase {
    async fn initialize(&self) -> MigrateResult<()> {
        let sql = self.init_history_sql();
        self.conn
            .call(move |conn| Ok(conn.execute_batch(&sql)?))
            .await
            .map_err(SqliteError::from)?;
        Ok(())
    }

    async fn find(&self, identity: &ChangeSetId) -> MigrateResult<Option<ExecutionRecord>> {
        let sql = format!(
            r#"SELECT {} FROM "{}" WHERE filename = ?1 AND id = ?2 AND author = ?3"#,
            COLUMNS,
            self.history_table()
        );
        let args = vec![identity.path.clone(), identity.id.clone(), identity.author.clone()];
        Ok(self.query_records(sql, args).await?.into_iter().next())
    }

    async fn list(&self) -> MigrateResult<Vec<ExecutionRecord>> {
        let sql = format!(
            r#"SELECT {} FROM "{}" ORDER BY order_executed"#,
            COLUMNS,
            self.history_table()
        );
        Ok(self.query_records(sql, Vec::new()).await?)
    }

    async fn upsert(&self, record: ExecutionRecord) -> MigrateResult<()> {
        let sql = format!(
            r#"INSERT OR REPLACE INTO "{}" ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            self.history_table(),
            COLUMNS
        );
        debug!(changeset = %record.identity, sequence = record.sequence, "writing history row");

        self.conn
            .call(move |conn| {
                conn.execute(
                    &sql,
                    params![
                        record.identity.id,
                        record.identity.author,
                        record.identity.path,
                        record.executed_at.to_rfc3339(),
                        record.sequence,
                        record.exec_type.as_str(),
                        record.checksum.as_ref().map(|c| c.to_string()),
                        record.description,
                        record.comments,
                        record.tag,
                        record.deployment_id,
                        record.engine_version,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(SqliteError::from)?;
        Ok(())
    }

    async fn delete(&self, identity: &ChangeSetId) -> MigrateResult<()> {
        let sql = format!(
            r#"DELETE FROM "{}" WHERE filename = ?1 AND id = ?2 AND author = ?3"#,
            self.history_table()
        );
        let identity = identity.clone();
        self.conn
            .call(move |conn| {
                conn.execute(&sql, params![identity.path, identity.id, identity.author])?;
                Ok(())
            })
            .await
            .map_err(SqliteError::from)?;
        Ok(())
    }

    async fn tag_exists(&self, tag: &str) -> MigrateResult<bool> {
        let sql = format!(r#"SELECT COUNT(*) FROM "{}" WHERE tag = ?1"#, self.history_table());
        let tag = tag.to_string();
        let count = self
            .conn
            .call(move |conn| Ok(conn.query_row(&sql, [&tag], |row| row.get::<_, i64>(0))?))
            .await
            .map_err(SqliteError::from)?;
        Ok(count > 0)
    }

    async fn tag_last(&self, tag: &str) -> MigrateResult<bool> {
        let sql = format!(
            r#"UPDATE "{history}" SET tag = ?1
               WHERE order_executed = (SELECT MAX(order_executed) FROM "{history}")"#,
            history = self.history_table()
        );
        let tag = tag.to_string();
        let updated = self
            .conn
            .call(move |conn| Ok(conn.execute(&sql, [&tag])?))
            .await
            .map_err(SqliteError::from)?;
        Ok(updated > 0)
    }

    async fn next_sequence(&self) -> MigrateResult<i64> {
        // Never below the largest recorded sequence, even for rows written elsewhere.
        let update = format!(
            r#"UPDATE "{sequence}" SET last_value =
                   MAX(last_value, (SELECT COALESCE(MAX(order_executed), 0) FROM "{history}")) + 1
               WHERE id = 1"#,
            sequence = self.sequence_table(),
            history = self.history_table()
        );
        let select = format!(r#"SELECT last_value FROM "{}" WHERE id = 1"#, self.sequence_table());

        let next = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(&update, [])?;
                let next: i64 = tx.query_row(&select, [], |row| row.get(0))?;
                tx.commit()?;
                Ok(next)
            })
            .await
            .map_err(SqliteError::from)?;
        Ok(next)
    }

    async fn clear_checksums(&self) -> MigrateResult<()> {
        let sql = format!(r#"UPDATE "{}" SET checksum = NULL"#, self.history_table());
        self.conn
            .call(move |conn| {
                conn.execute(&sql, [])?;
                Ok(())
            })
            .await
            .map_err(SqliteError::from)?;
        Ok(())
    }

    async fn acquire_lock(&self) -> MigrateResult<ExecutionLock> {
        let owner = format!("pid-{}-{}", std::process::id(), uuid::Uuid::new_v4().simple());
        let acquire = format!(
            r#"UPDATE "{}" SET locked = 1, locked_by = ?1, locked_at = ?2 WHERE id = 1 AND locked = 0"#,
            self.lock_table()
        );
        let holder_sql = format!(r#"SELECT locked_by, locked_at FROM "{}" WHERE id = 1"#, self.lock_table());

        let candidate = owner.clone();
        let holder = self
            .conn
            .call(move |conn| {
                let updated = conn.execute(&acquire, params![candidate, Utc::now().to_rfc3339()])?;
                if updated == 1 {
                    return Ok(None);
                }
                let holder = conn.query_row(&holder_sql, [], |row| {
                    Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?))
                })?;
                Ok(Some(holder))
            })
            .await
            .map_err(SqliteError::from)?;

        if let Some((locked_by, locked_at)) = holder {
            return Err(MigrationError::lock_failed(format!(
                "held by {} since {}",
                locked_by.unwrap_or_else(|| "unknown".into()),
                locked_at.unwrap_or_else(|| "unknown".into())
            )));
        }
        debug!(owner = %owner, "acquired changelog lock");

        let conn = self.conn.clone();
        let release = format!(
            r#"UPDATE "{}" SET locked = 0, locked_by = NULL, locked_at = NULL WHERE id = 1 AND locked_by = ?1"#,
            self.lock_table()
        );
        let releasing = owner.clone();
        Ok(ExecutionLock::new(owner, move || {
            // The connection thread answers without the async runtime, so
            // blocking here cannot deadlock.
            let result = futures::executor::block_on(conn.call(move |conn| {
                conn.execute(&release, [&releasing])?;
                Ok(())
            }));
            if let Err(e) = result {
                warn!(error = %e, "failed to release changelog lock");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_migrate::ChecksumVersion;
    use pretty_assertions::assert_eq;

    async fn store() -> SqliteDatabase {
        let db = SqliteDatabase::memory().await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    fn record(id: &str, sequence: i64) -> ExecutionRecord {
        let mut record = ExecutionRecord::new(
            ChangeSetId::new("db/changelog.yaml", id, "alice"),
            Checksum::compute(id, ChecksumVersion::V9),
            sequence,
            ExecType::Executed,
        );
        record.description = "createTable users".into();
        record.deployment_id = "0123456789".into();
        record
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let db = store().await;
        db.initialize().await.unwrap();
        assert!(db.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_find_and_list() {
        let db = store().await;
        let first = record("1", 1);
        db.upsert(record("2", 2)).await.unwrap();
        db.upsert(first.clone()).await.unwrap();

        let found = db.find(&first.identity).await.unwrap().unwrap();
        assert_eq!(found.checksum, first.checksum);
        assert_eq!(found.exec_type, ExecType::Executed);
        assert_eq!(found.description, "createTable users");
        assert_eq!(found.executed_at.timestamp(), first.executed_at.timestamp());

        let ids: Vec<String> = db.list().await.unwrap().into_iter().map(|r| r.identity.id).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let mut rerun = record("1", 3);
        rerun.exec_type = ExecType::Reran;
        db.upsert(rerun).await.unwrap();
        let rows = db.list().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].exec_type, ExecType::Reran);

        db.delete(&first.identity).await.unwrap();
        assert!(db.find(&first.identity).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sequence_survives_deletes() {
        let db = store().await;
        let first = db.next_sequence().await.unwrap();
        db.upsert(record("1", first)).await.unwrap();
        db.delete(&ChangeSetId::new("db/changelog.yaml", "1", "alice")).await.unwrap();
        assert!(db.next_sequence().await.unwrap() > first);

        db.upsert(record("9", 50)).await.unwrap();
        assert_eq!(db.next_sequence().await.unwrap(), 51);
    }

    #[tokio::test]
    async fn test_tags_and_cleared_checksums() {
        let db = store().await;
        assert!(!db.tag_last("v1").await.unwrap());

        db.upsert(record("1", 1)).await.unwrap();
        db.upsert(record("2", 2)).await.unwrap();
        assert!(db.tag_last("v1").await.unwrap());
        assert!(db.tag_exists("v1").await.unwrap());
        assert_eq!(db.list().await.unwrap()[1].tag.as_deref(), Some("v1"));

        db.clear_checksums().await.unwrap();
        assert!(db.list().await.unwrap().iter().all(|r| r.checksum.is_none()));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_and_released() {
        let db = store().await;
        let lock = db.acquire_lock().await.unwrap();
        let err = db.acquire_lock().await.unwrap_err();
        assert!(matches!(err, MigrationError::LockFailed(ref msg) if msg.contains(lock.owner())));

        drop(lock);
        assert!(db.acquire_lock().await.is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() {
        let db = store().await;
        db.inner()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO keel_changelog (id, author, filename, date_executed, order_executed, exec_type, checksum)
                     VALUES ('1', 'a', 'c', '2024-01-01T00:00:00Z', 1, 'EXECUTED', 'not-a-checksum')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        assert!(matches!(db.list().await, Err(MigrationError::Database(_))));
    }
}
