//! Execution history tracking.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::changeset::ChangeSetId;
use crate::checksum::Checksum;
use crate::error::{MigrateResult, MigrationError};

/// How a history row came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecType {
    Executed,
    Reran,
    MarkRan,
    Failed,
    Skipped,
}

impl ExecType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed => "EXECUTED",
            Self::Reran => "RERAN",
            Self::MarkRan => "MARK_RAN",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Whether the row counts as applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Executed | Self::Reran | Self::MarkRan)
    }
}

impl fmt::Display for ExecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXECUTED" => Ok(Self::Executed),
            "RERAN" => Ok(Self::Reran),
            "MARK_RAN" => Ok(Self::MarkRan),
            "FAILED" => Ok(Self::Failed),
            "SKIPPED" => Ok(Self::Skipped),
            other => Err(MigrationError::database(format!("unknown exec type '{}'", other))),
        }
    }
}

/// A persisted history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Changeset identity.
    pub identity: ChangeSetId,
    /// Recorded checksum; `None` once cleared.
    pub checksum: Option<Checksum>,
    /// When the changeset was recorded.
    pub executed_at: DateTime<Utc>,
    /// Monotonic ordering sequence, never reused.
    pub sequence: i64,
    pub exec_type: ExecType,
    pub description: String,
    pub comments: Option<String>,
    pub tag: Option<String>,
    /// Id shared by every row written in one engine run.
    pub deployment_id: String,
    /// Engine version that wrote the row.
    pub engine_version: String,
}

impl ExecutionRecord {
    /// A new row stamped now, with the running engine's version.
    pub fn new(identity: ChangeSetId, checksum: Checksum, sequence: i64, exec_type: ExecType) -> Self {
        Self {
            identity,
            checksum: Some(checksum),
            executed_at: Utc::now(),
            sequence,
            exec_type,
            description: String::new(),
            comments: None,
            tag: None,
            deployment_id: String::new(),
            engine_version: crate::VERSION.to_string(),
        }
    }
}

/// Persisted execution history.
///
/// The engine is the only writer and holds the [`ExecutionLock`] while it writes.
#[async_trait::async_trait]
pub trait ExecutionHistoryStore: Send + Sync {
    /// Create the history and lock tables if needed.
    async fn initialize(&self) -> MigrateResult<()>;

    /// Row for a changeset.
    async fn find(&self, identity: &ChangeSetId) -> MigrateResult<Option<ExecutionRecord>>;

    /// Every row ordered by sequence.
    async fn list(&self) -> MigrateResult<Vec<ExecutionRecord>>;

    /// Insert or replace the row for `record.identity`.
    async fn upsert(&self, record: ExecutionRecord) -> MigrateResult<()>;

    /// Remove the row for a changeset.
    async fn delete(&self, identity: &ChangeSetId) -> MigrateResult<()>;

    /// Whether any row carries `tag`.
    async fn tag_exists(&self, tag: &str) -> MigrateResult<bool>;

    /// Set `tag` on the row with the highest sequence. `false` when history is empty.
    async fn tag_last(&self, tag: &str) -> MigrateResult<bool>;

    /// Next sequence number; never returns a value handed out before.
    async fn next_sequence(&self) -> MigrateResult<i64>;

    /// Null out every stored checksum.
    async fn clear_checksums(&self) -> MigrateResult<()>;

    /// Take the exclusive changelog lock.
    async fn acquire_lock(&self) -> MigrateResult<ExecutionLock>;
}

/// Exclusive changelog lock, released on drop.
pub struct ExecutionLock {
    owner: String,
    release_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl ExecutionLock {
    /// Create a lock held by `owner`.
    pub fn new(owner: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            owner: owner.into(),
            release_fn: Some(Box::new(release)),
        }
    }

    /// Who holds the lock.
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl fmt::Debug for ExecutionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionLock").field("owner", &self.owner).finish()
    }
}

impl Drop for ExecutionLock {
    fn drop(&mut self) {
        if let Some(release) = self.release_fn.take() {
            release();
        }
    }
}

/// Ten-character deployment id, shared by every row of one run.
pub fn new_deployment_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..10].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_exec_type_round_trip_names() {
        for exec_type in [
            ExecType::Executed,
            ExecType::Reran,
            ExecType::MarkRan,
            ExecType::Failed,
            ExecType::Skipped,
        ] {
            assert_eq!(exec_type.as_str().parse::<ExecType>().unwrap(), exec_type);
        }
        assert!(ExecType::MarkRan.is_applied());
        assert!(!ExecType::Failed.is_applied());
        assert_eq!(serde_json::to_string(&ExecType::MarkRan).unwrap(), "\"MARK_RAN\"");
    }

    #[test]
    fn test_lock_released_on_drop() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        let lock = ExecutionLock::new("host-a", move || flag.store(true, Ordering::SeqCst));
        assert_eq!(lock.owner(), "host-a");
        assert!(!released.load(Ordering::SeqCst));
        drop(lock);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_deployment_id() {
        let id = new_deployment_id();
        assert_eq!(id.len(), 10);
        assert_ne!(id, new_deployment_id());
    }
}
