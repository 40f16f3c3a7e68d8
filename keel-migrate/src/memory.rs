//! In-process history store for tests and offline runs.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::changeset::ChangeSetId;
use crate::error::{MigrateResult, MigrationError};
use crate::history::{ExecutionHistoryStore, ExecutionLock, ExecutionRecord};

#[derive(Debug, Default)]
struct State {
    records: IndexMap<ChangeSetId, ExecutionRecord>,
    last_sequence: i64,
    lock_holder: Option<String>,
}

/// History kept in memory. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows ordered by sequence, synchronously.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        let mut records: Vec<_> = self.state.lock().records.values().cloned().collect();
        records.sort_by_key(|r| r.sequence);
        records
    }

    /// Whether the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.state.lock().lock_holder.is_some()
    }
}

#[async_trait::async_trait]
impl ExecutionHistoryStore for InMemoryHistoryStore {
    async fn initialize(&self) -> MigrateResult<()> {
        Ok(())
    }

    async fn find(&self, identity: &ChangeSetId) -> MigrateResult<Option<ExecutionRecord>> {
        Ok(self.state.lock().records.get(identity).cloned())
    }

    async fn list(&self) -> MigrateResult<Vec<ExecutionRecord>> {
        Ok(self.records())
    }

    async fn upsert(&self, record: ExecutionRecord) -> MigrateResult<()> {
        let mut state = self.state.lock();
        state.last_sequence = state.last_sequence.max(record.sequence);
        state.records.insert(record.identity.clone(), record);
        Ok(())
    }

    async fn delete(&self, identity: &ChangeSetId) -> MigrateResult<()> {
        self.state.lock().records.shift_remove(identity);
        Ok(())
    }

    async fn tag_exists(&self, tag: &str) -> MigrateResult<bool> {
        Ok(self
            .state
            .lock()
            .records
            .values()
            .any(|r| r.tag.as_deref() == Some(tag)))
    }

    async fn tag_last(&self, tag: &str) -> MigrateResult<bool> {
        let mut state = self.state.lock();
        let last = state.records.values_mut().max_by_key(|r| r.sequence);
        match last {
            Some(record) => {
                record.tag = Some(tag.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn next_sequence(&self) -> MigrateResult<i64> {
        let mut state = self.state.lock();
        state.last_sequence += 1;
        Ok(state.last_sequence)
    }

    async fn clear_checksums(&self) -> MigrateResult<()> {
        for record in self.state.lock().records.values_mut() {
            record.checksum = None;
        }
        Ok(())
    }

    async fn acquire_lock(&self) -> MigrateResult<ExecutionLock> {
        let owner = format!("in-memory-{}", std::process::id());
        {
            let mut state = self.state.lock();
            if let Some(holder) = &state.lock_holder {
                return Err(MigrationError::lock_failed(format!("held by {}", holder)));
            }
            state.lock_holder = Some(owner.clone());
        }
        let state = Arc::clone(&self.state);
        Ok(ExecutionLock::new(owner, move || {
            state.lock().lock_holder = None;
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{Checksum, ChecksumVersion};
    use crate::history::ExecType;

    fn record(id: &str, sequence: i64) -> ExecutionRecord {
        ExecutionRecord::new(
            ChangeSetId::new("c.yaml", id, "alice"),
            Checksum::compute(id, ChecksumVersion::V9),
            sequence,
            ExecType::Executed,
        )
    }

    #[tokio::test]
    async fn test_sequence_never_reused() {
        let store = InMemoryHistoryStore::new();
        let first = store.next_sequence().await.unwrap();
        store.upsert(record("a", first)).await.unwrap();
        store.delete(&ChangeSetId::new("c.yaml", "a", "alice")).await.unwrap();
        let second = store.next_sequence().await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_list_ordered_and_tagging() {
        let store = InMemoryHistoryStore::new();
        store.upsert(record("b", 2)).await.unwrap();
        store.upsert(record("a", 1)).await.unwrap();

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.identity.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(!store.tag_exists("v1").await.unwrap());
        assert!(store.tag_last("v1").await.unwrap());
        let tagged = store.find(&ChangeSetId::new("c.yaml", "b", "alice")).await.unwrap().unwrap();
        assert_eq!(tagged.tag.as_deref(), Some("v1"));
        assert!(!InMemoryHistoryStore::new().tag_last("v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_checksums() {
        let store = InMemoryHistoryStore::new();
        store.upsert(record("a", 1)).await.unwrap();
        store.clear_checksums().await.unwrap();
        assert!(store.records()[0].checksum.is_none());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let store = InMemoryHistoryStore::new();
        let lock = store.acquire_lock().await.unwrap();
        assert!(store.is_locked());
        assert!(matches!(store.acquire_lock().await, Err(MigrationError::LockFailed(_))));
        drop(lock);
        assert!(!store.is_locked());
        assert!(store.acquire_lock().await.is_ok());
    }
}
