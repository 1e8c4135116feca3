//! In-memory storage collaborator
//!
//! Non-durable reference implementation; restarts lose everything, so this
//! is for tests and embedders that want the engine without persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use eyre::Result;
use tokio::sync::Mutex;

use super::{Storage, TaskSnapshot};

/// HashMap-backed [`Storage`]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tasks: Mutex<HashMap<String, TaskSnapshot>>,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a snapshot directly, bypassing the task lifecycle.
    ///
    /// Useful for simulating a store left behind by a crashed process.
    pub async fn insert(&self, snapshot: TaskSnapshot) {
        self.tasks.lock().await.insert(snapshot.id.clone(), snapshot);
    }

    /// Number of stored snapshots
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// True when no snapshots are stored
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_task(&self, snapshot: &TaskSnapshot) -> Result<()> {
        self.tasks.lock().await.insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn remove_task(&self, id: &str) -> Result<()> {
        self.tasks.lock().await.remove(id);
        Ok(())
    }

    async fn load_tasks(&self) -> Result<Vec<TaskSnapshot>> {
        Ok(self.tasks.lock().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;
    use crate::storage::now_ms;
    use crate::task::TaskStatus;

    fn snapshot(id: &str) -> TaskSnapshot {
        let now = now_ms();
        TaskSnapshot {
            id: id.to_string(),
            state: State::new().with("count", 0),
            worker: "count".to_string(),
            status: TaskStatus::Created,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let storage = MemoryStorage::new();
        let snap = snapshot("t1");
        storage.save_task(&snap).await.unwrap();

        let loaded = storage.load_tasks().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], snap);
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let storage = MemoryStorage::new();
        let mut snap = snapshot("t1");
        storage.save_task(&snap).await.unwrap();

        snap.state.set("count", 3);
        storage.save_task(&snap).await.unwrap();

        let loaded = storage.load_tasks().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].state.get_i64("count"), Some(3));
    }

    #[tokio::test]
    async fn test_remove_nonexistent_is_ok() {
        let storage = MemoryStorage::new();
        storage.remove_task("missing").await.unwrap();
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_store_loads_zero_tasks() {
        let storage = MemoryStorage::new();
        let loaded = storage.load_tasks().await.unwrap();
        assert!(loaded.is_empty());
    }
}
