//! Storage collaborator contract
//!
//! The engine consults a [`Storage`] implementation at startup and each
//! task persists through it after every increment. Implementations must
//! tolerate concurrent calls for different task IDs; calls for the same ID
//! are never concurrent because only one loop ever runs per task.

mod memory;

pub use memory::MemoryStorage;

use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::state::State;
use crate::task::TaskStatus;

/// Current Unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The durable wire form of a task.
///
/// Everything needed to reconstruct the task after a restart: identity,
/// state, the worker NAME (functions are not serializable), and the status
/// at last save. A `running` status in a loaded snapshot marks a task that
/// was interrupted mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Unique task ID within one store
    pub id: String,

    /// State as of the last completed increment
    pub state: State,

    /// Registry key of the task's increment function
    pub worker: String,

    /// Lifecycle status at save time
    pub status: TaskStatus,

    /// Last error message (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last save timestamp (Unix milliseconds)
    pub updated_at: i64,
}

/// Durable snapshot store for tasks.
///
/// The store is the source of truth at engine startup; the engine itself
/// keeps no canonical task list.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Durably upsert the snapshot, keyed by its ID
    async fn save_task(&self, snapshot: &TaskSnapshot) -> Result<()>;

    /// Durably delete the snapshot for the given ID.
    ///
    /// Removing a nonexistent ID is not an error.
    async fn remove_task(&self, id: &str) -> Result<()>;

    /// Return every currently persisted task, in any order
    async fn load_tasks(&self) -> Result<Vec<TaskSnapshot>>;
}
