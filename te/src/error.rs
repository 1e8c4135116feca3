//! Error types for the engine and task APIs
//!
//! Collaborator traits ([`Storage`](crate::storage::Storage) and
//! [`Worker`](crate::worker::Worker)) return `eyre::Result` so
//! implementations can attach whatever context they like; the engine
//! converts those into the typed variants below at the API boundary.

use thiserror::Error;

/// Errors surfaced by [`Task::start`](crate::task::Task::start)
#[derive(Debug, Error)]
pub enum TaskError {
    /// `start` was called on a task that already reached `Done`
    #[error("task already done")]
    AlreadyDone,

    /// The task's worker name is not present in the registry
    #[error("worker function not found: {0}")]
    WorkerNotFound(String),

    /// The worker returned an error while the task was still running
    #[error("worker failed: {0}")]
    Worker(String),

    /// Persisting the task failed after the configured retries
    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors surfaced by [`Engine`](crate::engine::Engine) construction
#[derive(Debug, Error)]
pub enum EngineError {
    /// Loading persisted tasks failed; the engine cannot start
    #[error("failed to load tasks from storage: {0}")]
    Load(String),
}
