//! Task - resumable unit of incremental work
//!
//! A task wraps one [`State`] and the NAME of a registered worker, and owns
//! its own execution loop: call the worker, persist the returned state,
//! repeat until the worker signals completion. The loop runs on whatever
//! thread of control calls [`Task::start`] and does not return until the
//! task is done or paused; spawn it if you need it in the background.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::Message;
use crate::engine::EngineCore;
use crate::error::TaskError;
use crate::state::State;
use crate::storage::{TaskSnapshot, now_ms};
use crate::worker::StepContext;

/// Task lifecycle status.
///
/// One enumerated field instead of independent running/done flags, so the
/// invalid running-and-done combination cannot be represented. `Done` is
/// terminal; the terminal error, when present, travels in `last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Constructed, never started
    #[default]
    Created,
    /// Execution loop active (or interrupted mid-run, when read from a snapshot)
    Running,
    /// Stopped after a completed increment; resumable
    Paused,
    /// Finished, successfully or with an error; never leaves this state
    Done,
}

impl TaskStatus {
    /// True for statuses a task can never leave
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Status and terminal error under one guard, so the check-and-set in
/// `start` and the transitions in `pause`/`mark_done` are atomic.
#[derive(Debug, Default)]
struct Lifecycle {
    status: TaskStatus,
    last_error: Option<String>,
}

/// One resumable, persisted unit of incremental work
pub struct Task {
    id: String,
    worker: String,
    created_at: i64,
    lifecycle: Mutex<Lifecycle>,
    state: Mutex<State>,
    /// Cancel handle for the in-flight step, if any
    cancel: Mutex<Option<CancellationToken>>,
    core: Arc<EngineCore>,
}

impl Task {
    pub(crate) fn new(
        id: impl Into<String>,
        initial_state: State,
        worker: impl Into<String>,
        core: Arc<EngineCore>,
    ) -> Self {
        Self {
            id: id.into(),
            worker: worker.into(),
            created_at: now_ms(),
            lifecycle: Mutex::new(Lifecycle::default()),
            state: Mutex::new(initial_state),
            cancel: Mutex::new(None),
            core,
        }
    }

    pub(crate) fn from_snapshot(snapshot: TaskSnapshot, core: Arc<EngineCore>) -> Self {
        Self {
            id: snapshot.id,
            worker: snapshot.worker,
            created_at: snapshot.created_at,
            lifecycle: Mutex::new(Lifecycle {
                status: snapshot.status,
                last_error: snapshot.last_error,
            }),
            state: Mutex::new(snapshot.state),
            cancel: Mutex::new(None),
            core,
        }
    }

    /// Unique task ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registry key of the task's worker
    pub fn worker(&self) -> &str {
        &self.worker
    }

    /// Creation timestamp (Unix milliseconds)
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Current lifecycle status
    pub fn status(&self) -> TaskStatus {
        self.lifecycle().status
    }

    /// Terminal error, once the task failed
    pub fn last_error(&self) -> Option<String> {
        self.lifecycle().last_error.clone()
    }

    /// True while the execution loop is active
    pub fn is_running(&self) -> bool {
        self.status() == TaskStatus::Running
    }

    /// True once the task reached its terminal state
    pub fn is_done(&self) -> bool {
        self.status() == TaskStatus::Done
    }

    /// State as of the last completed increment
    pub fn state(&self) -> State {
        self.state_guard().clone()
    }

    /// Run the task's execution loop until it completes, fails, or pauses.
    ///
    /// Calling `start` on a task that is already running is an idempotent
    /// no-op; calling it on a done task fails with
    /// [`TaskError::AlreadyDone`]. Each increment runs under a child of
    /// `parent`, so cancelling `parent` forcefully pauses the task.
    ///
    /// After every increment the new state is persisted through the
    /// engine's storage collaborator; once the worker returns `Ok(None)`
    /// the task emits a `done` message and removes its persisted record.
    pub async fn start(&self, parent: &CancellationToken) -> Result<(), TaskError> {
        {
            let mut lifecycle = self.lifecycle();
            match lifecycle.status {
                TaskStatus::Running => {
                    debug!(task_id = %self.id, "start: already running");
                    return Ok(());
                }
                TaskStatus::Done => return Err(TaskError::AlreadyDone),
                TaskStatus::Created | TaskStatus::Paused => {
                    lifecycle.status = TaskStatus::Running;
                }
            }
        }

        let Some(worker) = self.core.registry.get(&self.worker) else {
            let err = TaskError::WorkerNotFound(self.worker.clone());
            self.mark_done(Some(err.to_string())).await;
            return Err(err);
        };

        info!(task_id = %self.id, worker = %self.worker, "task started");

        while self.is_running() {
            let step = parent.child_token();
            *self.cancel_guard() = Some(step.clone());
            let ctx = StepContext::new(&self.id, step.clone());
            let state = self.state_guard().clone();

            let result = worker.step(&ctx, state, &self.core.bus).await;
            step.cancel();

            match result {
                Err(err) => {
                    if !self.is_running() {
                        // A pause raced the failure; the task stays resumable.
                        debug!(task_id = %self.id, "step failed after pause request, treating as pause");
                        return Ok(());
                    }
                    warn!(task_id = %self.id, error = %err, "worker failed, finishing task");
                    self.mark_done(Some(err.to_string())).await;
                    return Err(TaskError::Worker(err.to_string()));
                }
                Ok(None) => {
                    self.mark_done(None).await;
                    break;
                }
                Ok(Some(next)) => {
                    *self.state_guard() = next;
                    self.persist().await?;
                }
            }
        }

        Ok(())
    }

    /// Request a graceful pause.
    ///
    /// The in-flight increment keeps running to completion; the loop exits
    /// after it returns, leaving the state consistent with the last
    /// completed increment.
    pub fn pause(&self) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.status == TaskStatus::Running {
            lifecycle.status = TaskStatus::Paused;
            debug!(task_id = %self.id, "pause requested");
        }
    }

    /// Request a forceful pause.
    ///
    /// Pauses and then cancels the in-flight increment's context. The
    /// worker may leave its side effects partially done; the next `start`
    /// re-runs from the last persisted state, so unsaved in-memory progress
    /// is discarded, not merged.
    pub fn pause_now(&self) {
        self.pause();
        let token = self.cancel_guard().clone();
        if let Some(token) = token {
            debug!(task_id = %self.id, "cancelling in-flight step");
            token.cancel();
        }
    }

    /// Capture the task's current durable form
    pub fn snapshot(&self) -> TaskSnapshot {
        let (status, last_error) = {
            let lifecycle = self.lifecycle();
            (lifecycle.status, lifecycle.last_error.clone())
        };
        TaskSnapshot {
            id: self.id.clone(),
            state: self.state_guard().clone(),
            worker: self.worker.clone(),
            status,
            last_error,
            created_at: self.created_at,
            updated_at: now_ms(),
        }
    }

    /// Persist the task's current snapshot once, without retries.
    ///
    /// The loop saves after every increment on its own; this is for
    /// durably recording a task before its first increment runs.
    pub async fn save(&self) -> Result<(), TaskError> {
        let snapshot = self.snapshot();
        self.core
            .storage
            .save_task(&snapshot)
            .await
            .map_err(|err| TaskError::Storage(err.to_string()))
    }

    /// Save the snapshot with the configured retry policy.
    ///
    /// On exhaustion the task is left `Paused`, not `Done`: the last
    /// durably saved snapshot stays authoritative and the task remains
    /// resumable.
    async fn persist(&self) -> Result<(), TaskError> {
        let attempts = self.core.config.save_retry_attempts.max(1);
        let backoff = Duration::from_millis(self.core.config.save_retry_backoff_ms);

        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let snapshot = self.snapshot();
            match self.core.storage.save_task(&snapshot).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(task_id = %self.id, attempt, error = %err, "snapshot save failed");
                    last_error = err.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(backoff * attempt).await;
                    }
                }
            }
        }

        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.status == TaskStatus::Running {
                lifecycle.status = TaskStatus::Paused;
            }
            lifecycle.last_error = Some(last_error.clone());
        }
        Err(TaskError::Storage(last_error))
    }

    /// Finish the task: emit the `done` message, enter the terminal state,
    /// and remove the persisted record. Removal failure is logged, not
    /// surfaced; the caller already has the more interesting error, if any.
    async fn mark_done(&self, error: Option<String>) {
        let payload = error.clone().map(Value::String).unwrap_or(Value::Null);
        self.core.bus.send(Message::done(&self.id, payload));

        {
            let mut lifecycle = self.lifecycle();
            lifecycle.status = TaskStatus::Done;
            lifecycle.last_error = error;
        }
        info!(task_id = %self.id, "task done");

        if let Err(err) = self.core.storage.remove_task(&self.id).await {
            warn!(task_id = %self.id, error = %err, "failed to remove finished task from storage");
        }
    }

    // A poisoned lock still holds consistent data (no guard is held across
    // an await or a panic point that leaves partial writes); recover it.
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_guard(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_guard(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("worker", &self.worker)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(TaskStatus::Created.to_string(), "created");
        assert_eq!(TaskStatus::Running.to_string(), "running");
        assert_eq!(TaskStatus::Paused.to_string(), "paused");
        assert_eq!(TaskStatus::Done.to_string(), "done");
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");

        let back: TaskStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(back, TaskStatus::Paused);
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(!TaskStatus::Created.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }
}
