//! Engine - task orchestration and crash recovery
//!
//! The engine loads every persisted task at construction, relaunches the
//! ones a previous process left mid-run, and hands out new tasks bound to
//! its worker registry and notification bus. It keeps no canonical task
//! list of its own: the storage collaborator is the source of truth at
//! startup, and each task maintains its own record from then on.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::MessageBus;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::registry::WorkerRegistry;
use crate::state::State;
use crate::storage::Storage;
use crate::task::{Task, TaskStatus};

/// Shared pieces every task holds a reference to: the bus, the storage
/// collaborator, the frozen registry, and the engine config.
pub(crate) struct EngineCore {
    pub(crate) bus: MessageBus,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) registry: WorkerRegistry,
    pub(crate) config: EngineConfig,
    shutdown: CancellationToken,
}

/// Orchestrates task loading, resumption, and creation
pub struct Engine {
    core: Arc<EngineCore>,
}

impl Engine {
    /// Construct an engine with the default configuration.
    ///
    /// See [`Engine::with_config`].
    pub async fn new(storage: Arc<dyn Storage>, registry: WorkerRegistry) -> Result<Self, EngineError> {
        Self::with_config(storage, registry, EngineConfig::default()).await
    }

    /// Construct an engine: load every persisted task, build the bus, and
    /// relaunch each task whose snapshot still carries the `running` crash
    /// marker. Snapshots saved as `created` or `paused` are left untouched
    /// in the store.
    ///
    /// A storage load failure is fatal; no engine is returned.
    pub async fn with_config(
        storage: Arc<dyn Storage>,
        registry: WorkerRegistry,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let snapshots = storage
            .load_tasks()
            .await
            .map_err(|err| EngineError::Load(err.to_string()))?;

        let core = Arc::new(EngineCore {
            bus: MessageBus::new(config.bus_capacity),
            storage,
            registry,
            config,
            shutdown: CancellationToken::new(),
        });

        let mut resumed = 0usize;
        for mut snapshot in snapshots {
            if snapshot.status != TaskStatus::Running {
                continue;
            }

            // Stale crash marker: reset locally only. The on-disk status
            // stays `running` until the relaunched loop saves its next
            // increment, which makes a crash during recovery re-runnable -
            // the persisted status is a recovery hint, never authority for
            // "currently executing".
            snapshot.status = TaskStatus::Paused;
            let task = Arc::new(Task::from_snapshot(snapshot, core.clone()));
            let token = core.shutdown.child_token();
            resumed += 1;

            info!(task_id = %task.id(), worker = %task.worker(), "resuming task interrupted by previous run");
            tokio::spawn(async move {
                if let Err(err) = task.start(&token).await {
                    warn!(task_id = %task.id(), error = %err, "resumed task failed");
                }
            });
        }

        if resumed > 0 {
            info!(count = resumed, "crash recovery complete");
        } else {
            debug!("no interrupted tasks found");
        }

        Ok(Self { core })
    }

    /// Create a task bound to this engine's registry and bus.
    ///
    /// The task is neither started nor persisted: call
    /// [`Task::save`](crate::task::Task::save) first if the task should
    /// survive a crash before its first increment, then
    /// [`Task::start`](crate::task::Task::start) when it should run.
    pub fn new_task(
        &self,
        id: impl Into<String>,
        initial_state: State,
        worker: impl Into<String>,
    ) -> Arc<Task> {
        Arc::new(Task::new(id, initial_state, worker, self.core.clone()))
    }

    /// The shared notification bus
    pub fn bus(&self) -> &MessageBus {
        &self.core.bus
    }

    /// The storage collaborator
    pub fn storage(&self) -> Arc<dyn Storage> {
        self.core.storage.clone()
    }

    /// The engine's root cancellation token.
    ///
    /// Pass it (or a child of it) to [`Task::start`](crate::task::Task::start)
    /// so that [`Engine::shutdown`] reaches the task's in-flight steps.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.core.shutdown.clone()
    }

    /// Cancel the root token, forcefully pausing every in-flight step that
    /// was started under it. Tasks persist nothing past their last
    /// completed increment, so a subsequent engine resumes them cleanly.
    pub fn shutdown(&self) {
        info!("engine shutdown requested");
        self.core.shutdown.cancel();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("workers", &self.core.registry.names())
            .finish()
    }
}
