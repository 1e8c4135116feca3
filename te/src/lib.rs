//! TaskEngine - resumable incremental task execution
//!
//! TaskEngine runs long-lived, interruptible tasks that make progress in
//! small idempotent increments and persist their state after every one, so
//! a process restart resumes each task from its last saved increment
//! instead of starting over.
//!
//! # Core Concepts
//!
//! - **State in Snapshots**: progress lives in the storage collaborator,
//!   not in memory; anything not yet saved is discarded on restart
//! - **Workers by Name**: increment functions are registered under string
//!   names because function values cannot be serialized with a task
//! - **One Loop per Task**: a task never has two increments in flight;
//!   concurrency is one logical worker per active task
//! - **Advisory Notifications**: the bus drops messages nobody is
//!   receiving - it is a signal, not a log
//!
//! # Modules
//!
//! - [`task`] - task state machine and execution loop
//! - [`engine`] - orchestration, resume-on-crash, task creation
//! - [`bus`] - best-effort notification bus
//! - [`worker`] - the increment-function trait and step context
//! - [`registry`] - name to worker lookup table
//! - [`storage`] - snapshot store contract and in-memory implementation
//! - [`config`] - engine tunables

pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod state;
pub mod storage;
pub mod task;
pub mod worker;

// Re-export commonly used types
pub use bus::{DEFAULT_BUS_CAPACITY, Message, MessageBus, MessageKind};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, TaskError};
pub use registry::WorkerRegistry;
pub use state::State;
pub use storage::{MemoryStorage, Storage, TaskSnapshot, now_ms};
pub use task::{Task, TaskStatus};
pub use worker::{StepContext, Worker, worker_fn};
