//! Worker registry - name to increment-function lookup
//!
//! Tasks persist the NAME of their worker, never the function itself, so a
//! reloaded task can be rebound after a restart. The registry is assembled
//! before engine construction and read-only afterwards: the engine takes it
//! by value, so no further registration is possible once tasks can run.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::bus::MessageBus;
use crate::state::State;
use crate::worker::{StepContext, Worker, worker_fn};

/// Immutable-after-construction mapping from worker name to implementation
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker under the given name, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, worker: Arc<dyn Worker>) {
        self.workers.insert(name.into(), worker);
    }

    /// Register an async closure under the given name
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(StepContext, State, MessageBus) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<Option<State>>> + Send + 'static,
    {
        self.register(name, worker_fn(f));
    }

    /// Look up a worker by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(name).cloned()
    }

    /// True when a worker is registered under the given name
    pub fn contains(&self, name: &str) -> bool {
        self.workers.contains_key(name)
    }

    /// Registered worker names, in arbitrary order
    pub fn names(&self) -> Vec<&str> {
        self.workers.keys().map(String::as_str).collect()
    }

    /// Number of registered workers
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// True when no workers are registered
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry").field("names", &self.names()).finish()
    }
}
