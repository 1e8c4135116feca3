//! Worker seam - the pluggable increment function
//!
//! A [`Worker`] performs the smallest safe unit of work per call and must be
//! safe to re-invoke on the same state after a crash between an increment
//! completing and its snapshot being persisted. Return `Ok(Some(state))` to
//! continue with the new state, `Ok(None)` to complete the task, or `Err`
//! to fail it.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::bus::MessageBus;
use crate::state::State;

/// Per-step context handed to a worker.
///
/// Carries the owning task's ID and the step's cancellation token. The
/// token is cancelled by [`Task::pause_now`](crate::task::Task::pause_now)
/// and unconditionally once the step returns; workers doing long or
/// blocking work should check it at their own checkpoints.
#[derive(Debug, Clone)]
pub struct StepContext {
    task_id: String,
    cancel: CancellationToken,
}

impl StepContext {
    pub(crate) fn new(task_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            task_id: task_id.into(),
            cancel,
        }
    }

    /// ID of the task this step belongs to
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// True once a forceful pause has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when a forceful pause is requested
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// The step's cancellation token, for use in `select!` arms
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// One bounded step of incremental work.
///
/// Implementations must be resumable from the last durably saved state: a
/// step interrupted by cancellation or a crash may leave side effects
/// partially done, and the engine will re-run it from the last persisted
/// snapshot, never from partial in-memory progress.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Perform one increment.
    ///
    /// `state` is a clone of the task's current state; the returned state
    /// replaces it and is persisted before the next call.
    async fn step(&self, ctx: &StepContext, state: State, bus: &MessageBus) -> Result<Option<State>>;
}

type StepFn = dyn Fn(StepContext, State, MessageBus) -> BoxFuture<'static, Result<Option<State>>> + Send + Sync;

struct FnWorker {
    f: Box<StepFn>,
}

#[async_trait]
impl Worker for FnWorker {
    async fn step(&self, ctx: &StepContext, state: State, bus: &MessageBus) -> Result<Option<State>> {
        (self.f)(ctx.clone(), state, bus.clone()).await
    }
}

/// Adapt an async closure into a registrable [`Worker`].
///
/// ```
/// use taskengine::{State, worker_fn};
///
/// let worker = worker_fn(|_ctx, mut state: State, _bus| async move {
///     let count = state.get_i64("count").unwrap_or(0);
///     if count == 5 {
///         return Ok(None);
///     }
///     state.set("count", count + 1);
///     Ok(Some(state))
/// });
/// ```
pub fn worker_fn<F, Fut>(f: F) -> Arc<dyn Worker>
where
    F: Fn(StepContext, State, MessageBus) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<State>>> + Send + 'static,
{
    Arc::new(FnWorker {
        f: Box::new(move |ctx, state, bus| Box::pin(f(ctx, state, bus))),
    })
}
