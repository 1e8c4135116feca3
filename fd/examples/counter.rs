//! Count-to-five walkthrough
//!
//! Registers a worker that bumps a counter once per increment, runs a task
//! against the file driver, and watches the `done` notification. Kill the
//! process mid-run and start it again: the task resumes from the last
//! count saved in `tasks.json`.
//!
//! Run with: cargo run --example counter

use std::sync::Arc;

use filedriver::FileDriver;
use taskengine::{Engine, State, Storage, WorkerRegistry};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let storage = Arc::new(FileDriver::new("tasks.json")?);

    // Workers are registered by name because a task can only persist the
    // NAME of its increment function, never the function itself.
    let mut registry = WorkerRegistry::new();
    registry.register_fn("example", |_ctx, mut state: State, _bus| async move {
        let count = state.get_i64("count").unwrap_or(0);
        if count == 5 {
            // This job is done.
            return Ok(None);
        }
        state.set("count", count + 1);
        Ok(Some(state))
    });

    // The engine restarts any task a previous run left mid-flight.
    let engine = Engine::new(storage.clone(), registry).await?;

    let task = engine.new_task("MyTask", State::new().with("count", 0), "example");

    // Durably record the task before its first increment; from here on a
    // crash resumes it instead of losing it.
    task.save().await?;

    // Listen for the completion notification.
    let bus = engine.bus().clone();
    let listener = tokio::spawn(async move {
        if let Some(message) = bus.recv().await {
            println!("{}:{}", message.task_id, message.kind);
        }
    });

    // Start does not return until the task is done or paused.
    task.start(&engine.cancellation_token()).await?;
    listener.await?;

    println!("tasks left in store: {}", storage.load_tasks().await?.len());
    Ok(())
}
