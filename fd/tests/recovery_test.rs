//! End-to-end tests of the engine running against the file driver
//!
//! The crash scenarios here build the exact file a dying process would
//! leave behind and verify the next engine picks the work back up.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use filedriver::FileDriver;
use taskengine::{Engine, MessageKind, State, Storage, TaskSnapshot, TaskStatus, WorkerRegistry, now_ms};
use tempfile::TempDir;

fn count_registry() -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    registry.register_fn("count-to-five", |_ctx, mut state: State, _bus| async move {
        let count = state.get_i64("count").unwrap_or(0);
        if count == 5 {
            return Ok(None);
        }
        state.set("count", count + 1);
        Ok(Some(state))
    });
    registry
}

#[tokio::test]
async fn test_engine_on_empty_file_loads_zero_tasks() {
    let temp = TempDir::new().unwrap();
    let storage = Arc::new(FileDriver::new(temp.path().join("tasks.json")).unwrap());

    let _engine = Engine::new(storage.clone(), count_registry()).await.unwrap();

    assert!(storage.load_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_task_runs_to_done_and_leaves_empty_file() {
    let temp = TempDir::new().unwrap();
    let storage = Arc::new(FileDriver::new(temp.path().join("tasks.json")).unwrap());
    let engine = Engine::new(storage.clone(), count_registry()).await.unwrap();

    let task = engine.new_task("MyTask", State::new().with("count", 0), "count-to-five");
    task.save().await.unwrap();
    assert!(storage.load_task("MyTask").unwrap().is_some());

    task.start(&engine.cancellation_token()).await.unwrap();

    let message = timeout(Duration::from_secs(1), engine.bus().recv()).await.unwrap().unwrap();
    assert_eq!(message.kind, MessageKind::Done);
    assert_eq!(message.task_id, "MyTask");

    assert!(task.is_done());
    assert!(storage.load_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_crashed_task_resumes_from_its_file_snapshot() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tasks.json");

    // A previous process saved this mid-run and never finished.
    {
        let storage = FileDriver::new(&path).unwrap();
        let now = now_ms();
        storage
            .save_task(&TaskSnapshot {
                id: "recover-1".to_string(),
                state: State::new().with("count", 2),
                worker: "count-to-five".to_string(),
                status: TaskStatus::Running,
                last_error: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    let storage = Arc::new(FileDriver::new(&path).unwrap());
    let engine = Engine::new(storage.clone(), count_registry()).await.unwrap();

    let message = timeout(Duration::from_secs(2), engine.bus().recv())
        .await
        .expect("interrupted task should be relaunched and finish")
        .unwrap();
    assert_eq!(message.kind, MessageKind::Done);
    assert_eq!(message.task_id, "recover-1");

    assert!(storage.load_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_paused_snapshot_stays_in_file_across_engines() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tasks.json");

    {
        let storage = FileDriver::new(&path).unwrap();
        let now = now_ms();
        storage
            .save_task(&TaskSnapshot {
                id: "sleeper".to_string(),
                state: State::new().with("count", 1),
                worker: "count-to-five".to_string(),
                status: TaskStatus::Paused,
                last_error: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    let storage = Arc::new(FileDriver::new(&path).unwrap());
    let engine = Engine::new(storage.clone(), count_registry()).await.unwrap();

    let message = timeout(Duration::from_millis(200), engine.bus().recv()).await;
    assert!(message.is_err(), "paused tasks are not auto-resumed");

    let loaded = storage.load_tasks().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "sleeper");
    assert_eq!(loaded[0].status, TaskStatus::Paused);
}
