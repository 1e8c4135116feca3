//! Best-effort notification bus
//!
//! A single shared publish point for task lifecycle events. Delivery is
//! advisory, not a log: `send` never blocks, and messages are dropped when
//! the buffer is full. Consumers that need every event must be actively
//! receiving. Multiple readers racing on [`MessageBus::recv`] each obtain a
//! disjoint subset of messages; this is deliberately NOT fan-out. Layer a
//! broadcast abstraction on top if every reader must see every message.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Default bus buffer capacity
pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// Classifies the nature of a message.
///
/// `Done` is emitted by every task that reaches its terminal state; workers
/// may publish their own `Custom` kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// A task finished (successfully or with an error)
    Done,
    /// Application-defined message kind
    Custom(String),
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Custom(kind) => write!(f, "{kind}"),
        }
    }
}

/// A lightweight, non-persisted notification sent from a task
#[derive(Debug, Clone)]
pub struct Message {
    /// Message classification
    pub kind: MessageKind,
    /// ID of the originating task
    pub task_id: String,
    /// Arbitrary payload
    pub payload: Value,
}

impl Message {
    /// Build a `Done` message for the given task
    pub fn done(task_id: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: MessageKind::Done,
            task_id: task_id.into(),
            payload,
        }
    }

    /// Build a custom message for the given task
    pub fn custom(kind: impl Into<String>, task_id: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: MessageKind::Custom(kind.into()),
            task_id: task_id.into(),
            payload,
        }
    }
}

/// The shared publish channel for lifecycle events.
///
/// Cloning is cheap; all clones feed the same buffer and drain the same
/// receiver.
#[derive(Clone)]
pub struct MessageBus {
    tx: mpsc::Sender<Message>,
    rx: Arc<Mutex<mpsc::Receiver<Message>>>,
}

impl MessageBus {
    /// Create a bus with the given buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Publish a message without blocking.
    ///
    /// If the buffer is full the message is silently discarded.
    pub fn send(&self, message: Message) {
        if let Err(err) = self.tx.try_send(message) {
            debug!(error = %err, "message bus full, dropping message");
        }
    }

    /// Receive the next message.
    ///
    /// Concurrent callers compete for messages; each message is delivered
    /// to exactly one of them. Returns `None` only if the bus is closed,
    /// which cannot happen while any clone is alive.
    pub async fn recv(&self) -> Option<Message> {
        self.rx.lock().await.recv().await
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus").field("capacity", &self.tx.max_capacity()).finish()
    }
}
