//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tunables for an [`Engine`](crate::engine::Engine).
///
/// All fields have working defaults; embedders that load configuration
/// from a file can deserialize this with missing fields filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Notification bus buffer capacity
    #[serde(rename = "bus-capacity")]
    pub bus_capacity: usize,

    /// Snapshot-save attempts before the task is paused with a storage error
    #[serde(rename = "save-retry-attempts")]
    pub save_retry_attempts: u32,

    /// Backoff between save attempts, multiplied by the attempt number
    #[serde(rename = "save-retry-backoff-ms")]
    pub save_retry_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bus_capacity: crate::bus::DEFAULT_BUS_CAPACITY,
            save_retry_attempts: 3,
            save_retry_backoff_ms: 50,
        }
    }
}
