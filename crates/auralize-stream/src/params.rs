use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hand-off buffer and shutdown settings of a concurrent source.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SourceParams {
    /// Frames held between producer and consumer; the oldest is evicted when full.
    pub buffer_capacity: usize,
    /// How long shutdown waits for the acquisition thread.
    pub join_timeout_ms: u64,
}

impl SourceParams {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

impl Default for SourceParams {
    fn default() -> Self {
        Self {
            buffer_capacity: 2,
            join_timeout_ms: 5_000,
        }
    }
}
