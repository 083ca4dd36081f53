// Queue Domain Model

use super::error::QueueError;
use serde::Serialize;
use std::time::Duration;

/// Default concurrency ceiling (max test runs in flight across all batches)
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Default pause between a completion and the next admission (2s)
pub const DEFAULT_START_DELAY: Duration = Duration::from_millis(2000);

/// Admission queue configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Concurrency ceiling, must be >= 1
    pub max_concurrent: usize,
    /// Inter-start delay, fixed for the life of the queue
    pub start_delay: Duration,
}

impl QueueConfig {
    pub fn new(max_concurrent: usize, start_delay: Duration) -> Self {
        Self {
            max_concurrent,
            start_delay,
        }
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        validate_ceiling(self.max_concurrent)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT, DEFAULT_START_DELAY)
    }
}

pub(crate) fn validate_ceiling(ceiling: usize) -> Result<(), QueueError> {
    if ceiling < 1 {
        return Err(QueueError::Config(format!(
            "concurrency ceiling must be at least 1, got {}",
            ceiling
        )));
    }
    Ok(())
}

/// Point-in-time view of the queue counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub running: usize,
    pub queued: usize,
    pub ceiling: usize,
}
