// Domain Error Types

use thiserror::Error;

/// Errors raised by the admission queue itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Invalid queue configuration: {0}")]
    Config(String),
}

/// Why a job handle did not yield a success value
///
/// `Failed` carries the operation's own error untouched; the other variants
/// are produced by the queue and never by the operation.
#[derive(Error, Debug)]
pub enum JobError<E> {
    #[error("job failed: {0}")]
    Failed(E),

    #[error("job cancelled before it was admitted")]
    Cancelled,

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl<E> JobError<E> {
    /// Returns the operation's error if the job failed on its own
    pub fn into_failure(self) -> Option<E> {
        match self {
            JobError::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, JobError::Panicked(_))
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
