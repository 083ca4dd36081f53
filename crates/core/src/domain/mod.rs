// Domain Layer - Queue and test run entities

pub mod error;
pub mod job;
pub mod queue;
pub mod test_run;

// Re-exports
pub use error::{JobError, QueueError};
pub use job::{JobLabel, JobOutcome, Ticket};
pub use queue::{QueueConfig, QueueStatus};
pub use test_run::{
    BatchId, BatchSummary, RunId, RunOutcome, RunStatus, TestRunReport, TestRunRequest,
};
