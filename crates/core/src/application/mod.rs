// Application Layer - Use Cases and Scheduling

pub mod admission;
pub mod batch;
pub mod shutdown;
pub mod status_reporter;

// Re-exports
pub use admission::{AdmissionQueue, JobHandle};
pub use batch::{Batch, BatchService, LaunchRequest};
pub use shutdown::{shutdown_channel, ShutdownReason, ShutdownSender, ShutdownToken};
pub use status_reporter::StatusReporter;
