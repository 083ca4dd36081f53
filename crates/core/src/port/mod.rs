// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod queue_observer;
pub mod test_runner;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use queue_observer::{QueueEvent, QueueObserver, TracingObserver};
pub use test_runner::{RunError, TestRunner};
pub use time_provider::TimeProvider;
