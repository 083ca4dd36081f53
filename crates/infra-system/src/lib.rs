// Vantage Infrastructure - System Adapters
// Implements: TestRunner

pub mod subprocess_runner;

pub use subprocess_runner::{RunnerConfig, SubprocessTestRunner};
