// Test Runner Port
// Abstraction over whatever actually drives a persona through the target site

use crate::domain::{TestRunReport, TestRunRequest};
use async_trait::async_trait;
use thiserror::Error;

/// Runner errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Run timed out after {0}ms")]
    Timeout(i64),

    #[error("Agent exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Test Runner trait
///
/// Implementations:
/// - SubprocessTestRunner: spawns the external test agent
/// - MockTestRunner: scripted behaviour for tests
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Execute one persona run to completion
    ///
    /// # Errors
    /// - RunError::SpawnFailed if the agent cannot be started
    /// - RunError::Timeout if the run exceeds the runner's own deadline
    /// - RunError::NonZeroExit if the agent reports failure
    async fn run(&self, request: &TestRunRequest) -> Result<TestRunReport, RunError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock runner behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with message
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Mock Test Runner for testing
    pub struct MockTestRunner {
        behavior: MockBehavior,
        latency: Duration,
        failing_personas: HashSet<String>,
        calls: Mutex<Vec<TestRunRequest>>,
    }

    impl MockTestRunner {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                latency: Duration::ZERO,
                failing_personas: HashSet::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }

        /// Simulated run duration (tokio clock)
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        /// Personas (by `name`) that fail regardless of the base behavior
        pub fn failing_for(mut self, name: impl Into<String>) -> Self {
            self.failing_personas.insert(name.into());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<TestRunRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TestRunner for MockTestRunner {
        async fn run(&self, request: &TestRunRequest) -> Result<TestRunReport, RunError> {
            self.calls.lock().unwrap().push(request.clone());

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            if let Some(name) = request.persona_name() {
                if self.failing_personas.contains(name) {
                    return Err(RunError::NonZeroExit {
                        code: Some(1),
                        stderr: format!("persona {} failed", name),
                    });
                }
            }

            match &self.behavior {
                MockBehavior::Success => Ok(TestRunReport {
                    run_id: request.run_id.clone(),
                    exit_code: Some(0),
                    duration_ms: self.latency.as_millis() as i64,
                    stdout: "mock report".to_string(),
                    stderr: String::new(),
                }),
                MockBehavior::Fail(msg) => Err(RunError::SpawnFailed(msg.clone())),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}
