// Subprocess test runner
// Spawns the external test agent once per persona run, with an allowlisted
// environment and a hard per-run timeout.
use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use vantage_core::domain::{TestRunReport, TestRunRequest};
use vantage_core::port::{RunError, TestRunner, TimeProvider};

/// Variables the runner sets for every run (always passed, never filtered)
pub const ENV_RUN_ID: &str = "VANTAGE_RUN_ID";
pub const ENV_BATCH_ID: &str = "VANTAGE_BATCH_ID";
pub const ENV_TARGET_URL: &str = "VANTAGE_TARGET_URL";
pub const ENV_PERSONA: &str = "VANTAGE_PERSONA";

/// How to launch the test agent
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout: Duration,
    /// Parent environment variables the agent may inherit
    pub env_allowlist: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            args: vec!["user-test-agent.js".to_string()],
            working_dir: PathBuf::from("."),
            timeout: Duration::from_secs(600),
            env_allowlist: vec!["PATH".to_string(), "HOME".to_string(), "USER".to_string()],
        }
    }
}

/// Subprocess test runner
pub struct SubprocessTestRunner {
    config: RunnerConfig,
    time_provider: Arc<dyn TimeProvider>,
}

impl SubprocessTestRunner {
    /// Create a new subprocess runner
    ///
    /// # Example
    /// ```ignore
    /// let runner = SubprocessTestRunner::new(RunnerConfig::default(), Arc::new(SystemTimeProvider));
    /// ```
    pub fn new(config: RunnerConfig, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            config,
            time_provider,
        }
    }

    /// Look up allowlisted variables only; values need not be UTF-8
    fn allowed_env<F>(&self, lookup: F) -> HashMap<OsString, OsString>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        self.config
            .env_allowlist
            .iter()
            .filter_map(|key| {
                lookup(key.as_str()).map(|value| (OsString::from(key), value))
            })
            .collect()
    }

    /// Full child environment: allowlisted parent variables plus run variables
    fn child_env(
        &self,
        request: &TestRunRequest,
    ) -> Result<HashMap<OsString, OsString>, RunError> {
        let mut env = self.allowed_env(|key| std::env::var_os(key));

        let persona = serde_json::to_string(&request.persona)
            .map_err(|e| RunError::InvalidRequest(format!("persona not serializable: {}", e)))?;
        env.insert(ENV_RUN_ID.into(), request.run_id.clone().into());
        env.insert(ENV_BATCH_ID.into(), request.batch_id.clone().into());
        env.insert(ENV_TARGET_URL.into(), request.target_url.clone().into());
        env.insert(ENV_PERSONA.into(), persona.into());
        Ok(env)
    }

    /// Spawn the agent and wait for its output, killing it on timeout
    async fn spawn_and_wait(
        &self,
        env: &HashMap<OsString, OsString>,
    ) -> Result<std::process::Output, RunError> {
        let child = Command::new(&self.config.command)
            .args(&self.config.args)
            .env_clear()
            .envs(env)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunError::SpawnFailed(e.to_string()))?;

        // On timeout the child future is dropped and kill_on_drop reaps it.
        match timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(RunError::Io(e.to_string())),
            Err(_) => Err(RunError::Timeout(self.config.timeout.as_millis() as i64)),
        }
    }
}

#[async_trait]
impl TestRunner for SubprocessTestRunner {
    async fn run(&self, request: &TestRunRequest) -> Result<TestRunReport, RunError> {
        if self.config.command.trim().is_empty() {
            return Err(RunError::InvalidRequest("Runner command is empty".into()));
        }

        let env = self.child_env(request)?;
        let start_time = self.time_provider.now_millis();

        info!(
            run_id = %request.run_id,
            batch_id = %request.batch_id,
            persona = request.persona_name().unwrap_or("unnamed"),
            command = %self.config.command,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "Starting test agent"
        );

        let output = match self.spawn_and_wait(&env).await {
            Ok(output) => output,
            Err(e) => {
                warn!(run_id = %request.run_id, error = %e, "Test agent did not complete");
                return Err(e);
            }
        };

        let duration_ms = self.time_provider.now_millis() - start_time;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            warn!(
                run_id = %request.run_id,
                exit_code = ?output.status.code(),
                duration_ms,
                "Test agent exited with failure"
            );
            return Err(RunError::NonZeroExit {
                code: output.status.code(),
                stderr,
            });
        }

        info!(
            run_id = %request.run_id,
            duration_ms,
            "Test agent completed"
        );

        Ok(TestRunReport {
            run_id: request.run_id.clone(),
            exit_code: output.status.code(),
            duration_ms,
            stdout,
            stderr,
        })
    }
}
