//! Daemon configuration from `VANTAGE_*` environment variables
//!
//! Unset variables fall back to defaults; set but malformed values are
//! errors rather than silently defaulted.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use vantage_core::domain::QueueConfig;
use vantage_infra_system::RunnerConfig;

pub const ENV_MAX_CONCURRENT: &str = "VANTAGE_MAX_CONCURRENT";
pub const ENV_START_DELAY_MS: &str = "VANTAGE_START_DELAY_MS";
pub const ENV_RUNNER_COMMAND: &str = "VANTAGE_RUNNER_COMMAND";
pub const ENV_RUNNER_ARGS: &str = "VANTAGE_RUNNER_ARGS";
pub const ENV_RUNNER_WORKDIR: &str = "VANTAGE_RUNNER_WORKDIR";
pub const ENV_RUN_TIMEOUT_SECS: &str = "VANTAGE_RUN_TIMEOUT_SECS";
pub const ENV_ENV_ALLOWLIST: &str = "VANTAGE_ENV_ALLOWLIST";
pub const ENV_STATUS_INTERVAL_SECS: &str = "VANTAGE_STATUS_INTERVAL_SECS";
pub const ENV_LOG_FORMAT: &str = "VANTAGE_LOG_FORMAT";

const DEFAULT_STATUS_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub queue: QueueConfig,
    pub runner: RunnerConfig,
    pub status_interval: Duration,
    pub log_format: LogFormat,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let queue_defaults = QueueConfig::default();
        let runner_defaults = RunnerConfig::default();

        // Signed parse so a negative ceiling reports as out of range.
        let max_concurrent: i64 =
            parse_or(&lookup, ENV_MAX_CONCURRENT, queue_defaults.max_concurrent as i64)?;
        if max_concurrent < 1 {
            bail!("{} must be at least 1, got {}", ENV_MAX_CONCURRENT, max_concurrent);
        }

        let start_delay_ms: u64 = parse_or(
            &lookup,
            ENV_START_DELAY_MS,
            queue_defaults.start_delay.as_millis() as u64,
        )?;

        let timeout_secs: u64 = parse_or(
            &lookup,
            ENV_RUN_TIMEOUT_SECS,
            runner_defaults.timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            bail!("{} must be greater than 0", ENV_RUN_TIMEOUT_SECS);
        }

        let status_interval_secs: u64 =
            parse_or(&lookup, ENV_STATUS_INTERVAL_SECS, DEFAULT_STATUS_INTERVAL_SECS)?;
        if status_interval_secs == 0 {
            bail!("{} must be greater than 0", ENV_STATUS_INTERVAL_SECS);
        }

        let command = lookup(ENV_RUNNER_COMMAND).unwrap_or(runner_defaults.command);
        if command.trim().is_empty() {
            bail!("{} cannot be empty", ENV_RUNNER_COMMAND);
        }

        let args = lookup(ENV_RUNNER_ARGS)
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or(runner_defaults.args);

        let working_dir = lookup(ENV_RUNNER_WORKDIR)
            .map(PathBuf::from)
            .unwrap_or(runner_defaults.working_dir);

        let env_allowlist = lookup(ENV_ENV_ALLOWLIST)
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or(runner_defaults.env_allowlist);

        let log_format = match lookup(ENV_LOG_FORMAT).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => bail!("{} must be 'pretty' or 'json', got '{}'", ENV_LOG_FORMAT, other),
        };

        Ok(Self {
            queue: QueueConfig::new(
                max_concurrent as usize,
                Duration::from_millis(start_delay_ms),
            ),
            runner: RunnerConfig {
                command,
                args,
                working_dir,
                timeout: Duration::from_secs(timeout_secs),
                env_allowlist,
            },
            status_interval: Duration::from_secs(status_interval_secs),
            log_format,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
