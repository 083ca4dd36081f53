//! Vantage Daemon - Main Entry Point
//! Runs one batch manifest of persona test runs through the admission queue.

mod config;

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use config::{DaemonConfig, LogFormat, ENV_LOG_FORMAT};
use vantage_core::application::{
    shutdown_channel, AdmissionQueue, BatchService, LaunchRequest, ShutdownReason, StatusReporter,
};
use vantage_core::port::id_provider::UuidProvider;
use vantage_core::port::time_provider::SystemTimeProvider;
use vantage_core::VERSION;
use vantage_infra_system::SubprocessTestRunner;

const USAGE: &str = "usage: vantage-daemon <manifest.json>";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    init_logging()?;
    info!("Vantage daemon v{} starting...", VERSION);

    // 2. Load configuration and manifest
    let config = DaemonConfig::from_env().context("Invalid configuration")?;
    let manifest_path = std::env::args().nth(1).context(USAGE)?;
    let manifest = load_manifest(&manifest_path)?;

    info!(
        max_concurrent = config.queue.max_concurrent,
        start_delay_ms = config.queue.start_delay.as_millis() as u64,
        command = %config.runner.command,
        manifest = %manifest_path,
        log_format = ?config.log_format,
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let queue = AdmissionQueue::new(config.queue.clone()).context("Queue setup failed")?;
    let runner = Arc::new(SubprocessTestRunner::new(
        config.runner.clone(),
        time_provider.clone(),
    ));
    let service = BatchService::new(queue.clone(), runner, id_provider, time_provider);

    // 4. Start status reporter
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let reporter = StatusReporter::new(queue.clone(), config.status_interval);
    let reporter_handle = tokio::spawn(reporter.run(shutdown_rx));

    // 5. Launch batch
    let batch = service.launch(manifest).context("Batch rejected")?;
    let batch_id = batch.id().to_string();
    let tickets = batch.tickets();
    info!(batch_id = %batch_id, runs = batch.len(), "Press Ctrl+C to cancel waiting runs");

    // 6. Wait for completion; Ctrl+C withdraws runs that have not started
    let (summary, reason) = {
        let wait = service.wait(batch);
        tokio::pin!(wait);
        tokio::select! {
            summary = &mut wait => (summary, ShutdownReason::BatchFinished),
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                warn!(batch_id = %batch_id, "Interrupt received, cancelling waiting runs");
                service.cancel_batch(&batch_id, &tickets);
                (wait.await, ShutdownReason::Interrupted)
            }
        }
    };

    // 7. Graceful shutdown
    info!(reason = %reason, "Shutting down");
    shutdown_tx.shutdown(reason);
    let _ = tokio::time::timeout(Duration::from_secs(5), reporter_handle).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to render summary")?
    );

    if !summary.is_clean() {
        bail!("{} of {} runs failed", summary.failed, summary.runs.len());
    }

    info!("Shutdown complete.");
    Ok(())
}

fn init_logging() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("vantage=info"))
        .context("Failed to create env filter")?;

    // Peek at the format only; full config validation happens after logging is up.
    let format = match std::env::var(ENV_LOG_FORMAT).as_deref() {
        Ok("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    };

    match format {
        LogFormat::Json => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}

fn load_manifest(path: &str) -> Result<LaunchRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path))?;
    parse_manifest(&raw).with_context(|| format!("Invalid manifest {}", path))
}

fn parse_manifest(raw: &str) -> Result<LaunchRequest> {
    Ok(serde_json::from_str(raw)?)
}
