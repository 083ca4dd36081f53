// Status Reporter - periodic queue status log line

use crate::application::admission::AdmissionQueue;
use crate::application::shutdown::ShutdownToken;
use crate::domain::QueueStatus;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Logs the admission queue counters on a fixed interval
///
/// Should be spawned with `tokio::spawn`; stops when shutdown is signalled.
pub struct StatusReporter {
    queue: AdmissionQueue,
    every: Duration,
}

impl StatusReporter {
    pub fn new(queue: AdmissionQueue, every: Duration) -> Self {
        Self { queue, every }
    }

    /// Run until shutdown, returning the number of reports emitted
    pub async fn run(self, mut shutdown: ShutdownToken) -> usize {
        info!(interval_secs = self.every.as_secs(), "Status reporter started");

        let mut tick = interval(self.every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reports = 0;

        // Shutdown is polled first so a stop request never races a due tick.
        loop {
            tokio::select! {
                biased;
                reason = shutdown.wait() => {
                    info!(reports, reason = %reason, "Status reporter stopped");
                    break;
                }
                _ = tick.tick() => {
                    report(self.queue.status());
                    reports += 1;
                }
            }
        }

        reports
    }
}

fn report(status: QueueStatus) {
    info!(
        running = status.running,
        queued = status.queued,
        ceiling = status.ceiling,
        "Queue status"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::shutdown::{shutdown_channel, ShutdownReason};
    use crate::domain::QueueConfig;

    #[tokio::test(start_paused = true)]
    async fn test_reports_until_shutdown() {
        let queue = AdmissionQueue::new(QueueConfig::default()).unwrap();
        let (tx, token) = shutdown_channel();
        let reporter = StatusReporter::new(queue, Duration::from_secs(10));

        let handle = tokio::spawn(reporter.run(token));

        // First tick fires immediately, then at 10s and 20s.
        tokio::time::sleep(Duration::from_secs(25)).await;
        tx.shutdown(ShutdownReason::BatchFinished);

        let reports = handle.await.unwrap();
        assert_eq!(reports, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_shutdown_already_requested() {
        let queue = AdmissionQueue::new(QueueConfig::default()).unwrap();
        let (tx, token) = shutdown_channel();
        tx.shutdown(ShutdownReason::Interrupted);

        let started = tokio::time::Instant::now();
        let reports = StatusReporter::new(queue, Duration::from_secs(60))
            .run(token)
            .await;

        // The immediate first tick is never taken once shutdown is set.
        assert_eq!(reports, 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
