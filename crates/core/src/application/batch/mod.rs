// Batch Service - fan persona test runs for one target through the queue

pub mod launch;

pub use launch::LaunchRequest;

use crate::application::admission::{AdmissionQueue, JobHandle};
use crate::domain::{
    BatchId, BatchSummary, JobError, RunId, RunOutcome, RunStatus, TestRunReport, Ticket,
};
use crate::error::Result;
use crate::port::{IdProvider, RunError, TestRunner, TimeProvider};
use futures::future::join_all;
use std::sync::Arc;
use tracing::info;

struct PendingRun {
    run_id: RunId,
    handle: JobHandle<TestRunReport, RunError>,
}

/// A launched batch; await it with [`BatchService::wait`]
pub struct Batch {
    id: BatchId,
    target_url: String,
    started_at: i64,
    runs: Vec<PendingRun>,
}

impl Batch {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn run_ids(&self) -> Vec<RunId> {
        self.runs.iter().map(|r| r.run_id.clone()).collect()
    }

    /// Queue tickets of every run, in persona order
    pub fn tickets(&self) -> Vec<Ticket> {
        self.runs.iter().map(|r| r.handle.ticket()).collect()
    }
}

/// Batch Service
pub struct BatchService {
    queue: AdmissionQueue,
    runner: Arc<dyn TestRunner>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl BatchService {
    pub fn new(
        queue: AdmissionQueue,
        runner: Arc<dyn TestRunner>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            queue,
            runner,
            id_provider,
            time_provider,
        }
    }

    pub fn queue(&self) -> &AdmissionQueue {
        &self.queue
    }

    /// Validate `req` and submit one queued run per persona
    ///
    /// Must be called inside a Tokio runtime.
    pub fn launch(&self, req: LaunchRequest) -> Result<Batch> {
        launch::validate_request(&req)?;

        let batch_id = self.id_provider.generate_id();
        let target_url = req.target_url.trim().to_string();
        let started_at = self.time_provider.now_millis();
        let requests = launch::build_runs(self.id_provider.as_ref(), &batch_id, req);

        let runs: Vec<PendingRun> = requests
            .into_iter()
            .map(|request| {
                let run_id = request.run_id.clone();
                let runner = Arc::clone(&self.runner);
                let handle = self.queue.submit(
                    format!("{}/{}", batch_id, run_id),
                    move || async move { runner.run(&request).await },
                );
                PendingRun { run_id, handle }
            })
            .collect();

        info!(
            batch_id = %batch_id,
            target_url = %target_url,
            runs = runs.len(),
            "Batch launched"
        );

        Ok(Batch {
            id: batch_id,
            target_url,
            started_at,
            runs,
        })
    }

    /// Withdraw every run of a batch that has not started yet
    ///
    /// Runs already in progress finish normally.
    pub fn cancel_batch(&self, batch_id: &str, tickets: &[Ticket]) -> usize {
        let cancelled = self.queue.cancel_many(tickets.iter().copied());
        info!(
            batch_id = %batch_id,
            cancelled,
            requested = tickets.len(),
            "Batch cancelled"
        );
        cancelled
    }

    /// Wait for every run of `batch` and summarise the outcomes
    pub async fn wait(&self, batch: Batch) -> BatchSummary {
        let Batch {
            id,
            target_url,
            started_at,
            runs,
        } = batch;

        let (run_ids, handles): (Vec<_>, Vec<_>) =
            runs.into_iter().map(|r| (r.run_id, r.handle)).unzip();
        let results = join_all(handles).await;

        let outcomes: Vec<RunOutcome> = run_ids
            .into_iter()
            .zip(results)
            .map(|(run_id, result)| RunOutcome {
                run_id,
                status: run_status(result),
            })
            .collect();

        let summary = BatchSummary::new(
            id,
            target_url,
            started_at,
            self.time_provider.now_millis(),
            outcomes,
        );

        info!(
            batch_id = %summary.batch_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            duration_ms = summary.finished_at - summary.started_at,
            "Batch finished"
        );

        summary
    }
}

fn run_status(result: std::result::Result<TestRunReport, JobError<RunError>>) -> RunStatus {
    match result {
        Ok(report) => RunStatus::Succeeded {
            exit_code: report.exit_code,
            duration_ms: report.duration_ms,
        },
        Err(JobError::Failed(e)) => RunStatus::Failed {
            error: e.to_string(),
        },
        Err(JobError::Cancelled) => RunStatus::Cancelled,
        Err(JobError::Panicked(message)) => RunStatus::Panicked { message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueueConfig;
    use crate::error::AppError;
    use crate::port::id_provider::SequentialIdProvider;
    use crate::port::test_runner::mocks::MockTestRunner;
    use crate::port::time_provider::ManualTimeProvider;
    use serde_json::json;
    use std::time::Duration;

    fn service(runner: MockTestRunner, max_concurrent: usize) -> (BatchService, Arc<MockTestRunner>) {
        let runner = Arc::new(runner);
        let queue =
            AdmissionQueue::new(QueueConfig::new(max_concurrent, Duration::from_millis(100)))
                .unwrap();
        let service = BatchService::new(
            queue,
            runner.clone(),
            Arc::new(SequentialIdProvider::new("id")),
            Arc::new(ManualTimeProvider::new(1_000)),
        );
        (service, runner)
    }

    fn personas(names: &[&str]) -> Vec<serde_json::Value> {
        names.iter().map(|n| json!({ "name": n })).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_runs_every_persona() {
        let (service, runner) = service(MockTestRunner::new_success(), 2);

        let batch = service
            .launch(LaunchRequest {
                target_url: "https://example.com".into(),
                personas: personas(&["Ana", "Ben", "Chen"]),
            })
            .unwrap();
        assert_eq!(batch.id(), "id-1");
        assert_eq!(batch.run_ids(), vec!["id-2", "id-3", "id-4"]);
        assert_eq!(batch.len(), 3);

        let summary = service.wait(batch).await;

        assert_eq!(summary.succeeded, 3);
        assert!(summary.is_clean());
        assert_eq!(summary.started_at, 1_000);
        assert_eq!(runner.call_count(), 3);
        assert!(runner
            .calls()
            .iter()
            .all(|r| r.batch_id == "id-1" && r.target_url == "https://example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_persona_reported_without_stopping_batch() {
        let (service, _) = service(MockTestRunner::new_success().failing_for("Ben"), 1);

        let batch = service
            .launch(LaunchRequest {
                target_url: "https://example.com".into(),
                personas: personas(&["Ana", "Ben", "Chen"]),
            })
            .unwrap();
        let summary = service.wait(batch).await;

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        match &summary.runs[1].status {
            RunStatus::Failed { error } => assert!(error.contains("persona Ben failed")),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_batch_withdraws_waiting_runs() {
        let (service, runner) = service(
            MockTestRunner::new_success().with_latency(Duration::from_secs(5)),
            1,
        );

        let batch = service
            .launch(LaunchRequest {
                target_url: "https://example.com".into(),
                personas: personas(&["Ana", "Ben", "Chen"]),
            })
            .unwrap();

        let cancelled = service.cancel_batch(batch.id(), &batch.tickets());
        assert_eq!(cancelled, 2);

        let summary = service.wait(batch).await;
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.cancelled, 2);
        assert!(summary.is_clean());
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_runner_counts_as_failure() {
        let (service, _) = service(MockTestRunner::new_panic_inducing("agent crashed"), 2);

        let batch = service
            .launch(LaunchRequest {
                target_url: "https://example.com".into(),
                personas: personas(&["Ana"]),
            })
            .unwrap();
        let summary = service.wait(batch).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.runs[0].status,
            RunStatus::Panicked {
                message: "agent crashed".into()
            }
        );
        assert_eq!(service.queue().status().running, 0);
    }

    #[tokio::test]
    async fn test_invalid_request_submits_nothing() {
        let (service, runner) = service(MockTestRunner::new_success(), 2);

        let result = service.launch(LaunchRequest {
            target_url: "".into(),
            personas: personas(&["Ana"]),
        });

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(service.queue().status().queued, 0);
        assert_eq!(runner.call_count(), 0);
    }
}
