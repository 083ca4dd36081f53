// Test Run Domain Model
//
// A test run is one persona exercising one target URL. Personas are produced
// upstream and stay opaque JSON here.

use serde::{Deserialize, Serialize};

/// Run ID (UUID v4)
pub type RunId = String;

/// Batch ID (UUID v4)
pub type BatchId = String;

/// Everything a runner needs to execute one persona test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRunRequest {
    pub run_id: RunId,
    pub batch_id: BatchId,
    pub target_url: String,
    pub persona: serde_json::Value,
}

impl TestRunRequest {
    /// Persona display name, when the persona carries one
    pub fn persona_name(&self) -> Option<&str> {
        self.persona.get("name").and_then(|v| v.as_str())
    }
}

/// Output of a run that exited cleanly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunReport {
    pub run_id: RunId,
    pub exit_code: Option<i32>,
    pub duration_ms: i64,
    pub stdout: String,
    pub stderr: String,
}

/// Final state of one run inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Succeeded { exit_code: Option<i32>, duration_ms: i64 },
    Failed { error: String },
    Cancelled,
    Panicked { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    #[serde(flatten)]
    pub status: RunStatus,
}

/// Aggregated result of a batch, printed by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub target_url: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub runs: Vec<RunOutcome>,
}

impl BatchSummary {
    pub fn new(
        batch_id: BatchId,
        target_url: String,
        started_at: i64,
        finished_at: i64,
        runs: Vec<RunOutcome>,
    ) -> Self {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        for run in &runs {
            match run.status {
                RunStatus::Succeeded { .. } => succeeded += 1,
                RunStatus::Failed { .. } | RunStatus::Panicked { .. } => failed += 1,
                RunStatus::Cancelled => cancelled += 1,
            }
        }
        Self {
            batch_id,
            target_url,
            started_at,
            finished_at,
            succeeded,
            failed,
            cancelled,
            runs,
        }
    }

    /// True when no run failed or panicked (cancelled runs do not count)
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(id: &str, status: RunStatus) -> RunOutcome {
        RunOutcome {
            run_id: id.to_string(),
            status,
        }
    }

    #[test]
    fn test_summary_counts_each_status() {
        let summary = BatchSummary::new(
            "b1".into(),
            "https://example.com".into(),
            10,
            20,
            vec![
                outcome(
                    "r1",
                    RunStatus::Succeeded {
                        exit_code: Some(0),
                        duration_ms: 5,
                    },
                ),
                outcome("r2", RunStatus::Failed { error: "x".into() }),
                outcome("r3", RunStatus::Cancelled),
                outcome(
                    "r4",
                    RunStatus::Panicked {
                        message: "p".into(),
                    },
                ),
            ],
        );

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.cancelled, 1);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_run_outcome_json_shape() {
        let value = serde_json::to_value(outcome("r1", RunStatus::Cancelled)).unwrap();
        assert_eq!(value, json!({"run_id": "r1", "status": "CANCELLED"}));
    }

    #[test]
    fn test_persona_name_lookup() {
        let request = TestRunRequest {
            run_id: "r".into(),
            batch_id: "b".into(),
            target_url: "https://example.com".into(),
            persona: json!({"name": "Maria", "age": 34}),
        };
        assert_eq!(request.persona_name(), Some("Maria"));
    }
}
