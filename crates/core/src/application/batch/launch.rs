// Launch Use Case - validate a batch request and build its run requests

use crate::domain::{BatchId, TestRunRequest};
use crate::error::{AppError, Result};
use crate::port::IdProvider;
use serde::{Deserialize, Serialize};

/// Longest target URL accepted
pub const MAX_TARGET_URL_LEN: usize = 2048;

/// One target URL exercised by a set of personas
///
/// This is also the daemon's manifest format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub target_url: String,
    pub personas: Vec<serde_json::Value>,
}

pub(crate) fn validate_request(req: &LaunchRequest) -> Result<()> {
    let url = req.target_url.trim();
    if url.is_empty() {
        return Err(AppError::Validation("Target URL cannot be empty".into()));
    }
    if url.len() > MAX_TARGET_URL_LEN {
        return Err(AppError::Validation(format!(
            "Target URL too long (max {} chars)",
            MAX_TARGET_URL_LEN
        )));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::Validation(format!(
            "Target URL must be http(s): {}",
            url
        )));
    }

    if req.personas.is_empty() {
        return Err(AppError::Validation(
            "Batch needs at least one persona".into(),
        ));
    }
    if let Some(index) = req.personas.iter().position(|p| !p.is_object()) {
        return Err(AppError::Validation(format!(
            "Persona #{} is not a JSON object",
            index
        )));
    }

    Ok(())
}

/// Build one run request per persona, in persona order
pub(crate) fn build_runs(
    id_provider: &dyn IdProvider,
    batch_id: &BatchId,
    req: LaunchRequest,
) -> Vec<TestRunRequest> {
    let target_url = req.target_url.trim().to_string();
    req.personas
        .into_iter()
        .map(|persona| TestRunRequest {
            run_id: id_provider.generate_id(),
            batch_id: batch_id.clone(),
            target_url: target_url.clone(),
            persona,
        })
        .collect()
}
