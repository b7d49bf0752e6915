//! Job-change intake for the job-execution system.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use jobwatch_core::error::CoreError;
use jobwatch_core::progress::ProgressNode;
use jobwatch_core::types::JobId;
use jobwatch_events::JobChange;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Header carrying the shared intake secret.
pub const INTAKE_TOKEN_HEADER: &str = "x-intake-token";

#[derive(Debug, Deserialize)]
pub struct JobChangeRequest {
    pub job_id: JobId,
    #[serde(default)]
    pub node: Option<ProgressNode>,
}

#[derive(Debug, Serialize)]
pub struct JobChangeAccepted {
    pub job_id: JobId,
}

/// POST /api/v1/internal/job-changes
///
/// Queues the notice on the progress bus and returns 202. Delivery to
/// subscribers happens asynchronously in the relay.
pub async fn accept_job_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<JobChangeRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<JobChangeAccepted>>)> {
    let presented = headers
        .get(INTAKE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing X-Intake-Token header"))?;

    if !secrets_match(presented, &state.config.intake_token) {
        return Err(AppError::unauthorized("Invalid intake token"));
    }

    if body.job_id.trim().is_empty() {
        return Err(CoreError::Validation("job_id must not be empty".into()).into());
    }

    let change = match body.node {
        Some(node) if node.id != body.job_id => {
            return Err(CoreError::Validation(format!(
                "node id {} does not match job_id {}",
                node.id, body.job_id
            ))
            .into());
        }
        Some(node) => JobChange::with_node(node),
        None => JobChange::new(body.job_id.clone()),
    };

    tracing::debug!(job_id = %change.job_id, hydrated = change.node.is_some(), "Job change accepted");
    state.bus.publish(change);

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: JobChangeAccepted { job_id: body.job_id },
        }),
    ))
}

/// Compares digests so the comparison time does not depend on where the
/// strings first differ.
fn secrets_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
