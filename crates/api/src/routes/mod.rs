pub mod health;
pub mod intake;
pub mod jobs;

use axum::routing::{get, post};
use axum::Router;

use crate::sse;
use crate::state::AppState;

/// Request/response routes under `/api/v1`.
///
/// ```text
/// /jobs/active                     active jobs (session required)
/// /jobs/{id}/progress              one job's progress (session required)
/// /internal/job-changes            job-change intake (X-Intake-Token)
/// ```
pub fn rest_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/active", get(jobs::list_active))
        .route("/jobs/{id}/progress", get(jobs::get_progress))
        .route("/internal/job-changes", post(intake::accept_job_change))
}

/// Long-lived streaming routes under `/api/v1`: `/events`.
pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/events", get(sse::sse_handler))
}
