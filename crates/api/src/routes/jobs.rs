//! Authenticated read-through to the progress query.

use axum::extract::{Path, State};
use axum::Json;

use jobwatch_core::progress::{ActiveJob, ProgressNode};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/jobs/active
pub async fn list_active(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<ActiveJob>>>> {
    let jobs = state.progress_query.list_active().await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}/progress
pub async fn get_progress(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<ProgressNode>>> {
    let node = state.progress_query.fetch(&id).await?;
    Ok(Json(DataResponse { data: node }))
}
