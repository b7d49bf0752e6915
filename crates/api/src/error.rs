use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use jobwatch_core::error::CoreError;

use crate::auth::session::AuthError;
use crate::progress_query::QueryError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `jobwatch_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A collaborator (session validator, progress query) could not be reached.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Core(CoreError::Unauthorized(msg.into()))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        tracing::warn!(error = %err, "Session validator unavailable");
        AppError::ServiceUnavailable("Session validation is temporarily unavailable".into())
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotFound(id) => AppError::Core(CoreError::NotFound { entity: "Job", id }),
            other => {
                tracing::warn!(error = %other, "Progress query failed");
                AppError::ServiceUnavailable("Progress query is temporarily unavailable".into())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
            },

            // --- HTTP-specific errors ---
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
