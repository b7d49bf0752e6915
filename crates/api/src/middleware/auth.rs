//! Session extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::auth::session::CacheMode;
use crate::error::AppError;
use crate::state::AppState;

/// Name of the cookie browsers send the session in.
pub const SESSION_COOKIE: &str = "session";

/// Raw session credential carried by the request.
///
/// Taken from `Authorization: Bearer <token>` when present, otherwise from
/// the `session` cookie. `EventSource` cannot set headers, so browsers rely
/// on the cookie.
#[derive(Debug, Clone)]
pub struct SessionCredential(pub String);

impl SessionCredential {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        bearer_token(headers)
            .or_else(|| session_cookie(headers))
            .map(|token| SessionCredential(token.to_string()))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|t| !t.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for SessionCredential {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        SessionCredential::from_headers(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("Missing session credential"))
    }
}

/// A caller whose session validated.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(subject_id = ?user.subject_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject_id: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SessionCredential(token) = SessionCredential::from_request_parts(parts, state).await?;

        let status = state.validator.validate(&token, CacheMode::Cached).await?;
        if !status.valid {
            return Err(AppError::unauthorized("Invalid or expired session"));
        }

        Ok(AuthUser {
            subject_id: status.subject_id,
        })
    }
}
