//! Read access to progress documents held by the job-execution system.
//!
//! [`ProgressQuery`] is the seam; [`HttpProgressQuery`] talks to the
//! engine's REST API using [`reqwest`].

use async_trait::async_trait;
use reqwest::Url;

use jobwatch_core::progress::{ActiveJob, ProgressNode};
use jobwatch_core::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine returned a non-2xx status code other than 404.
    #[error("Progress API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Invalid progress API URL '{0}'")]
    InvalidUrl(String),

    #[error("Progress query unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ProgressQuery: Send + Sync {
    /// Current progress document of one job, with nested children.
    async fn fetch(&self, job_id: &str) -> Result<ProgressNode, QueryError>;

    /// Jobs that have not reached a terminal status.
    async fn list_active(&self) -> Result<Vec<ActiveJob>, QueryError>;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// HTTP client for the engine's progress API.
///
/// - `GET {base}/jobs/{id}/progress`
/// - `GET {base}/jobs/active`
pub struct HttpProgressQuery {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProgressQuery {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// `{base}/<segments...>`, each segment percent-encoded so an id can
    /// never leave its path position.
    fn endpoint<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, QueryError> {
        let invalid = || QueryError::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, QueryError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ProgressQuery for HttpProgressQuery {
    async fn fetch(&self, job_id: &str) -> Result<ProgressNode, QueryError> {
        let response = self
            .client
            .get(self.endpoint(["jobs", job_id, "progress"])?)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(QueryError::NotFound(job_id.to_string()));
        }

        Ok(Self::ensure_success(response).await?.json().await?)
    }

    async fn list_active(&self) -> Result<Vec<ActiveJob>, QueryError> {
        let response = self
            .client
            .get(self.endpoint(["jobs", "active"])?)
            .send()
            .await?;

        Ok(Self::ensure_success(response).await?.json().await?)
    }
}

// ---------------------------------------------------------------------------
// Unconfigured
// ---------------------------------------------------------------------------

/// Stand-in used when no progress API is configured. Every call fails with
/// [`QueryError::Unavailable`]; notices that carry their document still flow.
#[derive(Debug, Default)]
pub struct UnconfiguredProgressQuery;

#[async_trait]
impl ProgressQuery for UnconfiguredProgressQuery {
    async fn fetch(&self, _job_id: &str) -> Result<ProgressNode, QueryError> {
        Err(QueryError::Unavailable("PROGRESS_QUERY_URL is not set".into()))
    }

    async fn list_active(&self) -> Result<Vec<ActiveJob>, QueryError> {
        Err(QueryError::Unavailable("PROGRESS_QUERY_URL is not set".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path() {
        let query = HttpProgressQuery::new("http://engine.internal:8080/engine/");
        let url = query.endpoint(["jobs", "active"]).unwrap();
        assert_eq!(url.as_str(), "http://engine.internal:8080/engine/jobs/active");
    }

    #[test]
    fn job_id_is_encoded_as_a_single_segment() {
        let query = HttpProgressQuery::new("http://engine.internal/engine");
        let url = query
            .endpoint(["jobs", "../../admin/purge?x=", "progress"])
            .unwrap();

        assert!(url.path().starts_with("/engine/jobs/"));
        assert!(url.path().ends_with("/progress"));
        assert_eq!(url.path_segments().unwrap().count(), 4);
        assert_eq!(url.query(), None);
        assert!(url.as_str().contains("%2F"));
        assert!(url.as_str().contains("%3F"));
    }

    #[test]
    fn unparsable_base_is_reported() {
        let query = HttpProgressQuery::new("not a url");
        assert!(matches!(
            query.endpoint(["jobs", "active"]),
            Err(QueryError::InvalidUrl(_))
        ));
    }
}
