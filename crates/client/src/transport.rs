//! Opening the push stream.
//!
//! [`EventSource`] is what the engine talks to; [`HttpEventSource`] is the
//! real implementation over [`reqwest`]. Tests substitute a scripted one.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::Deserialize;

use jobwatch_core::progress::ActiveJob;
use jobwatch_events::{SseDecoder, SseFrame, WireError};

/// Why a subscription could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// The server rejected the session. Never retried.
    #[error("Session rejected by server")]
    Unauthorized,

    #[error("Unexpected status {0}")]
    Status(u16),

    /// 2xx, but not an event stream (a login page from a proxy, say).
    #[error("Unexpected content type: {0}")]
    BadContentType(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Failure on an open stream or a side request.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Transport(err.to_string())
    }
}

/// Decoded frames of one open subscription. Ends when the server closes.
pub type FrameStream = BoxStream<'static, Result<SseFrame, TransportError>>;

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open one subscription carrying `credential`.
    async fn open(&self, credential: &str) -> Result<FrameStream, OpenError>;

    /// Current active jobs, used to seed the tree after connecting.
    async fn fetch_active(&self, credential: &str) -> Result<Vec<ActiveJob>, TransportError>;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// `GET {base}/api/v1/events` and `GET {base}/api/v1/jobs/active`.
pub struct HttpEventSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEventSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn open(&self, credential: &str) -> Result<FrameStream, OpenError> {
        let response = self
            .client
            .get(format!("{}/api/v1/events", self.base_url))
            .bearer_auth(credential)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| OpenError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(OpenError::Unauthorized);
        }
        if !status.is_success() {
            return Err(OpenError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("text/event-stream") {
            return Err(OpenError::BadContentType(content_type));
        }

        let mut decoder = SseDecoder::new();
        let frames = response
            .bytes_stream()
            .map(move |chunk| -> Vec<Result<SseFrame, TransportError>> {
                match chunk {
                    Ok(bytes) => match decoder.push(&bytes) {
                        Ok(frames) => frames.into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(e.into())],
                    },
                    Err(e) => vec![Err(e.into())],
                }
            })
            .flat_map(stream::iter);

        Ok(frames.boxed())
    }

    async fn fetch_active(&self, credential: &str) -> Result<Vec<ActiveJob>, TransportError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs/active", self.base_url))
            .bearer_auth(credential)
            .send()
            .await?
            .error_for_status()?;

        let envelope: DataEnvelope<Vec<ActiveJob>> = response.json().await?;
        Ok(envelope.data)
    }
}
