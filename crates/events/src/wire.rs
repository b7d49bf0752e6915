//! Server-Sent Events wire format.
//!
//! Every push event is one block of the form
//!
//! ```text
//! event: <type>
//! data: <json>
//!
//! ```
//!
//! The server encodes with [`PushEvent::encode`]; clients feed raw response
//! bytes into an [`SseDecoder`] and get back complete [`SseFrame`]s.

use std::fmt;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use jobwatch_core::progress::ProgressNode;

/// Errors raised while encoding or decoding push events.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Invalid event payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event stream is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Event stream line or event exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// Event types carried on the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PushEventKind {
    /// A job's progress document changed.
    Update,
    /// Liveness signal; sent on open and on every heartbeat.
    KeepAlive,
    /// The session behind the connection is no longer valid. Terminal.
    AuthExpired,
    Complete,
    Error,
}

impl PushEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PushEventKind::Update => "update",
            PushEventKind::KeepAlive => "keep-alive",
            PushEventKind::AuthExpired => "auth-expired",
            PushEventKind::Complete => "complete",
            PushEventKind::Error => "error",
        }
    }

    /// Parse an `event:` field value. Unknown types yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "update" => Some(PushEventKind::Update),
            "keep-alive" => Some(PushEventKind::KeepAlive),
            "auth-expired" => Some(PushEventKind::AuthExpired),
            "complete" => Some(PushEventKind::Complete),
            "error" => Some(PushEventKind::Error),
            _ => None,
        }
    }
}

impl fmt::Display for PushEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PushEvent
// ---------------------------------------------------------------------------

/// One event destined for push subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub kind: PushEventKind,
    pub data: serde_json::Value,
}

impl PushEvent {
    pub fn new(kind: PushEventKind, data: serde_json::Value) -> Self {
        Self { kind, data }
    }

    /// `update` carrying the node's full progress document.
    pub fn update(node: &ProgressNode) -> Result<Self, WireError> {
        Ok(Self::new(PushEventKind::Update, serde_json::to_value(node)?))
    }

    /// `keep-alive` stamped with the current time.
    pub fn keep_alive() -> Self {
        Self::new(
            PushEventKind::KeepAlive,
            json!({ "timestamp": Utc::now().to_rfc3339() }),
        )
    }

    pub fn auth_expired() -> Self {
        Self::new(
            PushEventKind::AuthExpired,
            json!({ "reason": "session expired" }),
        )
    }

    pub fn complete() -> Self {
        Self::new(PushEventKind::Complete, json!({}))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(PushEventKind::Error, json!({ "message": message.into() }))
    }

    /// Render the event in SSE framing, including the terminating blank line.
    pub fn encode(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.kind, self.data)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// A complete event block as read off the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if present.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
}

impl SseFrame {
    /// Recognised event kind. Frames without an `event:` field are
    /// `message` events, which this protocol does not use.
    pub fn kind(&self) -> Option<PushEventKind> {
        self.event.as_deref().and_then(PushEventKind::parse)
    }

    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<T, WireError> {
        Ok(serde_json::from_str(&self.data)?)
    }
}

/// Upper bound on a single line and on the joined `data` of one event.
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// Incremental SSE parser.
///
/// Chunks may split lines (and multi-byte characters) at any point; only
/// complete lines are interpreted. Input past [`MAX_EVENT_BYTES`] fails with
/// [`WireError::TooLarge`] and resets the decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Leading bytes of `buffer` already known to hold no line break.
    scanned: usize,
    pending: SseFrame,
    has_fields: bool,
    data_lines: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the response body and return every event block it
    /// completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, WireError> {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut line_start = 0;
        let mut search_from = self.scanned;

        while let Some(offset) = buffer[search_from..].iter().position(|&b| b == b'\n') {
            let line_end = search_from + offset;
            let line = &buffer[line_start..line_end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if let Err(e) = self.take_line(line, &mut frames) {
                self.reset();
                return Err(e);
            }
            line_start = line_end + 1;
            search_from = line_start;
        }

        let unterminated = buffer.len() - line_start;
        if unterminated > MAX_EVENT_BYTES {
            self.reset();
            return Err(WireError::TooLarge {
                limit: MAX_EVENT_BYTES,
            });
        }

        buffer.drain(..line_start);
        self.buffer = buffer;
        self.scanned = unterminated;
        Ok(frames)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn take_line(&mut self, line: &[u8], frames: &mut Vec<SseFrame>) -> Result<(), WireError> {
        if line.len() > MAX_EVENT_BYTES {
            return Err(WireError::TooLarge {
                limit: MAX_EVENT_BYTES,
            });
        }
        let line = std::str::from_utf8(line)?;
        if let Some(frame) = self.process_line(line)? {
            frames.push(frame);
        }
        Ok(())
    }

    fn process_line(&mut self, line: &str) -> Result<Option<SseFrame>, WireError> {
        if line.is_empty() {
            if !self.has_fields {
                return Ok(None);
            }
            self.has_fields = false;
            self.data_lines = 0;
            return Ok(Some(std::mem::take(&mut self.pending)));
        }

        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                self.pending.event = Some(value.to_string());
                self.has_fields = true;
            }
            "data" => {
                if self.pending.data.len() + value.len() + 1 > MAX_EVENT_BYTES {
                    return Err(WireError::TooLarge {
                        limit: MAX_EVENT_BYTES,
                    });
                }
                if self.data_lines > 0 {
                    self.pending.data.push('\n');
                }
                self.pending.data.push_str(value);
                self.data_lines += 1;
                self.has_fields = true;
            }
            "id" => {
                self.pending.id = Some(value.to_string());
                self.has_fields = true;
            }
            // `retry` and unknown fields are ignored.
            _ => {}
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
