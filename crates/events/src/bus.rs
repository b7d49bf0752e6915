//! In-process change bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`ProgressBus`] carries [`JobChange`] notices from the intake endpoint to
//! whoever fans them out (the relay in the API crate). It is designed to be
//! shared via `Arc<ProgressBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use jobwatch_core::progress::ProgressNode;
use jobwatch_core::types::JobId;

// ---------------------------------------------------------------------------
// JobChange
// ---------------------------------------------------------------------------

/// Notice from the job-execution system that a job's progress changed.
///
/// The notice may carry the new progress document. When it does not, the
/// consumer hydrates it from the progress query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobChange {
    pub job_id: JobId,

    #[serde(default)]
    pub node: Option<ProgressNode>,

    /// When the notice was received (UTC).
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl JobChange {
    /// A bare "this job changed" notice.
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: job_id.into(),
            node: None,
            received_at: Utc::now(),
        }
    }

    /// A notice that already carries the progress document.
    pub fn with_node(node: ProgressNode) -> Self {
        Self {
            job_id: node.id.clone(),
            node: Some(node),
            received_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus for job-change notices.
///
/// # Usage
///
/// ```rust
/// use jobwatch_events::bus::{JobChange, ProgressBus};
///
/// let bus = ProgressBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobChange::new("job-42"));
/// ```
pub struct ProgressBus {
    sender: broadcast::Sender<JobChange>,
}

impl ProgressBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed notices are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notice to all current subscribers.
    ///
    /// With no subscribers the notice is silently dropped.
    pub fn publish(&self, change: JobChange) {
        if self.sender.send(change).is_err() {
            tracing::debug!("Job change published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobChange> {
        self.sender.subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
