//! Job-change to push-event relay.
//!
//! [`ProgressRelay`] subscribes to the [`ProgressBus`](jobwatch_events::ProgressBus)
//! and turns each [`JobChange`] into an `update` event on the
//! [`BroadcastHub`]. Notices that only name a job are hydrated through the
//! [`ProgressQuery`] first.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use jobwatch_core::progress::ProgressNode;
use jobwatch_events::{JobChange, PushEvent};

use crate::progress_query::ProgressQuery;
use crate::sse::BroadcastHub;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Query(#[from] crate::progress_query::QueryError),

    #[error(transparent)]
    Wire(#[from] jobwatch_events::WireError),
}

pub struct ProgressRelay {
    hub: Arc<BroadcastHub>,
    query: Arc<dyn ProgressQuery>,
}

impl ProgressRelay {
    pub fn new(hub: Arc<BroadcastHub>, query: Arc<dyn ProgressQuery>) -> Self {
        Self { hub, query }
    }

    /// Run the relay loop until `cancel` fires or the bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<JobChange>, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Progress relay cancelled");
                    break;
                }
                received = receiver.recv() => received,
            };

            match received {
                Ok(change) => {
                    let job_id = change.job_id.clone();
                    if let Err(e) = self.relay(change).await {
                        tracing::error!(error = %e, job_id = %job_id, "Failed to relay job change");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Progress relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Progress bus closed, relay shutting down");
                    break;
                }
            }
        }
    }

    /// Push one change to every subscriber. Returns the number reached.
    pub async fn relay(&self, change: JobChange) -> Result<usize, RelayError> {
        let node = self.resolve(change).await?;
        let event = PushEvent::update(&node)?;
        let delivered = self.hub.publish(&event).await;
        tracing::debug!(job_id = %node.id, status = ?node.status, delivered, "Relayed job update");
        Ok(delivered)
    }

    async fn resolve(&self, change: JobChange) -> Result<ProgressNode, RelayError> {
        match change.node {
            Some(node) => Ok(node),
            None => Ok(self.query.fetch(&change.job_id).await?),
        }
    }
}
