use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use futures::future::join_all;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use jobwatch_core::types::Timestamp;
use jobwatch_events::PushEvent;

use crate::auth::session::{CacheMode, SessionValidator};
use crate::error::AppError;

/// Identifier assigned to each SSE connection.
pub type ConnId = String;

/// Channel sender half for pushing events to one SSE stream.
pub type SseSender = mpsc::Sender<PushEvent>;

/// Tunables for a [`BroadcastHub`].
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Events buffered per subscriber before it is considered gone.
    pub subscriber_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
        }
    }
}

/// Metadata for a single SSE connection.
pub struct SseConnection {
    /// Session owner, as reported by the validator.
    pub subject_id: Option<String>,
    /// Credential the connection was opened with; re-checked on heartbeat.
    credential: String,
    pub sender: SseSender,
    pub connected_at: Timestamp,
}

/// The receiving end handed to the HTTP handler after a successful subscribe.
#[derive(Debug)]
pub struct SseSubscription {
    pub conn_id: ConnId,
    pub subject_id: Option<String>,
    pub receiver: mpsc::Receiver<PushEvent>,
}

/// Outcome of one re-validation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions still valid; sent a keep-alive.
    pub kept: usize,
    /// Sessions no longer valid; sent auth-expired and removed.
    pub expired: usize,
    /// Subscribers that had gone away.
    pub dropped: usize,
    /// Checks the validator could not answer; connection kept.
    pub unchecked: usize,
}

static GLOBAL_HUB: OnceLock<Arc<BroadcastHub>> = OnceLock::new();

/// Registry of all open SSE connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Writes to subscribers never block: each
/// gets a bounded channel, and one that is closed or full is removed.
pub struct BroadcastHub {
    validator: Arc<dyn SessionValidator>,
    config: HubConfig,
    connections: RwLock<HashMap<ConnId, SseConnection>>,
}

impl BroadcastHub {
    pub fn new(validator: Arc<dyn SessionValidator>, config: HubConfig) -> Self {
        Self {
            validator,
            config,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide hub. The first call builds it with `init`; later calls
    /// return the same instance and ignore `init`.
    pub fn global(init: impl FnOnce() -> BroadcastHub) -> Arc<BroadcastHub> {
        Arc::clone(GLOBAL_HUB.get_or_init(|| Arc::new(init())))
    }

    /// Validate `credential` and register a new connection.
    ///
    /// The returned receiver already holds a `keep-alive` event. On an
    /// invalid session nothing is registered.
    pub async fn subscribe(&self, credential: &str) -> Result<SseSubscription, AppError> {
        let status = self.validator.validate(credential, CacheMode::Cached).await?;
        if !status.valid {
            tracing::debug!("SSE subscribe rejected: invalid session");
            return Err(AppError::unauthorized("Invalid or expired session"));
        }

        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer.max(1));
        // Fresh channel with capacity >= 1, cannot fail.
        let _ = tx.try_send(PushEvent::keep_alive());

        let conn_id = uuid::Uuid::new_v4().to_string();
        let conn = SseConnection {
            subject_id: status.subject_id.clone(),
            credential: credential.to_string(),
            sender: tx,
            connected_at: chrono::Utc::now(),
        };

        let count = {
            let mut conns = self.connections.write().await;
            conns.insert(conn_id.clone(), conn);
            conns.len()
        };
        tracing::info!(
            conn_id = %conn_id,
            subject_id = ?status.subject_id,
            count,
            "SSE subscriber registered"
        );

        Ok(SseSubscription {
            conn_id,
            subject_id: status.subject_id,
            receiver: rx,
        })
    }

    /// Remove a connection by its ID. Unknown IDs are ignored.
    pub async fn unsubscribe(&self, conn_id: &str) {
        if self.connections.write().await.remove(conn_id).is_some() {
            tracing::debug!(conn_id = %conn_id, "SSE subscriber removed");
        }
    }

    /// Deliver `event` to every subscriber.
    ///
    /// Returns the number of subscribers the event was queued for.
    /// Subscribers whose channel is closed or full are removed.
    pub async fn publish(&self, event: &PushEvent) -> usize {
        let mut delivered = 0;
        let mut gone = Vec::new();

        {
            let conns = self.connections.read().await;
            for (id, conn) in conns.iter() {
                match conn.sender.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(conn_id = %id, "SSE subscriber buffer full, dropping");
                        gone.push(id.clone());
                    }
                    Err(TrySendError::Closed(_)) => gone.push(id.clone()),
                }
            }
        }

        if !gone.is_empty() {
            self.remove_all(&gone).await;
        }

        tracing::debug!(kind = %event.kind, delivered, dropped = gone.len(), "Published push event");
        delivered
    }

    /// Re-check every connection's session, bypassing caches.
    ///
    /// Valid sessions get a `keep-alive`. Invalid ones get `auth-expired` and
    /// are removed; dropping the sender ends the stream once the event has
    /// been read. When the validator cannot answer, the connection is kept
    /// and left alone until the next sweep.
    pub async fn revalidate_all(&self) -> SweepReport {
        let snapshot: Vec<(ConnId, String)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, conn)| (id.clone(), conn.credential.clone()))
            .collect();

        let checks = join_all(snapshot.into_iter().map(|(id, credential)| async move {
            let result = self.validator.validate(&credential, CacheMode::Bypass).await;
            (id, result)
        }))
        .await;

        let mut report = SweepReport::default();
        let mut conns = self.connections.write().await;

        for (id, result) in checks {
            match result {
                Ok(status) if status.valid => {
                    let Some(conn) = conns.get(&id) else { continue };
                    if conn.sender.try_send(PushEvent::keep_alive()).is_ok() {
                        report.kept += 1;
                    } else {
                        conns.remove(&id);
                        report.dropped += 1;
                    }
                }
                Ok(_) => {
                    if let Some(conn) = conns.remove(&id) {
                        let _ = conn.sender.try_send(PushEvent::auth_expired());
                        tracing::info!(conn_id = %id, subject_id = ?conn.subject_id, "SSE session expired");
                        report.expired += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(conn_id = %id, error = %e, "Session re-validation failed, keeping connection");
                    report.unchecked += 1;
                }
            }
        }

        report
    }

    /// Number of registered connections whose stream is still open.
    pub async fn connection_count(&self) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|conn| !conn.sender.is_closed())
            .count()
    }

    /// Send `complete` to every connection, then clear the registry.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.try_send(PushEvent::complete());
        }
        conns.clear();
        tracing::info!(count, "Closed all SSE connections");
    }

    async fn remove_all(&self, ids: &[ConnId]) {
        let mut conns = self.connections.write().await;
        for id in ids {
            conns.remove(id);
        }
    }
}
