use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::sse::hub::BroadcastHub;

/// Spawn the background task that re-validates every SSE session once per
/// `interval`.
///
/// Each sweep doubles as the heartbeat clients use for staleness detection:
/// live sessions receive a `keep-alive`. The task stops when `cancel` fires.
pub fn start_heartbeat(
    hub: Arc<BroadcastHub>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; subscribers already got a
        // keep-alive on connect.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("SSE heartbeat stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let report = hub.revalidate_all().await;
                    tracing::debug!(
                        kept = report.kept,
                        expired = report.expired,
                        dropped = report.dropped,
                        unchecked = report.unchecked,
                        "SSE heartbeat sweep"
                    );
                }
            }
        }
    })
}
