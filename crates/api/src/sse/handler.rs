use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION};
use axum::http::HeaderName;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use jobwatch_events::PushEvent;

use crate::error::AppResult;
use crate::middleware::auth::SessionCredential;
use crate::sse::hub::{BroadcastHub, ConnId};
use crate::state::AppState;

static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// GET /api/v1/events -- open a push stream.
///
/// Responds 401 before any streaming starts when the session is invalid.
/// The response disables proxy buffering and transformation so events
/// arrive as they are written.
pub async fn sse_handler(
    State(state): State<AppState>,
    SessionCredential(credential): SessionCredential,
) -> AppResult<impl IntoResponse> {
    let subscription = state.hub.subscribe(&credential).await?;

    let guard = StreamGuard {
        conn_id: subscription.conn_id,
        hub: Arc::clone(&state.hub),
    };

    let stream = ReceiverStream::new(subscription.receiver).map(move |event| {
        let _ = &guard;
        Ok::<_, Infallible>(to_sse_event(&event))
    });

    let headers = [
        (CACHE_CONTROL, "no-cache, no-transform"),
        (X_ACCEL_BUFFERING.clone(), "no"),
        (CONNECTION, "keep-alive"),
    ];

    Ok((headers, Sse::new(stream)))
}

fn to_sse_event(event: &PushEvent) -> Event {
    Event::default()
        .event(event.kind.as_str())
        .data(event.data.to_string())
}

/// Deregisters the connection when the response stream is dropped
/// (client went away or the server closed it).
struct StreamGuard {
    conn_id: ConnId,
    hub: Arc<BroadcastHub>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        tracing::info!(conn_id = %self.conn_id, "SSE stream closed");
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let hub = Arc::clone(&self.hub);
        let conn_id = std::mem::take(&mut self.conn_id);
        runtime.spawn(async move {
            hub.unsubscribe(&conn_id).await;
        });
    }
}
