use std::sync::Arc;

use jobwatch_events::ProgressBus;

use crate::auth::session::SessionValidator;
use crate::config::ServerConfig;
use crate::progress_query::ProgressQuery;
use crate::sse::BroadcastHub;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Registry of open SSE connections.
    pub hub: Arc<BroadcastHub>,
    /// Session validator used by authenticated REST routes.
    pub validator: Arc<dyn SessionValidator>,
    /// Read access to the job-execution system's progress documents.
    pub progress_query: Arc<dyn ProgressQuery>,
    /// Job-change notices accepted by the intake endpoint.
    pub bus: Arc<ProgressBus>,
}
