use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobwatch_api::auth::session::{
    CachedSessionValidator, JwtSessionValidator, RemoteSessionValidator, SessionValidator,
};
use jobwatch_api::config::ServerConfig;
use jobwatch_api::progress_query::{HttpProgressQuery, ProgressQuery, UnconfiguredProgressQuery};
use jobwatch_api::relay::ProgressRelay;
use jobwatch_api::router::build_app_router;
use jobwatch_api::sse::{self, BroadcastHub, HubConfig};
use jobwatch_api::state::AppState;
use jobwatch_events::ProgressBus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobwatch_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Session validation ---
    let authority: Arc<dyn SessionValidator> = match (&config.auth_service_url, &config.jwt) {
        (Some(url), _) => {
            tracing::info!(url = %url, "Using remote session validator");
            Arc::new(RemoteSessionValidator::new(url.clone()))
        }
        (None, Some(jwt)) => {
            tracing::info!("Using local JWT session validator");
            Arc::new(JwtSessionValidator::new(jwt.clone()))
        }
        (None, None) => anyhow::bail!("Either AUTH_SERVICE_URL or JWT_SECRET must be set"),
    };
    let validator: Arc<dyn SessionValidator> = Arc::new(CachedSessionValidator::new(
        authority,
        Duration::from_secs(config.session_cache_ttl_secs),
    ));

    // --- Progress query ---
    let progress_query: Arc<dyn ProgressQuery> = match &config.progress_query_url {
        Some(url) => Arc::new(HttpProgressQuery::new(url.clone())),
        None => {
            tracing::warn!("PROGRESS_QUERY_URL not set, id-only job changes cannot be relayed");
            Arc::new(UnconfiguredProgressQuery)
        }
    };

    // --- Broadcast hub ---
    let hub = BroadcastHub::global(|| {
        BroadcastHub::new(
            Arc::clone(&validator),
            HubConfig {
                subscriber_buffer: config.subscriber_buffer,
            },
        )
    });

    let background_cancel = CancellationToken::new();
    let heartbeat_handle = sse::start_heartbeat(
        Arc::clone(&hub),
        Duration::from_secs(config.heartbeat_interval_secs),
        background_cancel.clone(),
    );

    // --- Progress bus + relay ---
    let bus = Arc::new(ProgressBus::default());
    let relay = ProgressRelay::new(Arc::clone(&hub), Arc::clone(&progress_query));
    let relay_handle = tokio::spawn(relay.run(bus.subscribe(), background_cancel.clone()));
    tracing::info!("Background services started (heartbeat, relay)");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        hub: Arc::clone(&hub),
        validator,
        progress_query,
        bus,
    };

    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().context("Invalid HOST address")?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    // Open event streams never finish on their own, so close them as soon
    // as shutdown starts or graceful shutdown would wait forever.
    let shutdown_hub = Arc::clone(&hub);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_hub.shutdown_all().await;
        })
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    background_cancel.cancel();
    let _ = tokio::time::timeout(grace, relay_handle).await;
    let _ = tokio::time::timeout(grace, heartbeat_handle).await;
    tracing::info!("Background services stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
