//! `jobwatch-tail`: follow job progress from the terminal.
//!
//! Connects to a jobwatch server, keeps the subscription alive across
//! network drops and host sleep, and logs a one-line summary for every
//! progress update.
//!
//! | Env Var                 | Required | Default                |
//! |-------------------------|----------|------------------------|
//! | `JOBWATCH_URL`          | **yes**  | --                     |
//! | `JOBWATCH_TOKEN`        | **yes**  | --                     |
//! | `RETRY_INTERVAL_SECS`   | no       | `3`                    |
//! | `MAX_RETRIES`           | no       | `0` (unlimited)        |
//! | `STALENESS_MARGIN_SECS` | no       | `15`                   |
//! | `OPEN_TIMEOUT_SECS`     | no       | `20`                   |
//! | `RUST_LOG`              | no       | `jobwatch_client=info` |

use std::sync::Arc;

use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobwatch_client::transport::HttpEventSource;
use jobwatch_client::{ClientConfig, ConnectionState, ProgressClient};
use jobwatch_core::summary::summarize;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobwatch_client=info,jobwatch_tail=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(url = %config.base_url, "Following job progress");

    let transport = Arc::new(HttpEventSource::new(config.base_url.clone()));
    let client = ProgressClient::new(config, transport);

    client.set_update_handler(|node| {
        let summary = summarize(node);
        tracing::info!(
            job_id = %node.id,
            severity = ?summary.severity,
            "{}: {}",
            summary.title,
            summary.description.as_deref().unwrap_or("")
        );
    });

    let expired = Arc::new(Notify::new());
    let notify = Arc::clone(&expired);
    client.set_auth_expired_handler(move || {
        tracing::error!("Session rejected by server, log in again and restart");
        notify.notify_one();
    });

    let mut states = client.watch_state();
    let state_logger = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            match state {
                ConnectionState::Error => tracing::warn!(%state, "Connection state"),
                _ => tracing::info!(%state, "Connection state"),
            }
        }
    });

    client.connect();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            tracing::info!("Interrupted, disconnecting");
        }
        () = expired.notified() => {}
    }

    client.disconnect();
    state_logger.abort();
}
