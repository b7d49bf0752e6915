use std::time::Duration;

/// Default delay between reconnection attempts.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 3;
/// Server heartbeat period; must match the server's `HEARTBEAT_INTERVAL_SECS`.
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
/// Grace added to the heartbeat period before a connection counts as stale.
const DEFAULT_STALENESS_MARGIN_SECS: u64 = 15;
/// How often the watchdog looks at the last heartbeat.
const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 10;
/// Longest wait for the server to answer a subscription request.
const DEFAULT_OPEN_TIMEOUT_SECS: u64 = 20;

/// Settings for a [`ProgressClient`](crate::ProgressClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, e.g. `http://localhost:3000`.
    pub base_url: String,
    /// Session credential sent as a Bearer token.
    pub token: String,
    pub retry_interval: Duration,
    /// Retries after consecutive failures. `0` means unlimited.
    pub max_retries: u32,
    pub heartbeat_interval: Duration,
    pub staleness_margin: Duration,
    pub watchdog_interval: Duration,
    /// An open that has not produced response headers by then counts as a
    /// failed attempt and is retried.
    pub open_timeout: Duration,
    /// Load the active-jobs list after every successful open.
    pub hydrate_on_connect: bool,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            max_retries: 0,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            staleness_margin: Duration::from_secs(DEFAULT_STALENESS_MARGIN_SECS),
            watchdog_interval: Duration::from_secs(DEFAULT_WATCHDOG_INTERVAL_SECS),
            open_timeout: Duration::from_secs(DEFAULT_OPEN_TIMEOUT_SECS),
            hydrate_on_connect: true,
        }
    }

    /// Silence longer than this (strictly) means the connection is stale.
    pub fn staleness_threshold(&self) -> Duration {
        self.heartbeat_interval + self.staleness_margin
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                 | Required | Default |
    /// |-------------------------|----------|---------|
    /// | `JOBWATCH_URL`          | **yes**  | --      |
    /// | `JOBWATCH_TOKEN`        | **yes**  | --      |
    /// | `RETRY_INTERVAL_SECS`   | no       | `3`     |
    /// | `MAX_RETRIES`           | no       | `0`     |
    /// | `STALENESS_MARGIN_SECS` | no       | `15`    |
    /// | `OPEN_TIMEOUT_SECS`     | no       | `20`    |
    ///
    /// # Panics
    ///
    /// Panics if a required variable is missing or a number does not parse.
    pub fn from_env() -> Self {
        let base_url = std::env::var("JOBWATCH_URL").expect("JOBWATCH_URL must be set");
        let token = std::env::var("JOBWATCH_TOKEN").expect("JOBWATCH_TOKEN must be set");

        let retry_interval_secs: u64 = std::env::var("RETRY_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_RETRY_INTERVAL_SECS.to_string())
            .parse()
            .expect("RETRY_INTERVAL_SECS must be a valid u64");

        let max_retries: u32 = std::env::var("MAX_RETRIES")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .expect("MAX_RETRIES must be a valid u32");

        let staleness_margin_secs: u64 = std::env::var("STALENESS_MARGIN_SECS")
            .unwrap_or_else(|_| DEFAULT_STALENESS_MARGIN_SECS.to_string())
            .parse()
            .expect("STALENESS_MARGIN_SECS must be a valid u64");

        let open_timeout_secs: u64 = std::env::var("OPEN_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_OPEN_TIMEOUT_SECS.to_string())
            .parse()
            .expect("OPEN_TIMEOUT_SECS must be a valid u64");

        Self {
            retry_interval: Duration::from_secs(retry_interval_secs),
            open_timeout: Duration::from_secs(open_timeout_secs),
            max_retries,
            staleness_margin: Duration::from_secs(staleness_margin_secs),
            ..Self::new(base_url, token)
        }
    }
}
