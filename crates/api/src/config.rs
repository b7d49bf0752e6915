use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the intake secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Applies until response
    /// headers are sent, so open event streams are not cut off.
    pub request_timeout_secs: u64,
    /// Upper bound on post-shutdown cleanup, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Seconds between session re-validation sweeps (default: `30`).
    pub heartbeat_interval_secs: u64,
    /// Per-subscriber event buffer (default: `64`).
    pub subscriber_buffer: usize,
    /// How long a cached session check stays valid (default: `60`).
    pub session_cache_ttl_secs: u64,
    /// Local JWT validation. `None` when `AUTH_SERVICE_URL` is set.
    pub jwt: Option<JwtConfig>,
    /// Remote session validation endpoint.
    pub auth_service_url: Option<String>,
    /// Base URL of the job-execution system's progress API.
    pub progress_query_url: Option<String>,
    /// Shared secret expected in `X-Intake-Token` on job-change notices.
    pub intake_token: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `3000`                     |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `30`                       |
    /// | `HEARTBEAT_INTERVAL_SECS` | `30`                       |
    /// | `SUBSCRIBER_BUFFER`       | `64`                       |
    /// | `SESSION_CACHE_TTL_SECS`  | `60`                       |
    /// | `AUTH_SERVICE_URL`        | unset (local JWT)          |
    /// | `JWT_SECRET`              | required without the above |
    /// | `PROGRESS_QUERY_URL`      | unset                      |
    /// | `INTAKE_TOKEN`            | **required**               |
    ///
    /// # Panics
    ///
    /// Panics on unparseable numbers, a missing `INTAKE_TOKEN`, or a missing
    /// `JWT_SECRET` when no remote validator is configured.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs: u64 = env_or("SHUTDOWN_TIMEOUT_SECS", 30);
        let heartbeat_interval_secs: u64 = env_or("HEARTBEAT_INTERVAL_SECS", 30);
        let subscriber_buffer: usize = env_or("SUBSCRIBER_BUFFER", 64);
        let session_cache_ttl_secs: u64 = env_or("SESSION_CACHE_TTL_SECS", 60);

        let auth_service_url = optional_env("AUTH_SERVICE_URL");
        let jwt = auth_service_url.is_none().then(JwtConfig::from_env);

        let progress_query_url = optional_env("PROGRESS_QUERY_URL");

        let intake_token =
            std::env::var("INTAKE_TOKEN").expect("INTAKE_TOKEN must be set in the environment");
        assert!(!intake_token.is_empty(), "INTAKE_TOKEN must not be empty");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            heartbeat_interval_secs,
            subscriber_buffer,
            session_cache_ttl_secs,
            jwt,
            auth_service_url,
            progress_query_url,
            intake_token,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + ToString,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{key} must be a valid {}", std::any::type_name::<T>()))
}

/// Unset and empty are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
