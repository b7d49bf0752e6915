#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use jobwatch_api::auth::jwt::{mint_session_token, JwtConfig};
use jobwatch_api::auth::session::{
    AuthError, CacheMode, JwtSessionValidator, SessionStatus, SessionValidator,
};
use jobwatch_api::config::ServerConfig;
use jobwatch_api::progress_query::{ProgressQuery, QueryError};
use jobwatch_api::router::build_app_router;
use jobwatch_api::sse::{BroadcastHub, HubConfig};
use jobwatch_api::state::AppState;
use jobwatch_core::progress::{ActiveJob, ProgressNode};
use jobwatch_events::ProgressBus;

pub const INTAKE_TOKEN: &str = "test-intake-secret";

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret-long-enough".to_string(),
        token_ttl_mins: 15,
        leeway_secs: 0,
    }
}

/// Mint a session token the test app accepts.
pub fn token_for(subject: &str) -> String {
    mint_session_token(subject, &test_jwt_config()).expect("token generation should succeed")
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        heartbeat_interval_secs: 30,
        subscriber_buffer: 16,
        session_cache_ttl_secs: 60,
        jwt: Some(test_jwt_config()),
        auth_service_url: None,
        progress_query_url: None,
        intake_token: INTAKE_TOKEN.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Collaborator fakes
// ---------------------------------------------------------------------------

/// Progress query answering from in-memory documents.
#[derive(Default)]
pub struct StaticProgressQuery {
    pub nodes: Mutex<HashMap<String, ProgressNode>>,
    pub active: Mutex<Vec<ActiveJob>>,
}

impl StaticProgressQuery {
    pub fn with_node(self, node: ProgressNode) -> Self {
        self.nodes.lock().unwrap().insert(node.id.clone(), node);
        self
    }

    pub fn with_active(self, job: ActiveJob) -> Self {
        self.active.lock().unwrap().push(job);
        self
    }
}

#[async_trait]
impl ProgressQuery for StaticProgressQuery {
    async fn fetch(&self, job_id: &str) -> Result<ProgressNode, QueryError> {
        self.nodes
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(|| QueryError::NotFound(job_id.to_string()))
    }

    async fn list_active(&self) -> Result<Vec<ActiveJob>, QueryError> {
        Ok(self.active.lock().unwrap().clone())
    }
}

/// Validator whose answer the test flips at will.
pub struct SwitchValidator {
    pub valid: AtomicBool,
    pub down: AtomicBool,
}

impl SwitchValidator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            valid: AtomicBool::new(true),
            down: AtomicBool::new(false),
        })
    }

    pub fn revoke(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionValidator for SwitchValidator {
    async fn validate(&self, credential: &str, _mode: CacheMode) -> Result<SessionStatus, AuthError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AuthError::Unavailable("switched off".into()));
        }
        if self.valid.load(Ordering::SeqCst) {
            Ok(SessionStatus::valid(format!("subject-of-{credential}")))
        } else {
            Ok(SessionStatus::invalid())
        }
    }
}

// ---------------------------------------------------------------------------
// App builders
// ---------------------------------------------------------------------------

pub fn build_test_state(progress_query: Arc<dyn ProgressQuery>) -> AppState {
    let config = test_config();
    let validator: Arc<dyn SessionValidator> =
        Arc::new(JwtSessionValidator::new(test_jwt_config()));
    let hub = Arc::new(BroadcastHub::new(
        Arc::clone(&validator),
        HubConfig {
            subscriber_buffer: config.subscriber_buffer,
        },
    ));

    AppState {
        config: Arc::new(config),
        hub,
        validator,
        progress_query,
        bus: Arc::new(ProgressBus::default()),
    }
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state)
}

pub fn default_app() -> Router {
    build_test_app(build_test_state(Arc::new(StaticProgressQuery::default())))
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_intake(app: Router, body: serde_json::Value, token: Option<&str>) -> Response<Body> {
    let mut builder = Request::post("/api/v1/internal/job-changes")
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("X-Intake-Token", token);
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

/// Collect the whole body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
