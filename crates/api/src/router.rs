//! Application router and middleware stack, shared by `main.rs` and the
//! integration tests.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::routes::intake::INTAKE_TOKEN_HEADER;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application [`Router`].
///
/// Request/response routes (health, job queries, intake) carry a deadline
/// of `request_timeout_secs`. The event stream is mounted without one.
/// Everything shares, outermost first: CORS, request-id assignment,
/// tracing, request-id propagation, panic recovery.
pub fn build_app_router(state: AppState) -> Router {
    let deadline = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(state.config.request_timeout_secs),
    );
    let cors = build_cors_layer(&state.config);
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let api = routes::rest_routes()
        .layer(deadline.clone())
        .merge(routes::stream_routes());

    Router::new()
        .merge(routes::health::router().layer(deadline))
        .nest("/api/v1", api)
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// CORS for the browser UI. Credentials are allowed so the session cookie
/// reaches `/events`.
///
/// # Panics
///
/// Panics on an unparsable origin, so misconfiguration stops startup.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins = config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{origin}': {e}"))
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(INTAKE_TOKEN_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
