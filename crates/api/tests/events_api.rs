//! HTTP-level tests for the SSE endpoint `GET /api/v1/events`.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;

use jobwatch_events::{PushEvent, PushEventKind, SseDecoder, SseFrame};

use common::{body_json, get, get_auth, send, token_for, StaticProgressQuery};

/// Read body frames until at least one complete SSE event is decoded.
async fn next_frames(body: &mut Body, decoder: &mut SseDecoder) -> Vec<SseFrame> {
    loop {
        let frame = body
            .frame()
            .await
            .expect("stream ended early")
            .expect("body error");
        if let Ok(data) = frame.into_data() {
            let frames = decoder.push(&data).unwrap();
            if !frames.is_empty() {
                return frames;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Test: missing credential is rejected before streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_credential_returns_401_json() {
    let response = get(common::default_app(), "/api/v1/events").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn invalid_token_returns_401() {
    let response = get_auth(common::default_app(), "/api/v1/events", "not-a-jwt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Test: valid session opens an unbuffered event stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_session_streams_keep_alive_with_anti_buffering_headers() {
    let app = common::default_app();
    let response = get_auth(app, "/api/v1/events", &token_for("user-1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache, no-transform");
    assert_eq!(headers["x-accel-buffering"], "no");

    let mut body = response.into_body();
    let frames = next_frames(&mut body, &mut SseDecoder::new()).await;
    assert_eq!(frames[0].kind(), Some(PushEventKind::KeepAlive));
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let request = Request::get("/api/v1/events")
        .header("Cookie", format!("theme=dark; session={}", token_for("user-2")))
        .body(Body::empty())
        .unwrap();

    let response = send(common::default_app(), request).await;

    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Test: published updates arrive on the open stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn published_update_reaches_open_stream() {
    let state = common::build_test_state(Arc::new(StaticProgressQuery::default()));
    let hub = Arc::clone(&state.hub);
    let app = common::build_test_app(state);

    let response = get_auth(app, "/api/v1/events", &token_for("user-1")).await;
    let mut body = response.into_body();
    let mut decoder = SseDecoder::new();
    next_frames(&mut body, &mut decoder).await;
    assert_eq!(hub.connection_count().await, 1);

    let delivered = hub
        .publish(&PushEvent::new(
            PushEventKind::Update,
            serde_json::json!({ "id": "job-7" }),
        ))
        .await;
    assert_eq!(delivered, 1);

    let frames = next_frames(&mut body, &mut decoder).await;
    assert_eq!(frames[0].kind(), Some(PushEventKind::Update));
    let data: serde_json::Value = frames[0].parse_data().unwrap();
    assert_eq!(data["id"], "job-7");
}

#[tokio::test]
async fn dropping_the_stream_deregisters_the_connection() {
    let state = common::build_test_state(Arc::new(StaticProgressQuery::default()));
    let hub = Arc::clone(&state.hub);
    let app = common::build_test_app(state);

    let response = get_auth(app, "/api/v1/events", &token_for("user-1")).await;
    assert_eq!(hub.connection_count().await, 1);

    drop(response);
    // Deregistration runs on a spawned task.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(hub.connection_count().await, 0);
}
