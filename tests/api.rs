//! API endpoint integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;
use voicestream_gateway::api::ApiServerBuilder;
use voicestream_gateway::{SessionManager, SessionRegistry};

mod common;
use common::{Fakes, harness};

/// Build a test router around a fake-backed session manager
fn build_test_router(api_key_configured: bool) -> (axum::Router, Arc<SessionManager>) {
    let dir = std::env::temp_dir();
    let h = harness(Fakes::default(), &dir);
    let manager = Arc::new(SessionManager::new(
        SessionRegistry::new(),
        Arc::new(h.pipeline),
    ));

    let server = ApiServerBuilder::new(Arc::clone(&manager), 0)
        .api_key_configured(api_key_configured)
        .build();
    (server.router(), manager)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router.oneshot(get(uri)).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let (router, _) = build_test_router(true);

    let (status, json) = get_json(router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_ready_with_api_key() {
    let (router, _) = build_test_router(true);

    let (status, json) = get_json(router, "/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["checks"]["api_key"]["status"], "ok");
    assert_eq!(json["checks"]["sessions"]["count"], 0);
}

#[tokio::test]
async fn test_ready_without_api_key_is_degraded() {
    let (router, _) = build_test_router(false);

    let (status, json) = get_json(router, "/ready").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["api_key"]["status"], "unavailable");
}

#[tokio::test]
async fn test_sessions_lists_open_streams() {
    let (router, manager) = build_test_router(true);
    manager.connect("client-a").await;
    manager.start_stream("client-b").await;

    let (status, json) = get_json(router, "/api/sessions").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    let sessions = json["sessions"].as_array().unwrap();
    assert_eq!(sessions[0]["client_id"], "client-a");
    assert_eq!(sessions[0]["state"], "idle");
    assert_eq!(sessions[1]["client_id"], "client-b");
    assert_eq!(sessions[1]["state"], "active");
}

#[tokio::test]
async fn test_sessions_empty_after_end() {
    let (router, manager) = build_test_router(true);
    manager.start_stream("client-a").await;
    manager.end_stream("client-a").await;

    let (_, json) = get_json(router, "/api/sessions").await;

    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_ws_route_requires_upgrade() {
    let (router, _) = build_test_router(true);

    let response = router.oneshot(get("/ws/voice")).await.unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (router, _) = build_test_router(true);

    let response = router.oneshot(get("/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
