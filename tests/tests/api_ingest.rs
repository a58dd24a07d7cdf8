//! HTTP ingestion and metrics API behavior.

use aggregate_store::{AggregateStore, MemorySubstrate};
use analytics_core::{RateLimitConfig, RateLimiter};
use api::{router, AppState};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::{Duration, Utc};
use pipeline::EventProcessor;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

fn server_with_limits(config: RateLimitConfig) -> TestServer {
    let store = AggregateStore::new(Arc::new(MemorySubstrate::new()));
    let state = AppState::new(
        Arc::new(EventProcessor::new(store.clone())),
        store,
        Arc::new(RateLimiter::new(config)),
    );
    TestServer::new(router(state)).unwrap()
}

fn server() -> TestServer {
    server_with_limits(RateLimitConfig::default())
}

fn client_header(id: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-client-id"),
        HeaderValue::from_static(id),
    )
}

#[tokio::test]
async fn ingest_then_read_counters() {
    let server = server();
    let user = Uuid::new_v4();

    let response = server
        .post("/api/v1/events")
        .json(&json!({
            "userId": user,
            "eventType": "PAGE_VIEW",
            "eventTimestamp": Utc::now(),
            "pageUrl": "/home"
        }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>()["status"], "accepted");

    let response = server.get("/api/v1/metrics/active-users").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["activeUsersLast5m"], 1);

    let response = server
        .get("/api/v1/metrics/pageviews")
        .add_query_param("url", "/home")
        .await;
    response.assert_status(StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["url"], "/home");
    assert_eq!(body["pageViewsLast15m"], 1);

    let response = server
        .get("/api/v1/metrics/active-sessions")
        .add_query_param("userId", user.to_string())
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["activeSessionsLast5m"], 1);
}

#[tokio::test]
async fn far_future_timestamp_is_rejected() {
    let server = server();

    let response = server
        .post("/api/v1/events")
        .json(&json!({
            "userId": Uuid::new_v4(),
            "eventType": "PAGE_VIEW",
            "eventTimestamp": Utc::now() + Duration::seconds(301),
            "pageUrl": "/home"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "timestamp_too_future");
}

#[tokio::test]
async fn small_future_skew_is_tolerated() {
    let server = server();

    let response = server
        .post("/api/v1/events")
        .json(&json!({
            "userId": Uuid::new_v4(),
            "eventType": "CLICK",
            "eventTimestamp": Utc::now() + Duration::seconds(60),
            "pageUrl": "/cart"
        }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn malformed_body_is_a_client_error() {
    let server = server();

    let response = server
        .post("/api/v1/events")
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "invalid_event");
}

#[tokio::test]
async fn admission_is_denied_once_tokens_run_out() {
    let server = server_with_limits(RateLimitConfig {
        tokens_per_second: 0.001,
        capacity: 2,
    });

    let event = json!({
        "userId": Uuid::new_v4(),
        "eventType": "PAGE_VIEW",
        "pageUrl": "/home"
    });

    for _ in 0..2 {
        let response = server.post("/api/v1/events").json(&event).await;
        response.assert_status(StatusCode::ACCEPTED);
    }

    let response = server.post("/api/v1/events").json(&event).await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json::<Value>()["error"], "rate_limit_exceeded");
}

#[tokio::test]
async fn clients_are_rate_limited_independently() {
    let server = server_with_limits(RateLimitConfig {
        tokens_per_second: 0.001,
        capacity: 1,
    });

    let event = json!({
        "userId": Uuid::new_v4(),
        "eventType": "PAGE_VIEW",
        "pageUrl": "/home"
    });

    let (name, value) = client_header("client-a");
    let response = server
        .post("/api/v1/events")
        .add_header(name.clone(), value.clone())
        .json(&event)
        .await;
    response.assert_status(StatusCode::ACCEPTED);

    let (b_name, b_value) = client_header("client-b");
    let response = server
        .post("/api/v1/events")
        .add_header(b_name, b_value)
        .json(&event)
        .await;
    response.assert_status(StatusCode::ACCEPTED);

    let response = server
        .post("/api/v1/events")
        .add_header(name, value)
        .json(&event)
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn liveness_endpoint_is_always_up() {
    let server = server();
    let response = server.get("/health/live").await;
    response.assert_status(StatusCode::OK);
}
