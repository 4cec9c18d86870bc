//! HTTP adapter tests (router driven in-process via `tower::ServiceExt`).

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use rollsum_engine::app_state::AppState;
use rollsum_engine::config::RollsumConfig;
use rollsum_engine::{router, Engine};

fn app() -> (Router, Engine) {
    let cfg = RollsumConfig::default();
    let engine = Engine::start(cfg.engine.clone()).unwrap();
    let state = AppState::new(cfg, engine.clone());
    (router::build_router(state), engine)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, String) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn post_metric(key: &str, body: &str) -> Request<Body> {
    Request::post(format!("/metric/{key}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn record_then_sum() {
    let (app, engine) = app();

    for v in [5, 2, 1] {
        let (status, body) = send(&app, post_metric("pageview", &format!("{{\"value\": {v}}}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "{}");
    }
    engine.flush().await.unwrap();

    let (status, body) = send(&app, get("/metric/pageview/sum")).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["value"], 8);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_key_sum_is_zero() {
    let (app, engine) = app();

    let (status, body) = send(&app, get("/metric/unseen-key/sum")).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["value"], 0);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let (app, engine) = app();

    let (status, body) = send(&app, post_metric("pageview", "{\"value\": \"five\"}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["code"], "INVALID_INPUT");

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn draining_engine_rejects_and_reports_not_ready() {
    let (app, engine) = app();

    let (status, _) = send(&app, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);

    engine.shutdown().await.unwrap();

    let (status, body) = send(&app, post_metric("pageview", "{\"value\": 1}")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["code"], "UNAVAILABLE");

    let (status, body) = send(&app, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "draining");
}

#[tokio::test]
async fn metrics_and_health_endpoints() {
    let (app, engine) = app();

    send(&app, post_metric("pageview", "{\"value\": 1}")).await;
    engine.flush().await.unwrap();

    let (status, body) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let (status, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("rollsum_submissions_total{outcome=\"accepted\"} 1"));
    assert!(body.contains("rollsum_keys_active 1"));
    assert!(body.contains("rollsum_keys_stored 1"));
    assert!(body.contains("rollsum_draining 0"));

    engine.shutdown().await.unwrap();
}
