//! HTTP API tests for the reference daemon, driven through the router with
//! `tower::ServiceExt::oneshot`.

#![cfg(feature = "daemon")]

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use drkey::daemon::logging::REQUEST_ID_HEADER;
use drkey::daemon::{build_router, AppState};
use drkey::drkey::issuer::KeyIssuer;
use drkey::drkey::EpochSchedule;
use drkey::wire::{Lvl2KeyResponse, HEALTH_PATH, LVL2_PATH};

fn setup_test_app() -> Router {
    let schedule = EpochSchedule::new(Duration::from_secs(86_400)).unwrap();
    build_router(AppState::new(KeyIssuer::new(vec![0x01; 32], schedule)))
}

async fn post_json(app: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(LVL2_PATH)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn host_request(val_time: i64) -> Value {
    json!({
        "key_type": "HOST_TO_HOST",
        "protocol": "piskes",
        "src_ia": "1-ff00:0:111",
        "dst_ia": "1-ff00:0:112",
        "src_host": "127.0.0.1",
        "dst_host": "fd00:f00d:cafe::7f00:a",
        "val_time": val_time
    })
}

#[tokio::test]
async fn health_reports_schedule_and_protocols() {
    let app = setup_test_app();
    let request = Request::builder()
        .uri(HEALTH_PATH)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["epoch_duration_secs"], 86_400);
    assert_eq!(body["protocols"], json!(["piskes"]));
}

#[tokio::test]
async fn issues_host_key() {
    let (status, body) = post_json(setup_test_app(), host_request(1_700_000_000)).await;
    assert_eq!(status, StatusCode::OK);

    let resp: Lvl2KeyResponse = serde_json::from_value(body).unwrap();
    let key = resp.into_key().unwrap();
    assert!(key.epoch.contains(1_700_000_000));
    assert_eq!(key.epoch.duration_secs(), 86_400);
    assert_eq!(key.key.to_hex().len(), 32);
}

#[tokio::test]
async fn same_request_same_key() {
    let (_, a) = post_json(setup_test_app(), host_request(1_700_000_000)).await;
    let (_, b) = post_json(setup_test_app(), host_request(1_700_000_100)).await;
    assert_eq!(a["key"], b["key"]);
}

#[tokio::test]
async fn missing_host_is_invalid_request() {
    let mut body = host_request(0);
    body.as_object_mut().unwrap().remove("dst_host");

    let (status, body) = post_json(setup_test_app(), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn malformed_ia_is_invalid_request() {
    let mut body = host_request(0);
    body["src_ia"] = json!("not-an-ia");

    let (status, body) = post_json(setup_test_app(), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn empty_protocol_is_invalid_request() {
    let mut body = host_request(0);
    body["protocol"] = json!("");

    let (status, body) = post_json(setup_test_app(), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn as_to_as_key_for_unregistered_protocol() {
    let body = json!({
        "key_type": "AS_TO_AS",
        "protocol": "scmp",
        "src_ia": "1-ff00:0:111",
        "dst_ia": "1-ff00:0:112",
        "val_time": 0
    });
    let (status, body) = post_json(setup_test_app(), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["protocol"], "scmp");
    assert_eq!(body["not_before"], 0);
}

#[tokio::test]
async fn extreme_val_time_is_invalid_request() {
    for val_time in [i64::MAX, i64::MIN] {
        let (status, body) = post_json(setup_test_app(), host_request(val_time)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "val_time={val_time}");
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    }
}

#[tokio::test]
async fn issues_as_to_host_key() {
    let body = json!({
        "key_type": "AS_TO_HOST",
        "protocol": "piskes",
        "src_ia": "1-ff00:0:111",
        "dst_ia": "1-ff00:0:112",
        "dst_host": "CS",
        "val_time": 1_700_000_000
    });
    let (status, body) = post_json(setup_test_app(), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key_type"], "AS_TO_HOST");
    assert_eq!(body["dst_host"], "CS");
    assert!(body.get("src_host").is_none());
}
