//! End-to-end tests over HTTP against an in-memory store.

#![allow(clippy::panic, clippy::indexing_slicing, missing_docs)]

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use trigger_rendezvous::api;
use trigger_rendezvous::api::dto::{DispatchResponse, PollResponse};
use trigger_rendezvous::app_state::AppState;
use trigger_rendezvous::domain::TriggerDebugEvent;
use trigger_rendezvous::service::CoordinationService;
use trigger_rendezvous::store::MemoryStore;

async fn spawn_server() -> SocketAddr {
    let state = AppState::new(CoordinationService::new(Arc::new(MemoryStore::new())));
    let app = api::build_router().with_state(state);

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn poll_url(addr: SocketAddr, tenant: &str, trigger: &str) -> String {
    format!("http://{addr}/api/v1/tenants/{tenant}/subscriptions/s1/triggers/{trigger}/poll")
}

fn dispatch_url(addr: SocketAddr, tenant: &str) -> String {
    format!("http://{addr}/api/v1/tenants/{tenant}/subscriptions/s1/dispatch")
}

fn requester() -> serde_json::Value {
    json!({"user_id": "u1", "app_id": "a1", "node_id": "n1"})
}

#[tokio::test]
async fn poll_dispatch_poll_round() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let Ok(first) = client
        .post(poll_url(addr, "t1", "trg"))
        .json(&requester())
        .send()
        .await
    else {
        panic!("poll request failed");
    };
    assert_eq!(first.status(), StatusCode::NO_CONTENT);

    let Ok(dispatch) = client
        .post(dispatch_url(addr, "t1"))
        .json(&json!({"triggers": ["trg"], "request_id": "r1", "timestamp": 1000}))
        .send()
        .await
    else {
        panic!("dispatch request failed");
    };
    assert_eq!(dispatch.status(), StatusCode::OK);
    let Ok(body) = dispatch.json::<DispatchResponse>().await else {
        panic!("invalid dispatch body");
    };
    assert_eq!(body.dispatched, 1);

    let Ok(second) = client
        .post(poll_url(addr, "t1", "trg"))
        .json(&requester())
        .send()
        .await
    else {
        panic!("poll request failed");
    };
    assert_eq!(second.status(), StatusCode::OK);
    let Ok(body) = second.json::<PollResponse>().await else {
        panic!("invalid poll body");
    };
    assert_eq!(body.event, TriggerDebugEvent::new("s1", "r1", 1000));

    let Ok(third) = client
        .post(poll_url(addr, "t1", "trg"))
        .json(&requester())
        .send()
        .await
    else {
        panic!("poll request failed");
    };
    assert_eq!(third.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn payload_reaches_the_poller_unchanged() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();
    let payload = json!({"headers": {"x-sig": "abc"}, "body": [1, 2, 3]});

    let Ok(registered) = client
        .post(poll_url(addr, "t1", "trg"))
        .json(&requester())
        .send()
        .await
    else {
        panic!("poll request failed");
    };
    assert_eq!(registered.status(), StatusCode::NO_CONTENT);
    let Ok(dispatched) = client
        .post(dispatch_url(addr, "t1"))
        .json(&json!({"triggers": ["trg"], "payload": payload}))
        .send()
        .await
    else {
        panic!("dispatch request failed");
    };
    assert_eq!(dispatched.status(), StatusCode::OK);

    let Ok(resp) = client
        .post(poll_url(addr, "t1", "trg"))
        .json(&requester())
        .send()
        .await
    else {
        panic!("poll request failed");
    };
    let Ok(body) = resp.json::<PollResponse>().await else {
        panic!("invalid poll body");
    };
    assert_eq!(body.event.payload, Some(payload));
    assert!(!body.event.request_id.is_empty());
}

#[tokio::test]
async fn empty_identity_component_is_bad_request() {
    let addr = spawn_server().await;
    let Ok(resp) = reqwest::Client::new()
        .post(poll_url(addr, "t1", "trg"))
        .json(&json!({"user_id": "", "app_id": "a1", "node_id": "n1"}))
        .send()
        .await
    else {
        panic!("poll request failed");
    };
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let Ok(body) = resp.json::<serde_json::Value>().await else {
        panic!("invalid error body");
    };
    assert_eq!(body["error"]["code"], 1001);
}

#[tokio::test]
async fn empty_trigger_list_is_bad_request() {
    let addr = spawn_server().await;
    let Ok(resp) = reqwest::Client::new()
        .post(dispatch_url(addr, "t1"))
        .json(&json!({"triggers": []}))
        .send()
        .await
    else {
        panic!("dispatch request failed");
    };
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenant_with_reserved_character_is_bad_request() {
    let addr = spawn_server().await;
    let Ok(resp) = reqwest::Client::new()
        .post(poll_url(addr, "t%7D1", "trg"))
        .json(&requester())
        .send()
        .await
    else {
        panic!("poll request failed");
    };
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_store_backend() {
    let addr = spawn_server().await;
    let Ok(resp) = reqwest::get(format!("http://{addr}/health")).await else {
        panic!("health request failed");
    };
    assert_eq!(resp.status(), StatusCode::OK);
    let Ok(body) = resp.json::<serde_json::Value>().await else {
        panic!("invalid health body");
    };
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn settings_report_defaults() {
    let addr = spawn_server().await;
    let Ok(resp) = reqwest::get(format!("http://{addr}/config/rendezvous")).await else {
        panic!("settings request failed");
    };
    let Ok(body) = resp.json::<serde_json::Value>().await else {
        panic!("invalid settings body");
    };
    assert_eq!(body["event_ttl_secs"], 300);
    assert_eq!(body["fanout_warn_threshold"], 10);
}
