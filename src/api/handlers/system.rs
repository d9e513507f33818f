//! System endpoints: health check and rendezvous settings.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    store: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, store backend, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: state.coordination.store().backend_name().to_string(),
        }),
    )
}

/// Rendezvous settings in effect.
#[derive(Debug, Serialize, ToSchema)]
pub struct RendezvousSettings {
    event_ttl_secs: u64,
    fanout_warn_threshold: usize,
}

/// `GET /config/rendezvous` — Inbox/pool TTL and fan-out warning threshold.
#[utoipa::path(
    get,
    path = "/config/rendezvous",
    tag = "System",
    summary = "Rendezvous settings",
    description = "Returns the TTL applied to inboxes and waiting pools and the trigger count above which dispatches are logged as wide.",
    responses(
        (status = 200, description = "Current settings", body = RendezvousSettings),
    )
)]
pub async fn settings_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(RendezvousSettings {
            event_ttl_secs: state.coordination.event_ttl().as_secs(),
            fanout_warn_threshold: state.coordination.fanout_warn_threshold(),
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/rendezvous", get(settings_handler))
}
