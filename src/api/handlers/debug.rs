//! Trigger debug handlers: poll and dispatch.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{DispatchRequest, DispatchResponse, PollRequest, PollResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RendezvousError};

/// `POST /tenants/:tenant_id/subscriptions/:subscription_id/triggers/:trigger_name/poll`
/// — Collect a pending event or register for the next one.
///
/// # Errors
///
/// Returns [`RendezvousError`] on an invalid identity or path segment, or a
/// malformed stored event.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/subscriptions/{subscription_id}/triggers/{trigger_name}/poll",
    tag = "Trigger Debug",
    summary = "Poll for a debug event",
    description = "Consumes the event waiting for this requester if there is one; otherwise registers the requester so the next dispatch to this trigger lands in its inbox. Callers poll repeatedly until an event arrives.",
    params(
        ("tenant_id" = String, Path, description = "Tenant identifier"),
        ("subscription_id" = String, Path, description = "Subscription identifier"),
        ("trigger_name" = String, Path, description = "Trigger name"),
    ),
    request_body = PollRequest,
    responses(
        (status = 200, description = "Event collected", body = PollResponse),
        (status = 204, description = "No event yet; requester registered"),
        (status = 400, description = "Invalid requester identity or path segment", body = ErrorResponse),
        (status = 500, description = "Stored event is malformed", body = ErrorResponse),
    )
)]
pub async fn poll_event(
    State(state): State<AppState>,
    Path((tenant_id, subscription_id, trigger_name)): Path<(String, String, String)>,
    Json(req): Json<PollRequest>,
) -> Result<Response, RendezvousError> {
    let requester = req.into_identity()?;

    let event = state
        .coordination
        .poll(&tenant_id, &requester, &subscription_id, &trigger_name)
        .await?;

    Ok(match event {
        Some(event) => Json(PollResponse {
            event,
            received_at: Utc::now(),
        })
        .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// `POST /tenants/:tenant_id/subscriptions/:subscription_id/dispatch`
/// — Fan an event out to every poller waiting on the given triggers.
///
/// # Errors
///
/// Returns [`RendezvousError`] on an invalid trigger list or path segment.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/subscriptions/{subscription_id}/dispatch",
    tag = "Trigger Debug",
    summary = "Dispatch a debug event",
    description = "Drains the waiting pool of each listed trigger and writes the event into every drained poller's inbox. Failures on one trigger do not affect the others.",
    params(
        ("tenant_id" = String, Path, description = "Tenant identifier"),
        ("subscription_id" = String, Path, description = "Subscription identifier"),
    ),
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Event dispatched", body = DispatchResponse),
        (status = 400, description = "Invalid trigger list or path segment", body = ErrorResponse),
    )
)]
pub async fn dispatch_event(
    State(state): State<AppState>,
    Path((tenant_id, subscription_id)): Path<(String, String)>,
    Json(req): Json<DispatchRequest>,
) -> Result<impl IntoResponse, RendezvousError> {
    req.validate()?;

    let event = req.to_event(&subscription_id);
    let dispatched = state
        .coordination
        .dispatch(&tenant_id, &subscription_id, &req.triggers, &event)
        .await?;

    tracing::info!(
        tenant_id = %tenant_id,
        subscription_id = %subscription_id,
        request_id = %event.request_id,
        triggers = req.triggers.len(),
        dispatched,
        "debug event dispatched"
    );

    Ok(Json(DispatchResponse {
        dispatched,
        event,
        dispatched_at: Utc::now(),
    }))
}

/// Trigger debug routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tenants/{tenant_id}/subscriptions/{subscription_id}/triggers/{trigger_name}/poll",
            post(poll_event),
        )
        .route(
            "/tenants/{tenant_id}/subscriptions/{subscription_id}/dispatch",
            post(dispatch_event),
        )
}
