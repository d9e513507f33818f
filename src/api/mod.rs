//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Rendezvous endpoints are mounted under `/api/v1`; system endpoints at
//! the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "trigger-rendezvous"),
    paths(
        handlers::debug::poll_event,
        handlers::debug::dispatch_event,
        handlers::system::health_handler,
        handlers::system::settings_handler,
    ),
    components(schemas(
        dto::PollRequest,
        dto::PollResponse,
        dto::DispatchRequest,
        dto::DispatchResponse,
        crate::domain::TriggerDebugEvent,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    ))
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_rendezvous_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.ends_with("/poll")));
        assert!(paths.iter().any(|p| p.ends_with("/dispatch")));
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
    }
}
