//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::CoordinationService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Rendezvous coordinator for poll and dispatch.
    pub coordination: Arc<CoordinationService>,
}

impl AppState {
    /// Wraps a coordination service.
    #[must_use]
    pub fn new(coordination: CoordinationService) -> Self {
        Self {
            coordination: Arc::new(coordination),
        }
    }
}
