//! trigger-rendezvous server entry point.
//!
//! Starts the Axum HTTP server and the expiry sweeper.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use trigger_rendezvous::api;
use trigger_rendezvous::app_state::AppState;
use trigger_rendezvous::config::{LogFormat, RendezvousConfig, StoreBackend};
use trigger_rendezvous::service::CoordinationService;
use trigger_rendezvous::store::{MemoryStore, PostgresStore, TriggerStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RendezvousConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, backend = ?config.store_backend, "starting trigger-rendezvous");

    // Build store layer
    let store: Arc<dyn TriggerStore> = match config.store_backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Postgres => Arc::new(PostgresStore::connect(&config).await?),
    };

    // Build service layer
    let coordination = CoordinationService::new(store)
        .with_event_ttl(config.event_ttl())
        .with_fanout_warn_threshold(config.fanout_warn_threshold);

    // Build application state
    let app_state = AppState::new(coordination);

    if config.purge_interval_secs > 0 {
        spawn_sweeper(
            Arc::clone(&app_state.coordination),
            Duration::from_secs(config.purge_interval_secs),
        );
    }

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically removes expired inboxes and waiting pools.
fn spawn_sweeper(coordination: Arc<CoordinationService>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match coordination.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "purged expired rendezvous entries"),
                Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
            }
        }
    });
}
