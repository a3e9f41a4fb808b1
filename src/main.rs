//! basalt-orchestrator server entry point.
//!
//! Replays the WAL, then starts the Axum HTTP server with REST and
//! WebSocket endpoints. Replay runs to completion before the listener
//! binds; the orchestrator never serves requests from partial state.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use basalt_orchestrator::api;
use basalt_orchestrator::app_state::AppState;
use basalt_orchestrator::auth::TokenService;
use basalt_orchestrator::config::OrchestratorConfig;
use basalt_orchestrator::domain::EventHub;
use basalt_orchestrator::service::Orchestrator;
use basalt_orchestrator::storage::{HttpObjectStore, MemoryObjectStore, ObjectStore};
use basalt_orchestrator::wal::Wal;
use basalt_orchestrator::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = OrchestratorConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting basalt-orchestrator");

    // Object storage gateway
    let store: Arc<dyn ObjectStore> = match &config.object_store_endpoint {
        Some(endpoint) => Arc::new(HttpObjectStore::new(
            endpoint,
            &config.object_store_bucket,
            config.object_store_access_token.clone(),
        )),
        None => {
            tracing::warn!("OBJECT_STORE_ENDPOINT not set; using in-memory object store");
            Arc::new(MemoryObjectStore::new())
        }
    };

    // Replay the WAL and build the core
    let wal = Wal::open(&config.wal_path)?;
    let event_hub = EventHub::new(config.event_hub_capacity);
    let orchestrator = Arc::new(Orchestrator::new(wal, event_hub.clone(), store)?);

    let token_service = Arc::new(TokenService::new(
        &config.token_signing_secret,
        &config.registration_secret,
        config.token_ttl_secs,
    ));

    let upload_base_url = config
        .object_store_endpoint
        .as_ref()
        .map(|e| format!("{}/{}", e.trim_end_matches('/'), config.object_store_bucket));

    // Build application state
    let app_state = AppState {
        orchestrator,
        event_hub,
        token_service,
        upload_base_url,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
