//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::TokenService;
use crate::domain::EventHub;
use crate::service::Orchestrator;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Orchestrator core for all business logic.
    pub orchestrator: Arc<Orchestrator>,
    /// Event hub for WebSocket subscriptions.
    pub event_hub: EventHub,
    /// Token minting and validation.
    pub token_service: Arc<TokenService>,
    /// Base URL agents upload snapshot objects to
    /// (`{endpoint}/{bucket}`), when an external store is configured.
    pub upload_base_url: Option<String>,
}
