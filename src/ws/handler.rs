//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::error::OrchestratorError;

/// Query parameters for the WebSocket upgrade.
///
/// Browsers cannot set headers on WebSocket requests, so the bearer
/// token travels as a query parameter.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Operator bearer token.
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /ws` — Upgrade to the live event stream.
///
/// # Errors
///
/// Returns [`OrchestratorError::Auth`] without a valid operator token.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let token = query
        .token
        .as_deref()
        .ok_or_else(|| OrchestratorError::Auth("missing token query parameter".to_string()))?;
    let claims = state.token_service.validate(token)?;
    if !claims.subject.is_operator() {
        return Err(OrchestratorError::Auth(
            "operator token required".to_string(),
        ));
    }

    let event_rx = state.event_hub.subscribe();
    Ok(ws.on_upgrade(move |socket| run_connection(socket, event_rx)))
}
