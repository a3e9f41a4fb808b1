//! REST endpoint handlers organized by resource.

pub mod agent;
pub mod job;
pub mod snapshot;
pub mod system;
pub mod token;

use axum::Router;
use axum::http::HeaderMap;

use crate::app_state::AppState;
use crate::auth::Claims;
use crate::error::OrchestratorError;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(token::routes())
        .merge(snapshot::routes())
        .merge(job::routes())
        .merge(agent::routes())
}

/// Extracts and validates the bearer token from request headers.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Claims, OrchestratorError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| OrchestratorError::Auth("missing bearer token".to_string()))?;
    state.token_service.validate(token)
}

/// Requires an unscoped operator token.
fn require_operator(state: &AppState, headers: &HeaderMap) -> Result<Claims, OrchestratorError> {
    let claims = authenticate(state, headers)?;
    if claims.subject.is_operator() {
        Ok(claims)
    } else {
        Err(OrchestratorError::Auth(
            "operator token required".to_string(),
        ))
    }
}

/// Requires a token scoped to exactly `agent_id`. Operator tokens are
/// rejected: the coordinator never impersonates agent polling.
fn require_agent(
    state: &AppState,
    headers: &HeaderMap,
    agent_id: &str,
) -> Result<Claims, OrchestratorError> {
    let claims = authenticate(state, headers)?;
    if claims.can_act_for_agent(agent_id) {
        Ok(claims)
    } else {
        Err(OrchestratorError::Auth(format!(
            "token not scoped to agent {agent_id}"
        )))
    }
}

/// Requires an operator token or a token scoped to `agent_id`.
fn require_operator_or_agent(
    state: &AppState,
    headers: &HeaderMap,
    agent_id: &str,
) -> Result<Claims, OrchestratorError> {
    let claims = authenticate(state, headers)?;
    if claims.subject.is_operator() || claims.can_act_for_agent(agent_id) {
        Ok(claims)
    } else {
        Err(OrchestratorError::Auth(format!(
            "token not scoped to agent {agent_id}"
        )))
    }
}
