//! Agent-facing handlers: command polling and event posting.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::{require_agent, require_operator};
use crate::api::dto::{
    AgentListResponse, CommandDto, EventAckDto, PollCommandsResponse, PostEventRequest,
};
use crate::app_state::AppState;
use crate::domain::CommandId;
use crate::error::{ErrorResponse, OrchestratorError};

/// `GET /agents` — List agent identities known from command history.
///
/// # Errors
///
/// Returns [`OrchestratorError::Auth`] without an operator token.
#[utoipa::path(
    get,
    path = "/api/v1/agents",
    tag = "Agents",
    summary = "List known agents",
    responses(
        (status = 200, description = "Known agent identities", body = AgentListResponse),
    )
)]
pub async fn list_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, OrchestratorError> {
    let _claims = require_operator(&state, &headers)?;

    Ok(Json(AgentListResponse {
        agents: state.orchestrator.list_agents().await,
    }))
}

/// `GET /agents/:agent_id/commands` — Poll for outstanding commands.
///
/// Agents sit behind NAT and poll; the same commands are returned on
/// every poll until an event acknowledges them (at-least-once).
///
/// # Errors
///
/// Returns [`OrchestratorError::Auth`] unless the token is scoped to
/// `agent_id`.
#[utoipa::path(
    get,
    path = "/api/v1/agents/{agent_id}/commands",
    tag = "Agents",
    summary = "Poll pending commands",
    params(
        ("agent_id" = String, Path, description = "Agent identity"),
    ),
    responses(
        (status = 200, description = "Outstanding commands in enqueue order", body = PollCommandsResponse),
        (status = 401, description = "Token not scoped to this agent", body = ErrorResponse),
        (status = 503, description = "WAL unavailable", body = ErrorResponse),
    )
)]
pub async fn poll_commands(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, OrchestratorError> {
    let _claims = require_agent(&state, &headers, &agent_id)?;

    let commands = state.orchestrator.poll_commands(&agent_id).await?;

    Ok(Json(PollCommandsResponse {
        commands: commands.into_iter().map(CommandDto::from).collect(),
    }))
}

/// `POST /agents/:agent_id/events` — Report a command outcome.
///
/// # Errors
///
/// Returns [`OrchestratorError::AgentUnknown`] if the command is not
/// owned by `agent_id`; job state is unchanged in that case.
#[utoipa::path(
    post,
    path = "/api/v1/agents/{agent_id}/events",
    tag = "Agents",
    summary = "Post a command outcome",
    description = "Drives the owning command and job to a terminal state, or appends to the job log when the job is already terminal.",
    params(
        ("agent_id" = String, Path, description = "Agent identity"),
    ),
    request_body = PostEventRequest,
    responses(
        (status = 200, description = "Event consumed", body = EventAckDto),
        (status = 401, description = "Token not scoped to this agent", body = ErrorResponse),
        (status = 403, description = "Command not owned by this agent", body = ErrorResponse),
        (status = 503, description = "WAL unavailable", body = ErrorResponse),
    )
)]
pub async fn post_agent_event(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<PostEventRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let _claims = require_agent(&state, &headers, &agent_id)?;

    let job = state
        .orchestrator
        .post_agent_event(
            &agent_id,
            CommandId::from_uuid(req.command_id),
            req.outcome,
            req.detail,
        )
        .await?;

    Ok(Json(EventAckDto {
        job_id: job.id,
        job_status: job.status,
    }))
}

/// Agent routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/agents", get(list_agents))
        .route("/agents/{agent_id}/commands", get(poll_commands))
        .route("/agents/{agent_id}/events", post(post_agent_event))
}
