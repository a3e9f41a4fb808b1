//! Restore job handlers: create, get, list.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::require_operator;
use crate::api::dto::{CreateJobRequest, JobDto, JobListResponse, PaginationParams};
use crate::app_state::AppState;
use crate::domain::{JobId, SnapshotId};
use crate::error::{ErrorResponse, OrchestratorError};

/// `POST /jobs` — Create and dispatch a restore job.
///
/// # Errors
///
/// Returns [`OrchestratorError::InvalidStateTransition`] if the snapshot
/// is not `available`; no command is enqueued in that case.
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "Jobs",
    summary = "Create a restore job",
    description = "Validates the snapshot, enqueues a restore command for the target agent, and records the job as in_progress.",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created and dispatched", body = JobDto),
        (status = 404, description = "Snapshot not found", body = ErrorResponse),
        (status = 409, description = "Snapshot not available", body = ErrorResponse),
        (status = 503, description = "WAL unavailable", body = ErrorResponse),
    )
)]
pub async fn create_restore_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let _claims = require_operator(&state, &headers)?;

    let job = state
        .orchestrator
        .create_restore_job(SnapshotId::from_uuid(req.snapshot_id), &req.target_agent_id)
        .await?;

    Ok((StatusCode::CREATED, Json(JobDto::from(job))))
}

/// `GET /jobs/:id` — Get a restore job with status and logs.
///
/// # Errors
///
/// Returns [`OrchestratorError::JobNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "Jobs",
    summary = "Get restore job details",
    params(
        ("id" = uuid::Uuid, Path, description = "Job UUID"),
    ),
    responses(
        (status = 200, description = "Job details", body = JobDto),
        (status = 404, description = "Job not found", body = ErrorResponse),
    )
)]
pub async fn get_restore_job(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, OrchestratorError> {
    let _claims = require_operator(&state, &headers)?;

    let job = state
        .orchestrator
        .get_restore_job(JobId::from_uuid(id))
        .await?;

    Ok(Json(JobDto::from(job)))
}

/// `GET /jobs` — List restore jobs with pagination.
///
/// # Errors
///
/// Returns [`OrchestratorError::Auth`] without an operator token.
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "Jobs",
    summary = "List restore jobs",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated job list", body = JobListResponse),
    )
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, OrchestratorError> {
    let _claims = require_operator(&state, &headers)?;

    let params = params.clamped();
    let jobs = state.orchestrator.list_jobs().await;
    let (data, pagination) = params.paginate(jobs.into_iter().map(JobDto::from).collect());

    Ok(Json(JobListResponse { data, pagination }))
}

/// Restore job routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(create_restore_job).get(list_jobs))
        .route("/jobs/{id}", get(get_restore_job))
}
