//! Snapshot handlers: create, complete upload, get, list, download.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::{require_operator, require_operator_or_agent};
use crate::api::dto::{
    CompleteUploadRequest, CreateSnapshotRequest, CreateSnapshotResponse, PaginationParams,
    SnapshotDto, SnapshotListQuery, SnapshotListResponse, UploadHandleDto,
};
use crate::app_state::AppState;
use crate::domain::SnapshotId;
use crate::error::{ErrorResponse, OrchestratorError};

/// `POST /snapshots` — Allocate a snapshot and its upload location.
///
/// # Errors
///
/// Returns [`OrchestratorError`] on invalid input or when the WAL
/// refuses writes.
#[utoipa::path(
    post,
    path = "/api/v1/snapshots",
    tag = "Snapshots",
    summary = "Create a snapshot",
    description = "Allocates snapshot metadata and a storage location. The agent uploads bytes directly to the returned handle, then calls the complete endpoint.",
    request_body = CreateSnapshotRequest,
    responses(
        (status = 201, description = "Snapshot created", body = CreateSnapshotResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 503, description = "WAL unavailable", body = ErrorResponse),
    )
)]
pub async fn create_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateSnapshotRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let _claims = require_operator_or_agent(&state, &headers, &req.agent_id)?;

    let snapshot = state
        .orchestrator
        .create_snapshot(&req.agent_id, &req.checksum, req.size, req.metadata)
        .await?;

    let upload_url = state
        .upload_base_url
        .as_ref()
        .map(|base| format!("{base}/{}", snapshot.storage_key));

    let response = CreateSnapshotResponse {
        snapshot_id: snapshot.id,
        status: snapshot.status,
        upload_handle: UploadHandleDto {
            storage_key: snapshot.storage_key,
            upload_url,
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /snapshots/:id/complete` — Report upload completion and verify.
///
/// # Errors
///
/// Returns [`OrchestratorError::ChecksumMismatch`] when the stored bytes
/// fail verification; the snapshot is then permanently `failed`.
#[utoipa::path(
    post,
    path = "/api/v1/snapshots/{id}/complete",
    tag = "Snapshots",
    summary = "Complete a snapshot upload",
    description = "Recomputes the checksum over the stored object and flips the snapshot to available on match or failed on mismatch.",
    params(
        ("id" = uuid::Uuid, Path, description = "Snapshot UUID"),
    ),
    request_body = CompleteUploadRequest,
    responses(
        (status = 200, description = "Snapshot verified and available", body = SnapshotDto),
        (status = 404, description = "Snapshot not found", body = ErrorResponse),
        (status = 409, description = "Snapshot not pending upload", body = ErrorResponse),
        (status = 422, description = "Checksum mismatch", body = ErrorResponse),
        (status = 503, description = "Object storage unavailable", body = ErrorResponse),
    )
)]
pub async fn complete_snapshot_upload(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    headers: HeaderMap,
    Json(req): Json<CompleteUploadRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let snapshot_id = SnapshotId::from_uuid(id);
    let snapshot = state.orchestrator.get_snapshot(snapshot_id).await?;
    let _claims = require_operator_or_agent(&state, &headers, &snapshot.agent_id)?;

    let snapshot = state
        .orchestrator
        .complete_snapshot_upload(snapshot_id, &req.checksum)
        .await?;

    Ok(Json(SnapshotDto::from(snapshot)))
}

/// `GET /snapshots` — List snapshots with pagination.
///
/// # Errors
///
/// Returns [`OrchestratorError::Auth`] without an operator token.
#[utoipa::path(
    get,
    path = "/api/v1/snapshots",
    tag = "Snapshots",
    summary = "List snapshots",
    description = "Returns a paginated list of snapshots, optionally filtered by owning agent.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated snapshot list", body = SnapshotListResponse),
    )
)]
pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<SnapshotListQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, OrchestratorError> {
    let _claims = require_operator(&state, &headers)?;

    let params = params.clamped();
    let snapshots = state
        .orchestrator
        .list_snapshots(filter.agent_id.as_deref())
        .await;
    let (data, pagination) =
        params.paginate(snapshots.into_iter().map(SnapshotDto::from).collect());

    Ok(Json(SnapshotListResponse { data, pagination }))
}

/// `GET /snapshots/:id` — Get snapshot metadata.
///
/// # Errors
///
/// Returns [`OrchestratorError::SnapshotNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/snapshots/{id}",
    tag = "Snapshots",
    summary = "Get snapshot details",
    params(
        ("id" = uuid::Uuid, Path, description = "Snapshot UUID"),
    ),
    responses(
        (status = 200, description = "Snapshot details", body = SnapshotDto),
        (status = 404, description = "Snapshot not found", body = ErrorResponse),
    )
)]
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, OrchestratorError> {
    let snapshot = state
        .orchestrator
        .get_snapshot(SnapshotId::from_uuid(id))
        .await?;
    let _claims = require_operator_or_agent(&state, &headers, &snapshot.agent_id)?;

    Ok(Json(SnapshotDto::from(snapshot)))
}

/// `GET /snapshots/:id/object` — Stream the verified snapshot bytes.
///
/// # Errors
///
/// Returns [`OrchestratorError::InvalidStateTransition`] unless the
/// snapshot is `available`.
#[utoipa::path(
    get,
    path = "/api/v1/snapshots/{id}/object",
    tag = "Snapshots",
    summary = "Download snapshot bytes",
    description = "Streams the stored object for an available snapshot.",
    params(
        ("id" = uuid::Uuid, Path, description = "Snapshot UUID"),
    ),
    responses(
        (status = 200, description = "Snapshot byte stream"),
        (status = 404, description = "Snapshot not found", body = ErrorResponse),
        (status = 409, description = "Snapshot not available", body = ErrorResponse),
        (status = 503, description = "Object storage unavailable", body = ErrorResponse),
    )
)]
pub async fn get_snapshot_object(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, OrchestratorError> {
    let snapshot_id = SnapshotId::from_uuid(id);
    let snapshot = state.orchestrator.get_snapshot(snapshot_id).await?;
    let _claims = require_operator_or_agent(&state, &headers, &snapshot.agent_id)?;

    let (_snapshot, stream) = state.orchestrator.snapshot_object(snapshot_id).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(stream),
    ))
}

/// Snapshot routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/snapshots", post(create_snapshot).get(list_snapshots))
        .route("/snapshots/{id}", get(get_snapshot))
        .route("/snapshots/{id}/complete", post(complete_snapshot_upload))
        .route("/snapshots/{id}/object", get(get_snapshot_object))
}
