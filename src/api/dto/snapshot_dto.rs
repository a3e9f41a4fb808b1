//! Snapshot DTOs for create, complete-upload, get, and list operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{Snapshot, SnapshotId, SnapshotStatus};

/// Request body for `POST /snapshots`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSnapshotRequest {
    /// Agent that owns the snapshot data.
    pub agent_id: String,
    /// Content hash declared by the uploader (early-rejection hint;
    /// verified against the stored bytes on completion).
    pub checksum: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Opaque key-value metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Where the agent should upload the snapshot bytes.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadHandleDto {
    /// Object store key allocated for this snapshot.
    pub storage_key: String,
    /// Full upload URL when an external store is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}

/// Response body for `POST /snapshots` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSnapshotResponse {
    /// New snapshot identifier.
    #[schema(value_type = String)]
    pub snapshot_id: SnapshotId,
    /// Initial status (`pending_upload`).
    #[schema(value_type = String)]
    pub status: SnapshotStatus,
    /// Upload destination.
    pub upload_handle: UploadHandleDto,
}

/// Request body for `POST /snapshots/{id}/complete`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteUploadRequest {
    /// Checksum of the bytes the agent actually uploaded.
    pub checksum: String,
}

/// Snapshot detail for get, complete, and list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotDto {
    /// Snapshot identifier.
    #[schema(value_type = String)]
    pub snapshot_id: SnapshotId,
    /// Owning agent.
    pub agent_id: String,
    /// Declared (and, once available, verified) content hash.
    pub checksum: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Object store key.
    pub storage_key: String,
    /// Upload lifecycle status.
    #[schema(value_type = String)]
    pub status: SnapshotStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change timestamp.
    pub updated_at: DateTime<Utc>,
    /// Opaque client metadata.
    pub metadata: HashMap<String, String>,
}

impl From<Snapshot> for SnapshotDto {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            snapshot_id: snapshot.id,
            agent_id: snapshot.agent_id,
            checksum: snapshot.checksum,
            size: snapshot.size,
            storage_key: snapshot.storage_key,
            status: snapshot.status,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            metadata: snapshot.metadata,
        }
    }
}

/// Paginated list response for `GET /snapshots`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotListResponse {
    /// Snapshot details.
    pub data: Vec<SnapshotDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Query parameters for `GET /snapshots`.
#[derive(Debug, Deserialize)]
pub struct SnapshotListQuery {
    /// Restrict to snapshots owned by this agent.
    #[serde(default)]
    pub agent_id: Option<String>,
}
