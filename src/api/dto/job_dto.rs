//! Restore job DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{JobId, JobLogEntry, JobStatus, RestoreJob, SnapshotId};

/// Request body for `POST /jobs`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateJobRequest {
    /// Snapshot to restore. Must be `available`.
    pub snapshot_id: uuid::Uuid,
    /// Agent to restore onto.
    pub target_agent_id: String,
}

/// One log line in a job response.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobLogEntryDto {
    /// When the entry was recorded.
    pub at: DateTime<Utc>,
    /// Event summary.
    pub message: String,
}

impl From<JobLogEntry> for JobLogEntryDto {
    fn from(entry: JobLogEntry) -> Self {
        Self {
            at: entry.at,
            message: entry.message,
        }
    }
}

/// Restore job detail for create, get, and list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobDto {
    /// Job identifier.
    #[schema(value_type = String)]
    pub job_id: JobId,
    /// Snapshot being restored.
    #[schema(value_type = String)]
    pub snapshot_id: SnapshotId,
    /// Restore target.
    pub target_agent_id: String,
    /// Lifecycle status.
    #[schema(value_type = String)]
    pub status: JobStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Append-only event log.
    pub logs: Vec<JobLogEntryDto>,
}

impl From<RestoreJob> for JobDto {
    fn from(job: RestoreJob) -> Self {
        Self {
            job_id: job.id,
            snapshot_id: job.snapshot_id,
            target_agent_id: job.target_agent_id,
            status: job.status,
            created_at: job.created_at,
            updated_at: job.updated_at,
            logs: job.logs.into_iter().map(JobLogEntryDto::from).collect(),
        }
    }
}

/// Paginated list response for `GET /jobs`.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    /// Job details.
    pub data: Vec<JobDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
