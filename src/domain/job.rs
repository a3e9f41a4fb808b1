//! Restore job entity and its linear state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, SnapshotId};

/// Restore job lifecycle.
///
/// Status only ever moves forward through
/// `Pending → InProgress → {Completed, Failed}`. Once terminal, further
/// agent events are accepted for logging but cause no transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, command not yet dispatched.
    Pending,
    /// Command dispatched to the target agent.
    InProgress,
    /// Agent reported a successful restore.
    Completed,
    /// Agent reported a failed restore.
    Failed,
}

impl JobStatus {
    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One entry in a job's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    /// When the entry was recorded (WAL record timestamp).
    pub at: DateTime<Utc>,
    /// Event summary.
    pub message: String,
}

/// A restore operation driven end-to-end by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreJob {
    /// Unique job identifier.
    pub id: JobId,

    /// Snapshot being restored. Must have been `available` at creation.
    pub snapshot_id: SnapshotId,

    /// Agent the snapshot is restored onto.
    pub target_agent_id: String,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last mutation (status change or log append).
    pub updated_at: DateTime<Utc>,

    /// Append-only ordered list of event summaries.
    pub logs: Vec<JobLogEntry>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap_or_default();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(JobStatus::InProgress.as_str(), "in_progress");
    }
}
