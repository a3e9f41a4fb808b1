//! Snapshot entity and upload lifecycle states.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SnapshotId;

/// Upload lifecycle of a snapshot.
///
/// A snapshot is [`Available`](SnapshotStatus::Available) if and only if
/// the checksum of its stored bytes has been independently recomputed and
/// matched the declared value. `Failed` is terminal: the bytes are kept
/// for diagnostics but the snapshot can never back a restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Metadata allocated, bytes not yet verified.
    PendingUpload,
    /// Stored bytes verified against the declared checksum.
    Available,
    /// Verification failed; unusable for restores.
    Failed,
}

impl SnapshotStatus {
    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingUpload => "pending_upload",
            Self::Available => "available",
            Self::Failed => "failed",
        }
    }
}

/// A point-in-time snapshot pushed by a remote agent.
///
/// Created when a client requests a snapshot; mutated only by the
/// upload-completion step; never deleted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique snapshot identifier (immutable after creation).
    pub id: SnapshotId,

    /// Agent that owns the snapshot data.
    pub agent_id: String,

    /// Content hash declared by the uploader, verified server-side
    /// before the snapshot becomes available.
    pub checksum: String,

    /// Declared size in bytes.
    pub size: u64,

    /// Key of the snapshot object in the blob store.
    pub storage_key: String,

    /// Upload lifecycle status.
    pub status: SnapshotStatus,

    /// Creation timestamp (immutable after creation).
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last status change.
    pub updated_at: DateTime<Utc>,

    /// Opaque key-value bag supplied by the client.
    pub metadata: HashMap<String, String>,
}

impl Snapshot {
    /// Returns `true` if the snapshot may back a restore job.
    #[must_use]
    pub fn is_restorable(&self) -> bool {
        self.status == SnapshotStatus::Available
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_snapshot(status: SnapshotStatus) -> Snapshot {
        let id = SnapshotId::new();
        Snapshot {
            id,
            agent_id: "agent-1".to_string(),
            checksum: "deadbeef".to_string(),
            size: 1024,
            storage_key: format!("snapshots/{id}"),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn only_available_is_restorable() {
        assert!(!make_snapshot(SnapshotStatus::PendingUpload).is_restorable());
        assert!(make_snapshot(SnapshotStatus::Available).is_restorable());
        assert!(!make_snapshot(SnapshotStatus::Failed).is_restorable());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SnapshotStatus::PendingUpload).unwrap_or_default();
        assert_eq!(json, "\"pending_upload\"");
    }
}
