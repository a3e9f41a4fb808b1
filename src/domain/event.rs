//! WAL events: one variant per state mutation.
//!
//! Every mutation of a snapshot, command, or job is recorded as exactly
//! one [`WalEvent`] appended to the write-ahead log. All derived state is
//! a fold over these events, so each variant carries everything needed to
//! rebuild the entity it touches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::command::CommandKind;
use super::{CommandId, JobId, SnapshotId};

/// Outcome reported by an agent for a command it executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The command executed successfully.
    Success,
    /// The command failed on the agent.
    Failure,
}

/// A state mutation recorded in the write-ahead log.
///
/// Serialized with an `event_type` tag so the on-disk records and the
/// event-hub payloads are self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum WalEvent {
    /// Snapshot metadata allocated; upload pending.
    SnapshotCreated {
        /// New snapshot identifier.
        snapshot_id: SnapshotId,
        /// Owning agent.
        agent_id: String,
        /// Checksum declared by the uploader.
        checksum: String,
        /// Declared size in bytes.
        size: u64,
        /// Object store key allocated for the upload.
        storage_key: String,
        /// Opaque client metadata.
        metadata: HashMap<String, String>,
    },

    /// Stored bytes verified; snapshot eligible for restores.
    SnapshotAvailable {
        /// Verified snapshot.
        snapshot_id: SnapshotId,
    },

    /// Verification failed; snapshot permanently unusable.
    SnapshotFailed {
        /// Rejected snapshot.
        snapshot_id: SnapshotId,
        /// Checksum recomputed over the stored object.
        computed_checksum: String,
    },

    /// Restore job created in `pending`.
    JobCreated {
        /// New job identifier.
        job_id: JobId,
        /// Snapshot being restored.
        snapshot_id: SnapshotId,
        /// Agent the restore targets.
        target_agent_id: String,
    },

    /// Restore command dispatched; job now `in_progress`.
    JobStarted {
        /// Job identifier.
        job_id: JobId,
    },

    /// All job commands succeeded; job terminal.
    JobCompleted {
        /// Job identifier.
        job_id: JobId,
    },

    /// A job command failed; job terminal.
    JobFailed {
        /// Job identifier.
        job_id: JobId,
    },

    /// Command enqueued for an agent.
    CommandCreated {
        /// New command identifier.
        command_id: CommandId,
        /// Agent the command is addressed to.
        agent_id: String,
        /// Owning job.
        job_id: JobId,
        /// Instruction payload.
        kind: CommandKind,
    },

    /// Command included in a poll response for the first time.
    CommandSent {
        /// Command identifier.
        command_id: CommandId,
    },

    /// Owning agent reported success.
    CommandCompleted {
        /// Command identifier.
        command_id: CommandId,
        /// Optional agent-supplied detail, carried into the job log.
        detail: Option<String>,
    },

    /// Owning agent reported failure.
    CommandFailed {
        /// Command identifier.
        command_id: CommandId,
        /// Optional agent-supplied detail, carried into the job log.
        detail: Option<String>,
    },

    /// Event received for a terminal job; recorded for the job log only.
    AgentEventLogged {
        /// Job the command belongs to.
        job_id: JobId,
        /// Command the event referenced.
        command_id: CommandId,
        /// Reporting agent.
        agent_id: String,
        /// Reported outcome.
        outcome: EventOutcome,
        /// Optional agent-supplied detail.
        detail: Option<String>,
    },
}

impl WalEvent {
    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SnapshotCreated { .. } => "snapshot_created",
            Self::SnapshotAvailable { .. } => "snapshot_available",
            Self::SnapshotFailed { .. } => "snapshot_failed",
            Self::JobCreated { .. } => "job_created",
            Self::JobStarted { .. } => "job_started",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
            Self::CommandCreated { .. } => "command_created",
            Self::CommandSent { .. } => "command_sent",
            Self::CommandCompleted { .. } => "command_completed",
            Self::CommandFailed { .. } => "command_failed",
            Self::AgentEventLogged { .. } => "agent_event_logged",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_created_serializes_with_tag() {
        let event = WalEvent::SnapshotCreated {
            snapshot_id: SnapshotId::new(),
            agent_id: "agent-1".to_string(),
            checksum: "abc123".to_string(),
            size: 100,
            storage_key: "snapshots/x".to_string(),
            metadata: HashMap::new(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event_type\":\"snapshot_created\""));
        assert_eq!(event.event_type_str(), "snapshot_created");
    }

    #[test]
    fn event_round_trips_through_json() {
        let event = WalEvent::CommandFailed {
            command_id: CommandId::new(),
            detail: Some("disk full".to_string()),
        };
        let json = serde_json::to_string(&event).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        let back: WalEvent = serde_json::from_str(&json).ok().unwrap_or_else(|| {
            panic!("deserialization failed");
        });
        assert_eq!(back.event_type_str(), "command_failed");
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let json = serde_json::to_string(&EventOutcome::Failure).unwrap_or_default();
        assert_eq!(json, "\"failure\"");
    }
}
