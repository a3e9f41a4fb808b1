//! Agent commands and the closed set of command variants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CommandId, JobId, SnapshotId};

/// Delivery lifecycle of a command.
///
/// `Pending → Sent` happens the first time the command appears in a poll
/// response; `Sent → Completed | Failed` only via a matching event from
/// the owning agent. Until a terminal event lands, polls keep returning
/// the command — that is the at-least-once contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Queued, never delivered.
    Pending,
    /// Included in at least one poll response.
    Sent,
    /// Agent reported success.
    Completed,
    /// Agent reported failure.
    Failed,
}

impl CommandStatus {
    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// The closed set of instructions an agent can be asked to execute.
///
/// Dispatch is a tagged variant, not runtime inspection; adding an
/// operation means adding a variant here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command_type", rename_all = "snake_case")]
pub enum CommandKind {
    /// Restore the referenced snapshot onto the target agent.
    RestoreSnapshot {
        /// Snapshot to restore.
        snapshot_id: SnapshotId,
        /// Object store key holding the snapshot bytes.
        storage_key: String,
        /// Verified content hash the agent should check after download.
        checksum: String,
        /// Size of the snapshot in bytes.
        size: u64,
    },
}

impl CommandKind {
    /// Returns the command type as a static string slice.
    #[must_use]
    pub const fn command_type_str(&self) -> &'static str {
        match self {
            Self::RestoreSnapshot { .. } => "restore_snapshot",
        }
    }
}

/// A durable, pollable instruction owned by exactly one job and one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Unique command identifier.
    pub id: CommandId,

    /// Agent the command is addressed to.
    pub agent_id: String,

    /// Restore job that dispatched the command.
    pub job_id: JobId,

    /// Instruction payload.
    pub kind: CommandKind,

    /// Delivery lifecycle status.
    pub status: CommandStatus,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last status change.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!CommandStatus::Pending.is_terminal());
        assert!(!CommandStatus::Sent.is_terminal());
        assert!(CommandStatus::Completed.is_terminal());
        assert!(CommandStatus::Failed.is_terminal());
    }

    #[test]
    fn kind_serializes_with_command_type_tag() {
        let kind = CommandKind::RestoreSnapshot {
            snapshot_id: SnapshotId::new(),
            storage_key: "snapshots/x".to_string(),
            checksum: "abc123".to_string(),
            size: 100,
        };
        let json = serde_json::to_string(&kind).unwrap_or_default();
        assert!(json.contains("\"command_type\":\"restore_snapshot\""));
        assert_eq!(kind.command_type_str(), "restore_snapshot");
    }
}
