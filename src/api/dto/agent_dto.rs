//! Agent-facing DTOs: command polling and event posting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Command, CommandId, CommandKind, CommandStatus, EventOutcome, JobId, JobStatus};

/// One command in a poll response.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommandDto {
    /// Command identifier. Echo this back in `POST /agents/{id}/events`.
    #[schema(value_type = String)]
    pub command_id: CommandId,
    /// Owning restore job.
    #[schema(value_type = String)]
    pub job_id: JobId,
    /// Delivery status (`pending` or `sent`; terminal commands are
    /// never re-offered).
    #[schema(value_type = String)]
    pub status: CommandStatus,
    /// Instruction payload, tagged by `command_type`.
    #[schema(value_type = Object)]
    pub command: CommandKind,
    /// Enqueue timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<Command> for CommandDto {
    fn from(command: Command) -> Self {
        Self {
            command_id: command.id,
            job_id: command.job_id,
            status: command.status,
            command: command.kind,
            created_at: command.created_at,
        }
    }
}

/// Response body for `GET /agents/{id}/commands`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PollCommandsResponse {
    /// Outstanding commands in enqueue order. Re-polling returns the
    /// same commands until an event acknowledges them.
    pub commands: Vec<CommandDto>,
}

/// Request body for `POST /agents/{id}/events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PostEventRequest {
    /// Command this event acknowledges.
    pub command_id: uuid::Uuid,
    /// Execution outcome.
    #[schema(value_type = String)]
    pub outcome: EventOutcome,
    /// Optional detail carried into the job log.
    #[serde(default)]
    pub detail: Option<String>,
}

/// Acknowledgement returned by `POST /agents/{id}/events`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventAckDto {
    /// Job the command belongs to.
    #[schema(value_type = String)]
    pub job_id: JobId,
    /// Job status after consuming the event.
    #[schema(value_type = String)]
    pub job_status: JobStatus,
}

/// Response body for `GET /agents`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AgentListResponse {
    /// Every agent identity known from command history, sorted.
    pub agents: Vec<String>,
}
