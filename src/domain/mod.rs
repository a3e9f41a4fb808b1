//! Domain layer: entities, identifiers, WAL events, and the event hub.
//!
//! This module contains the orchestrator's domain model: snapshot,
//! command, and restore-job entities with their lifecycle enums, the
//! typed identifiers keying them, the WAL event vocabulary every state
//! mutation is recorded in, and the broadcast hub for live observers.

pub mod command;
pub mod event;
pub mod event_hub;
pub mod ids;
pub mod job;
pub mod snapshot;

pub use command::{Command, CommandKind, CommandStatus};
pub use event::{EventOutcome, WalEvent};
pub use event_hub::EventHub;
pub use ids::{CommandId, JobId, SnapshotId};
pub use job::{JobLogEntry, JobStatus, RestoreJob};
pub use snapshot::{Snapshot, SnapshotStatus};
