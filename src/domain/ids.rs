//! Type-safe entity identifiers.
//!
//! [`SnapshotId`], [`JobId`], and [`CommandId`] are newtype wrappers around
//! [`uuid::Uuid`] (v4) so the three identifier spaces cannot be confused
//! with each other or with other UUIDs. Agent identities are plain strings
//! chosen by the agents themselves; the orchestrator never generates them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a snapshot.
///
/// Generated by the snapshot registry at creation time and immutable
/// thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(uuid::Uuid);

/// Unique identifier for a restore job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(uuid::Uuid);

/// Unique identifier for a queued agent command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(uuid::Uuid);

macro_rules! id_impls {
    ($name:ident) => {
        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_impls!(SnapshotId);
id_impls!(JobId);
id_impls!(CommandId);
