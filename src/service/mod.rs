//! Service layer: the orchestrator core.
//!
//! [`Orchestrator`] owns the WAL, the derived in-memory state, and the
//! event hub, and drives the snapshot registry, command queue, and
//! restore job state machine through a single write path.

pub mod orchestrator;

pub use orchestrator::Orchestrator;
