//! # basalt-orchestrator
//!
//! Control-plane orchestrator for the basalt distributed backup/restore
//! system.
//!
//! The orchestrator accepts point-in-time snapshots pushed by remote
//! agents, stores them with checksum-gated integrity verification, and
//! drives restore operations back onto agents that poll for work
//! (agents sit behind NAT and cannot be reached inbound). Every state
//! mutation is appended to a write-ahead log before derived state
//! changes, so a restart rebuilds the registry, queue, and job table by
//! replaying the log.
//!
//! ## Architecture
//!
//! ```text
//! Clients / Agents (HTTP), Operators (WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── TokenService (auth/)
//!     ├── Orchestrator (service/)
//!     │       ├── Snapshot Registry
//!     │       ├── Command Queue
//!     │       └── Restore Job State Machine
//!     │
//!     ├── Wal (wal/)          ── append-only durability boundary
//!     ├── EventHub (domain/)  ── live fan-out of WAL records
//!     └── ObjectStore (storage/) ── S3-compatible blob store
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod storage;
pub mod wal;
pub mod ws;
