//! WebSocket layer: the live event stream for operators.
//!
//! The endpoint at `/ws` streams every WAL record to connected
//! observers in publish order. Delivery is best-effort per subscriber;
//! there is no backfill for late or lagging connections.

pub mod connection;
pub mod handler;
pub mod messages;
