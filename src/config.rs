//! Orchestrator configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The two secrets have no defaults and
//! startup fails without them.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level orchestrator configuration.
///
/// Loaded once at startup via [`OrchestratorConfig::from_env`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:7400`).
    pub listen_addr: SocketAddr,

    /// Shared secret agents present when minting tokens. Required.
    pub registration_secret: String,

    /// Key used to sign access tokens. Required.
    pub token_signing_secret: String,

    /// Lifetime of minted tokens in seconds.
    pub token_ttl_secs: u64,

    /// Path of the write-ahead log file.
    pub wal_path: PathBuf,

    /// Base URL of the S3-compatible object store. When unset, an
    /// in-memory store is used (development only).
    pub object_store_endpoint: Option<String>,

    /// Bucket that holds snapshot objects.
    pub object_store_bucket: String,

    /// Optional bearer token for the object store.
    pub object_store_access_token: Option<String>,

    /// Capacity of the event hub broadcast channel.
    pub event_hub_capacity: usize,
}

impl OrchestratorConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    /// Operational knobs fall back to development defaults; secrets do not.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` cannot be parsed as a
    /// [`SocketAddr`], or if `REGISTRATION_SECRET` / `TOKEN_SIGNING_SECRET`
    /// are missing or empty.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:7400".to_string())
            .parse()?;

        let registration_secret = require_env("REGISTRATION_SECRET")?;
        let token_signing_secret = require_env("TOKEN_SIGNING_SECRET")?;

        let token_ttl_secs = parse_env("TOKEN_TTL_SECS", 3600);

        let wal_path = PathBuf::from(
            std::env::var("WAL_PATH").unwrap_or_else(|_| "data/orchestrator.wal".to_string()),
        );

        let object_store_endpoint = std::env::var("OBJECT_STORE_ENDPOINT").ok();
        let object_store_bucket =
            std::env::var("OBJECT_STORE_BUCKET").unwrap_or_else(|_| "basalt-snapshots".to_string());
        let object_store_access_token = std::env::var("OBJECT_STORE_ACCESS_TOKEN").ok();

        let event_hub_capacity = parse_env("EVENT_HUB_CAPACITY", 10_000);

        Ok(Self {
            listen_addr,
            registration_secret,
            token_signing_secret,
            token_ttl_secs,
            wal_path,
            object_store_endpoint,
            object_store_bucket,
            object_store_access_token,
            event_hub_capacity,
        })
    }
}

/// Reads a required environment variable, rejecting empty values.
fn require_env(key: &str) -> Result<String, Box<dyn std::error::Error>> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(format!("{key} must be set").into()),
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
