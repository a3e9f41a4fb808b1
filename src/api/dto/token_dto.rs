//! Token minting DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /auth/token`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MintTokenRequest {
    /// Shared registration secret configured on the orchestrator.
    pub registration_secret: String,
    /// When set, scopes the token to this agent's command polling and
    /// event posting. Omit for an operator token.
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// Response body for `POST /auth/token`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MintTokenResponse {
    /// Signed bearer token.
    pub token: String,
    /// Token subject (`operator` or `agent:<id>`).
    pub subject: String,
    /// When the token was minted.
    pub issued_at: DateTime<Utc>,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
}
