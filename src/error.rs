//! Orchestrator error types with HTTP status code mapping.
//!
//! [`OrchestratorError`] is the central error type for the control plane.
//! Each variant maps to a specific HTTP status code and structured JSON
//! error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{CommandId, JobId, SnapshotId};
use crate::wal::WalError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2101,
///     "message": "invalid state transition: snapshot is pending_upload",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`OrchestratorError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status                  |
/// |-----------|---------------------|------------------------------|
/// | 1000–1099 | Validation          | 400 Bad Request              |
/// | 1100–1199 | Auth / Scope        | 401 Unauthorized / 403       |
/// | 2000–2099 | Not Found           | 404 Not Found                |
/// | 2100–2199 | State Transition    | 409 Conflict                 |
/// | 3000–3999 | Server / Upstream   | 500 / 503                    |
/// | 4000–4999 | Integrity           | 422 Unprocessable Entity     |
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Token missing, malformed, expired, or out of scope.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// An agent posted an event for a command it does not own.
    #[error("command {command_id} is not owned by agent {agent_id}")]
    AgentUnknown {
        /// Agent identity presented by the caller.
        agent_id: String,
        /// Command the event referenced.
        command_id: CommandId,
    },

    /// Snapshot with the given ID was not found.
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    /// Restore job with the given ID was not found.
    #[error("restore job not found: {0}")]
    JobNotFound(JobId),

    /// Command with the given ID was not found.
    #[error("command not found: {0}")]
    CommandNotFound(CommandId),

    /// Operation requested against an entity whose state does not permit it.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Stored bytes do not hash to the declared checksum.
    #[error("checksum mismatch: declared {declared}, computed {computed}")]
    ChecksumMismatch {
        /// Checksum declared at snapshot creation.
        declared: String,
        /// Checksum recomputed over the stored object.
        computed: String,
    },

    /// The object storage gateway is unreachable. Retryable.
    #[error("object storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The WAL append path failed. Fatal: the orchestrator stops
    /// accepting mutating requests once this is observed.
    #[error("wal append failed: {0}")]
    WalWrite(#[from] WalError),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Auth(_) => 1101,
            Self::AgentUnknown { .. } => 1102,
            Self::SnapshotNotFound(_) => 2001,
            Self::JobNotFound(_) => 2002,
            Self::CommandNotFound(_) => 2003,
            Self::InvalidStateTransition(_) => 2101,
            Self::Internal(_) => 3000,
            Self::StorageUnavailable(_) => 3001,
            Self::WalWrite(_) => 3002,
            Self::ChecksumMismatch { .. } => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::AgentUnknown { .. } => StatusCode::FORBIDDEN,
            Self::SnapshotNotFound(_) | Self::JobNotFound(_) | Self::CommandNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidStateTransition(_) => StatusCode::CONFLICT,
            Self::ChecksumMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::StorageUnavailable(_) | Self::WalWrite(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn checksum_mismatch_maps_to_422() {
        let err = OrchestratorError::ChecksumMismatch {
            declared: "abc".to_string(),
            computed: "def".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), 4001);
    }

    #[test]
    fn wal_write_maps_to_503() {
        let err = OrchestratorError::WalWrite(WalError::SequenceGap {
            expected: 3,
            got: 5,
        });
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn error_body_serializes_without_details() {
        let err = OrchestratorError::InvalidRequest("missing agent_id".to_string());
        let body = ErrorResponse {
            error: ErrorBody {
                code: err.error_code(),
                message: err.to_string(),
                details: None,
            },
        };
        let json = serde_json::to_string(&body).unwrap_or_default();
        assert!(json.contains("1001"));
        assert!(!json.contains("details"));
    }
}
