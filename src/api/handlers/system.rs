//! System endpoints: liveness and readiness probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Liveness probe response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// Readiness probe response.
#[derive(Debug, Serialize, ToSchema)]
struct ReadyResponse {
    status: String,
}

/// `GET /health` — Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Liveness probe",
    description = "Returns process liveness, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /ready` — Readiness probe.
///
/// Reports `degraded` with a 503 once a WAL append has failed; mutating
/// endpoints refuse new work from that point.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "System",
    summary = "Readiness probe",
    description = "Returns ok while the WAL accepts appends, degraded otherwise.",
    responses(
        (status = 200, description = "Ready for writes", body = ReadyResponse),
        (status = 503, description = "WAL medium unreachable", body = ReadyResponse),
    )
)]
pub async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.orchestrator.is_accepting() {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ok".to_string(),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "degraded".to_string(),
            }),
        )
    }
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
}
