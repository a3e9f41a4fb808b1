//! Token minting handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{MintTokenRequest, MintTokenResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, OrchestratorError};

/// `POST /auth/token` — Mint an access token.
///
/// # Errors
///
/// Returns [`OrchestratorError::Auth`] if the registration secret does
/// not match the configured value.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    tag = "Auth",
    summary = "Mint an access token",
    description = "Exchanges the shared registration secret for a signed bearer token, optionally scoped to a single agent identity.",
    request_body = MintTokenRequest,
    responses(
        (status = 200, description = "Token minted", body = MintTokenResponse),
        (status = 401, description = "Registration secret rejected", body = ErrorResponse),
    )
)]
pub async fn mint_token(
    State(state): State<AppState>,
    Json(req): Json<MintTokenRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let token = state
        .token_service
        .mint(&req.registration_secret, req.agent_id.as_deref())?;
    let claims = state.token_service.validate(&token)?;

    Ok(Json(MintTokenResponse {
        token,
        subject: String::from(claims.subject),
        issued_at: claims.issued_at,
        expires_at: claims.expiry,
    }))
}

/// Auth routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/token", post(mint_token))
}
