//! Admin login and logout.

use crate::auth::{verify_credentials, LoginRequest, LoginResponse};
use crate::error::AppError;
use crate::extractors::AdminSession;
use crate::handlers::from_body;
use crate::response::success_one_ok;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;

/// POST /api/auth/login: `{username, password}` -> bearer token.
pub async fn login(State(state): State<AppState>, Json(body): Json<Value>) -> Result<impl IntoResponse, AppError> {
    let req: LoginRequest = from_body(body)?;
    if !verify_credentials(&state.config, &req.username, &req.password) {
        tracing::warn!(username = %req.username, "admin login rejected");
        return Err(AppError::Unauthorized("invalid credentials".into()));
    }
    let token = state.sessions.issue();
    tracing::info!(username = %req.username, "admin session issued");
    Ok(success_one_ok(LoginResponse {
        token,
        token_type: "bearer",
    }))
}

pub async fn logout(State(state): State<AppState>, AdminSession(token): AdminSession) -> impl IntoResponse {
    state.sessions.revoke(&token);
    tracing::info!("admin session revoked");
    StatusCode::NO_CONTENT
}
