// ============================
// crates/backend-lib/src/handlers/sessions.rs
// ============================
//! Session management handlers.
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use gameauth_common::{CleanupReport, RotateSessionResponse, SecurityReport, SessionList, SessionStats};
use uuid::Uuid;

use crate::auth::{AuthContext, ClientInfo};
use crate::error::AppError;
use crate::AppState;

pub async fn rotate(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<RotateSessionResponse>, AppError> {
    Ok(Json(state.auth.rotate_session_token(&ctx).await?))
}

/// Reached through claims-only authentication so a revoked token gets a report
pub async fn security(
    State(state): State<AppState>,
    ctx: AuthContext,
    client: ClientInfo,
) -> Result<Json<SecurityReport>, AppError> {
    Ok(Json(state.auth.validate_session_security(&ctx, client).await?))
}

pub async fn list(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<SessionList>, AppError> {
    Ok(Json(state.auth.list_sessions(&ctx).await?))
}

pub async fn terminate(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.auth.terminate_session(&ctx, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<SessionStats>, AppError> {
    Ok(Json(state.auth.session_stats().await?))
}

pub async fn cleanup(State(state): State<AppState>) -> Result<Json<CleanupReport>, AppError> {
    Ok(Json(state.auth.cleanup_expired().await?))
}
