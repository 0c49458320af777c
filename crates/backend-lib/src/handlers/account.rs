// ============================
// crates/backend-lib/src/handlers/account.rs
// ============================
//! Registration, login, refresh, logout and password handlers.
use axum::{extract::State, http::StatusCode, Json};
use gameauth_common::{
    AccountProfile, ChangePasswordRequest, LoginRequest, LogoutResponse, RefreshRequest,
    RegisterRequest, RegisterResponse, TokenResponse,
};

use crate::auth::{AuthContext, ClientInfo};
use crate::error::AppError;
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let response = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    Ok(Json(state.auth.login(req, client).await?))
}

pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    Ok(Json(state.auth.refresh(req, client).await?))
}

/// Log out of every device
pub async fn logout(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<LogoutResponse>, AppError> {
    Ok(Json(state.auth.logout(&ctx).await?))
}

/// Log out of this device only
pub async fn logout_session(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<LogoutResponse>, AppError> {
    Ok(Json(state.auth.logout_session(&ctx).await?))
}

pub async fn me(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<AccountProfile>, AppError> {
    Ok(Json(state.auth.current_account(&ctx).await?))
}

pub async fn change_password(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<LogoutResponse>, AppError> {
    Ok(Json(state.auth.change_password(&ctx, req).await?))
}
