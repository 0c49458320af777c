// ============================
// crates/backend-lib/src/middleware/auth.rs
// ============================
//! Bearer authentication middleware.
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use gameauth_common::BEARER;

use crate::error::AppError;
use crate::AppState;

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing authorization header".into()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AppError::Unauthorized("malformed authorization header".into()))?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case(BEARER) || token.is_empty() {
        return Err(AppError::Unauthorized("unsupported authorization scheme".into()));
    }
    Ok(token.to_string())
}

/// Require a verified token backed by a live session
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    let ctx = state.auth.authenticate(&token).await?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Require a verified token; the session may already be revoked
pub async fn require_claims(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    let ctx = state.auth.verify_claims(&token).await?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
