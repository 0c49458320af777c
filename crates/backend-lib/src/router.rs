// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router.
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{account, health, sessions};
use crate::middleware::{rate_limit, require_claims, require_session};
use crate::AppState;

/// Create the HTTP router
///
/// Public routes: register, login, refresh. Everything else under `/auth`
/// needs a bearer token backed by a live session, except the security
/// report, which only needs a verifiable token.
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        .route("/refresh", post(account::refresh));

    let authenticated = Router::new()
        .route("/logout", post(account::logout))
        .route("/logout/session", post(account::logout_session))
        .route("/me", get(account::me))
        .route("/password", post(account::change_password))
        .route("/sessions", get(sessions::list))
        .route("/sessions/rotate", post(sessions::rotate))
        .route("/sessions/{id}", delete(sessions::terminate))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let claims_only = Router::new()
        .route("/sessions/security", get(sessions::security))
        .route_layer(from_fn_with_state(state.clone(), require_claims));

    Router::new()
        .nest("/auth", public.merge(authenticated).merge(claims_only))
        .route("/health", get(health::health))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the operator router, served on the private admin listener
///
/// Global session statistics and an on-demand sweep. No bearer check: the
/// listener is expected to be reachable only from inside the deployment.
pub fn create_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/sessions/stats", get(sessions::stats))
        .route("/admin/sessions/cleanup", post(sessions::cleanup))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
