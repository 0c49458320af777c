// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers. Each one is a thin adapter over [`AuthService`](crate::auth::AuthService).

pub mod account;
pub mod health;
pub mod sessions;
