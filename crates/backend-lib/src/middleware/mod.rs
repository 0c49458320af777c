// crates/backend-lib/src/middleware/mod.rs

//! HTTP middleware: request rate limiting and bearer authentication.

pub mod auth;
pub mod rate_limit;

pub use auth::{require_claims, require_session};
pub use rate_limit::{rate_limit, RateLimiter};
