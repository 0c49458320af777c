// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for Prometheus metric keys
pub const AUTH_REGISTERED: &str = "auth.registered";
pub const AUTH_LOGIN_SUCCESS: &str = "auth.login.success";
pub const AUTH_LOGIN_FAILURE: &str = "auth.login.failure";
pub const AUTH_LOCKOUT: &str = "auth.lockout";
pub const AUTH_REFRESH: &str = "auth.refresh";
pub const AUTH_TOKEN_REUSE: &str = "auth.refresh.reuse";
pub const AUTH_PASSWORD_REHASH: &str = "auth.password.rehash";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_REVOKED: &str = "session.revoked";
pub const SESSION_ROTATED: &str = "session.rotated";
pub const SESSION_ACTIVE: &str = "session.active";
pub const SESSION_SECURITY_WARNING: &str = "session.security.warning";
pub const SWEEP_REMOVED: &str = "sweep.removed";
pub const SWEEP_RUNS: &str = "sweep.runs";
pub const STORE_TIMEOUT: &str = "store.timeout";
pub const REQUEST_RATE_LIMITED: &str = "request.rate_limited";
