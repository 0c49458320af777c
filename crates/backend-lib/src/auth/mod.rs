// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod account;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod refresh;
pub mod security;
pub mod session;
pub mod token_generator;
mod service;
mod service_impl;

pub use account::{Account, AccountStore, InMemoryAccountStore};
pub use jwt::{Claims, IssuedToken, TokenError, TokenIssuer};
pub use password::{
    validate_password_strength, CredentialHasher, PasswordError, PasswordRequirements, Verification,
};
pub use rate_limit::{AttemptStore, AttemptTicket, BruteForceGuard, GuardKey, InMemoryAttemptStore};
pub use refresh::{ConsumeOutcome, InMemoryRefreshTokenStore, RefreshTokenRecord, RefreshTokenStore};
pub use security::SessionSecurityValidator;
pub use service::{AuthContext, AuthService};
pub use service_impl::{DefaultAuth, Stores};
pub use session::{ClientInfo, InMemorySessionStore, Session, SessionStore};
