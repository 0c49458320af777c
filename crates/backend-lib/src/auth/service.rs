use async_trait::async_trait;
use gameauth_common::{
    AccountProfile, ChangePasswordRequest, CleanupReport, LoginRequest, LogoutResponse,
    RefreshRequest, RegisterRequest, RegisterResponse, RotateSessionResponse, SecurityReport,
    SessionList, SessionStats, TokenResponse,
};
use uuid::Uuid;

use super::ClientInfo;
use crate::error::AppError;

/// Identity attached to an authenticated request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    /// Set when the token was matched to a live session
    pub session_id: Option<Uuid>,
    pub access_token: String,
}

/// Entry point for every authentication workflow
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, AppError>;

    async fn login(&self, req: LoginRequest, client: ClientInfo) -> Result<TokenResponse, AppError>;

    async fn refresh(&self, req: RefreshRequest, client: ClientInfo) -> Result<TokenResponse, AppError>;

    /// Revoke every session of the account
    async fn logout(&self, ctx: &AuthContext) -> Result<LogoutResponse, AppError>;

    /// Revoke only the session behind the presented token
    async fn logout_session(&self, ctx: &AuthContext) -> Result<LogoutResponse, AppError>;

    async fn rotate_session_token(&self, ctx: &AuthContext) -> Result<RotateSessionResponse, AppError>;

    async fn validate_session_security(
        &self,
        ctx: &AuthContext,
        client: ClientInfo,
    ) -> Result<SecurityReport, AppError>;

    /// Signature, claims and a live session
    async fn authenticate(&self, token: &str) -> Result<AuthContext, AppError>;

    /// Signature and claims only
    async fn verify_claims(&self, token: &str) -> Result<AuthContext, AppError>;

    async fn current_account(&self, ctx: &AuthContext) -> Result<AccountProfile, AppError>;

    async fn change_password(
        &self,
        ctx: &AuthContext,
        req: ChangePasswordRequest,
    ) -> Result<LogoutResponse, AppError>;

    async fn list_sessions(&self, ctx: &AuthContext) -> Result<SessionList, AppError>;

    async fn terminate_session(&self, ctx: &AuthContext, session_id: Uuid) -> Result<(), AppError>;

    async fn session_stats(&self) -> Result<SessionStats, AppError>;

    async fn cleanup_expired(&self) -> Result<CleanupReport, AppError>;

    /// Mint a session for an account proven by an external identity source
    async fn issue_session(&self, account_id: Uuid, client: ClientInfo) -> Result<TokenResponse, AppError>;
}
