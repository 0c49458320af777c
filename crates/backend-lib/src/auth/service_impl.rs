use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use gameauth_common::{
    AccountProfile, ChangePasswordRequest, CleanupReport, LoginRequest, LogoutResponse,
    RefreshRequest, RegisterRequest, RegisterResponse, RotateSessionResponse, SecurityReport,
    SessionList, SessionStats, TokenResponse, BEARER,
};
use metrics::counter;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::account::{Account, AccountStore, InMemoryAccountStore};
use super::jwt::{Claims, TokenIssuer};
use super::password::{CredentialHasher, PasswordRequirements, Verification};
use super::rate_limit::{AttemptStore, AttemptTicket, BruteForceGuard, GuardKey, InMemoryAttemptStore};
use super::refresh::{ConsumeOutcome, InMemoryRefreshTokenStore, RefreshTokenRecord, RefreshTokenStore};
use super::security::SessionSecurityValidator;
use super::service::{AuthContext, AuthService};
use super::session::{ClientInfo, InMemorySessionStore, Session, SessionStore};
use crate::config::Settings;
use crate::error::AppError;
use crate::metrics::{
    AUTH_LOGIN_FAILURE, AUTH_LOGIN_SUCCESS, AUTH_PASSWORD_REHASH, AUTH_REFRESH, AUTH_REGISTERED,
    AUTH_TOKEN_REUSE, SESSION_ROTATED, STORE_TIMEOUT,
};
use crate::validation::{validate_email, validate_login_input, validate_username};

/// Verified when the login identifier matches no account
const DUMMY_PASSWORD: &str = "dummy-password-for-timing";

/// Short, log-safe prefix of a credential
fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

/// Every store the orchestrator talks to
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub attempts: Arc<dyn AttemptStore>,
}

impl Stores {
    /// All stores in memory
    pub fn in_memory() -> Self {
        Self::with_accounts(Arc::new(InMemoryAccountStore::new()))
    }

    /// In-memory session state around a given account store
    pub fn with_accounts(accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            accounts,
            sessions: Arc::new(InMemorySessionStore::new()),
            refresh_tokens: Arc::new(InMemoryRefreshTokenStore::new()),
            attempts: Arc::new(InMemoryAttemptStore::new()),
        }
    }
}

pub struct DefaultAuth {
    stores: Stores,
    hasher: Arc<CredentialHasher>,
    issuer: TokenIssuer,
    guard: BruteForceGuard,
    validator: SessionSecurityValidator,
    policy: PasswordRequirements,
    refresh_ttl: Duration,
    store_timeout: Duration,
    reporting_timeout: Duration,
    dummy_hash: String,
}

impl DefaultAuth {
    pub fn new(settings: &Settings, stores: Stores) -> Result<Self, AppError> {
        let hasher = CredentialHasher::new(&settings.hashing)?;
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;

        Ok(Self {
            guard: BruteForceGuard::new(stores.attempts.clone(), &settings.guard),
            validator: SessionSecurityValidator::new(stores.sessions.clone(), &settings.session),
            issuer: TokenIssuer::new(&settings.jwt),
            policy: PasswordRequirements::from(&settings.password),
            refresh_ttl: settings.refresh.ttl(),
            store_timeout: settings.timeouts.store(),
            reporting_timeout: settings.timeouts.reporting(),
            hasher: Arc::new(hasher),
            dummy_hash,
            stores,
        })
    }

    async fn within<T>(
        &self,
        budget: Duration,
        op: &'static str,
        fut: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(budget, fut).await {
            Ok(result) => result,
            Err(_) => {
                counter!(STORE_TIMEOUT, "op" => op).increment(1);
                warn!(op, budget_ms = budget.as_millis() as u64, "store call timed out");
                Err(AppError::StoreTimeout(op))
            },
        }
    }

    /// Run a store call under the hot-path budget
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        self.within(self.store_timeout, op, fut).await
    }

    async fn hash_password(&self, plain: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let mut plain = plain;
        let hash = tokio::task::spawn_blocking(move || hasher.hash_secure(&mut plain)).await??;
        Ok(hash)
    }

    async fn verify_password(&self, plain: &str, encoded: &str) -> Result<Verification, AppError> {
        let hasher = self.hasher.clone();
        let plain = plain.to_string();
        let encoded = encoded.to_string();
        let verdict = tokio::task::spawn_blocking(move || hasher.verify(&plain, &encoded)).await??;
        Ok(verdict)
    }

    fn fail_login(&self, ticket: &AttemptTicket) -> AppError {
        counter!(AUTH_LOGIN_FAILURE).increment(1);
        self.guard.attempt_failed(ticket);
        AppError::InvalidCredentials
    }

    async fn reset_guard(&self, keys: &[GuardKey]) {
        for key in keys {
            if let Err(e) = self.bounded("guard.reset", self.guard.reset(key)).await {
                warn!(error = %e, key = %key, "failed to reset login attempts");
            }
        }
    }

    /// Best-effort upgrade of a legacy or weak hash after a successful login
    async fn upgrade_hash(&self, account: &Account, plain: &str) {
        let hash = match self.hash_password(plain.to_string()).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "password rehash failed");
                return;
            },
        };

        let stored = self
            .bounded("accounts.update_password_hash", self.stores.accounts.update_password_hash(account.id, hash))
            .await;
        match stored {
            Ok(_) => {
                counter!(AUTH_PASSWORD_REHASH).increment(1);
                info!(account_id = %account.id, "password hash upgraded");
            },
            Err(e) => warn!(account_id = %account.id, error = %e, "password hash upgrade failed"),
        }
    }

    /// Revoke every refresh token and then every session of an account
    ///
    /// Tokens go first: an in-flight refresh that commits its session after
    /// the token revocation notices its spent token is gone and backs out.
    async fn revoke_all(&self, account_id: Uuid) -> Result<usize, AppError> {
        self.bounded(
            "refresh_tokens.revoke_all_for_account",
            self.stores.refresh_tokens.revoke_all_for_account(account_id),
        )
        .await?;
        let removed = self
            .bounded("sessions.delete_all_for_account", self.stores.sessions.delete_all_for_account(account_id))
            .await?;
        Ok(removed.len())
    }

    /// Best-effort removal of a single refresh token
    async fn revoke_refresh(&self, token: &str) {
        if let Err(e) = self.bounded("refresh_tokens.revoke", self.stores.refresh_tokens.revoke(token)).await {
            warn!(error = %e, refresh = token_prefix(token), "failed to revoke refresh token");
        }
    }

    fn token_response(&self, access_token: String, refresh_token: String) -> TokenResponse {
        TokenResponse {
            access_token,
            refresh_token,
            token_type: BEARER.to_string(),
            expires_in: self.issuer.ttl().as_secs(),
        }
    }

    /// Issue access and refresh tokens and persist a new session for them
    async fn open_session(&self, account: &Account, client: &ClientInfo) -> Result<TokenResponse, AppError> {
        let access = self.issuer.issue(account)?;
        let mut session =
            Session::new(account.id, access.token.clone(), String::new(), access.expires_at, client);
        let record = RefreshTokenRecord::issue(account.id, session.id, self.refresh_ttl)?;
        session.refresh_token = record.token.clone();
        let session_id = session.id;

        self.bounded("refresh_tokens.insert", self.stores.refresh_tokens.insert(record.clone()))
            .await?;
        self.bounded("sessions.create", self.stores.sessions.create(session)).await?;

        info!(account_id = %account.id, session_id = %session_id, ip = %client.ip_address, "session opened");
        Ok(self.token_response(access.token, record.token))
    }

    fn context_from_claims(claims: Claims, token: &str, session_id: Option<Uuid>) -> AuthContext {
        AuthContext {
            account_id: claims.sub,
            username: claims.username,
            email: claims.email,
            session_id,
            access_token: token.to_string(),
        }
    }

    async fn active_account(&self, account_id: Uuid) -> Result<Account, AppError> {
        self.bounded("accounts.get_by_id", self.stores.accounts.get_by_id(account_id))
            .await?
            .filter(Account::is_active)
            .ok_or_else(|| AppError::Unauthorized("account unavailable".to_string()))
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, AppError> {
        let email = req.email.trim().to_string();
        let username = req.username.trim().to_string();
        validate_email(&email)?;
        validate_username(&username)?;

        if self.bounded("accounts.get_by_email", self.stores.accounts.get_by_email(&email)).await?.is_some()
            || self
                .bounded("accounts.get_by_username", self.stores.accounts.get_by_username(&username))
                .await?
                .is_some()
        {
            return Err(AppError::Conflict(format!("account {email} already exists")));
        }

        self.policy.check(&req.password)?;
        let hash = self.hash_password(req.password).await?;

        let account = Account::new(&email, &username, hash);
        let account_id = account.id;
        self.bounded("accounts.insert", self.stores.accounts.insert(account)).await?;

        counter!(AUTH_REGISTERED).increment(1);
        info!(account_id = %account_id, username = %username, "account registered");
        Ok(RegisterResponse { account_id })
    }

    async fn login(&self, req: LoginRequest, client: ClientInfo) -> Result<TokenResponse, AppError> {
        validate_login_input(&req.email, &req.password)?;

        let account = self
            .bounded("accounts.find_by_login", self.stores.accounts.find_by_login(req.email.trim()))
            .await?;

        // Email and username share one counter once the account is known
        let account_key = account
            .as_ref()
            .map_or_else(|| GuardKey::identifier(&req.email), |a| GuardKey::account(a.id));
        let keys = [account_key, GuardKey::address(&client.ip_address)];
        let ticket = self.bounded("guard.begin_attempt", self.guard.begin_attempt(&keys)).await?;

        let stored_hash = account.as_ref().map_or(self.dummy_hash.as_str(), |a| a.password_hash.as_str());
        let verdict = match self.verify_password(&req.password, stored_hash).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(error = %e, "stored password hash unusable");
                Verification { matches: false, needs_rehash: false }
            },
        };

        let account = match account {
            Some(account) if verdict.matches && account.is_active() => account,
            Some(account) if verdict.matches => {
                debug!(account_id = %account.id, "login refused for disabled account");
                return Err(self.fail_login(&ticket));
            },
            _ => return Err(self.fail_login(&ticket)),
        };

        self.reset_guard(&keys).await;
        if verdict.needs_rehash {
            self.upgrade_hash(&account, &req.password).await;
        }

        let tokens = self.open_session(&account, &client).await?;

        if let Err(e) = self
            .bounded("accounts.record_login", self.stores.accounts.record_login(account.id, Utc::now()))
            .await
        {
            warn!(account_id = %account.id, error = %e, "failed to record login time");
        }

        counter!(AUTH_LOGIN_SUCCESS).increment(1);
        info!(account_id = %account.id, ip = %client.ip_address, "login succeeded");
        Ok(tokens)
    }

    async fn refresh(&self, req: RefreshRequest, client: ClientInfo) -> Result<TokenResponse, AppError> {
        if req.refresh_token.trim().is_empty() {
            return Err(AppError::Validation("Refresh token is required".to_string()));
        }

        let outcome = self
            .bounded("refresh_tokens.consume", self.stores.refresh_tokens.consume(&req.refresh_token, Utc::now()))
            .await?;

        let consumed = match outcome {
            ConsumeOutcome::Consumed(record) => record,
            ConsumeOutcome::Invalid => {
                return Err(AppError::Unauthorized("invalid or expired refresh token".to_string()));
            },
            ConsumeOutcome::AlreadyUsed { account_id, session_id } => {
                counter!(AUTH_TOKEN_REUSE).increment(1);
                warn!(
                    account_id = %account_id,
                    session_id = %session_id,
                    ip = %client.ip_address,
                    refresh = token_prefix(&req.refresh_token),
                    "refresh token reuse detected, revoking all sessions"
                );
                let revoked = self.revoke_all(account_id).await?;
                info!(account_id = %account_id, revoked, "defensive revocation completed");
                return Err(AppError::TokenReuse { account_id });
            },
        };

        let account = self.active_account(consumed.account_id).await?;
        let access = self.issuer.issue(&account)?;

        let existing = self
            .bounded("sessions.get_by_id", self.stores.sessions.get_by_id(consumed.session_id))
            .await?
            .filter(|s| s.is_active && s.account_id == account.id);
        let session_id = existing.as_ref().map_or_else(Uuid::new_v4, |s| s.id);

        let record = RefreshTokenRecord::issue(account.id, session_id, self.refresh_ttl)?;
        self.bounded("refresh_tokens.insert", self.stores.refresh_tokens.insert(record.clone()))
            .await?;

        if existing.is_some() {
            let replaced = self
                .bounded(
                    "sessions.replace_tokens",
                    self.stores.sessions.replace_tokens(
                        session_id,
                        access.token.clone(),
                        record.token.clone(),
                        access.expires_at,
                    ),
                )
                .await?;
            if !replaced {
                self.revoke_refresh(&record.token).await;
                return Err(AppError::Unauthorized("session ended during refresh".to_string()));
            }
        } else {
            let mut session =
                Session::new(account.id, access.token.clone(), record.token.clone(), access.expires_at, &client);
            session.id = session_id;
            self.bounded("sessions.create", self.stores.sessions.create(session)).await?;
        }

        let still_tracked = self
            .bounded("refresh_tokens.exists", self.stores.refresh_tokens.exists(&consumed.token))
            .await?;
        if !still_tracked {
            warn!(account_id = %account.id, session_id = %session_id, "account revoked during refresh");
            if let Err(e) = self
                .bounded("sessions.delete_by_token", self.stores.sessions.delete_by_token(&access.token))
                .await
            {
                warn!(session_id = %session_id, error = %e, "failed to drop session after revocation");
            }
            self.revoke_refresh(&record.token).await;
            return Err(AppError::Unauthorized("account revoked during refresh".to_string()));
        }

        counter!(AUTH_REFRESH).increment(1);
        info!(account_id = %account.id, session_id = %session_id, "tokens refreshed");
        Ok(self.token_response(access.token, record.token))
    }

    async fn logout(&self, ctx: &AuthContext) -> Result<LogoutResponse, AppError> {
        let sessions_revoked = self.revoke_all(ctx.account_id).await?;
        info!(account_id = %ctx.account_id, sessions_revoked, "logged out everywhere");
        Ok(LogoutResponse { success: true, sessions_revoked })
    }

    async fn logout_session(&self, ctx: &AuthContext) -> Result<LogoutResponse, AppError> {
        let removed = self
            .bounded("sessions.delete_by_token", self.stores.sessions.delete_by_token(&ctx.access_token))
            .await?;

        let sessions_revoked = match removed {
            Some(session) => {
                self.revoke_refresh(&session.refresh_token).await;
                info!(account_id = %ctx.account_id, session_id = %session.id, "session logged out");
                1
            },
            None => 0,
        };
        Ok(LogoutResponse { success: true, sessions_revoked })
    }

    async fn rotate_session_token(&self, ctx: &AuthContext) -> Result<RotateSessionResponse, AppError> {
        let session = self
            .bounded("sessions.get_by_token", self.stores.sessions.get_by_token(&ctx.access_token))
            .await?
            .filter(|s| s.account_id == ctx.account_id)
            .ok_or(AppError::NoActiveSession)?;

        let account = self.active_account(ctx.account_id).await?;
        let access = self.issuer.issue(&account)?;

        let replaced = self
            .bounded(
                "sessions.replace_tokens",
                self.stores.sessions.replace_tokens(
                    session.id,
                    access.token.clone(),
                    session.refresh_token.clone(),
                    access.expires_at,
                ),
            )
            .await?;
        if !replaced {
            return Err(AppError::NoActiveSession);
        }

        counter!(SESSION_ROTATED).increment(1);
        info!(account_id = %ctx.account_id, session_id = %session.id, "session token rotated");
        Ok(RotateSessionResponse { new_token: access.token, expires_at: access.expires_at })
    }

    async fn validate_session_security(
        &self,
        ctx: &AuthContext,
        client: ClientInfo,
    ) -> Result<SecurityReport, AppError> {
        self.bounded(
            "sessions.validate_security",
            self.validator.validate(ctx.account_id, &ctx.access_token, &client),
        )
        .await
    }

    async fn authenticate(&self, token: &str) -> Result<AuthContext, AppError> {
        let claims = self.issuer.verify(token)?;
        let session = self
            .bounded("sessions.get_by_token", self.stores.sessions.get_by_token(token))
            .await?
            .ok_or_else(|| AppError::Unauthorized("no live session for token".to_string()))?;

        if session.account_id != claims.sub {
            warn!(session_id = %session.id, "token subject does not own its session");
            return Err(AppError::Unauthorized("session owner mismatch".to_string()));
        }
        Ok(Self::context_from_claims(claims, token, Some(session.id)))
    }

    async fn verify_claims(&self, token: &str) -> Result<AuthContext, AppError> {
        let claims = self.issuer.verify(token)?;
        Ok(Self::context_from_claims(claims, token, None))
    }

    async fn current_account(&self, ctx: &AuthContext) -> Result<AccountProfile, AppError> {
        self.bounded("accounts.get_by_id", self.stores.accounts.get_by_id(ctx.account_id))
            .await?
            .map(|account| account.profile())
            .ok_or_else(|| AppError::NotFound("account".to_string()))
    }

    async fn change_password(
        &self,
        ctx: &AuthContext,
        req: ChangePasswordRequest,
    ) -> Result<LogoutResponse, AppError> {
        if req.current_password.is_empty() {
            return Err(AppError::Validation("Current password is required".to_string()));
        }
        self.policy.check(&req.new_password)?;

        let account = self.active_account(ctx.account_id).await?;
        let keys = [GuardKey::account(account.id)];
        let ticket = self.bounded("guard.begin_attempt", self.guard.begin_attempt(&keys)).await?;
        let verdict = self.verify_password(&req.current_password, &account.password_hash).await?;
        if !verdict.matches {
            return Err(self.fail_login(&ticket));
        }
        self.reset_guard(&keys).await;

        let hash = self.hash_password(req.new_password).await?;
        let updated = self
            .bounded("accounts.update_password_hash", self.stores.accounts.update_password_hash(account.id, hash))
            .await?;
        if !updated {
            return Err(AppError::NotFound("account".to_string()));
        }

        let sessions_revoked = self.revoke_all(account.id).await?;
        info!(account_id = %account.id, sessions_revoked, "password changed, sessions revoked");
        Ok(LogoutResponse { success: true, sessions_revoked })
    }

    async fn list_sessions(&self, ctx: &AuthContext) -> Result<SessionList, AppError> {
        let sessions = self
            .bounded("sessions.list_for_account", self.stores.sessions.list_for_account(ctx.account_id))
            .await?;
        let items: Vec<_> = sessions
            .iter()
            .map(|s| s.to_info(Some(s.id) == ctx.session_id))
            .collect();
        Ok(SessionList { total: items.len(), items })
    }

    async fn terminate_session(&self, ctx: &AuthContext, session_id: Uuid) -> Result<(), AppError> {
        let session = self
            .bounded("sessions.get_by_id", self.stores.sessions.get_by_id(session_id))
            .await?
            .filter(|s| s.account_id == ctx.account_id && s.is_active)
            .ok_or_else(|| AppError::NotFound("session".to_string()))?;

        self.bounded("sessions.terminate", self.stores.sessions.terminate(session.id)).await?;
        self.revoke_refresh(&session.refresh_token).await;

        info!(account_id = %ctx.account_id, session_id = %session.id, "session terminated");
        Ok(())
    }

    async fn session_stats(&self) -> Result<SessionStats, AppError> {
        self.within(self.reporting_timeout, "sessions.stats", self.stores.sessions.stats(Utc::now()))
            .await
    }

    async fn cleanup_expired(&self) -> Result<CleanupReport, AppError> {
        let now = Utc::now();
        let sessions_removed = self
            .within(self.reporting_timeout, "sessions.sweep", self.stores.sessions.sweep_expired(now))
            .await?;
        let refresh_tokens_removed = self
            .within(self.reporting_timeout, "refresh_tokens.sweep", self.stores.refresh_tokens.sweep_expired(now))
            .await?;
        let attempt_counters_removed = self
            .within(self.reporting_timeout, "guard.sweep", self.guard.sweep())
            .await?;

        let report = CleanupReport { sessions_removed, refresh_tokens_removed, attempt_counters_removed };
        debug!(?report, "expired state swept");
        Ok(report)
    }

    async fn issue_session(&self, account_id: Uuid, client: ClientInfo) -> Result<TokenResponse, AppError> {
        let account = self.active_account(account_id).await?;
        self.open_session(&account, &client).await
    }
}
