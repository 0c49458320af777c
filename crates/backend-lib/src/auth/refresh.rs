// ============================
// crates/backend-lib/src/auth/refresh.rs
// ============================
//! Refresh token store.
//!
//! Refresh tokens are opaque, single-use and store-backed. Consumed records
//! stay in the store until they expire so a replay can be told apart from
//! a token that never existed.
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use uuid::Uuid;

use crate::auth::token_generator::generate_secure_token;
use crate::error::AppError;
use crate::metrics::SWEEP_REMOVED;

/// Persisted refresh token
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub session_id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl RefreshTokenRecord {
    /// Mint a fresh record with a random token value
    pub fn issue(account_id: Uuid, session_id: Uuid, ttl: Duration) -> Result<Self, AppError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::Dependency(format!("refresh ttl out of range: {e}")))?;
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            session_id,
            token: generate_secure_token()?,
            created_at: now,
            expires_at: now + ttl,
            used: false,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of presenting a refresh token
#[derive(Debug, Clone)]
pub enum ConsumeOutcome {
    /// The token was valid and is now spent
    Consumed(RefreshTokenRecord),
    /// The token had already been spent
    AlreadyUsed { account_id: Uuid, session_id: Uuid },
    /// Unknown or expired
    Invalid,
}

/// Storage abstraction for refresh tokens
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AppError>;

    /// Owning record of an unspent, unexpired token
    async fn validate(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Atomically spend a token; concurrent callers see exactly one `Consumed`
    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<ConsumeOutcome, AppError>;

    /// Whether a record for `token` is still held, spent or not
    async fn exists(&self, token: &str) -> Result<bool, AppError>;

    async fn revoke(&self, token: &str) -> Result<bool, AppError>;

    async fn revoke_all_for_account(&self, account_id: Uuid) -> Result<usize, AppError>;

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError>;
}

/// In-memory refresh token store
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: DashMap<String, RefreshTokenRecord>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AppError> {
        self.tokens.insert(record.token.clone(), record);
        Ok(())
    }

    async fn validate(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let now = Utc::now();
        Ok(self
            .tokens
            .get(token)
            .filter(|r| !r.used && !r.is_expired(now))
            .map(|r| r.clone()))
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<ConsumeOutcome, AppError> {
        // get_mut holds the shard write lock for the whole check-and-set
        let outcome = match self.tokens.get_mut(token) {
            None => ConsumeOutcome::Invalid,
            Some(record) if record.is_expired(now) => ConsumeOutcome::Invalid,
            Some(record) if record.used => ConsumeOutcome::AlreadyUsed {
                account_id: record.account_id,
                session_id: record.session_id,
            },
            Some(mut record) => {
                record.used = true;
                ConsumeOutcome::Consumed(record.clone())
            },
        };
        Ok(outcome)
    }

    async fn exists(&self, token: &str) -> Result<bool, AppError> {
        Ok(self.tokens.contains_key(token))
    }

    async fn revoke(&self, token: &str) -> Result<bool, AppError> {
        Ok(self.tokens.remove(token).is_some())
    }

    async fn revoke_all_for_account(&self, account_id: Uuid) -> Result<usize, AppError> {
        let before = self.tokens.len();
        self.tokens.retain(|_, record| record.account_id != account_id);
        Ok(before.saturating_sub(self.tokens.len()))
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let before = self.tokens.len();
        self.tokens.retain(|_, record| !record.is_expired(now));
        let removed = before.saturating_sub(self.tokens.len());
        if removed > 0 {
            counter!(SWEEP_REMOVED, "kind" => "refresh_token").increment(removed as u64);
        }
        Ok(removed)
    }
}
