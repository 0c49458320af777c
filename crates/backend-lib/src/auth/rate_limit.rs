// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Brute-force protection for login attempts.
//!
//! Counts failed authentications per account identifier and per source
//! address. This is keyed on outcome, unlike the request limiter in
//! `middleware::rate_limit` which counts raw request volume.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::GuardSettings;
use crate::error::AppError;
use crate::metrics::{AUTH_LOCKOUT, SWEEP_REMOVED};

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52))
}

/// What a counter is keyed on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GuardKey {
    /// A resolved account, however it was named at login
    Account(Uuid),
    /// A login identifier that matched no account
    Identifier(String),
    Address(String),
}

impl GuardKey {
    pub fn account(id: Uuid) -> Self {
        GuardKey::Account(id)
    }

    pub fn identifier(identifier: &str) -> Self {
        GuardKey::Identifier(identifier.trim().to_lowercase())
    }

    pub fn address(ip: &str) -> Self {
        GuardKey::Address(ip.to_string())
    }
}

impl fmt::Display for GuardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardKey::Account(id) => write!(f, "account:{id}"),
            GuardKey::Identifier(name) => write!(f, "identifier:{name}"),
            GuardKey::Address(ip) => write!(f, "address:{ip}"),
        }
    }
}

/// Failed attempts within the current window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptCounter {
    pub failures: u32,
    pub window_start: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl AttemptCounter {
    fn new(now: DateTime<Utc>) -> Self {
        Self { failures: 0, window_start: now, locked_until: None }
    }

    /// Count one attempt, opening a fresh window when the old one has lapsed
    fn admit(
        &mut self,
        now: DateTime<Utc>,
        window: chrono::Duration,
        lockout: chrono::Duration,
        max: u32,
    ) {
        let lock_expired = self.locked_until.is_some_and(|until| until <= now);
        let window_lapsed = self.locked_until.is_none() && now >= self.window_start + window;
        if lock_expired || window_lapsed {
            *self = AttemptCounter::new(now);
        }
        self.failures = self.failures.saturating_add(1);
        if self.failures >= max && self.locked_until.is_none() {
            self.locked_until = Some(now + lockout);
        }
    }

    fn lock_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.locked_until
            .filter(|until| *until > now)
            .and_then(|until| (until - now).to_std().ok())
    }
}

/// Storage abstraction for attempt counters
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Apply `apply` to the counter under the key's lock, creating it if absent
    async fn update(
        &self,
        key: &str,
        now: DateTime<Utc>,
        apply: &(dyn for<'c> Fn(&'c mut AttemptCounter) + Send + Sync),
    ) -> Result<AttemptCounter, AppError>;

    async fn get(&self, key: &str) -> Result<Option<AttemptCounter>, AppError>;

    async fn remove(&self, key: &str) -> Result<(), AppError>;

    /// Drop counters that are neither locked nor inside their window
    async fn sweep(&self, now: DateTime<Utc>, window: Duration) -> Result<usize, AppError>;
}

/// In-memory attempt counters
#[derive(Default)]
pub struct InMemoryAttemptStore {
    attempts: DashMap<String, AttemptCounter>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn update(
        &self,
        key: &str,
        now: DateTime<Utc>,
        apply: &(dyn for<'c> Fn(&'c mut AttemptCounter) + Send + Sync),
    ) -> Result<AttemptCounter, AppError> {
        let mut entry = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| AttemptCounter::new(now));
        apply(entry.value_mut());
        Ok(entry.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<AttemptCounter>, AppError> {
        Ok(self.attempts.get(key).map(|c| c.clone()))
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.attempts.remove(key);
        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>, window: Duration) -> Result<usize, AppError> {
        let window = to_chrono(window);
        let before = self.attempts.len();
        self.attempts.retain(|_, counter| {
            counter.lock_remaining(now).is_some() || now < counter.window_start + window
        });
        Ok(before.saturating_sub(self.attempts.len()))
    }
}

/// Keys whose last allowed attempt was taken by this login
#[derive(Debug, Default)]
pub struct AttemptTicket {
    locking: Vec<GuardKey>,
}

/// Per-account and per-address lockout
#[derive(Clone)]
pub struct BruteForceGuard {
    store: Arc<dyn AttemptStore>,
    max_attempts: u32,
    window: Duration,
    lockout: Duration,
}

impl BruteForceGuard {
    pub fn new(store: Arc<dyn AttemptStore>, settings: &GuardSettings) -> Self {
        Self {
            store,
            max_attempts: settings.max_attempts,
            window: settings.window(),
            lockout: settings.lockout(),
        }
    }

    /// Remaining lockout for a key, if any
    pub async fn is_locked(&self, key: &GuardKey) -> Result<Option<Duration>, AppError> {
        let now = Utc::now();
        Ok(self
            .store
            .get(&key.to_string())
            .await?
            .and_then(|counter| counter.lock_remaining(now)))
    }

    /// Count an authentication attempt against every key before it is checked
    ///
    /// The attempt counts as a failure until `reset` clears it, so concurrent
    /// guesses cannot all slip in under the threshold. Fails with `LockedOut`
    /// once a key has used up its attempts; the attempt must then be refused
    /// without verifying the credential.
    pub async fn begin_attempt(&self, keys: &[GuardKey]) -> Result<AttemptTicket, AppError> {
        let now = Utc::now();
        let window = to_chrono(self.window);
        let lockout = to_chrono(self.lockout);
        let max_attempts = self.max_attempts;

        let mut ticket = AttemptTicket::default();
        let mut retry_after: Option<Duration> = None;
        for key in keys {
            let counter = self
                .store
                .update(&key.to_string(), now, &move |counter: &mut AttemptCounter| {
                    counter.admit(now, window, lockout, max_attempts)
                })
                .await?;

            if counter.failures > max_attempts {
                let remaining = counter.lock_remaining(now).unwrap_or(self.lockout);
                retry_after = Some(retry_after.map_or(remaining, |r| r.max(remaining)));
            } else if counter.failures == max_attempts {
                ticket.locking.push(key.clone());
            }
        }

        match retry_after {
            Some(retry_after) => {
                debug!(retry_after_secs = retry_after.as_secs(), "attempt refused while locked out");
                Err(AppError::LockedOut { retry_after })
            },
            None => Ok(ticket),
        }
    }

    /// Settle an attempt whose credential was wrong
    pub fn attempt_failed(&self, ticket: &AttemptTicket) {
        for key in &ticket.locking {
            counter!(AUTH_LOCKOUT).increment(1);
            warn!(key = %key, failures = self.max_attempts, "locked out after repeated failed logins");
        }
    }

    /// Clear a key after a successful authentication
    pub async fn reset(&self, key: &GuardKey) -> Result<(), AppError> {
        self.store.remove(&key.to_string()).await
    }

    pub async fn sweep(&self) -> Result<usize, AppError> {
        let removed = self.store.sweep(Utc::now(), self.window).await?;
        if removed > 0 {
            counter!(SWEEP_REMOVED, "kind" => "attempt_counter").increment(removed as u64);
        }
        Ok(removed)
    }
}
