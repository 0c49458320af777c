// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core of the game-platform authentication service: credential hashing,
//! token issuance, refresh rotation, the session registry and its security
//! scoring, brute-force protection, and the HTTP surface over them.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod storage;
pub mod tasks;
pub mod validation;

use std::sync::Arc;

use tracing::info;

use crate::auth::{AuthService, DefaultAuth, Stores};
use crate::config::{Settings, StorageBackend};
use crate::error::AppError;
use crate::middleware::RateLimiter;
use crate::storage::FlatFileAccountStore;

pub use router::{create_admin_router, create_router};
pub use tasks::Sweeper;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Settings the service was built from
    pub settings: Arc<Settings>,
    /// General request limiter
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Create a new application state around an existing service
    pub fn new(auth: Arc<dyn AuthService>, settings: Settings) -> Self {
        let rate_limiter = Arc::new(RateLimiter::from_settings(&settings.rate_limit));
        Self { auth, settings: Arc::new(settings), rate_limiter }
    }

    /// Build stores and the default service from settings
    pub async fn from_settings(settings: Settings) -> Result<Self, AppError> {
        let stores = match settings.storage.backend {
            StorageBackend::Memory => Stores::in_memory(),
            StorageBackend::FlatFile => {
                let accounts = FlatFileAccountStore::open(&settings.storage.data_dir).await?;
                Stores::with_accounts(Arc::new(accounts))
            },
        };
        info!(backend = ?settings.storage.backend, "stores ready");

        let auth = DefaultAuth::new(&settings, stores)?;
        Ok(Self::new(Arc::new(auth), settings))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::HashingSettings;

    /// Valid settings with cheap hashing
    pub fn test_settings() -> Settings {
        let mut settings = Settings::default();
        settings.jwt.secret = "0123456789abcdef0123456789abcdef".to_string();
        settings.hashing = HashingSettings {
            memory_kib: 8,
            time_cost: 1,
            parallelism: 1,
            output_len: 32,
            salt_len: 16,
        };
        settings.timeouts.store_ms = 1_000;
        settings.timeouts.reporting_ms = 1_000;
        settings
    }

    pub fn test_state(settings: Settings) -> AppState {
        let auth = DefaultAuth::new(&settings, Stores::in_memory()).unwrap();
        AppState::new(Arc::new(auth), settings)
    }
}
