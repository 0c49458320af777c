// ============================
// gameauth-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable prefix, `GAMEAUTH_JWT__SECRET` sets `jwt.secret`
pub const ENV_PREFIX: &str = "GAMEAUTH_";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "gameauth.toml";

/// Minimum HMAC secret length in bytes
pub const MIN_SECRET_LENGTH: usize = 32;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Invalid configuration values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Operator endpoints (session statistics, on-demand sweep); keep it private
    pub admin_bind_addr: SocketAddr,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: LogFormat,
    pub jwt: JwtSettings,
    pub refresh: RefreshSettings,
    pub password: PasswordSettings,
    pub hashing: HashingSettings,
    pub guard: GuardSettings,
    pub session: SessionSettings,
    pub timeouts: TimeoutSettings,
    pub rate_limit: RateLimitSettings,
    pub storage: StorageSettings,
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Access token signing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    /// HMAC secret for new tokens
    pub secret: String,
    /// Key id stamped into the token header
    pub key_id: String,
    /// Retired keys still accepted for verification
    pub previous_keys: Vec<PreviousKey>,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    /// Clock skew tolerated on `exp`/`nbf`
    pub leeway_secs: u64,
}

/// A retired signing key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousKey {
    pub key_id: String,
    pub secret: String,
}

/// Refresh token lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub ttl_secs: u64,
}

/// Password complexity requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

/// Argon2id cost parameters for new hashes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingSettings {
    pub memory_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub output_len: usize,
    pub salt_len: usize,
}

/// Brute-force guard thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    pub max_attempts: u32,
    pub window_secs: u64,
    pub lockout_secs: u64,
}

/// Session policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Age after which rotation is recommended
    pub max_age_secs: u64,
    /// Inactivity after which a session is flagged idle
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

/// Timeout budgets for store access
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub store_ms: u64,
    pub reporting_ms: u64,
}

/// General per-address request limiter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Account persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
}

/// Which account store to build
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    FlatFile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            admin_bind_addr: SocketAddr::from(([127, 0, 0, 1], 9090)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            jwt: JwtSettings::default(),
            refresh: RefreshSettings::default(),
            password: PasswordSettings::default(),
            hashing: HashingSettings::default(),
            guard: GuardSettings::default(),
            session: SessionSettings::default(),
            timeouts: TimeoutSettings::default(),
            rate_limit: RateLimitSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            key_id: "primary".to_string(),
            previous_keys: Vec::new(),
            issuer: "gameauth".to_string(),
            audience: "game-clients".to_string(),
            access_ttl_secs: 15 * 60,
            leeway_secs: 5,
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self { ttl_secs: 60 * 60 * 24 * 7 } // 7 days
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: false,
        }
    }
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
            output_len: 32,
            salt_len: 16,
        }
    }
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self { max_attempts: 5, window_secs: 15 * 60, lockout_secs: 15 * 60 }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_age_secs: 60 * 60 * 24,
            idle_timeout_secs: 30 * 60,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self { store_ms: 50, reporting_ms: 100 }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self { max_requests: 100, window_secs: 60 }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { backend: StorageBackend::Memory, data_dir: PathBuf::from("data") }
    }
}

impl JwtSettings {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }
}

impl RefreshSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl GuardSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn lockout(&self) -> Duration {
        Duration::from_secs(self.lockout_secs)
    }
}

impl SessionSettings {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl TimeoutSettings {
    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }

    pub fn reporting(&self) -> Duration {
        Duration::from_millis(self.reporting_ms)
    }
}

impl Settings {
    /// Load settings from `gameauth.toml` and the environment
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load settings from an explicit TOML file, then the environment
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_bind_addr == self.bind_addr {
            return Err(invalid("admin_bind_addr", "must differ from bind_addr"));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(invalid("log_level", format!("unknown level `{}`", self.log_level)));
        }

        if self.jwt.secret.len() < MIN_SECRET_LENGTH {
            return Err(invalid(
                "jwt.secret",
                format!("must be at least {MIN_SECRET_LENGTH} bytes"),
            ));
        }
        if self.jwt.key_id.trim().is_empty() {
            return Err(invalid("jwt.key_id", "must not be empty"));
        }
        for key in &self.jwt.previous_keys {
            if key.key_id == self.jwt.key_id {
                return Err(invalid("jwt.previous_keys", "key id collides with the active key"));
            }
            if key.secret.len() < MIN_SECRET_LENGTH {
                return Err(invalid(
                    "jwt.previous_keys",
                    format!("secret for `{}` is shorter than {MIN_SECRET_LENGTH} bytes", key.key_id),
                ));
            }
        }
        if self.jwt.issuer.is_empty() || self.jwt.audience.is_empty() {
            return Err(invalid("jwt", "issuer and audience are required"));
        }
        if self.jwt.access_ttl_secs == 0 {
            return Err(invalid("jwt.access_ttl_secs", "must be positive"));
        }
        if self.refresh.ttl_secs <= self.jwt.access_ttl_secs {
            return Err(invalid("refresh.ttl_secs", "must be longer than the access token TTL"));
        }

        if self.password.min_length < 6 {
            return Err(invalid("password.min_length", "must be at least 6"));
        }
        if self.password.max_length < self.password.min_length {
            return Err(invalid("password.max_length", "must not be below min_length"));
        }

        if self.hashing.salt_len < 8 || self.hashing.output_len < 16 {
            return Err(invalid("hashing", "salt must be >= 8 bytes and output >= 16 bytes"));
        }
        if self.hashing.time_cost == 0 || self.hashing.parallelism == 0 {
            return Err(invalid("hashing", "time_cost and parallelism must be positive"));
        }

        if self.guard.max_attempts == 0 {
            return Err(invalid("guard.max_attempts", "must be positive"));
        }
        if self.guard.window_secs == 0 || self.guard.lockout_secs == 0 {
            return Err(invalid("guard", "window and lockout must be positive"));
        }

        if self.session.sweep_interval_secs == 0 {
            return Err(invalid("session.sweep_interval_secs", "must be positive"));
        }
        if self.timeouts.store_ms == 0 || self.timeouts.reporting_ms == 0 {
            return Err(invalid("timeouts", "budgets must be positive"));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(invalid("rate_limit.max_requests", "must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod config_tests;
