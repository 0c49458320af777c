// ============================
// crates/backend-lib/src/middleware/rate_limit.rs
// ============================
//! General per-address request limiter.
//!
//! Independent of the login brute-force guard: this one counts every
//! request, successful or not.
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use metrics::counter;
use tracing::warn;

use crate::auth::ClientInfo;
use crate::config::RateLimitSettings;
use crate::error::AppError;
use crate::metrics::REQUEST_RATE_LIMITED;
use crate::AppState;

/// Rate limit entry for a client
#[derive(Debug)]
struct RateLimitEntry {
    requests: u32,
    window_start: Instant,
}

/// Fixed-window request counter keyed by client address
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self { entries: DashMap::new(), window, max_requests }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(Duration::from_secs(settings.window_secs), settings.max_requests)
    }

    /// Count one request from `address`
    pub fn check(&self, address: &str) -> Result<(), AppError> {
        let mut entry = self.entries.entry(address.to_string()).or_insert_with(|| RateLimitEntry {
            requests: 0,
            window_start: Instant::now(),
        });

        if entry.window_start.elapsed() > self.window {
            entry.requests = 0;
            entry.window_start = Instant::now();
        }

        if entry.requests >= self.max_requests {
            counter!(REQUEST_RATE_LIMITED).increment(1);
            warn!(ip = %address, "request rate limit exceeded");
            return Err(AppError::RateLimitExceeded);
        }

        entry.requests += 1;
        Ok(())
    }

    /// Drop entries whose window has closed
    pub fn prune(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let open = entry.window_start.elapsed() <= self.window;
            if !open {
                removed += 1;
            }
            open
        });
        removed
    }
}

/// Rate limiter middleware
pub async fn rate_limit(
    State(state): State<AppState>,
    client: ClientInfo,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    state.rate_limiter.check(&client.ip_address)?;
    Ok(next.run(request).await)
}
