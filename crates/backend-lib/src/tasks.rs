// ============================
// crates/backend-lib/src/tasks.rs
// ============================
//! Background maintenance.
//!
//! The [`Sweeper`] is started once by the binary and stopped explicitly
//! after the HTTP server has drained.
use std::time::Duration;

use gameauth_common::CleanupReport;
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::metrics::SWEEP_RUNS;
use crate::AppState;

/// Remove expired sessions, refresh tokens, attempt counters and rate-limit windows
pub async fn sweep_once(state: &AppState) -> Result<CleanupReport, AppError> {
    let report = state.auth.cleanup_expired().await?;
    let windows = state.rate_limiter.prune();
    counter!(SWEEP_RUNS).increment(1);
    debug!(
        sessions = report.sessions_removed,
        refresh_tokens = report.refresh_tokens_removed,
        attempt_counters = report.attempt_counters_removed,
        rate_limit_windows = windows,
        "sweep finished"
    );
    Ok(report)
}

/// Periodic sweep bound to the process lifecycle
pub struct Sweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweep loop; the first sweep runs one `interval` after start
    pub fn start(state: AppState, interval: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            info!(interval_ms = interval.as_millis() as u64, "sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = sweep_once(&state).await {
                            warn!(error = %e, "sweep failed");
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("sweeper stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the loop and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "sweeper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
