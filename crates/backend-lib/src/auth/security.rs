// ============================
// crates/backend-lib/src/auth/security.rs
// ============================
//! Session anomaly scoring.
//!
//! Fingerprint drift lowers the score and raises warnings but never
//! invalidates a session on its own; mobile and NAT clients change
//! address legitimately.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gameauth_common::{RiskLevel, SecurityReport};
use metrics::counter;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::session::{ClientInfo, Session, SessionStore};
use crate::config::SessionSettings;
use crate::error::AppError;
use crate::metrics::SESSION_SECURITY_WARNING;

const FULL_SCORE: i32 = 100;
const IP_CHANGE_PENALTY: i32 = 25;
const USER_AGENT_CHANGE_PENALTY: i32 = 25;
const AGE_PENALTY: i32 = 15;
const IDLE_PENALTY: i32 = 10;

pub const WARN_SESSION_NOT_FOUND: &str = "session_not_found";
pub const WARN_POSSIBLE_TOKEN_THEFT: &str = "possible_token_theft";
pub const WARN_SESSION_INACTIVE: &str = "session_inactive";
pub const WARN_SESSION_EXPIRED: &str = "session_expired";
pub const WARN_IP_CHANGED: &str = "ip_address_changed";
pub const WARN_USER_AGENT_CHANGED: &str = "user_agent_changed";
pub const WARN_POSSIBLE_HIJACK: &str = "possible_session_hijack";
pub const WARN_SESSION_TOO_OLD: &str = "session_too_old";
pub const WARN_SESSION_IDLE: &str = "session_idle";

pub const REC_IMMEDIATE_REAUTH: &str = "immediate_re_authentication";
pub const REC_SECURITY_REVIEW: &str = "security_review";
pub const REC_REAUTH: &str = "re_authenticate";
pub const REC_ROTATE: &str = "rotate_session";

/// Map a score to a risk band
pub fn risk_for_score(score: u8) -> RiskLevel {
    match score {
        80..=u8::MAX => RiskLevel::Low,
        50..=79 => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}

fn rejected(warnings: &[&str], recommendations: &[&str]) -> SecurityReport {
    SecurityReport {
        is_valid: false,
        risk_level: RiskLevel::Critical,
        warnings: warnings.iter().map(|w| w.to_string()).collect(),
        recommendations: recommendations.iter().map(|r| r.to_string()).collect(),
        security_score: 0,
        active_sessions: 0,
    }
}

/// Scores a session against the request presenting it
#[derive(Clone)]
pub struct SessionSecurityValidator {
    sessions: Arc<dyn SessionStore>,
    max_age: chrono::Duration,
    idle_timeout: chrono::Duration,
}

impl SessionSecurityValidator {
    pub fn new(sessions: Arc<dyn SessionStore>, settings: &SessionSettings) -> Self {
        Self {
            sessions,
            max_age: chrono::Duration::from_std(settings.max_age())
                .unwrap_or_else(|_| chrono::Duration::days(1)),
            idle_timeout: chrono::Duration::from_std(settings.idle_timeout())
                .unwrap_or_else(|_| chrono::Duration::minutes(30)),
        }
    }

    /// Score without side effects
    pub fn assess(&self, session: Option<&Session>, client: &ClientInfo, now: DateTime<Utc>) -> SecurityReport {
        let Some(session) = session else {
            return rejected(
                &[WARN_SESSION_NOT_FOUND, WARN_POSSIBLE_TOKEN_THEFT],
                &[REC_IMMEDIATE_REAUTH, REC_SECURITY_REVIEW],
            );
        };
        if !session.is_active {
            return rejected(&[WARN_SESSION_INACTIVE], &[REC_REAUTH]);
        }
        if now >= session.expires_at {
            return rejected(&[WARN_SESSION_EXPIRED], &[REC_REAUTH]);
        }

        let mut score = FULL_SCORE;
        let mut warnings: Vec<String> = Vec::new();
        let mut recommendations: Vec<String> = Vec::new();

        let ip_changed = !session.ip_address.is_empty() && session.ip_address != client.ip_address;
        let ua_changed = !session.user_agent.is_empty() && session.user_agent != client.user_agent;

        if ip_changed {
            score -= IP_CHANGE_PENALTY;
            warnings.push(WARN_IP_CHANGED.to_string());
        }
        if ua_changed {
            score -= USER_AGENT_CHANGE_PENALTY;
            warnings.push(WARN_USER_AGENT_CHANGED.to_string());
        }
        if ip_changed && ua_changed {
            warnings.push(WARN_POSSIBLE_HIJACK.to_string());
            recommendations.push(REC_REAUTH.to_string());
        }
        if now - session.created_at > self.max_age {
            score -= AGE_PENALTY;
            warnings.push(WARN_SESSION_TOO_OLD.to_string());
            recommendations.push(REC_ROTATE.to_string());
        }
        if now - session.last_activity > self.idle_timeout {
            score -= IDLE_PENALTY;
            warnings.push(WARN_SESSION_IDLE.to_string());
        }

        let security_score = score.clamp(0, FULL_SCORE) as u8;
        SecurityReport {
            is_valid: true,
            risk_level: risk_for_score(security_score),
            warnings,
            recommendations,
            security_score,
            active_sessions: 0,
        }
    }

    /// Score the session behind `token` and record the request's activity on it
    pub async fn validate(
        &self,
        account_id: Uuid,
        token: &str,
        client: &ClientInfo,
    ) -> Result<SecurityReport, AppError> {
        let now = Utc::now();
        let session = self
            .sessions
            .find_by_token(token)
            .await?
            .filter(|s| s.account_id == account_id);

        let mut report = self.assess(session.as_ref(), client, now);

        if let (true, Some(session)) = (report.is_valid, session.as_ref()) {
            if !report.warnings.is_empty() {
                counter!(SESSION_SECURITY_WARNING).increment(report.warnings.len() as u64);
                warn!(
                    session_id = %session.id,
                    account_id = %account_id,
                    old_ip = %session.ip_address,
                    new_ip = %client.ip_address,
                    warnings = ?report.warnings,
                    "session security anomalies detected"
                );
            }
            self.sessions.touch(session.id, client, now).await?;
        }

        report.active_sessions = self.sessions.count_active(account_id, now).await?;
        info!(
            account_id = %account_id,
            is_valid = report.is_valid,
            risk = ?report.risk_level,
            score = report.security_score,
            "session security validated"
        );
        Ok(report)
    }
}
