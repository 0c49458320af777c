// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session registry.
//!
//! One row per issued access token. Rows are keyed by session id with a
//! secondary index from access token to id; the index is always checked
//! against the row, so a stale index entry reads as a miss.
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use gameauth_common::{SessionInfo, SessionStats};
use metrics::{counter, gauge};
use uuid::Uuid;

use crate::error::AppError;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_REVOKED, SWEEP_REMOVED};

/// How many user agents the statistics break down
const TOP_DEVICES: usize = 10;

/// Source address and user agent of a request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self { ip_address: ip_address.into(), user_agent: user_agent.into() }
    }
}

/// Session information
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub account_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
    pub ip_address: String,
    pub user_agent: String,
}

impl Session {
    pub fn new(
        account_id: Uuid,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
        client: &ClientInfo,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            access_token,
            refresh_token,
            created_at: now,
            expires_at,
            last_activity: now,
            is_active: true,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        }
    }

    /// Active and not past expiry
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expires_at
    }

    pub fn to_info(&self, current: bool) -> SessionInfo {
        SessionInfo {
            id: self.id,
            created_at: self.created_at,
            last_activity: self.last_activity,
            expires_at: self.expires_at,
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            current,
        }
    }
}

/// Storage abstraction for sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: Session) -> Result<(), AppError>;

    /// Live session for an access token; expired or inactive rows read as absent
    async fn get_by_token(&self, token: &str) -> Result<Option<Session>, AppError>;

    /// Session for an access token regardless of state
    async fn find_by_token(&self, token: &str) -> Result<Option<Session>, AppError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Session>, AppError>;

    /// Live sessions of one account
    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Session>, AppError>;

    /// Swap in new credentials; returns false if the row is gone or inactive
    async fn replace_tokens(
        &self,
        id: Uuid,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Record activity and the latest client fingerprint
    async fn touch(&self, id: Uuid, client: &ClientInfo, at: DateTime<Utc>)
        -> Result<bool, AppError>;

    async fn delete_by_token(&self, token: &str) -> Result<Option<Session>, AppError>;

    async fn delete_all_for_account(&self, account_id: Uuid) -> Result<Vec<Session>, AppError>;

    /// Deactivate a session; the sweeper reaps it later
    async fn terminate(&self, id: Uuid) -> Result<bool, AppError>;

    /// Remove expired and inactive rows
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError>;

    async fn stats(&self, now: DateTime<Utc>) -> Result<SessionStats, AppError>;

    async fn count_active(&self, account_id: Uuid, now: DateTime<Utc>) -> Result<usize, AppError>;
}

/// In-memory session registry over sharded maps
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<Uuid, Session>,
    by_token: DashMap<String, Uuid>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn remove_row(&self, id: &Uuid) -> Option<Session> {
        let (_, session) = self.sessions.remove(id)?;
        self.by_token.remove_if(&session.access_token, |_, owner| owner == id);
        Some(session)
    }

    /// Point `token` at `id`, backing out if the row no longer carries it
    fn index(&self, token: String, id: Uuid) {
        self.by_token.insert(token.clone(), id);
        let current = self.sessions.get(&id).is_some_and(|s| s.access_token == token);
        if !current {
            self.by_token.remove_if(&token, |_, owner| *owner == id);
        }
    }

    fn lookup(&self, token: &str) -> Option<Session> {
        let id = *self.by_token.get(token)?;
        let session = self.sessions.get(&id)?;
        (session.access_token == token).then(|| session.clone())
    }

    fn report_active(&self) {
        gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: Session) -> Result<(), AppError> {
        let (token, id) = (session.access_token.clone(), session.id);
        self.sessions.insert(id, session);
        self.index(token, id);

        counter!(SESSION_CREATED).increment(1);
        self.report_active();
        Ok(())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Session>, AppError> {
        let now = Utc::now();
        Ok(self.lookup(token).filter(|s| s.is_live(now)))
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Session>, AppError> {
        Ok(self.lookup(token))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Session>, AppError> {
        let now = Utc::now();
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|s| s.account_id == account_id && s.is_live(now))
            .map(|s| s.clone())
            .collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(sessions)
    }

    async fn replace_tokens(
        &self,
        id: Uuid,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        // The row guard is released before the index is touched
        let previous = match self.sessions.get_mut(&id) {
            Some(mut session) if session.is_active => {
                session.refresh_token = refresh_token;
                session.expires_at = expires_at;
                session.last_activity = Utc::now();
                std::mem::replace(&mut session.access_token, access_token.clone())
            },
            _ => return Ok(false),
        };

        self.index(access_token, id);
        self.by_token.remove_if(&previous, |_, owner| *owner == id);
        Ok(true)
    }

    async fn touch(
        &self,
        id: Uuid,
        client: &ClientInfo,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self.sessions.get_mut(&id) {
            Some(mut session) => {
                session.last_activity = at;
                session.ip_address.clone_from(&client.ip_address);
                session.user_agent.clone_from(&client.user_agent);
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn delete_by_token(&self, token: &str) -> Result<Option<Session>, AppError> {
        let removed = match self.by_token.remove(token) {
            Some((_, id)) => self
                .sessions
                .remove_if(&id, |_, session| session.access_token == token)
                .map(|(_, session)| session),
            None => None,
        };
        if removed.is_some() {
            counter!(SESSION_REVOKED).increment(1);
            self.report_active();
        }
        Ok(removed)
    }

    async fn delete_all_for_account(&self, account_id: Uuid) -> Result<Vec<Session>, AppError> {
        let ids: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|s| s.account_id == account_id)
            .map(|s| s.id)
            .collect();

        let removed: Vec<Session> = ids.iter().filter_map(|id| self.remove_row(id)).collect();
        if !removed.is_empty() {
            counter!(SESSION_REVOKED).increment(removed.len() as u64);
            self.report_active();
        }
        Ok(removed)
    }

    async fn terminate(&self, id: Uuid) -> Result<bool, AppError> {
        match self.sessions.get_mut(&id) {
            Some(mut session) if session.is_active => {
                session.is_active = false;
                counter!(SESSION_REVOKED).increment(1);
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let mut reaped = Vec::new();
        self.sessions.retain(|id, session| {
            let live = session.is_live(now);
            if !live {
                reaped.push((session.access_token.clone(), *id));
            }
            live
        });
        for (token, id) in &reaped {
            self.by_token.remove_if(token, |_, owner| owner == id);
        }
        let removed = reaped.len();

        if removed > 0 {
            counter!(SWEEP_REMOVED, "kind" => "session").increment(removed as u64);
            self.report_active();
        }
        Ok(removed)
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<SessionStats, AppError> {
        let day_ago = now - ChronoDuration::hours(24);
        let mut stats = SessionStats::default();
        let mut devices: HashMap<String, usize> = HashMap::new();
        let mut total_minutes = 0.0;

        for session in self.sessions.iter() {
            stats.total_sessions += 1;
            if session.last_activity >= day_ago {
                stats.recent_activity_24h += 1;
            }
            if session.is_live(now) {
                stats.active_sessions += 1;
                total_minutes += (session.expires_at - session.created_at).num_seconds() as f64 / 60.0;
                let device = if session.user_agent.is_empty() {
                    "unknown".to_string()
                } else {
                    session.user_agent.clone()
                };
                *devices.entry(device).or_default() += 1;
            } else {
                stats.inactive_sessions += 1;
            }
        }

        if stats.active_sessions > 0 {
            stats.average_session_minutes = total_minutes / stats.active_sessions as f64;
        }

        let mut ranked: Vec<(String, usize)> = devices.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats.sessions_by_device = ranked.into_iter().take(TOP_DEVICES).collect::<BTreeMap<_, _>>();

        Ok(stats)
    }

    async fn count_active(&self, account_id: Uuid, now: DateTime<Utc>) -> Result<usize, AppError> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.account_id == account_id && s.is_live(now))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn client() -> ClientInfo {
        ClientInfo::new("10.0.0.1", "game-client/1.0")
    }

    fn session_for(account_id: Uuid, token: &str, ttl_secs: i64) -> Session {
        Session::new(
            account_id,
            token.to_string(),
            format!("refresh-{token}"),
            Utc::now() + ChronoDuration::seconds(ttl_secs),
            &client(),
        )
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = InMemorySessionStore::new();
        let account = Uuid::new_v4();
        let session = session_for(account, "tok-a", 60);
        let id = session.id;

        store.create(session).await.unwrap();

        let found = store.get_by_token("tok-a").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.account_id, account);
        assert!(store.get_by_token("tok-b").await.unwrap().is_none());
        assert!(store.get_by_id(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_absent() {
        let store = InMemorySessionStore::new();
        store.create(session_for(Uuid::new_v4(), "old", -1)).await.unwrap();

        assert!(store.get_by_token("old").await.unwrap().is_none());
        assert!(store.find_by_token("old").await.unwrap().is_some());

        assert_eq!(store.sweep_expired(Utc::now()).await.unwrap(), 1);
        assert!(store.find_by_token("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_tokens_moves_index() {
        let store = InMemorySessionStore::new();
        let session = session_for(Uuid::new_v4(), "first", 60);
        let id = session.id;
        store.create(session).await.unwrap();

        let replaced = store
            .replace_tokens(id, "second".into(), "refresh-2".into(), Utc::now() + ChronoDuration::seconds(120))
            .await
            .unwrap();
        assert!(replaced);

        assert!(store.get_by_token("first").await.unwrap().is_none());
        let current = store.get_by_token("second").await.unwrap().unwrap();
        assert_eq!(current.id, id);
        assert_eq!(current.refresh_token, "refresh-2");

        assert!(!store
            .replace_tokens(Uuid::new_v4(), "x".into(), "y".into(), Utc::now())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemorySessionStore::new();
        store.create(session_for(Uuid::new_v4(), "tok", 60)).await.unwrap();

        assert!(store.delete_by_token("tok").await.unwrap().is_some());
        assert!(store.delete_by_token("tok").await.unwrap().is_none());
        assert!(store.get_by_token("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_all_for_account() {
        let store = InMemorySessionStore::new();
        let account = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.create(session_for(account, "a1", 60)).await.unwrap();
        store.create(session_for(account, "a2", 60)).await.unwrap();
        store.create(session_for(other, "b1", 60)).await.unwrap();

        let removed = store.delete_all_for_account(account).await.unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.count_active(account, Utc::now()).await.unwrap(), 0);
        assert_eq!(store.count_active(other, Utc::now()).await.unwrap(), 1);
        assert!(store.get_by_token("a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_terminate_then_sweep() {
        let store = InMemorySessionStore::new();
        let session = session_for(Uuid::new_v4(), "tok", 60);
        let id = session.id;
        store.create(session).await.unwrap();

        assert!(store.terminate(id).await.unwrap());
        assert!(!store.terminate(id).await.unwrap());
        assert!(store.get_by_token("tok").await.unwrap().is_none());
        assert!(!store.find_by_token("tok").await.unwrap().unwrap().is_active);

        assert_eq!(store.sweep_expired(Utc::now()).await.unwrap(), 1);
        assert!(store.get_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_updates_fingerprint() {
        let store = InMemorySessionStore::new();
        let session = session_for(Uuid::new_v4(), "tok", 60);
        let id = session.id;
        store.create(session).await.unwrap();

        let later = Utc::now() + ChronoDuration::seconds(5);
        let moved = ClientInfo::new("192.168.1.9", "game-client/2.0");
        assert!(store.touch(id, &moved, later).await.unwrap());

        let updated = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(updated.ip_address, "192.168.1.9");
        assert_eq!(updated.user_agent, "game-client/2.0");
        assert_eq!(updated.last_activity, later);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemorySessionStore::new();
        let account = Uuid::new_v4();
        store.create(session_for(account, "live-1", 600)).await.unwrap();
        store.create(session_for(account, "live-2", 600)).await.unwrap();
        store.create(session_for(account, "dead", -10)).await.unwrap();

        let stats = store.stats(Utc::now()).await.unwrap();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.inactive_sessions, 1);
        assert_eq!(stats.recent_activity_24h, 3);
        assert_eq!(stats.sessions_by_device.get("game-client/1.0"), Some(&2));
        assert!(stats.average_session_minutes > 9.0);
    }

    #[tokio::test]
    async fn test_concurrent_create_and_delete() {
        let store = Arc::new(InMemorySessionStore::new());
        let account = Uuid::new_v4();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let token = format!("tok-{i}");
                    store.create(session_for(account, &token, 60)).await.unwrap();
                    if i % 2 == 0 {
                        store.delete_by_token(&token).await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count_active(account, Utc::now()).await.unwrap(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sweep_never_loses_fresh_sessions() {
        let store = Arc::new(InMemorySessionStore::new());
        let stop = Arc::new(AtomicBool::new(false));

        let sweeper = {
            let (store, stop) = (store.clone(), stop.clone());
            tokio::spawn(async move {
                while !stop.load(Ordering::Relaxed) {
                    store.sweep_expired(Utc::now()).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let creators = (0..3).map(|worker| {
            let store = store.clone();
            tokio::spawn(async move {
                let mut unreadable = 0;
                for i in 0..2_000 {
                    let token = format!("tok-{worker}-{i}");
                    store.create(session_for(Uuid::new_v4(), &token, 600)).await.unwrap();
                    if store.get_by_token(&token).await.unwrap().is_none() {
                        unreadable += 1;
                    }
                }
                unreadable
            })
        });
        let unreadable: usize = futures_util::future::join_all(creators)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .sum();

        stop.store(true, Ordering::Relaxed);
        sweeper.await.unwrap();
        assert_eq!(unreadable, 0);
        assert_eq!(store.by_token.len(), 6_000);
    }

    #[tokio::test]
    async fn test_sweep_drops_only_reaped_index_entries() {
        let store = InMemorySessionStore::new();
        let account = Uuid::new_v4();
        store.create(session_for(account, "live", 600)).await.unwrap();
        store.create(session_for(account, "dead", -1)).await.unwrap();

        assert_eq!(store.sweep_expired(Utc::now()).await.unwrap(), 1);
        assert!(store.by_token.contains_key("live"));
        assert!(!store.by_token.contains_key("dead"));
    }

    #[tokio::test]
    async fn test_replace_on_terminated_session_leaves_no_index() {
        let store = InMemorySessionStore::new();
        let session = session_for(Uuid::new_v4(), "first", 60);
        let id = session.id;
        store.create(session).await.unwrap();
        assert!(store.terminate(id).await.unwrap());

        let replaced = store
            .replace_tokens(id, "second".into(), "refresh-2".into(), Utc::now() + ChronoDuration::seconds(60))
            .await
            .unwrap();
        assert!(!replaced);
        assert!(!store.by_token.contains_key("second"));
        assert!(store.find_by_token("first").await.unwrap().is_some());
    }
}
