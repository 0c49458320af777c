// ============================
// crates/backend-lib/src/auth/account.rs
// ============================
//! Player accounts and the account store abstraction.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gameauth_common::{AccountProfile, AccountStatus};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::validation::normalize_identifier;

/// Stored account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    /// Algorithm-tagged PHC string
    pub password_hash: String,
    #[serde(default)]
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(email: &str, username: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_string(),
            username: username.trim().to_string(),
            password_hash,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            status: self.status,
            created_at: self.created_at,
            last_login_at: self.last_login_at,
        }
    }
}

/// Storage abstraction for accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account; `Conflict` if email or username is taken
    async fn insert(&self, account: Account) -> Result<(), AppError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    /// Case-insensitive email lookup
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    /// Case-insensitive username lookup
    async fn get_by_username(&self, username: &str) -> Result<Option<Account>, AppError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: String) -> Result<bool, AppError>;

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Resolve a login identifier, which is either an email or a username
    async fn find_by_login(&self, login: &str) -> Result<Option<Account>, AppError> {
        if login.contains('@') {
            self.get_by_email(login).await
        } else {
            self.get_by_username(login).await
        }
    }
}

#[derive(Default)]
struct AccountIndex {
    by_id: HashMap<Uuid, Account>,
    by_email: HashMap<String, Uuid>,
    by_username: HashMap<String, Uuid>,
}

/// In-memory account store
///
/// Also serves as the write-through cache behind
/// [`FlatFileAccountStore`](crate::storage::FlatFileAccountStore).
#[derive(Default)]
pub struct InMemoryAccountStore {
    inner: RwLock<AccountIndex>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_sync(&self, account: Account) -> Result<(), AppError> {
        let email = normalize_identifier(&account.email);
        let username = normalize_identifier(&account.username);

        let mut index = self.inner.write();
        if index.by_email.contains_key(&email) || index.by_username.contains_key(&username) {
            return Err(AppError::Conflict(format!("account {} already exists", account.email)));
        }
        index.by_email.insert(email, account.id);
        index.by_username.insert(username, account.id);
        index.by_id.insert(account.id, account);
        Ok(())
    }

    pub(crate) fn remove_sync(&self, id: Uuid) -> Option<Account> {
        let mut index = self.inner.write();
        let account = index.by_id.remove(&id)?;
        index.by_email.remove(&normalize_identifier(&account.email));
        index.by_username.remove(&normalize_identifier(&account.username));
        Some(account)
    }

    pub(crate) fn get_sync(&self, id: Uuid) -> Option<Account> {
        self.inner.read().by_id.get(&id).cloned()
    }

    /// Apply a change to one account and return the updated copy
    pub(crate) fn modify_sync(&self, id: Uuid, change: impl FnOnce(&mut Account)) -> Option<Account> {
        let mut index = self.inner.write();
        let account = index.by_id.get_mut(&id)?;
        change(account);
        Some(account.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> Result<(), AppError> {
        self.insert_sync(account)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.get_sync(id))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let index = self.inner.read();
        Ok(index
            .by_email
            .get(&normalize_identifier(email))
            .and_then(|id| index.by_id.get(id))
            .cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Account>, AppError> {
        let index = self.inner.read();
        Ok(index
            .by_username
            .get(&normalize_identifier(username))
            .and_then(|id| index.by_id.get(id))
            .cloned())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: String) -> Result<bool, AppError> {
        Ok(self
            .modify_sync(id, |account| {
                account.password_hash = password_hash;
                account.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        self.modify_sync(id, |account| account.last_login_at = Some(at));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = InMemoryAccountStore::new();
        let account = Account::new("Player@Example.com", "Player_One", "$argon2id$x".into());
        let id = account.id;
        store.insert(account).await.unwrap();

        assert_eq!(store.get_by_id(id).await.unwrap().unwrap().username, "Player_One");
        assert!(store.get_by_email("player@example.com").await.unwrap().is_some());
        assert!(store.get_by_username("player_one").await.unwrap().is_some());
        assert_eq!(store.find_by_login("PLAYER@example.com").await.unwrap().unwrap().id, id);
        assert_eq!(store.find_by_login("Player_One").await.unwrap().unwrap().id, id);
        assert!(store.find_by_login("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_or_username_conflicts() {
        let store = InMemoryAccountStore::new();
        store.insert(Account::new("a@x.com", "alpha", "h".into())).await.unwrap();

        let dup_email = store.insert(Account::new("A@X.com", "beta", "h".into())).await;
        assert!(matches!(dup_email, Err(AppError::Conflict(_))));

        let dup_name = store.insert(Account::new("b@x.com", "ALPHA", "h".into())).await;
        assert!(matches!(dup_name, Err(AppError::Conflict(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_password_and_record_login() {
        let store = InMemoryAccountStore::new();
        let account = Account::new("a@x.com", "alpha", "old".into());
        let id = account.id;
        store.insert(account).await.unwrap();

        assert!(store.update_password_hash(id, "new".into()).await.unwrap());
        assert!(!store.update_password_hash(Uuid::new_v4(), "new".into()).await.unwrap());

        let at = Utc::now();
        store.record_login(id, at).await.unwrap();

        let stored = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new");
        assert_eq!(stored.last_login_at, Some(at));
    }

    #[test]
    fn test_profile_omits_hash() {
        let account = Account::new("a@x.com", "alpha", "secret-hash".into());
        let json = serde_json::to_string(&account.profile()).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("alpha"));
    }
}
