// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! Flat-file account persistence.
//!
//! One JSON document per account under `<root>/accounts/`. Everything is
//! loaded into memory on open and written through on every mutation.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs as tokio_fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{Account, AccountStore, InMemoryAccountStore};
use crate::error::AppError;

const ACCOUNTS_DIR: &str = "accounts";

/// Flat-file implementation of [`AccountStore`]
pub struct FlatFileAccountStore {
    root: PathBuf,
    cache: InMemoryAccountStore,
}

impl FlatFileAccountStore {
    /// Open (or create) the store and load every account file
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        let dir = root.join(ACCOUNTS_DIR);
        tokio_fs::create_dir_all(&dir).await?;

        let cache = InMemoryAccountStore::new();
        let mut entries = tokio_fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio_fs::read_to_string(&path).await?;
            match serde_json::from_str::<Account>(&content) {
                Ok(account) => {
                    if let Err(e) = cache.insert_sync(account) {
                        warn!(path = %path.display(), error = %e, "skipping duplicate account file");
                    }
                },
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable account file"),
            }
        }

        info!(root = %root.display(), accounts = cache.len(), "account store loaded");
        Ok(Self { root, cache })
    }

    fn account_path(&self, id: Uuid) -> PathBuf {
        self.root.join(ACCOUNTS_DIR).join(format!("{id}.json"))
    }

    /// Write via a temp file and rename so readers never see a partial document
    async fn persist(&self, account: &Account) -> Result<(), AppError> {
        let path = self.account_path(account.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(account)?;
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for FlatFileAccountStore {
    async fn insert(&self, account: Account) -> Result<(), AppError> {
        let id = account.id;
        self.cache.insert_sync(account.clone())?;
        if let Err(e) = self.persist(&account).await {
            self.cache.remove_sync(id);
            return Err(e);
        }
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.cache.get_sync(id))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        self.cache.get_by_email(email).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Account>, AppError> {
        self.cache.get_by_username(username).await
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: String) -> Result<bool, AppError> {
        let Some(previous) = self.cache.get_sync(id) else {
            return Ok(false);
        };
        let Some(updated) = self.cache.modify_sync(id, |account| {
            account.password_hash = password_hash;
            account.updated_at = Utc::now();
        }) else {
            return Ok(false);
        };

        if let Err(e) = self.persist(&updated).await {
            self.cache.modify_sync(id, |account| *account = previous);
            return Err(e);
        }
        Ok(true)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(updated) = self.cache.modify_sync(id, |account| account.last_login_at = Some(at)) {
            self.persist(&updated).await?;
        }
        Ok(())
    }
}
