//! On-disk cache of signed-in accounts, refresh tokens and a pending sign-in

use super::provider::{Account, AuthError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Cached account with its refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAccount {
    pub account: Account,
    pub refresh_token: String,
}

/// Device authorization started by a redirect-style sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSignIn {
    pub device_code: String,
    pub message: String,
    pub interval_secs: u64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenCacheFile {
    #[serde(default)]
    accounts: Vec<StoredAccount>,
    #[serde(default)]
    pending: Option<PendingSignIn>,
}

/// JSON token cache; every mutation is written through to disk
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    data: Mutex<TokenCacheFile>,
}

impl TokenStore {
    /// Open the cache at `path`, starting empty when the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        let data = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            TokenCacheFile::default()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.lock().accounts.iter().map(|a| a.account.clone()).collect()
    }

    pub fn refresh_token(&self, home_account_id: &str) -> Option<String> {
        self.lock()
            .accounts
            .iter()
            .find(|a| a.account.home_account_id == home_account_id)
            .map(|a| a.refresh_token.clone())
    }

    /// Insert or replace an account; the most recent sign-in comes first
    pub fn upsert(&self, account: Account, refresh_token: String) -> Result<(), AuthError> {
        let mut data = self.lock();
        data.accounts
            .retain(|a| a.account.home_account_id != account.home_account_id);
        data.accounts.insert(0, StoredAccount { account, refresh_token });
        self.save(&data)
    }

    pub fn pending(&self) -> Option<PendingSignIn> {
        self.lock().pending.clone()
    }

    pub fn set_pending(&self, pending: Option<PendingSignIn>) -> Result<(), AuthError> {
        let mut data = self.lock();
        data.pending = pending;
        self.save(&data)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TokenCacheFile> {
        // a poisoned lock still holds consistent data: every write is a whole-field swap
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn save(&self, data: &TokenCacheFile) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(data)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}
