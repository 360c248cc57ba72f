//! Signed-in session with a cached Graph access token

use super::provider::{Account, IdentityProvider, TokenGrant};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

/// Read-only directory permissions requested by default
pub const GRAPH_SCOPES: [&str; 3] = ["User.Read.All", "Directory.Read.All", "Group.Read.All"];

/// Tokens this close to expiry (in seconds) are treated as expired
const TOKEN_BUFFER_SECS: i64 = 60;

/// Lifetime assumed when the provider does not report one
const DEFAULT_LIFETIME_SECS: i64 = 60 * 60;

/// Cached access token
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            access_token: grant.access_token,
            expires_at: grant
                .expires_on
                .unwrap_or(now + Duration::seconds(DEFAULT_LIFETIME_SECS)),
        }
    }

    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && self.expires_at - Duration::seconds(TOKEN_BUFFER_SECS) > now
    }
}

/// Active account plus a single-slot token cache
///
/// Neither public operation returns an error: failures are logged and
/// degrade to `false`/`None`, possibly after starting a redirect sign-in.
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    scopes: Vec<String>,
    active_account: RwLock<Option<Account>>,
    cached_token: RwLock<Option<CachedToken>>,
    /// Held while a refresh is in flight so concurrent callers share it
    refresh_guard: Mutex<()>,
}

impl AuthSession {
    pub fn new(provider: Arc<dyn IdentityProvider>, scopes: Vec<String>) -> Self {
        Self {
            provider,
            scopes,
            active_account: RwLock::new(None),
            cached_token: RwLock::new(None),
            refresh_guard: Mutex::new(()),
        }
    }

    pub async fn active_account(&self) -> Option<Account> {
        self.active_account.read().await.clone()
    }

    /// Establish an active account; returns whether the caller may proceed
    #[instrument(skip(self))]
    pub async fn ensure_signed_in(&self) -> bool {
        let resolved = match self.provider.complete_redirect().await {
            Ok(Some(account)) => Some(account),
            Ok(None) => self.provider.accounts().await.into_iter().next(),
            Err(e) => {
                error!(error = %e, "failed to complete pending sign-in");
                None
            }
        };

        match resolved {
            Some(account) => {
                info!(username = %account.username, "signed in");
                *self.active_account.write().await = Some(account);
                true
            }
            None => {
                self.start_login().await;
                false
            }
        }
    }

    /// A valid bearer token, or `None` when a sign-in flow had to be started
    #[instrument(skip(self))]
    pub async fn get_access_token(&self) -> Option<String> {
        if let Some(token) = self.cached_token_at(Utc::now()).await {
            return Some(token);
        }

        let _guard = self.refresh_guard.lock().await;

        // a caller we waited on may have refreshed already
        if let Some(token) = self.cached_token_at(Utc::now()).await {
            debug!("reusing token refreshed by a concurrent caller");
            return Some(token);
        }

        let Some(account) = self.active_account().await else {
            self.start_login().await;
            return None;
        };

        match self.provider.acquire_token_silent(&self.scopes, &account).await {
            Ok(grant) => return Some(self.store_token(grant).await),
            Err(e) => warn!(error = %e, "silent token acquisition failed"),
        }

        match self.provider.acquire_token_interactive(&self.scopes, &account).await {
            Ok(grant) => return Some(self.store_token(grant).await),
            Err(e) => warn!(
                error = %e,
                "interactive token acquisition failed, falling back to redirect"
            ),
        }

        if let Err(e) = self.provider.acquire_token_redirect(&self.scopes, &account).await {
            error!(error = %e, "redirect token acquisition failed");
        }
        None
    }

    async fn cached_token_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.cached_token
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_valid_at(now))
            .map(|t| t.access_token.clone())
    }

    async fn store_token(&self, grant: TokenGrant) -> String {
        let token = CachedToken::from_grant(grant, Utc::now());
        debug!(
            "cached new token, expires at {}",
            token.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let access_token = token.access_token.clone();
        *self.cached_token.write().await = Some(token);
        access_token
    }

    async fn start_login(&self) {
        if let Err(e) = self.provider.login_redirect(&self.scopes).await {
            error!(error = %e, "failed to start sign-in");
        }
    }
}
