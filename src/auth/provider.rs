//! Identity provider abstraction used by the auth session

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Channel used to show sign-in instructions to the operator
pub type PromptSender = watch::Sender<Option<String>>;

/// Errors raised by identity providers
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no cached credentials, interaction required")]
    InteractionRequired,

    #[error("{0} is not supported by this identity provider")]
    Unsupported(&'static str),

    #[error("device code expired before sign-in completed")]
    Expired,

    #[error("identity provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token cache error: {0}")]
    Store(#[from] std::io::Error),
}

/// A signed-in operator account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// `<oid>.<tid>` for device code accounts
    pub home_account_id: String,
    pub username: String,
    pub tenant_id: Option<String>,
}

/// Result of a successful token acquisition
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_on: Option<DateTime<Utc>>,
}

/// An OAuth2/OIDC authority able to sign an operator in and mint Graph tokens
///
/// Mirrors the three acquisition tiers: silent, interactive, redirect. A
/// redirect leaves the flow pending; `complete_redirect` picks it up later.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Finish a redirect-style sign-in started earlier, if one is pending
    async fn complete_redirect(&self) -> Result<Option<Account>, AuthError>;

    /// Accounts known from the local token cache
    async fn accounts(&self) -> Vec<Account>;

    /// Begin a full sign-in; the operator finishes it out of band
    async fn login_redirect(&self, scopes: &[String]) -> Result<(), AuthError>;

    async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: &Account,
    ) -> Result<TokenGrant, AuthError>;

    async fn acquire_token_interactive(
        &self,
        scopes: &[String],
        account: &Account,
    ) -> Result<TokenGrant, AuthError>;

    async fn acquire_token_redirect(
        &self,
        scopes: &[String],
        account: &Account,
    ) -> Result<(), AuthError>;
}
