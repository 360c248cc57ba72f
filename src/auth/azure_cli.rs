//! Azure CLI credential provider for Graph authentication

use super::provider::{Account, AuthError, IdentityProvider, PromptSender, TokenGrant};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_identity::AzureCliCredential;
use chrono::DateTime;
use std::sync::Arc;

/// The CLI can only mint tokens for a resource's static permissions
const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Provider that reuses the operator's `az login` session
///
/// Only silent acquisition is available; signing in happens in the CLI.
pub struct AzureCliProvider {
    credential: Arc<AzureCliCredential>,
    prompt: PromptSender,
}

impl AzureCliProvider {
    pub fn new(prompt: PromptSender) -> Result<Self, AuthError> {
        let credential = AzureCliCredential::new()
            .map_err(|e| {
                AuthError::Provider(format!("failed to create Azure CLI credential: {e}"))
            })?;

        Ok(Self { credential, prompt })
    }

    fn cli_account() -> Account {
        Account {
            home_account_id: "azure-cli".to_string(),
            username: "Azure CLI".to_string(),
            tenant_id: None,
        }
    }

    fn ask_for_login(&self) {
        self.prompt
            .send_replace(Some("Sign in with 'az login' and restart entrascope".to_string()));
    }
}

#[async_trait]
impl IdentityProvider for AzureCliProvider {
    async fn complete_redirect(&self) -> Result<Option<Account>, AuthError> {
        Ok(None)
    }

    async fn accounts(&self) -> Vec<Account> {
        vec![Self::cli_account()]
    }

    async fn login_redirect(&self, _scopes: &[String]) -> Result<(), AuthError> {
        self.ask_for_login();
        Ok(())
    }

    async fn acquire_token_silent(
        &self,
        _scopes: &[String],
        _account: &Account,
    ) -> Result<TokenGrant, AuthError> {
        let token = self
            .credential
            .get_token(&[GRAPH_DEFAULT_SCOPE])
            .await
            .map_err(|e| AuthError::Provider(format!("Azure CLI token request failed: {e}")))?;

        Ok(TokenGrant {
            access_token: token.token.secret().to_string(),
            expires_on: DateTime::from_timestamp(token.expires_on.unix_timestamp(), 0),
        })
    }

    async fn acquire_token_interactive(
        &self,
        _scopes: &[String],
        _account: &Account,
    ) -> Result<TokenGrant, AuthError> {
        Err(AuthError::Unsupported("interactive sign-in"))
    }

    async fn acquire_token_redirect(
        &self,
        _scopes: &[String],
        _account: &Account,
    ) -> Result<(), AuthError> {
        self.ask_for_login();
        Ok(())
    }
}
