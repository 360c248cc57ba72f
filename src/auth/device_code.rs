//! Microsoft identity platform device code provider
//!
//! Interactive acquisition runs the device authorization grant and waits for
//! the operator; redirect acquisition starts the same grant, records it as
//! pending and returns so a later launch can pick it up.

use super::provider::{Account, AuthError, IdentityProvider, PromptSender, TokenGrant};
use super::token_store::{PendingSignIn, TokenStore};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{debug, info, instrument, warn};

/// OpenID scopes added to every request so an id token and refresh token come back
const OIDC_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    message: String,
    #[serde(default = "default_interval")]
    interval: u64,
    expires_in: i64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    oid: Option<String>,
    tid: Option<String>,
    sub: Option<String>,
    preferred_username: Option<String>,
    name: Option<String>,
}

/// Outcome of a single device code poll
enum Poll {
    Granted(TokenResponse),
    Pending,
    SlowDown,
}

/// Device code identity provider for a single tenant and app registration
pub struct DeviceCodeProvider {
    http_client: Client,
    authority: String,
    client_id: String,
    store: TokenStore,
    prompt: PromptSender,
}

impl DeviceCodeProvider {
    /// # Arguments
    /// * `authority_host` - e.g., "https://login.microsoftonline.com"
    /// * `tenant_id` - directory (tenant) id or domain
    /// * `client_id` - public client application id
    pub fn new(
        authority_host: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        store: TokenStore,
        prompt: PromptSender,
    ) -> Result<Self, AuthError> {
        let http_client = Client::builder()
            .user_agent(concat!("entrascope/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            authority: format!("{}/{}", authority_host.trim_end_matches('/'), tenant_id),
            client_id: client_id.into(),
            store,
            prompt,
        })
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority)
    }

    fn scope_param(scopes: &[String]) -> String {
        scopes
            .iter()
            .map(String::as_str)
            .chain(OIDC_SCOPES)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn show_prompt(&self, message: &str) {
        info!("{message}");
        self.prompt.send_replace(Some(message.to_string()));
    }

    fn clear_prompt(&self) {
        self.prompt.send_replace(None);
    }

    async fn start_device_code(&self, scopes: &[String]) -> Result<PendingSignIn, AuthError> {
        let url = format!("{}/oauth2/v2.0/devicecode", self.authority);
        let scope = Self::scope_param(scopes);
        let params = [("client_id", self.client_id.as_str()), ("scope", scope.as_str())];

        let response = self.http_client.post(&url).form(&params).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider(format!(
                "device code request failed with status {}: {}",
                status, body
            )));
        }

        let code: DeviceCodeResponse = response.json().await?;
        self.show_prompt(&code.message);

        Ok(PendingSignIn {
            device_code: code.device_code,
            message: code.message,
            interval_secs: code.interval,
            expires_at: Utc::now() + Duration::seconds(code.expires_in),
        })
    }

    async fn poll_once(&self, device_code: &str) -> Result<Poll, AuthError> {
        let params = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", self.client_id.as_str()),
            ("device_code", device_code),
        ];
        let response = self.http_client.post(self.token_url()).form(&params).send().await?;

        if response.status().is_success() {
            return Ok(Poll::Granted(response.json().await?));
        }

        let body = response.text().await.unwrap_or_default();
        let err: TokenErrorResponse = serde_json::from_str(&body)
            .map_err(|_| AuthError::Provider(format!("token request failed: {}", body)))?;

        match err.error.as_str() {
            "authorization_pending" => Ok(Poll::Pending),
            "slow_down" => Ok(Poll::SlowDown),
            "expired_token" | "code_expired" => Err(AuthError::Expired),
            _ => Err(AuthError::Provider(format!("{}: {}", err.error, err.error_description))),
        }
    }

    /// Poll until the operator completes the sign-in or the code expires
    async fn wait_for_sign_in(&self, pending: &PendingSignIn) -> Result<TokenResponse, AuthError> {
        let mut interval = pending.interval_secs;

        loop {
            if Utc::now() >= pending.expires_at {
                return Err(AuthError::Expired);
            }
            tokio::time::sleep(StdDuration::from_secs(interval)).await;

            match self.poll_once(&pending.device_code).await? {
                Poll::Granted(token) => return Ok(token),
                Poll::Pending => debug!("authorization pending"),
                Poll::SlowDown => interval += 5,
            }
        }
    }

    async fn refresh(
        &self,
        scopes: &[String],
        refresh_token: &str,
    ) -> Result<TokenResponse, AuthError> {
        let scope = Self::scope_param(scopes);
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];
        let response = self.http_client.post(self.token_url()).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider(format!(
                "refresh failed with status {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }

    /// Persist the refresh token and turn the response into an account and grant
    fn accept(
        &self,
        token: TokenResponse,
        known: Option<&Account>,
    ) -> Result<(Account, TokenGrant), AuthError> {
        let account = match token.id_token.as_deref().map(account_from_id_token) {
            Some(Ok(account)) => account,
            Some(Err(e)) if known.is_none() => return Err(e),
            _ => known.cloned().ok_or_else(|| {
                AuthError::Provider("token response carried no id token".to_string())
            })?,
        };

        if let Some(refresh_token) = token.refresh_token {
            self.store.upsert(account.clone(), refresh_token)?;
        }

        let grant = TokenGrant {
            access_token: token.access_token,
            expires_on: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        };
        Ok((account, grant))
    }
}

/// Read the account identity out of an (unverified) id token payload
fn account_from_id_token(id_token: &str) -> Result<Account, AuthError> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::Provider("malformed id token".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::Provider(format!("malformed id token: {e}")))?;
    let claims: IdTokenClaims = serde_json::from_slice(&bytes)?;

    let object_id = claims
        .oid
        .or(claims.sub)
        .ok_or_else(|| AuthError::Provider("id token has no subject".to_string()))?;
    let home_account_id = match &claims.tid {
        Some(tid) => format!("{}.{}", object_id, tid),
        None => object_id,
    };

    Ok(Account {
        home_account_id,
        username: claims
            .preferred_username
            .or(claims.name)
            .unwrap_or_else(|| "unknown".to_string()),
        tenant_id: claims.tid,
    })
}

#[async_trait]
impl IdentityProvider for DeviceCodeProvider {
    #[instrument(skip(self))]
    async fn complete_redirect(&self) -> Result<Option<Account>, AuthError> {
        let Some(pending) = self.store.pending() else {
            return Ok(None);
        };

        if Utc::now() >= pending.expires_at {
            warn!("pending sign-in expired");
            self.store.set_pending(None)?;
            return Ok(None);
        }

        match self.poll_once(&pending.device_code).await {
            Ok(Poll::Granted(token)) => {
                self.store.set_pending(None)?;
                self.clear_prompt();
                let (account, _) = self.accept(token, None)?;
                Ok(Some(account))
            }
            Ok(Poll::Pending | Poll::SlowDown) => {
                self.show_prompt(&pending.message);
                Ok(None)
            }
            Err(e) => {
                self.store.set_pending(None)?;
                Err(e)
            }
        }
    }

    async fn accounts(&self) -> Vec<Account> {
        self.store.accounts()
    }

    async fn login_redirect(&self, scopes: &[String]) -> Result<(), AuthError> {
        // the operator may still be entering the code from the last launch
        if let Some(pending) = self.store.pending().filter(|p| Utc::now() < p.expires_at) {
            debug!("reusing pending sign-in");
            self.show_prompt(&pending.message);
            return Ok(());
        }

        let pending = self.start_device_code(scopes).await?;
        self.store.set_pending(Some(pending))
    }

    async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: &Account,
    ) -> Result<TokenGrant, AuthError> {
        let refresh_token = self
            .store
            .refresh_token(&account.home_account_id)
            .ok_or(AuthError::InteractionRequired)?;
        let token = self.refresh(scopes, &refresh_token).await?;
        let (_, grant) = self.accept(token, Some(account))?;
        Ok(grant)
    }

    async fn acquire_token_interactive(
        &self,
        scopes: &[String],
        account: &Account,
    ) -> Result<TokenGrant, AuthError> {
        let pending = self.start_device_code(scopes).await?;
        let token = self.wait_for_sign_in(&pending).await;
        self.clear_prompt();
        let (_, grant) = self.accept(token?, Some(account))?;
        Ok(grant)
    }

    async fn acquire_token_redirect(
        &self,
        scopes: &[String],
        _account: &Account,
    ) -> Result<(), AuthError> {
        self.login_redirect(scopes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthSession;
    use serde_json::json;
    use tokio::sync::watch;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn id_token(claims: serde_json::Value) -> String {
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("eyJhbGciOiJub25lIn0.{}.sig", payload)
    }

    fn provider(
        server: &MockServer,
        dir: &tempfile::TempDir,
    ) -> (DeviceCodeProvider, watch::Receiver<Option<String>>) {
        let store = TokenStore::open(dir.path().join("token_cache.json")).unwrap();
        let (tx, rx) = watch::channel(None);
        let provider = DeviceCodeProvider::new(&server.uri(), "tid", "client", store, tx).unwrap();
        (provider, rx)
    }

    fn scopes() -> Vec<String> {
        vec!["User.Read.All".to_string()]
    }

    #[test]
    fn test_account_from_id_token() {
        let token = id_token(json!({
            "oid": "o1",
            "tid": "t1",
            "preferred_username": "admin@contoso.com"
        }));
        let account = account_from_id_token(&token).unwrap();
        assert_eq!(account.home_account_id, "o1.t1");
        assert_eq!(account.username, "admin@contoso.com");
        assert_eq!(account.tenant_id.as_deref(), Some("t1"));

        assert!(account_from_id_token("not-a-jwt").is_err());
    }

    #[test]
    fn test_scope_param_adds_oidc_scopes() {
        assert_eq!(
            DeviceCodeProvider::scope_param(&scopes()),
            "User.Read.All openid profile offline_access"
        );
    }

    #[tokio::test]
    async fn test_interactive_sign_in_stores_refresh_token() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/tid/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dc1",
                "user_code": "ABCD",
                "verification_uri": "https://microsoft.com/devicelogin",
                "message": "Enter ABCD at https://microsoft.com/devicelogin",
                "interval": 0,
                "expires_in": 900
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/tid/oauth2/v2.0/token"))
            .and(body_string_contains("device_code=dc1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at1",
                "expires_in": 3600,
                "refresh_token": "rt1",
                "id_token": id_token(json!({
                    "oid": "o1",
                    "tid": "t1",
                    "preferred_username": "admin@contoso.com"
                }))
            })))
            .mount(&server)
            .await;

        let (provider, rx) = provider(&server, &dir);
        let known = Account {
            home_account_id: "o1.t1".into(),
            username: "admin@contoso.com".into(),
            tenant_id: Some("t1".into()),
        };

        let grant = provider.acquire_token_interactive(&scopes(), &known).await.unwrap();
        assert_eq!(grant.access_token, "at1");
        assert!(grant.expires_on.is_some());
        assert_eq!(provider.store.refresh_token("o1.t1").as_deref(), Some("rt1"));
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_silent_uses_refresh_token() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/tid/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh",
                "expires_in": 3600,
                "refresh_token": "rt-new"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (provider, _rx) = provider(&server, &dir);
        let account = Account {
            home_account_id: "o1.t1".into(),
            username: "admin@contoso.com".into(),
            tenant_id: None,
        };
        provider.store.upsert(account.clone(), "rt-old".into()).unwrap();

        let grant = provider.acquire_token_silent(&scopes(), &account).await.unwrap();
        assert_eq!(grant.access_token, "fresh");
        assert_eq!(provider.store.refresh_token("o1.t1").as_deref(), Some("rt-new"));
    }

    #[tokio::test]
    async fn test_silent_without_refresh_token_requires_interaction() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (provider, _rx) = provider(&server, &dir);
        let account = Account {
            home_account_id: "nobody".into(),
            username: "nobody".into(),
            tenant_id: None,
        };

        let err = provider.acquire_token_silent(&scopes(), &account).await.unwrap_err();
        assert!(matches!(err, AuthError::InteractionRequired));
    }

    #[tokio::test]
    async fn test_redirect_is_completed_on_next_launch() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/tid/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dc2",
                "message": "Enter WXYZ at https://microsoft.com/devicelogin",
                "interval": 5,
                "expires_in": 900
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/tid/oauth2/v2.0/token"))
            .and(body_string_contains("device_code=dc2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at2",
                "expires_in": 3600,
                "refresh_token": "rt2",
                "id_token": id_token(json!({
                    "oid": "o2",
                    "tid": "t2",
                    "preferred_username": "ops@contoso.com"
                }))
            })))
            .mount(&server)
            .await;

        let (first, rx) = provider(&server, &dir);
        first.login_redirect(&scopes()).await.unwrap();
        assert!(rx.borrow().as_deref().unwrap().contains("WXYZ"));
        assert!(first.store.pending().is_some());
        drop(first);

        let (second, _rx) = provider(&server, &dir);
        let account = second.complete_redirect().await.unwrap().unwrap();
        assert_eq!(account.username, "ops@contoso.com");
        assert!(second.store.pending().is_none());
        assert_eq!(second.accounts().await, vec![account]);
    }

    #[tokio::test]
    async fn test_pending_redirect_keeps_waiting() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/tid/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "authorization_pending",
                "error_description": "pending"
            })))
            .mount(&server)
            .await;

        let (provider, rx) = provider(&server, &dir);
        provider
            .store
            .set_pending(Some(PendingSignIn {
                device_code: "dc3".into(),
                message: "Enter CODE".into(),
                interval_secs: 5,
                expires_at: Utc::now() + Duration::minutes(10),
            }))
            .unwrap();

        assert!(provider.complete_redirect().await.unwrap().is_none());
        assert!(provider.store.pending().is_some());
        assert_eq!(rx.borrow().as_deref(), Some("Enter CODE"));
    }

    #[tokio::test]
    async fn test_relaunch_keeps_pending_device_code() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/tid/oauth2/v2.0/token"))
            .and(body_string_contains("device_code=dc1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "authorization_pending",
                "error_description": "pending"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/tid/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dc-new",
                "message": "Enter NEW",
                "interval": 5,
                "expires_in": 900
            })))
            .expect(0)
            .mount(&server)
            .await;

        let (provider, rx) = provider(&server, &dir);
        provider
            .store
            .set_pending(Some(PendingSignIn {
                device_code: "dc1".into(),
                message: "Enter FIRST".into(),
                interval_secs: 5,
                expires_at: Utc::now() + Duration::minutes(10),
            }))
            .unwrap();

        let session = AuthSession::new(std::sync::Arc::new(provider), scopes());
        assert!(!session.ensure_signed_in().await);
        assert_eq!(rx.borrow().as_deref(), Some("Enter FIRST"));

        let store = TokenStore::open(dir.path().join("token_cache.json")).unwrap();
        assert_eq!(store.pending().map(|p| p.device_code).as_deref(), Some("dc1"));
    }

    #[tokio::test]
    async fn test_expired_pending_starts_new_device_code() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/tid/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dc-new",
                "message": "Enter NEW",
                "interval": 5,
                "expires_in": 900
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (provider, rx) = provider(&server, &dir);
        provider
            .store
            .set_pending(Some(PendingSignIn {
                device_code: "dc-old".into(),
                message: "Enter OLD".into(),
                interval_secs: 5,
                expires_at: Utc::now() - Duration::minutes(1),
            }))
            .unwrap();

        provider.login_redirect(&scopes()).await.unwrap();
        assert_eq!(rx.borrow().as_deref(), Some("Enter NEW"));
        assert_eq!(
            provider.store.pending().map(|p| p.device_code).as_deref(),
            Some("dc-new")
        );
    }
}
