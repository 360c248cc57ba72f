//! Microsoft Graph REST client

use crate::models::ODataResponse;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Default Graph endpoint
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Errors from Graph requests
#[derive(Debug, Error)]
pub enum GraphError {
    /// Graph answered with a non-success status
    #[error("Graph fetch failed: {status} {body}")]
    Status { status: StatusCode, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Friendly-name lookup keyed by object or SKU id
pub type NameMap = Arc<HashMap<String, String>>;

/// HTTP client for Microsoft Graph
pub struct GraphClient {
    http_client: Client,
    base_url: String,
    page_size: usize,
    pub(super) sku_cache: RwLock<Option<NameMap>>,
    pub(super) role_cache: RwLock<Option<NameMap>>,
}

impl GraphClient {
    /// Create a new Graph client
    ///
    /// # Arguments
    /// * `base_url` - Graph root including version (e.g., "https://graph.microsoft.com/v1.0")
    /// * `page_size` - `$top` used for the user collection
    pub fn new(base_url: impl Into<String>, page_size: usize) -> GraphResult<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("entrascope/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size,
            sku_cache: RwLock::new(None),
            role_cache: RwLock::new(None),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Resolve an endpoint against the base URL; absolute URLs pass through
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }

    /// Make an authenticated GET request and deserialize the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, token: &str) -> GraphResult<T> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Status { status, body });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetch every page of a collection, following `@odata.nextLink`
    pub async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
    ) -> GraphResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(self.url(url));
        let mut pages = 0usize;

        while let Some(url) = next {
            let page: ODataResponse<T> = self.get_json(&url, token).await?;
            pages += 1;
            items.extend(page.value);
            next = page.next_link;
        }

        debug!(pages, items = items.len(), "fetched collection");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_url_resolution() {
        let client = GraphClient::new("https://graph.example/v1.0/", 999).unwrap();
        assert_eq!(client.url("/users"), "https://graph.example/v1.0/users");
        assert_eq!(client.url("https://other/next"), "https://other/next");
    }

    #[tokio::test]
    async fn test_fetch_all_pages_follows_next_link() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"id": "c"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/items"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"id": "a"}, {"id": "b"}],
                "@odata.nextLink": format!("{}/items?page=2", server.uri())
            })))
            .mount(&server)
            .await;

        let client = GraphClient::new(server.uri(), 999).unwrap();
        let items: Vec<serde_json::Value> = client.fetch_all_pages("items", "tok").await.unwrap();
        let ids: Vec<_> = items.iter().map(|v| v["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fetch_all_pages_reports_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Authorization_RequestDenied"))
            .mount(&server)
            .await;

        let client = GraphClient::new(server.uri(), 999).unwrap();
        let err = client
            .fetch_all_pages::<serde_json::Value>("items", "tok")
            .await
            .unwrap_err();

        match err {
            GraphError::Status { status, ref body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "Authorization_RequestDenied");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("403"));
    }
}
