//! Tenant-wide lookups: subscribed SKUs and activated directory roles
//!
//! Both maps are fetched once per client and never invalidated.

use super::client::{GraphClient, GraphResult, NameMap};
use crate::models::{DirectoryRole, ODataResponse, SubscribedSku};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

impl GraphClient {
    /// Map of SKU id to part number; errors propagate and are not cached
    pub async fn load_subscribed_skus(&self, token: &str) -> GraphResult<NameMap> {
        if let Some(map) = self.sku_cache.read().await.as_ref() {
            debug!("using cached subscribed SKUs");
            return Ok(map.clone());
        }

        let response: ODataResponse<SubscribedSku> =
            self.get_json(&self.url("subscribedSkus"), token).await?;

        let map: HashMap<String, String> = response
            .value
            .into_iter()
            .map(|sku| {
                let name = sku
                    .sku_part_number
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| sku.sku_id.clone());
                (sku.sku_id, name)
            })
            .collect();

        let map = Arc::new(map);
        *self.sku_cache.write().await = Some(map.clone());
        Ok(map)
    }

    /// Map of role object id to display name
    ///
    /// Roles are best-effort enrichment: any failure yields (and caches) an
    /// empty map.
    pub async fn load_directory_roles(&self, token: &str) -> NameMap {
        if let Some(map) = self.role_cache.read().await.as_ref() {
            debug!("using cached directory roles");
            return map.clone();
        }

        let url = self.url("directoryRoles?$select=id,displayName");
        let map = match self.get_json::<ODataResponse<DirectoryRole>>(&url, token).await {
            Ok(response) => response
                .value
                .into_iter()
                .map(|role| {
                    let name = role.display_name.unwrap_or_else(|| role.id.clone());
                    (role.id, name)
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to load directory roles, continuing without names");
                HashMap::new()
            }
        };

        let map = Arc::new(map);
        *self.role_cache.write().await = Some(map.clone());
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::GraphError;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_skus_are_fetched_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscribedSkus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"skuId": "s1", "skuPartNumber": "ENTERPRISEPACK"},
                    {"skuId": "s2"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GraphClient::new(server.uri(), 999).unwrap();
        let first = client.load_subscribed_skus("tok").await.unwrap();
        let second = client.load_subscribed_skus("tok").await.unwrap();

        assert_eq!(first.get("s1").map(String::as_str), Some("ENTERPRISEPACK"));
        assert_eq!(first.get("s2").map(String::as_str), Some("s2"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_sku_failure_propagates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscribedSkus"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GraphClient::new(server.uri(), 999).unwrap();
        let err = client.load_subscribed_skus("tok").await.unwrap_err();
        assert!(matches!(err, GraphError::Status { .. }));
    }

    #[tokio::test]
    async fn test_roles_failure_degrades_to_empty_map() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/directoryRoles"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let client = GraphClient::new(server.uri(), 999).unwrap();
        assert!(client.load_directory_roles("tok").await.is_empty());
        // cached, no second request
        assert!(client.load_directory_roles("tok").await.is_empty());
    }

    #[tokio::test]
    async fn test_roles_map_names() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/directoryRoles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"id": "r1", "displayName": "Global Administrator"},
                    {"id": "r2"}
                ]
            })))
            .mount(&server)
            .await;

        let client = GraphClient::new(server.uri(), 999).unwrap();
        let roles = client.load_directory_roles("tok").await;
        assert_eq!(roles.get("r1").map(String::as_str), Some("Global Administrator"));
        assert_eq!(roles.get("r2").map(String::as_str), Some("r2"));
    }
}
