//! OData response wrapper

use serde::Deserialize;

/// Generic OData page with value array and continuation link
#[derive(Debug, Deserialize)]
pub struct ODataResponse<T> {
    #[serde(rename = "value", default = "Vec::new")]
    pub value: Vec<T>,

    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_value_is_empty_page() {
        let page: ODataResponse<serde_json::Value> = serde_json::from_str("{}").unwrap();
        assert!(page.value.is_empty());
        assert!(page.next_link.is_none());
    }

    #[test]
    fn test_next_link_is_read() {
        let page: ODataResponse<serde_json::Value> = serde_json::from_str(
            r#"{"value":[{"id":"1"}],"@odata.nextLink":"https://graph/next"}"#,
        )
        .unwrap();
        assert_eq!(page.value.len(), 1);
        assert_eq!(page.next_link.as_deref(), Some("https://graph/next"));
    }
}
