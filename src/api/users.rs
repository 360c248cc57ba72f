//! User collection and per-user membership/license endpoints

use super::client::{GraphClient, GraphResult};
use crate::models::{DirectoryObject, LicenseDetail, User, UserField};

impl GraphClient {
    /// Get every user of the tenant with all table fields selected
    pub async fn list_users(&self, token: &str) -> GraphResult<Vec<User>> {
        let endpoint = format!(
            "users?$select={}&$top={}",
            UserField::select_list(),
            self.page_size()
        );
        self.fetch_all_pages(&endpoint, token).await
    }

    /// Get groups and directory roles the user is a direct member of
    pub async fn load_user_groups(
        &self,
        user_id: &str,
        token: &str,
    ) -> GraphResult<Vec<DirectoryObject>> {
        let endpoint = format!(
            "users/{}/memberOf?$select=id,displayName,groupTypes,mailEnabled,securityEnabled",
            urlencoding::encode(user_id)
        );
        self.fetch_all_pages(&endpoint, token).await
    }

    /// Get license assignments of a user
    pub async fn load_user_licenses(
        &self,
        user_id: &str,
        token: &str,
    ) -> GraphResult<Vec<LicenseDetail>> {
        let endpoint = format!("users/{}/licenseDetails", urlencoding::encode(user_id));
        self.fetch_all_pages(&endpoint, token).await
    }
}
