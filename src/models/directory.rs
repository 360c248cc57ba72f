//! Group membership, license and directory role models

use serde::Deserialize;

/// An entry of `/users/{id}/memberOf`: a group, a directory role or
/// another directory object
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryObject {
    #[serde(rename = "@odata.type")]
    pub odata_type: Option<String>,

    pub id: Option<String>,

    pub display_name: Option<String>,

    #[serde(default)]
    pub group_types: Option<Vec<String>>,

    pub mail_enabled: Option<bool>,

    pub security_enabled: Option<bool>,
}

impl DirectoryObject {
    pub fn is_directory_role(&self) -> bool {
        self.odata_type
            .as_deref()
            .map(|t| t.contains("directoryRole"))
            .unwrap_or(false)
    }

    /// True when the type marker names something other than a group
    pub fn is_non_group(&self) -> bool {
        match self.odata_type.as_deref() {
            Some(t) if !t.is_empty() => !t.contains("group"),
            _ => false,
        }
    }

    pub fn is_unified(&self) -> bool {
        self.group_types
            .as_ref()
            .map(|types| types.iter().any(|t| t == "Unified"))
            .unwrap_or(false)
    }

    /// Name shown on a chip
    pub fn get_display_name(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| "Unnamed".to_string())
    }
}

/// An entry of `/users/{id}/licenseDetails`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseDetail {
    pub sku_id: Option<String>,
    pub sku_part_number: Option<String>,
}

/// An entry of `/subscribedSkus`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedSku {
    pub sku_id: String,
    pub sku_part_number: Option<String>,
}

/// An entry of `/directoryRoles`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRole {
    pub id: String,
    pub display_name: Option<String>,
}
