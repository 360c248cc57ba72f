//! Detail view: per-user enrichment with groups, licenses and roles

use crate::api::{GraphClient, GraphResult};
use crate::models::{DirectoryObject, LicenseDetail, User, UserField};
use std::collections::HashMap;
use tracing::{debug, warn};

/// A chip in one of the group sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub is_role: bool,
}

/// memberOf entries sorted into the four display sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupBuckets {
    pub security: Vec<GroupEntry>,
    pub microsoft_365: Vec<GroupEntry>,
    pub distribution: Vec<GroupEntry>,
    pub other: Vec<GroupEntry>,
}

impl GroupBuckets {
    /// Non-empty sections with their headings, in display order
    pub fn sections(&self) -> Vec<(&'static str, &[GroupEntry])> {
        [
            ("Security Groups", self.security.as_slice()),
            ("Microsoft 365 Groups", self.microsoft_365.as_slice()),
            ("Distribution", self.distribution.as_slice()),
            ("Other", self.other.as_slice()),
        ]
        .into_iter()
        .filter(|(_, entries)| !entries.is_empty())
        .collect()
    }
}

/// Sort memberOf entries into sections
///
/// Directory roles and non-group objects land in "other"; groups go to the
/// first matching of security, Microsoft 365 (unified or mail-enabled),
/// distribution (neither security nor mail enabled), other.
pub fn categorize_groups(entries: &[DirectoryObject]) -> GroupBuckets {
    let mut buckets = GroupBuckets::default();

    for entry in entries {
        let is_role = entry.is_directory_role();
        let chip = GroupEntry {
            name: entry.get_display_name(),
            is_role,
        };

        if is_role || entry.is_non_group() {
            buckets.other.push(chip);
            continue;
        }

        let security = entry.security_enabled.unwrap_or(false);
        let mail = entry.mail_enabled.unwrap_or(false);

        if security {
            buckets.security.push(chip);
        } else if entry.is_unified() || mail {
            buckets.microsoft_365.push(chip);
        } else if !security && !mail {
            buckets.distribution.push(chip);
        } else {
            buckets.other.push(chip);
        }
    }

    buckets
}

/// A license resolved to its friendly name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseEntry {
    pub name: String,
    pub sku_id: String,
}

/// Friendly name: SKU map, then the record's part number, then the raw id
pub fn resolve_licenses(
    licenses: &[LicenseDetail],
    skus: &HashMap<String, String>,
) -> Vec<LicenseEntry> {
    licenses
        .iter()
        .map(|license| {
            let sku_id = license.sku_id.clone().unwrap_or_default();
            let name = skus
                .get(&sku_id)
                .filter(|n| !n.is_empty())
                .cloned()
                .or_else(|| license.sku_part_number.clone().filter(|p| !p.is_empty()))
                .unwrap_or_else(|| sku_id.clone());
            LicenseEntry { name, sku_id }
        })
        .collect()
}

/// Names of the directory roles among memberOf entries
pub fn resolve_roles(entries: &[DirectoryObject], roles: &HashMap<String, String>) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.is_directory_role())
        .map(|e| {
            e.id.as_ref()
                .and_then(|id| roles.get(id))
                .cloned()
                .unwrap_or_else(|| e.get_display_name())
        })
        .collect()
}

/// Everything the detail panel shows for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailModel {
    pub user_id: String,
    pub title: String,
    pub subtitle: String,
    pub basic: Vec<(&'static str, String)>,
    pub groups: GroupBuckets,
    pub licenses: Vec<LicenseEntry>,
    pub roles: Vec<String>,
}

impl DetailModel {
    /// Panel built from locally known fields only, with empty sections
    pub fn basic(user: &User) -> Self {
        Self {
            user_id: user.object_id().to_string(),
            title: user.title(),
            subtitle: user.subtitle(),
            basic: UserField::ALL
                .iter()
                .map(|f| (f.label(), f.text(user)))
                .collect(),
            groups: GroupBuckets::default(),
            licenses: Vec::new(),
            roles: Vec::new(),
        }
    }
}

/// State of the detail drawer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailPanel {
    Loading { user_id: String, title: String },
    Ready(Box<DetailModel>),
}

impl DetailPanel {
    pub fn loading(user: &User) -> Self {
        Self::Loading {
            user_id: user.object_id().to_string(),
            title: user.title(),
        }
    }
}

async fn enrich(graph: &GraphClient, user: &User, token: &str) -> GraphResult<DetailModel> {
    let user_id = user.object_id();
    let (groups, licenses) = tokio::try_join!(
        graph.load_user_groups(user_id, token),
        graph.load_user_licenses(user_id, token),
    )?;
    let roles = graph.load_directory_roles(token).await;
    let skus = graph.load_subscribed_skus(token).await?;

    debug!(
        user_id,
        groups = groups.len(),
        licenses = licenses.len(),
        "loaded user detail"
    );

    Ok(DetailModel {
        groups: categorize_groups(&groups),
        licenses: resolve_licenses(&licenses, &skus),
        roles: resolve_roles(&groups, &roles),
        ..DetailModel::basic(user)
    })
}

/// Load the enriched panel; any failure falls back to basic fields
pub async fn fetch_detail(graph: &GraphClient, user: &User, token: Option<&str>) -> DetailModel {
    let Some(token) = token else {
        warn!(user_id = user.object_id(), "no access token, showing basic details");
        return DetailModel::basic(user);
    };

    match enrich(graph, user, token).await {
        Ok(model) => model,
        Err(e) => {
            warn!(user_id = user.object_id(), error = %e, "failed to load user detail");
            DetailModel::basic(user)
        }
    }
}
