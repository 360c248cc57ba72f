//! Configuration file and defaults

use crate::api::GRAPH_BASE_URL;
use crate::auth::GRAPH_SCOPES;
use crate::models::UserField;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default `$top` for the user collection
pub const DEFAULT_PAGE_SIZE: usize = 999;

/// Default Microsoft identity platform host
pub const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// How the operator signs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Device code sign-in against an app registration
    #[default]
    DeviceCode,
    /// Reuse the Azure CLI login
    AzureCli,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub scopes: Vec<String>,
    pub authority_host: String,
    pub graph_base_url: String,
    pub page_size: usize,
    pub auth_mode: AuthMode,
    pub default_columns: Vec<UserField>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            scopes: GRAPH_SCOPES.iter().map(|s| s.to_string()).collect(),
            authority_host: AUTHORITY_HOST.to_string(),
            graph_base_url: GRAPH_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            auth_mode: AuthMode::default(),
            default_columns: UserField::BASE.to_vec(),
        }
    }
}

impl Config {
    /// Load from `path`, or the default location; a missing file gives defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn config_dir() -> Result<PathBuf> {
        let mut path = dirs::config_dir().context("Could not find config directory")?;
        path.push("entrascope");
        Ok(path)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Token cache file, kept next to the config file
    pub fn token_cache_path(config_path: Option<&Path>) -> Result<PathBuf> {
        let dir = match config_path.and_then(Path::parent) {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => Self::config_dir()?,
        };
        Ok(dir.join("token_cache.json"))
    }

    /// Tenant and client id, required by the device code provider
    pub fn app_registration(&self) -> Result<(&str, &str)> {
        let tenant = self
            .tenant_id
            .as_deref()
            .filter(|t| !t.is_empty())
            .context("No tenant id configured (use --tenant or ENTRA_TENANT_ID)")?;
        let client = self
            .client_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .context("No client id configured (use --client-id or ENTRA_CLIENT_ID)")?;
        Ok((tenant, client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.page_size, 999);
        assert_eq!(config.scopes.len(), 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "tenant_id = \"contoso\"\nauth_mode = \"azure-cli\"\ndefault_columns = [\"displayName\", \"department\"]\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.tenant_id.as_deref(), Some("contoso"));
        assert_eq!(config.auth_mode, AuthMode::AzureCli);
        assert_eq!(
            config.default_columns,
            vec![UserField::DisplayName, UserField::Department]
        );
        assert_eq!(config.graph_base_url, GRAPH_BASE_URL);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let config = Config {
            client_id: Some("app".into()),
            page_size: 50,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_app_registration_requires_both_ids() {
        let mut config = Config {
            tenant_id: Some("t".into()),
            ..Default::default()
        };
        assert!(config.app_registration().is_err());
        config.client_id = Some("c".into());
        assert_eq!(config.app_registration().unwrap(), ("t", "c"));
    }

    #[test]
    fn test_token_cache_sits_next_to_config() {
        let path = Config::token_cache_path(Some(Path::new("/tmp/entra/config.toml"))).unwrap();
        assert_eq!(path, Path::new("/tmp/entra/token_cache.json"));
    }
}
