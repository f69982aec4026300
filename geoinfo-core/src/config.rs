use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{fetch::DEFAULT_REQUEST_TIMEOUT, provider::ProviderId};

pub const DEFAULT_BASE_CURRENCY: &str = "RUB";
pub const DEFAULT_NEWS_COUNT: usize = 3;

/// Configuration for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Overrides the provider's default endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Overrides how long a cached payload is served without refetching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), base_url: None, cache_ttl_secs: None }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Currency the exchange rates are quoted against, "RUB" if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_currency: Option<String>,

    /// Headlines collected per location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Per-request HTTP timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Example TOML:
    /// [providers.weather]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    pub fn base_currency(&self) -> String {
        self.base_currency
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BASE_CURRENCY)
            .to_ascii_uppercase()
    }

    pub fn news_count(&self) -> usize {
        self.news_count.unwrap_or(DEFAULT_NEWS_COUNT).max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs.map(Duration::from_secs).unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, id: ProviderId) -> Option<&str> {
        self.provider_config(id).map(|cfg| cfg.api_key.as_str())
    }

    /// API key for a provider, or an error telling the user how to add one.
    pub fn require_api_key(&self, id: ProviderId) -> Result<&str> {
        self.provider_api_key(id).ok_or_else(|| {
            anyhow!(
                "No API key configured for provider '{id}'.\n\
                 Hint: run `geoinfo configure {id}` and enter your API key."
            )
        })
    }

    pub fn is_provider_configured(&self, id: ProviderId) -> bool {
        self.provider_api_key(id).is_some()
    }

    /// Set/replace a provider API key, keeping any other overrides.
    pub fn upsert_provider_api_key(&mut self, id: ProviderId, api_key: String) {
        self.providers
            .entry(id.as_str().to_string())
            .and_modify(|cfg| cfg.api_key = api_key.clone())
            .or_insert_with(|| ProviderConfig::new(api_key));
    }

    pub fn base_url(&self, id: ProviderId) -> String {
        self.provider_config(id)
            .and_then(|cfg| cfg.base_url.clone())
            .unwrap_or_else(|| id.default_base_url().to_string())
    }

    pub fn cache_ttl(&self, id: ProviderId) -> Duration {
        self.provider_config(id)
            .and_then(|cfg| cfg.cache_ttl_secs)
            .map(Duration::from_secs)
            .unwrap_or_else(|| id.default_ttl())
    }

    /// Configured cache directory, or the platform cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.cache_dir().to_path_buf()),
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid configuration TOML")
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "geoinfo", "geoinfo-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::default();

        assert_eq!(cfg.base_currency(), "RUB");
        assert_eq!(cfg.news_count(), DEFAULT_NEWS_COUNT);
        assert_eq!(cfg.base_url(ProviderId::Weather), ProviderId::Weather.default_base_url());
        assert_eq!(cfg.cache_ttl(ProviderId::Weather), Duration::ZERO);
        assert_eq!(cfg.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn require_api_key_errors_with_hint() {
        let cfg = Config::default();
        let err = cfg.require_api_key(ProviderId::News).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No API key configured for provider 'news'"));
        assert!(msg.contains("Hint: run `geoinfo configure news`"));
    }

    #[test]
    fn upsert_sets_and_replaces_key_without_dropping_overrides() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Currency, "OLD".into());
        cfg.providers.get_mut("currency").unwrap().cache_ttl_secs = Some(60);

        cfg.upsert_provider_api_key(ProviderId::Currency, "NEW".into());

        assert_eq!(cfg.provider_api_key(ProviderId::Currency), Some("NEW"));
        assert_eq!(cfg.cache_ttl(ProviderId::Currency), Duration::from_secs(60));
        assert!(cfg.is_provider_configured(ProviderId::Currency));
        assert!(!cfg.is_provider_configured(ProviderId::Country));
    }

    #[test]
    fn parses_full_toml() {
        let cfg = Config::from_toml(
            r#"
            base_currency = "usd"
            news_count = 0
            cache_dir = "/var/cache/geoinfo"
            request_timeout_secs = 3

            [providers.weather]
            api_key = "OW"
            base_url = "http://localhost:9000"

            [providers.news]
            api_key = "NEWS"
            cache_ttl_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(cfg.base_currency(), "USD");
        assert_eq!(cfg.news_count(), 1);
        assert_eq!(cfg.cache_dir().unwrap(), PathBuf::from("/var/cache/geoinfo"));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.base_url(ProviderId::Weather), "http://localhost:9000");
        assert_eq!(cfg.cache_ttl(ProviderId::News), Duration::from_secs(120));
        assert_eq!(cfg.provider_api_key(ProviderId::Weather), Some("OW"));
    }

    #[test]
    fn serialized_config_round_trips() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Country, "KEY".into());

        let text = toml::to_string_pretty(&cfg).unwrap();
        let back = Config::from_toml(&text).unwrap();
        assert_eq!(back.provider_config(ProviderId::Country), Some(&ProviderConfig::new("KEY")));
    }
}
