use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::provider::openweather::DEFAULT_BASE_URL;

/// Who may call the gate and how often.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Allow-list of caller credentials.
    pub api_keys: Vec<String>,
    pub requests_per_hour: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self { api_keys: Vec::new(), requests_per_hour: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum age of a stored observation served without an upstream call.
    pub freshness_minutes: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { freshness_minutes: 60 }
    }
}

impl CacheConfig {
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.freshness_minutes))
    }
}

/// Upstream provider settings (OpenWeatherMap).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub units: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            units: "metric".to_string(),
            connect_timeout_secs: 10,
            timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store file; defaults to `store.json` in the platform data directory.
    pub path: Option<PathBuf>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [access]
/// api_keys = ["K1"]
/// requests_per_hour = 100
///
/// [provider]
/// api_key = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub access: AccessConfig,
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load config from the default location, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-task", "weather-gate")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the store file: the configured one, or the platform data dir.
    pub fn store_file_path(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("store.json")),
        }
    }

    /// Adds a caller credential to the allow-list. Returns false if already present.
    pub fn add_access_key(&mut self, key: String) -> bool {
        if key.is_empty() || self.access.api_keys.contains(&key) {
            return false;
        }
        self.access.api_keys.push(key);
        true
    }

    /// Removes a caller credential. Returns false if it was not listed.
    pub fn remove_access_key(&mut self, key: &str) -> bool {
        let before = self.access.api_keys.len();
        self.access.api_keys.retain(|k| k != key);
        before != self.access.api_keys.len()
    }

    pub fn set_provider_api_key(&mut self, api_key: String) {
        self.provider.api_key = Some(api_key);
    }

    /// Returns the upstream API key, if present and non-blank.
    pub fn provider_api_key(&self) -> Option<&str> {
        self.provider.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn is_provider_configured(&self) -> bool {
        self.provider_api_key().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();

        assert_eq!(cfg.access.requests_per_hour, 100);
        assert_eq!(cfg.cache.freshness_window(), chrono::Duration::hours(1));
        assert_eq!(cfg.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.provider.timeout(), Duration::from_secs(30));
        assert!(!cfg.is_provider_configured());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [access]
            api_keys = ["K1", "K2"]

            [provider]
            api_key = "OPEN_KEY"
            "#,
        )
        .expect("valid config");

        assert_eq!(cfg.access.api_keys, ["K1", "K2"]);
        assert_eq!(cfg.access.requests_per_hour, 100);
        assert_eq!(cfg.cache.freshness_minutes, 60);
        assert_eq!(cfg.provider_api_key(), Some("OPEN_KEY"));
        assert_eq!(cfg.provider.units, "metric");
    }

    #[test]
    fn blank_provider_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.set_provider_api_key("  ".into());
        assert!(!cfg.is_provider_configured());
    }

    #[test]
    fn add_access_key_ignores_duplicates_and_empty() {
        let mut cfg = Config::default();

        assert!(cfg.add_access_key("K1".into()));
        assert!(!cfg.add_access_key("K1".into()));
        assert!(!cfg.add_access_key(String::new()));
        assert_eq!(cfg.access.api_keys, ["K1"]);

        assert!(cfg.remove_access_key("K1"));
        assert!(!cfg.remove_access_key("K1"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.toml");

        let mut cfg = Config::default();
        cfg.add_access_key("K1".into());
        cfg.access.requests_per_hour = 5;
        cfg.storage.path = Some(dir.path().join("store.json"));
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.access.api_keys, ["K1"]);
        assert_eq!(loaded.access.requests_per_hour, 5);
        assert_eq!(loaded.store_file_path().unwrap(), dir.path().join("store.json"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.access.api_keys.is_empty());
    }
}
