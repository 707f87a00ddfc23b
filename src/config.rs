use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{JournalError, Result};

pub const CONFIG_VERSION: u32 = 1;
pub const APP_DIR: &str = "weekly-journal";

pub const BACKEND_URL_ENV: &str = "JOURNAL_BACKEND_URL";
pub const ANON_KEY_ENV: &str = "JOURNAL_ANON_KEY";

/// Settings file `config.json`; every field is optional on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub config_version: u32,
    /// Hosted backend base URL; remote sync is off without it
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    /// SQLite file holding the local journal cache
    pub cache_path: Option<PathBuf>,
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
    pub sync_debounce_ms: u64,
    pub storage_poll_interval_ms: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            backend_url: None,
            anon_key: None,
            cache_path: None,
            idle_timeout_secs: 30 * 60,
            idle_check_interval_secs: 30,
            sync_debounce_ms: 800,
            storage_poll_interval_ms: 500,
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| JournalError::ConfigError("no config directory found".to_string()))?;
    Ok(base.join(APP_DIR))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

pub fn default_cache_path() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| JournalError::ConfigError("no data directory found".to_string()))?;
    Ok(base.join(APP_DIR).join("journal.db"))
}

impl JournalConfig {
    /// Read `path`; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: JournalConfig = serde_json::from_str(&contents)
            .map_err(|e| JournalError::ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;

        if config.config_version > CONFIG_VERSION {
            return Err(JournalError::ConfigError(format!(
                "config_version {} is newer than this build supports ({})",
                config.config_version, CONFIG_VERSION
            )));
        }
        Ok(config)
    }

    /// Default location, with environment overrides applied
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&default_config_path()?)?;
        Ok(config.with_overrides(|name| std::env::var(name).ok()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut stamped = self.clone();
        stamped.config_version = CONFIG_VERSION;

        let json = serde_json::to_string_pretty(&stamped)
            .map_err(|e| JournalError::ConfigError(e.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json.as_bytes())?;
        std::fs::rename(&tmp_path, path)?;

        log::info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Apply `JOURNAL_BACKEND_URL` / `JOURNAL_ANON_KEY` as returned by `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|v| !v.is_empty()) {
            self.backend_url = Some(url);
        }
        if let Some(key) = lookup(ANON_KEY_ENV).filter(|v| !v.is_empty()) {
            self.anon_key = Some(key);
        }
        self
    }

    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache_path {
            Some(path) => Ok(path.clone()),
            None => default_cache_path(),
        }
    }

    /// Backend URL and key, when both are configured
    pub fn backend(&self) -> Option<(&str, &str)> {
        match (&self.backend_url, &self.anon_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_interval_secs.max(1))
    }

    pub fn sync_debounce(&self) -> Duration {
        Duration::from_millis(self.sync_debounce_ms)
    }

    pub fn storage_poll_interval(&self) -> Duration {
        Duration::from_millis(self.storage_poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = JournalConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, JournalConfig::default());
        assert_eq!(config.idle_timeout(), Duration::from_secs(1800));
        assert_eq!(config.sync_debounce(), Duration::from_millis(800));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"idle_timeout_secs": 600, "backend_url": "https://db.example.com"}"#).unwrap();

        let config = JournalConfig::load_from(&path).unwrap();
        assert_eq!(config.idle_timeout_secs, 600);
        assert_eq!(config.backend_url.as_deref(), Some("https://db.example.com"));
        assert_eq!(config.storage_poll_interval_ms, 500);
        assert!(config.backend().is_none());
    }

    #[test]
    fn test_session_timings_come_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"idle_timeout_secs": 120, "idle_check_interval_secs": 0, "storage_poll_interval_ms": 250}"#,
        )
        .unwrap();

        let config = JournalConfig::load_from(&path).unwrap();
        assert_eq!(config.idle_timeout(), Duration::from_secs(120));
        assert_eq!(config.idle_check_interval(), Duration::from_secs(1));
        assert_eq!(config.storage_poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"config_version": 99}"#).unwrap();

        assert!(matches!(JournalConfig::load_from(&path), Err(JournalError::ConfigError(_))));
    }

    #[test]
    fn test_environment_overrides_file() {
        let config = JournalConfig {
            backend_url: Some("https://file.example.com".to_string()),
            ..Default::default()
        }
        .with_overrides(|name| match name {
            BACKEND_URL_ENV => Some("https://env.example.com".to_string()),
            ANON_KEY_ENV => Some("anon".to_string()),
            _ => None,
        });

        assert_eq!(config.backend(), Some(("https://env.example.com", "anon")));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = JournalConfig {
            cache_path: Some(dir.path().join("journal.db")),
            sync_debounce_ms: 250,
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(JournalConfig::load_from(&path).unwrap(), config);
    }
}
