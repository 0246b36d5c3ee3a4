//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! backend base URL, request timeout, where the session credential is kept,
//! and the last username used to log in.
//!
//! Configuration is stored at `~/.config/techtalk/config.json`. The
//! `TECHTALK_API_URL` and `TECHTALK_CREDENTIAL_BACKEND` environment variables
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/data directory paths
const APP_NAME: &str = "techtalk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend origin used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_API_URL: &str = "TECHTALK_API_URL";
const ENV_CREDENTIAL_BACKEND: &str = "TECHTALK_CREDENTIAL_BACKEND";

/// Where the bearer credential is persisted between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// OS keychain
    Keyring,
    /// JSON file in the local data directory
    #[default]
    File,
    /// Not persisted; gone when the process exits
    Memory,
}

impl std::str::FromStr for CredentialBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyring" => Ok(CredentialBackend::Keyring),
            "file" => Ok(CredentialBackend::File),
            "memory" => Ok(CredentialBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown credential backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::default(),
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Record the last username in the config file. Only that field changes;
    /// environment and command line overrides held in memory are not written.
    pub fn remember_username(username: &str) -> Result<()> {
        Self::remember_username_at(&Self::config_path()?, username)
    }

    pub fn remember_username_at(path: &Path, username: &str) -> Result<()> {
        let mut on_disk = Self::load_from(path)?;
        on_disk.last_username = Some(username.to_string());
        on_disk.save_to(path)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_url = url.trim().to_string();
            }
        }
        if let Ok(backend) = std::env::var(ENV_CREDENTIAL_BACKEND) {
            match backend.parse() {
                Ok(backend) => self.credential_backend = backend,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_CREDENTIAL_BACKEND),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the file-backed credential
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find local data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.credential_backend, CredentialBackend::File);
    }

    #[test]
    fn test_save_and_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"api_url": "https://api.techtalk.dev", "credential_backend": "keyring"}"#).unwrap();
        let mut config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_url, "https://api.techtalk.dev");
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.request_timeout_secs, 30);

        config.last_username = Some("alice".to_string());
        config.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.last_username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_remember_username_keeps_overrides_out_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"request_timeout_secs": 10}"#).unwrap();

        // A one-off override, as from TECHTALK_API_URL or --api-url
        let mut running = Config::load_from(&path).unwrap();
        running.api_url = "http://staging.example".to_string();
        running.credential_backend = CredentialBackend::Memory;

        Config::remember_username_at(&path, "alice").unwrap();
        assert_eq!(running.api_url, "http://staging.example");

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.last_username.as_deref(), Some("alice"));
        assert_eq!(reloaded.api_url, DEFAULT_API_URL);
        assert_eq!(reloaded.credential_backend, CredentialBackend::File);
        assert_eq!(reloaded.request_timeout_secs, 10);
    }

    #[test]
    fn test_remember_username_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("techtalk").join("config.json");

        Config::remember_username_at(&path, "bob").unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.last_username.as_deref(), Some("bob"));
        assert_eq!(reloaded.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_credential_backend_from_str() {
        assert_eq!("Keyring".parse::<CredentialBackend>().unwrap(), CredentialBackend::Keyring);
        assert_eq!(" memory ".parse::<CredentialBackend>().unwrap(), CredentialBackend::Memory);
        assert!("vault".parse::<CredentialBackend>().is_err());
    }
}
