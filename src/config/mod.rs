//! Configuration management for Triplog

pub mod schema;

pub use schema::Config;

use crate::error::{TriplogError, TriplogResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Overrides the state directory (cache, session, audit log)
pub const STATE_DIR_ENV: &str = "TRIPLOG_STATE_DIR";
/// Overrides `api.base_url`
pub const API_URL_ENV: &str = "TRIPLOG_API_URL";
/// Overrides `api.api_key`
pub const API_KEY_ENV: &str = "TRIPLOG_API_KEY";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("triplog")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("triplog")
    }

    /// Get the key-value store root
    pub fn store_dir() -> PathBuf {
        Self::state_dir().join("store")
    }

    /// Query cache cells and the version map
    pub fn cache_dir() -> PathBuf {
        Self::store_dir().join("cache")
    }

    /// Persisted session fields
    pub fn session_dir() -> PathBuf {
        Self::store_dir().join("session")
    }

    /// Get the audit log path
    pub fn audit_log_path() -> PathBuf {
        Self::state_dir().join("audit.log")
    }

    /// Load configuration, falling back to defaults if the file is missing.
    ///
    /// Environment overrides are applied on top.
    pub async fn load(&self) -> TriplogResult<Config> {
        let mut config = if self.config_path.exists() {
            self.load_from_file(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            Config::default()
        };
        apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> TriplogResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| TriplogError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| TriplogError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> TriplogResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                TriplogError::io(format!("creating directory {}", parent.display()), e)
            })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            TriplogError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure all state directories exist
    pub async fn ensure_state_dirs() -> TriplogResult<()> {
        for dir in [Self::state_dir(), Self::cache_dir(), Self::session_dir()] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                TriplogError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }

        // Session tokens live here
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(Self::session_dir(), perms)
                .map_err(|e| TriplogError::io("setting session dir permissions", e))?;
        }

        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `TRIPLOG_API_URL` and `TRIPLOG_API_KEY` when set and non-empty
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(url) = std::env::var(API_URL_ENV).ok().filter(|v| !v.is_empty()) {
        debug!("api.base_url overridden from {}", API_URL_ENV);
        config.api.base_url = url;
    }
    if let Some(key) = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty()) {
        debug!("api.api_key overridden from {}", API_KEY_ENV);
        config.api.api_key = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[tokio::test]
    #[serial]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.api.timeout_secs, 15);
    }

    #[tokio::test]
    #[serial]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.api.base_url = "https://trips.example.co".to_string();
        config.auth.refresh_threshold_secs = 120;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.api.base_url, "https://trips.example.co");
        assert_eq!(loaded.auth.refresh_threshold_secs, 120);
    }

    #[tokio::test]
    async fn invalid_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "[api\nbase_url = 1").await.unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, TriplogError::ConfigInvalid { .. }));
    }

    #[test]
    #[serial]
    fn env_overrides_file_values() {
        std::env::set_var(API_URL_ENV, "https://env.example.co");
        std::env::set_var(API_KEY_ENV, "");

        let mut config = Config::default();
        config.api.api_key = "from-file".to_string();
        apply_env_overrides(&mut config);

        std::env::remove_var(API_URL_ENV);
        std::env::remove_var(API_KEY_ENV);

        assert_eq!(config.api.base_url, "https://env.example.co");
        assert_eq!(config.api.api_key, "from-file");
    }

    #[test]
    #[serial]
    fn state_dir_env_override() {
        let temp = TempDir::new().unwrap();
        std::env::set_var(STATE_DIR_ENV, temp.path());

        assert_eq!(ConfigManager::state_dir(), temp.path());
        assert_eq!(
            ConfigManager::cache_dir(),
            temp.path().join("store").join("cache")
        );
        assert_eq!(ConfigManager::audit_log_path(), temp.path().join("audit.log"));

        std::env::remove_var(STATE_DIR_ENV);
    }
}
