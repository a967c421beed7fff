//! User configuration settings
//!
//! Layered configuration: defaults → config file → environment (`FLOW_*`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the session store (defaults to the platform data dir)
    pub data_dir: Option<PathBuf>,

    /// Explicit path of the session store file
    pub sessions_file: Option<PathBuf>,

    /// Outcome recorded by `end` when none is given
    pub default_outcome: String,

    /// Timeout for git subprocesses in milliseconds
    pub git_timeout_ms: u64,

    /// Rows shown by `list` when no limit is given (0 = unlimited)
    pub list_limit: usize,

    /// Enable debug logging
    pub debug: bool,

    /// Log file path (if set, logs to file instead of stderr)
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            sessions_file: None,
            default_outcome: "completed".to_string(),
            git_timeout_ms: 5_000,
            list_limit: 20,
            debug: false,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from the default file and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load configuration layering `config_path` (if it exists) over defaults
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // FLOW_GIT_TIMEOUT_MS, FLOW_DATA_DIR, ...
            .merge(Env::prefixed("FLOW_"))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.data_dir().to_path_buf()),
        }
    }

    /// Get the session store path
    pub fn sessions_file_path(&self) -> Result<PathBuf> {
        match &self.sessions_file {
            Some(path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join("sessions.json")),
        }
    }

    /// Git subprocess timeout
    pub fn git_timeout(&self) -> Duration {
        Duration::from_millis(self.git_timeout_ms)
    }

    /// Ensure the data directory exists
    pub fn ensure_directories(&self) -> Result<()> {
        let data_dir = self.data_dir()?;
        std::fs::create_dir_all(&data_dir)
            .map_err(|_| Error::Config(ConfigError::DirectoryCreationFailed(data_dir)))?;
        Ok(())
    }

    /// Save current configuration to a specific file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|_e| {
                Error::Config(ConfigError::DirectoryCreationFailed(parent.to_path_buf()))
            })?;
        }

        let toml =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        std::fs::write(config_path, toml).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "flow-cli", "flow-cli").ok_or_else(|| {
            Error::Config(ConfigError::LoadFailed(
                "Could not determine home directory".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_outcome, "completed");
        assert_eq!(config.git_timeout(), Duration::from_secs(5));
        assert_eq!(config.list_limit, 20);
        assert!(!config.debug);
    }

    #[test]
    fn test_sessions_file_resolution() {
        let mut config = Config {
            data_dir: Some(PathBuf::from("/var/lib/flow")),
            ..Config::default()
        };
        assert_eq!(
            config.sessions_file_path().unwrap(),
            PathBuf::from("/var/lib/flow/sessions.json")
        );

        config.sessions_file = Some(PathBuf::from("/elsewhere/s.json"));
        assert_eq!(
            config.sessions_file_path().unwrap(),
            PathBuf::from("/elsewhere/s.json")
        );
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("config.toml");

        let config = Config {
            default_outcome: "shipped".to_string(),
            git_timeout_ms: 750,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.default_outcome, "shipped");
        assert_eq!(loaded.git_timeout_ms, 750);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.list_limit, Config::default().list_limit);
    }
}
