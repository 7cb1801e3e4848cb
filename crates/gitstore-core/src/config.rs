//! Store configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/gitstore/config.toml)
//! 3. Environment variables (GITSTORE_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::identity::ServerHost;
use crate::lock::{RetryPolicy, DEFAULT_LOCK_ATTEMPTS, DEFAULT_LOCK_BACKOFF};

/// Environment variable prefix
const ENV_PREFIX: &str = "GITSTORE";

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding the bags and the git repository
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,

    /// Public address of the serving host, used in commit identities
    #[serde(default)]
    pub server_host: ServerHost,

    /// Committer name for every commit the store makes
    #[serde(default = "default_system_name")]
    pub system_name: String,

    /// Total attempts to take a tiddler's write lock
    #[serde(default = "default_lock_attempts")]
    pub lock_attempts: u32,

    /// Pause between lock attempts, in milliseconds
    #[serde(default = "default_lock_backoff_ms")]
    pub lock_backoff_ms: u64,

    /// Log file path (optional; logs go to stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            server_host: ServerHost::default(),
            system_name: default_system_name(),
            lock_attempts: default_lock_attempts(),
            lock_backoff_ms: default_lock_backoff_ms(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (GITSTORE_STORE_ROOT, GITSTORE_HOST, GITSTORE_PORT, GITSTORE_SYSTEM_NAME)
    /// 2. Config file (~/.config/gitstore/config.toml or GITSTORE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.ensure_store_root()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // GITSTORE_STORE_ROOT
        if let Ok(val) = std::env::var(format!("{}_STORE_ROOT", ENV_PREFIX)) {
            self.store_root = PathBuf::from(val);
        }

        // GITSTORE_HOST
        if let Ok(val) = std::env::var(format!("{}_HOST", ENV_PREFIX)) {
            self.server_host.host = val;
        }

        // GITSTORE_PORT
        if let Ok(val) = std::env::var(format!("{}_PORT", ENV_PREFIX)) {
            self.server_host.port = val
                .parse()
                .with_context(|| format!("Invalid {}_PORT: {:?}", ENV_PREFIX, val))?;
        }

        // GITSTORE_SYSTEM_NAME
        if let Ok(val) = std::env::var(format!("{}_SYSTEM_NAME", ENV_PREFIX)) {
            if !val.is_empty() {
                self.system_name = val;
            }
        }

        Ok(())
    }

    /// Ensure the store root exists
    fn ensure_store_root(&self) -> Result<()> {
        if !self.store_root.exists() {
            std::fs::create_dir_all(&self.store_root).with_context(|| {
                format!("Failed to create store root: {:?}", self.store_root)
            })?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with GITSTORE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gitstore")
            .join("config.toml")
    }

    /// Lock retry settings derived from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.lock_attempts,
            backoff: Duration::from_millis(self.lock_backoff_ms),
        }
    }
}

/// Get the default store root
fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gitstore")
}

fn default_system_name() -> String {
    "tiddlyweb".to_string()
}

fn default_lock_attempts() -> u32 {
    DEFAULT_LOCK_ATTEMPTS
}

fn default_lock_backoff_ms() -> u64 {
    DEFAULT_LOCK_BACKOFF.as_millis() as u64
}
