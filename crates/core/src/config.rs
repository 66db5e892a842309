//! Fleet Configuration
//!
//! Boot-wait schedule and cleanup registry location, stored as TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FleetError, Result};
use crate::retry::{Backoff, RetryPolicy};

/// Boot-wait polling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootWaitConfig {
    /// Number of status polls before giving up
    pub attempts: u32,
    /// Delay between polls in milliseconds
    pub interval_ms: u64,
    /// Delay growth between polls
    pub backoff: Backoff,
}

impl Default for BootWaitConfig {
    fn default() -> Self {
        Self {
            attempts: RetryPolicy::BOOT_WAIT_ATTEMPTS,
            interval_ms: RetryPolicy::BOOT_WAIT_INTERVAL.as_millis() as u64,
            backoff: Backoff::None,
        }
    }
}

impl From<&BootWaitConfig> for RetryPolicy {
    fn from(config: &BootWaitConfig) -> Self {
        RetryPolicy {
            attempts: config.attempts,
            interval: Duration::from_millis(config.interval_ms),
            backoff: config.backoff,
        }
    }
}

/// Cleanup registry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Registry file; defaults to the data directory
    pub registry_file: Option<PathBuf>,
}

/// Main fleet configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Configuration version for migrations
    pub version: u32,
    pub boot_wait: BootWaitConfig,
    pub cleanup: CleanupConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            version: 1,
            boot_wait: BootWaitConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl FleetConfig {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("dev", "droidfleet", "droid-fleet")
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Load configuration from the default location
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| FleetError::Config("Cannot determine config path".into()))?;
        Self::load_from(&config_file).await
    }

    /// Load configuration from file, falling back to defaults when it is missing
    pub async fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = tokio::fs::read_to_string(path).await?;
            toml::from_str::<FleetConfig>(&contents)?
        } else {
            info!("Config file {:?} not found, using defaults", path);
            FleetConfig::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.boot_wait.attempts == 0 {
            return Err(FleetError::Config("boot_wait.attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Boot-wait schedule
    pub fn boot_wait_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.boot_wait)
    }

    /// Resolve the cleanup registry file
    pub fn cleanup_registry_file(&self) -> Result<PathBuf> {
        match &self.cleanup.registry_file {
            Some(path) => Ok(path.clone()),
            None => Self::data_dir()
                .map(|dir| dir.join("cleanup-registry.json"))
                .ok_or_else(|| FleetError::Config("Cannot determine data directory".into())),
        }
    }
}
