//! Configuration module for terrasync.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, and defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration for terrasync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub transfer: TransferConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Remote service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the remote service.
    pub url: String,
    /// Display name recorded as the author of pushed versions.
    pub author: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "https://app.terrasync.dev".to_string(),
            author: String::new(),
        }
    }
}

/// File transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Maximum concurrent file downloads/uploads within one sync.
    pub concurrency: usize,
    /// Maximum retries for transient network failures.
    pub network_retries: u32,
    /// Base delay in seconds for exponential backoff.
    pub backoff_base_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            network_retries: 5,
            backoff_base_secs: 1,
        }
    }
}

/// Sync protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How many times push may loop back to pull after `VersionOutdated`
    /// before surfacing `Contention`.
    pub contention_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            contention_retries: 3,
        }
    }
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a YAML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_yaml::to_string(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check invariants the rest of the system relies on
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.url.is_empty() {
            anyhow::bail!("server.url must not be empty");
        }
        if self.transfer.concurrency == 0 {
            anyhow::bail!("transfer.concurrency must be at least 1");
        }
        if self.sync.contention_retries == 0 {
            anyhow::bail!("sync.contention_retries must be at least 1");
        }
        Ok(())
    }
}
