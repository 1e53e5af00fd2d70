//! CLI subcommands
//!
//! Each command is a clap `Args` struct with an async `execute`. Shared
//! wiring (config discovery, adapter construction) lives here.

pub mod create;
pub mod download;
pub mod remove;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use terrasync_core::config::Config;
use terrasync_history::HistoryClient;
use terrasync_store::ContentStore;
use terrasync_sync::{LocalFileSystem, SyncOrchestrator};
use tracing::debug;

/// Environment variable holding the bearer token for the remote service
pub const TOKEN_ENV: &str = "TERRASYNC_TOKEN";

/// Default config location: `$XDG_CONFIG_HOME/terrasync/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("terrasync")
        .join("config.yaml")
}

/// Load config from the given path, or the default path, falling back to
/// built-in defaults when no file exists
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.map_or_else(default_config_path, Path::to_path_buf);
    if path.exists() {
        debug!(path = %path.display(), "loading configuration");
        Config::load(&path)
    } else {
        debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

/// Wire up the orchestrator with the HTTP remote, content store and
/// local filesystem adapters
pub fn build_orchestrator(config: &Config) -> Result<SyncOrchestrator> {
    let token = std::env::var(TOKEN_ENV).with_context(|| {
        format!("{TOKEN_ENV} is not set; export an access token for {}", config.server.url)
    })?;
    let remote = HistoryClient::new(&config.server.url, token, &config.server.author)?;
    Ok(SyncOrchestrator::new(
        Arc::new(remote),
        Arc::new(ContentStore::new()),
        Arc::new(LocalFileSystem::new()),
        config,
    ))
}
