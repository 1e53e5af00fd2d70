//! Download command
//!
//! Clones the latest version of a remote project into a fresh directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use terrasync_core::config::Config;
use terrasync_core::domain::newtypes::ProjectRef;

use crate::commands::build_orchestrator;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Project to download, as `workspace/name`
    pub project: ProjectRef,

    /// Target directory (defaults to the project name)
    pub path: Option<PathBuf>,
}

impl DownloadCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let orchestrator = build_orchestrator(config)?;

        let root = self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.project.name()));
        let version = orchestrator.download(&self.project, &root).await?;

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "project": self.project,
                "path": root,
                "version": version,
            }));
        } else {
            formatter.success(&format!(
                "Downloaded {} at {} into '{}'",
                self.project,
                version,
                root.display()
            ));
        }
        Ok(())
    }
}
