//! Status command
//!
//! Read-only report: base version, latest server version, and local
//! changes not yet pushed. Never touches the working copy.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use terrasync_core::config::Config;
use terrasync_core::domain::diff::FileChange;

use crate::commands::build_orchestrator;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Working copy directory (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub path: PathBuf,
}

impl StatusCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let orchestrator = build_orchestrator(config)?;

        let report = orchestrator.status(&self.path).await?;

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "project": report.project,
                "base_version": report.base_version,
                "latest_version": report.latest_version,
                "local_changes": report.local_changes,
            }));
            return Ok(());
        }

        println!("Project:        {}", report.project);
        println!("Local version:  {}", report.base_version);
        println!("Server version: {}", report.latest_version);

        if report.base_version < report.latest_version {
            formatter.info("server has newer versions, run 'terrasync sync' to pull them");
        }

        if report.local_changes.is_empty() {
            formatter.info("no local changes");
        } else {
            println!("Local changes:");
            for (path, change) in &report.local_changes.files {
                let marker = match change {
                    FileChange::Added { .. } => "added",
                    FileChange::Removed => "removed",
                    FileChange::Updated { .. } => "updated",
                };
                println!("  {marker:>8}  {path}");
            }
        }
        Ok(())
    }
}
