//! Sync command
//!
//! Runs a full synchronization cycle on a working copy and prints the
//! outcome, including any conflicts resolved along the way.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use terrasync_core::config::Config;
use terrasync_core::domain::errors::SyncPhase;
use terrasync_core::domain::newtypes::RelPath;
use terrasync_core::ports::{ISyncObserver, TransferDirection};

use crate::commands::build_orchestrator;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Working copy directory (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub path: PathBuf,
}

/// Prints per-phase and per-file progress as the orchestrator reports it
struct ProgressPrinter;

impl ISyncObserver for ProgressPrinter {
    fn phase_changed(&self, phase: SyncPhase) {
        println!("  {phase}...");
    }

    fn file_transferred(&self, path: &RelPath, direction: TransferDirection) {
        let verb = match direction {
            TransferDirection::Download => "pulled",
            TransferDirection::Upload => "pushed",
        };
        println!("    {verb} {path}");
    }
}

impl SyncCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let mut orchestrator = build_orchestrator(config)?;
        if matches!(format, OutputFormat::Human) {
            orchestrator = orchestrator.with_observer(Arc::new(ProgressPrinter));
        }

        let result = orchestrator.sync(&self.path).await?;

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "base_version": result.new_base_version,
                "applied_files": result.applied_files,
                "pushed": result.pushed,
            }));
        } else {
            formatter.success(&format!(
                "Synchronized to {} ({} file(s) applied{})",
                result.new_base_version,
                result.applied_files,
                if result.pushed { ", local changes pushed" } else { "" },
            ));
        }
        formatter.print_conflicts(&result.conflicts);
        Ok(())
    }
}
