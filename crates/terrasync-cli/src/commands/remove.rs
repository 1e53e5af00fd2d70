//! Remove commands
//!
//! `remove-local` deletes a working copy directory; `remove-remote`
//! deletes a project from the server. Both are irreversible and so are
//! kept as separate, explicit commands.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use terrasync_core::config::Config;
use terrasync_core::domain::newtypes::ProjectRef;

use crate::commands::build_orchestrator;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct RemoveLocalCommand {
    /// Working copy directory to delete
    pub path: PathBuf,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

impl RemoveLocalCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        if !self.yes && !confirm(&format!("Delete '{}' and all its contents?", self.path.display()))? {
            formatter.info("aborted");
            return Ok(());
        }

        let orchestrator = build_orchestrator(config)?;
        orchestrator.remove_local(&self.path).await?;
        formatter.success(&format!("Removed working copy '{}'", self.path.display()));
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct RemoveRemoteCommand {
    /// Project to delete from the server, as `workspace/name`
    pub project: ProjectRef,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

impl RemoveRemoteCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        if !self.yes
            && !confirm(&format!(
                "Delete {} from the server, including its full version history?",
                self.project
            ))?
        {
            formatter.info("aborted");
            return Ok(());
        }

        let orchestrator = build_orchestrator(config)?;
        orchestrator.remove_remote(&self.project).await?;
        formatter.success(&format!("Removed project {} from the server", self.project));
        Ok(())
    }
}

/// Interactive yes/no prompt, defaulting to no
fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
