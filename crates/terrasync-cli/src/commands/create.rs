//! Create-project command
//!
//! Registers a new empty project on the server and initializes a working
//! copy. With `--push`, existing files in the directory become version 1.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use terrasync_core::config::Config;
use terrasync_core::domain::newtypes::ProjectRef;

use crate::commands::build_orchestrator;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct CreateProjectCommand {
    /// Project to create, as `workspace/name`
    pub project: ProjectRef,

    /// Directory to initialize as the working copy (defaults to the
    /// current directory)
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Push the directory's current contents as the first version
    #[arg(long)]
    pub push: bool,
}

impl CreateProjectCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let orchestrator = build_orchestrator(config)?;

        orchestrator
            .create(&self.project, &self.path, self.push)
            .await?;

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "project": self.project,
                "path": self.path,
                "pushed": self.push,
            }));
        } else if self.push {
            formatter.success(&format!(
                "Created {} and pushed '{}' as the first version",
                self.project,
                self.path.display()
            ));
        } else {
            formatter.success(&format!(
                "Created empty project {} in '{}'",
                self.project,
                self.path.display()
            ));
        }
        Ok(())
    }
}
