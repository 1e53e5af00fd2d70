//! Terrasync CLI - synchronize geospatial project directories
//!
//! Provides commands for:
//! - Creating and downloading projects
//! - Running a sync cycle against the remote service
//! - Inspecting working copy status
//! - Removing local working copies and remote projects
//!
//! Exit codes map to the sync error taxonomy so scripts can distinguish
//! failure classes (see [`exit_code`]).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use terrasync_core::domain::errors::SyncError;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    create::CreateProjectCommand,
    download::DownloadCommand,
    remove::{RemoveLocalCommand, RemoveRemoteCommand},
    status::StatusCommand,
    sync::SyncCommand,
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "terrasync",
    version,
    about = "Content-versioned sync for geospatial project directories"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new project on the server
    CreateProject(CreateProjectCommand),
    /// Download the latest version of a project
    Download(DownloadCommand),
    /// Synchronize a working copy with the server
    Sync(SyncCommand),
    /// Show working copy status against the server
    Status(StatusCommand),
    /// Delete a local working copy
    RemoveLocal(RemoveLocalCommand),
    /// Delete a project from the server
    RemoveRemote(RemoveRemoteCommand),
}

/// Map the error taxonomy to process exit codes
///
/// 1 is reserved for errors outside the taxonomy (bad arguments, missing
/// token, config parse failures).
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(sync_err) = cause.downcast_ref::<SyncError>() {
            return match sync_err {
                SyncError::Io { .. } => 2,
                SyncError::NetworkFailure { .. } => 3,
                SyncError::PermissionDenied { .. } => 4,
                SyncError::VersionOutdated { .. } => 5,
                SyncError::HistoryGap { .. } => 6,
                SyncError::Contention { .. } => 7,
                SyncError::SyncInProgress => 8,
                SyncError::Cancelled { .. } => 9,
                SyncError::Other { .. } => 10,
            };
        }
    }
    1
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let result = run(cli, format).await;
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            get_formatter(matches!(format, OutputFormat::Json)).error(&format!("{err:#}"));
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli, format: OutputFormat) -> anyhow::Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::CreateProject(cmd) => cmd.execute(&config, format).await,
        Commands::Download(cmd) => cmd.execute(&config, format).await,
        Commands::Sync(cmd) => cmd.execute(&config, format).await,
        Commands::Status(cmd) => cmd.execute(&config, format).await,
        Commands::RemoveLocal(cmd) => cmd.execute(&config, format).await,
        Commands::RemoveRemote(cmd) => cmd.execute(&config, format).await,
    }
}
