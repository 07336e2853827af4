//! Command-line interface for runstore.

pub mod args;
mod commands;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::warn;

use crate::config::{ConfigError, ConfigHelper, read_config};
use crate::store::StoreError;
use crate::sync::SyncError;

pub use args::{GlobalArgs, RunArgs, write_output};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Store error.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("{0}")]
    Sync(#[from] SyncError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

// =============================================================================
// CLI Definition
// =============================================================================

/// runstore - sync a job's local output directory to a remote store.
#[derive(Parser, Debug)]
#[command(name = "runstore", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload new and changed files from a run's local directory.
    Sync(commands::sync::SyncArgs),

    /// Print the remote root of a run.
    #[command(name = "run-path")]
    RunPath(commands::sync::RunPathArgs),

    /// Create (if needed) and print a run's local staging directory.
    #[command(name = "staging-dir")]
    StagingDir(commands::sync::StagingDirArgs),
}

// =============================================================================
// CLI Execution
// =============================================================================

impl Cli {
    /// Parse command-line arguments and return the CLI instance.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let config_result = read_config(&self.global.to_config_source())?;
        for warning in &config_result.warnings {
            warn!("{}", warning);
        }
        let config = ConfigHelper::new(config_result.config);
        let json = self.global.json;

        match self.command {
            Command::Sync(args) => args.run(&config, json).await,
            Command::RunPath(args) => args.run(&config, json).await,
            Command::StagingDir(args) => args.run(&config, json).await,
        }
    }
}

/// Main entry point for the CLI.
pub async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.run().await
}
