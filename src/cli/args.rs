//! Command-line argument definitions and helpers.

use std::path::PathBuf;

use clap::Args;
use tokio::io::AsyncWriteExt;

use crate::config::ConfigSource;

// =============================================================================
// Global Arguments
// =============================================================================

/// Global arguments that apply to all commands.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to the main configuration file.
    #[arg(long = "config-file", global = true)]
    pub config_file: Option<PathBuf>,

    /// Path to the configuration overrides file.
    #[arg(long = "config-file-overrides", global = true)]
    pub config_file_overrides: Option<PathBuf>,

    /// Configuration overrides in the form name=value.
    #[arg(long = "config", value_parser = parse_config_override, global = true)]
    pub config_overrides: Vec<(String, String)>,

    /// Format output as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    /// Convert to a ConfigSource for reading configuration.
    pub fn to_config_source(&self) -> ConfigSource {
        ConfigSource {
            config_file: self.config_file.clone(),
            override_file: self.config_file_overrides.clone(),
            overrides: self.config_overrides.clone(),
        }
    }
}

/// Parse a config override from "name=value" format.
fn parse_config_override(s: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid config override '{}': expected name=value", s))?;
    Ok((name.to_string(), value.to_string()))
}

// =============================================================================
// Run Arguments
// =============================================================================

/// Identifies a store and a run within it.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Store root (s3://, hdfs://, file:// URL, local path, or configured store name).
    #[arg(long)]
    pub store: String,

    /// Run identifier.
    #[arg(long = "run-id")]
    pub run_id: String,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Write a line of output to stdout, as JSON or as plain text.
pub async fn write_output<T: serde::Serialize>(
    value: &T,
    text: &str,
    json: bool,
) -> std::io::Result<()> {
    let output = if json {
        serde_json::to_string_pretty(value).map_err(std::io::Error::other)?
    } else {
        text.to_string()
    };
    let mut stdout = tokio::io::stdout();
    stdout.write_all(output.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
