//! Sync CLI commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::cli::{Result, RunArgs, write_output};
use crate::config::ConfigHelper;
use crate::store::Store;

// =============================================================================
// Sync
// =============================================================================

/// Arguments for the sync command.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Local directory to sync. Defaults to the run's staging directory.
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Re-sync every this many seconds instead of syncing once.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Stop after this many passes (only with --interval).
    #[arg(long, requires = "interval")]
    pub iterations: Option<u64>,
}

#[derive(Serialize)]
struct SyncOutput<'a> {
    run_id: &'a str,
    run_root: &'a str,
    pass: u64,
    uploaded: usize,
    total_uploaded: usize,
}

impl SyncArgs {
    pub async fn run(self, config: &ConfigHelper, json: bool) -> Result<()> {
        let store = Store::from_spec(&self.run.store, config)?;

        let staging_dir;
        let local_dir: &Path = match &self.dir {
            Some(dir) => dir,
            None => {
                staging_dir = store.local_output_dir_fn(&self.run.run_id).acquire().await?;
                staging_dir.path()
            }
        };

        let mut sync = store.sync_fn(&self.run.run_id);
        let mut total_uploaded = 0;
        let mut pass = 0;

        loop {
            pass += 1;
            let uploaded = sync.sync(local_dir).await?;
            total_uploaded += uploaded;

            let output = SyncOutput {
                run_id: sync.run_id(),
                run_root: sync.run_root(),
                pass,
                uploaded,
                total_uploaded,
            };
            let text = format!(
                "{} -> {}: uploaded {} file(s)",
                local_dir.display(),
                sync.run_root(),
                uploaded
            );
            write_output(&output, &text, json).await?;

            let Some(interval) = self.interval else {
                break;
            };
            if self.iterations.is_some_and(|max| pass >= max) {
                break;
            }
            info!(seconds = interval, "waiting for next sync pass");
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }

        Ok(())
    }
}

// =============================================================================
// Run Path
// =============================================================================

/// Arguments for the run-path command.
#[derive(Args, Debug)]
pub struct RunPathArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Serialize)]
struct RunPathOutput<'a> {
    run_id: &'a str,
    run_root: &'a str,
}

impl RunPathArgs {
    pub async fn run(self, config: &ConfigHelper, json: bool) -> Result<()> {
        let store = Store::from_spec(&self.run.store, config)?;
        let run_root = store.get_run_path(&self.run.run_id);

        let output = RunPathOutput {
            run_id: &self.run.run_id,
            run_root: &run_root,
        };
        write_output(&output, &run_root, json).await?;
        Ok(())
    }
}

// =============================================================================
// Staging Dir
// =============================================================================

/// Arguments for the staging-dir command.
#[derive(Args, Debug)]
pub struct StagingDirArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Serialize)]
struct StagingDirOutput<'a> {
    run_id: &'a str,
    dir: String,
}

impl StagingDirArgs {
    pub async fn run(self, config: &ConfigHelper, json: bool) -> Result<()> {
        let store = Store::from_spec(&self.run.store, config)?;
        let dir = store.local_output_dir_fn(&self.run.run_id).acquire().await?;

        let path = dir.path().display().to_string();
        let output = StagingDirOutput {
            run_id: &self.run.run_id,
            dir: path.clone(),
        };
        write_output(&output, &path, json).await?;
        Ok(())
    }
}
