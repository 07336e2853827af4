//! Local staging directories.
//!
//! Each run gets one directory under the staging base, `<base>/<run_id>`,
//! that the job writes its outputs into. Directories are created on demand
//! and are never removed, so repeated acquisitions within a run see the
//! files written earlier.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use super::error::{Result, StoreError};

/// Maps run ids to local staging directories under a base directory.
#[derive(Debug, Clone)]
pub struct StagingDirs {
    base: PathBuf,
}

impl StagingDirs {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The staging directory for a run. Does not touch the filesystem.
    pub fn dir_for(&self, run_id: &str) -> PathBuf {
        self.base.join(run_id.trim_start_matches('/'))
    }

    /// Make sure the run's directory exists and return a handle to it.
    ///
    /// Safe to call repeatedly and from several tasks at once.
    pub async fn acquire(&self, run_id: &str) -> Result<LocalOutputDir> {
        let path = self.dir_for(run_id);

        fs::create_dir_all(&path)
            .await
            .map_err(|source| StoreError::DirectoryCreationFailed {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "acquired local output dir");
        Ok(LocalOutputDir { path })
    }
}

/// A run's local output directory, held for as long as the job writes to it.
///
/// Releasing the handle leaves the directory and its contents in place.
#[derive(Debug)]
pub struct LocalOutputDir {
    path: PathBuf,
}

impl LocalOutputDir {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Deref for LocalOutputDir {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for LocalOutputDir {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocalOutputDir {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "released local output dir");
    }
}
