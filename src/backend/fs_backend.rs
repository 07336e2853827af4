use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;

use super::filesystem_adapter::{
    AdapterFactory, BackendError, FilesystemAdapter, Result,
};

/// Counter for generating unique temp file names.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A filesystem-based implementation of `FilesystemAdapter`.
///
/// Remote paths are either `file://` URLs or plain paths on a local or
/// mounted filesystem. Writes are atomic: data is copied to a temp file next
/// to the destination and then renamed into place.
pub struct FsAdapter;

impl FsAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Map a remote path to a filesystem path.
    fn full_path(remote: &str) -> Result<PathBuf> {
        let path = remote.strip_prefix("file://").unwrap_or(remote);
        if path.is_empty() {
            return Err(BackendError::InvalidPath(remote.to_string()));
        }
        Ok(PathBuf::from(path))
    }

    /// Generate a unique temp file path in the same directory as `dest`.
    fn temp_file_path(dest: &Path) -> PathBuf {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        dest.with_file_name(format!(".{}.tmp.{}.{}", name, pid, counter))
    }
}

impl Default for FsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FilesystemAdapter for FsAdapter {
    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let full_path = Self::full_path(remote)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = Self::temp_file_path(&full_path);
        if let Err(e) = fs::copy(local, &temp_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn exists(&self, remote: &str) -> Result<bool> {
        let full_path = Self::full_path(remote)?;
        Ok(fs::try_exists(&full_path).await?)
    }
}

/// Creates [`FsAdapter`]s. Construction never touches the filesystem.
pub struct FsAdapterFactory;

#[async_trait]
impl AdapterFactory for FsAdapterFactory {
    async fn create(&self) -> Result<Arc<dyn FilesystemAdapter>> {
        Ok(Arc::new(FsAdapter::new()))
    }
}
