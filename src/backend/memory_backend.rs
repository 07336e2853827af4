use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::filesystem_adapter::{BackendError, FilesystemAdapter, Result};

/// One recorded call to [`MemoryAdapter::upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub local: PathBuf,
    pub remote: String,
}

/// An in-memory implementation of `FilesystemAdapter`, intended primarily for
/// testing and dry runs.
///
/// Every upload is recorded in call order, and the uploaded bytes are kept
/// by remote path.
pub struct MemoryAdapter {
    objects: RwLock<HashMap<String, Bytes>>,
    uploads: RwLock<Vec<UploadRecord>>,
    failing: RwLock<HashSet<String>>,
}

impl MemoryAdapter {
    /// Create a new empty in-memory adapter.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            uploads: RwLock::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Make every upload to `remote` fail until [`clear_failure`](Self::clear_failure).
    pub fn fail_uploads_to(&self, remote: impl Into<String>) {
        self.failing.write().unwrap().insert(remote.into());
    }

    pub fn clear_failure(&self, remote: &str) {
        self.failing.write().unwrap().remove(remote);
    }

    /// All successful uploads so far, oldest first.
    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.read().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.read().unwrap().len()
    }

    pub fn last_upload(&self) -> Option<UploadRecord> {
        self.uploads.read().unwrap().last().cloned()
    }

    /// Contents last uploaded to `remote`.
    pub fn get(&self, remote: &str) -> Option<Bytes> {
        self.objects.read().unwrap().get(remote).cloned()
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FilesystemAdapter for MemoryAdapter {
    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let should_fail = self.failing.read().unwrap().contains(remote);
        if should_fail {
            return Err(BackendError::Other(format!(
                "simulated upload failure for {}",
                remote
            )));
        }

        let data = tokio::fs::read(local).await?;

        self.objects
            .write()
            .unwrap()
            .insert(remote.to_string(), Bytes::from(data));
        self.uploads.write().unwrap().push(UploadRecord {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        Ok(())
    }

    async fn exists(&self, remote: &str) -> Result<bool> {
        let objects = self.objects.read().unwrap();
        if objects.contains_key(remote) {
            return Ok(true);
        }
        // Directories exist implicitly once something is stored beneath them.
        let prefix = format!("{}/", remote.trim_end_matches('/'));
        Ok(objects.keys().any(|k| k.starts_with(&prefix)))
    }
}
