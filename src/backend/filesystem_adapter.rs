use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

/// Error type for backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The remote path was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote endpoint could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote path is not valid for this backend.
    #[error("invalid remote path: {0}")]
    InvalidPath(String),

    /// A custom error message.
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// The capability a remote store must provide to the sync engine.
///
/// Remote paths are the full slash-addressed paths composed by the store
/// (e.g. `s3://bucket/prefix/run_001/a.txt`). Implementations decide how
/// to map them to their own addressing.
#[async_trait]
pub trait FilesystemAdapter: Send + Sync {
    /// Copy the bytes of a local file to the remote path.
    ///
    /// Overwrites any existing object at `remote` and creates intermediate
    /// directories (or prefixes) implicitly. Implementations must not retry.
    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;

    /// Check whether something exists at the remote path.
    async fn exists(&self, remote: &str) -> Result<bool>;
}

/// Builds a [`FilesystemAdapter`] on demand.
///
/// A store holds a factory rather than an adapter so that connecting to the
/// remote end is deferred until the adapter is first needed.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn FilesystemAdapter>>;
}

/// Factory that hands out an adapter which already exists.
pub struct SharedAdapterFactory {
    adapter: Arc<dyn FilesystemAdapter>,
}

impl SharedAdapterFactory {
    pub fn new(adapter: Arc<dyn FilesystemAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl AdapterFactory for SharedAdapterFactory {
    async fn create(&self) -> Result<Arc<dyn FilesystemAdapter>> {
        Ok(Arc::clone(&self.adapter))
    }
}
