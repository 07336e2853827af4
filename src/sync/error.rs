//! Error types for sync operations.

use std::path::PathBuf;

use crate::backend::BackendError;
use crate::store::StoreError;

/// Error type for sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A single file failed to upload. The pass stopped at this file.
    #[error("failed to upload {} to {remote}: {source}", local.display())]
    UploadFailed {
        local: PathBuf,
        remote: String,
        source: BackendError,
    },

    /// The local directory could not be walked.
    #[error("failed to read local directory {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The store could not provide its filesystem adapter.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
