//! Error types for store operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur while creating or using a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store root specification is invalid.
    #[error("invalid store spec: {0}")]
    InvalidSpec(String),

    /// The URL scheme is not supported.
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// A named store was not found in the configuration.
    #[error("store not found: {0}")]
    StoreNotFound(String),

    /// The filesystem adapter could not be constructed on first use.
    #[error("failed to construct filesystem adapter for {root}: {source}")]
    AdapterConstructionFailed { root: String, source: BackendError },

    /// A local staging directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A remote operation failed.
    #[error("remote error: {0}")]
    Remote(#[from] BackendError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
