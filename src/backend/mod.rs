//! Remote filesystem adapters.
//!
//! The sync engine only needs one capability from a remote store: copy a
//! local file to a remote path. [`FilesystemAdapter`] expresses that, and each
//! backend implements it:
//! - [`HdfsAdapter`] - HDFS over the WebHDFS REST API
//! - [`S3Adapter`] - S3-compatible object storage
//! - [`FsAdapter`] - a local or mounted filesystem
//! - [`MemoryAdapter`] - in-memory, records uploads (tests, dry runs)

mod filesystem_adapter;
mod fs_backend;
mod hdfs_backend;
mod memory_backend;
mod s3_backend;

pub use filesystem_adapter::{
    AdapterFactory, BackendError, FilesystemAdapter, Result, SharedAdapterFactory,
};
pub use fs_backend::{FsAdapter, FsAdapterFactory};
pub use hdfs_backend::{DEFAULT_WEBHDFS_PORT, HdfsAdapter, HdfsAdapterConfig, HdfsAdapterFactory};
pub use memory_backend::{MemoryAdapter, UploadRecord};
pub use s3_backend::{S3Adapter, S3AdapterConfig, S3AdapterFactory};
