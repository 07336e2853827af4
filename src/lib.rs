//! runstore - incremental sync of a job's local output directory to a remote store.

pub mod backend;
pub mod cli;
pub mod config;
pub mod store;
pub mod sync;

pub use backend::{
    AdapterFactory, BackendError, FilesystemAdapter, FsAdapter, HdfsAdapter, HdfsAdapterConfig,
    MemoryAdapter, S3Adapter, S3AdapterConfig,
};
pub use store::{
    LocalOutputDir, LocalOutputDirFn, ParsedStoreSpec, RunSync, StagingDirs, Store, StoreError,
    StoreKind, StoreOptions, remote_path, run_path,
};
pub use sync::{SyncError, SyncOptions, SyncState, run_sync};
