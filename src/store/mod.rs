//! Stores: a remote root, the adapter that writes to it, and per-run handles.
//!
//! - [`Store`] - façade a job driver talks to
//! - [`run_path`] / [`remote_path`] - remote path composition
//! - [`StagingDirs`] - local per-run output directories
//! - [`ParsedStoreSpec`] - store root parsing and backend selection

mod error;
mod run_path;
mod staging;
#[allow(clippy::module_inception)]
mod store;
mod store_spec;

pub use error::{Result, StoreError};
pub use run_path::{remote_path, run_path};
pub use staging::{LocalOutputDir, StagingDirs};
pub use store::{LocalOutputDirFn, RunSync, Store, StoreOptions};
pub use store_spec::{ParsedStoreSpec, StoreKind};
