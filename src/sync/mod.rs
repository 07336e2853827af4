//! Incremental sync of a local directory to a remote store.
//!
//! # Overview
//!
//! A sync pass walks a local staging directory and uploads every file that
//! is new or whose modification time has advanced since it was last
//! uploaded. The last-uploaded times live in a [`SyncState`] that the caller
//! keeps between passes. Deleted local files are left alone remotely.
//!
//! # Key Functions
//!
//! - [`run_sync`] - Execute one sync pass

mod error;
mod run_sync;
mod sync_state;

pub use error::{Result, SyncError};
pub use run_sync::{DEFAULT_MAX_CONCURRENT_UPLOADS, SyncOptions, run_sync};
pub use sync_state::SyncState;
