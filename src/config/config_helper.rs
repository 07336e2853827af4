//! Configuration helper for interpreting config values.
//!
//! The `ConfigHelper` wraps a `Config` and provides methods for interpreting
//! configuration values, such as resolving a named store's settings against
//! the section defaults.

use std::path::Path;

use super::{Config, HdfsConfig, S3Settings, StoreConfig};
use crate::config::read_config::default_config;
use crate::sync::SyncOptions;

/// Helper for interpreting configuration values.
#[derive(Debug, Clone)]
pub struct ConfigHelper {
    config: Config,
}

impl ConfigHelper {
    /// Create a new ConfigHelper wrapping the given config.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get a reference to the underlying config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the helper and return the underlying config.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Look up a named store.
    pub fn get_store(&self, name: &str) -> Option<&StoreConfig> {
        self.config.stores.get(name)
    }

    /// Resolve S3 settings, letting values set on a store (if any) win over
    /// the [s3] defaults.
    pub fn resolve_s3_settings(&self, overrides: Option<&S3Settings>) -> S3Settings {
        let defaults = &self.config.s3.settings;
        let overrides = overrides.cloned().unwrap_or_default();
        S3Settings {
            endpoint_url: overrides.endpoint_url.or_else(|| defaults.endpoint_url.clone()),
            region: overrides.region.or_else(|| defaults.region.clone()),
        }
    }

    pub fn hdfs(&self) -> &HdfsConfig {
        &self.config.hdfs
    }

    /// Base directory for per-run local output directories.
    pub fn staging_dir(&self) -> &Path {
        &self.config.staging.dir
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions::default().with_max_concurrent_uploads(self.config.sync.max_concurrent_uploads)
    }
}

impl Default for ConfigHelper {
    fn default() -> Self {
        Self::new(default_config())
    }
}

impl From<Config> for ConfigHelper {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}
