//! Configuration module.

mod config_helper;
mod read_config;
mod types;

pub use config_helper::ConfigHelper;
pub use read_config::{ConfigError, ConfigResult, ConfigSource, read_config};
pub use types::{Config, HdfsConfig, S3Config, S3Settings, StagingConfig, StoreConfig, SyncConfig};
