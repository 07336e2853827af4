//! Configuration types for runstore.
//!
//! This module defines the structures used to represent application configuration
//! as parsed from an INI-format config file.

use std::collections::HashMap;
use std::path::PathBuf;

// =============================================================================
// Connection Settings
// =============================================================================

/// S3-specific connection settings (shared by [s3] and [store.{name}]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Settings {
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
}

// =============================================================================
// Config Sections
// =============================================================================

/// [staging] section - where local output directories are created.
#[derive(Debug, Clone)]
pub struct StagingConfig {
    pub dir: PathBuf,
}

/// [sync] section - sync pass tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub max_concurrent_uploads: usize,
}

/// [s3] section - defaults for all S3 stores.
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub settings: S3Settings,
}

/// [hdfs] section - WebHDFS connection settings for all HDFS stores.
#[derive(Debug, Clone)]
pub struct HdfsConfig {
    pub webhdfs_url: Option<String>,
    pub webhdfs_port: u16,
    pub user: Option<String>,
}

/// [store.{name}] section - named store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub settings: S3Settings,
}

// =============================================================================
// Top-Level Config
// =============================================================================

/// Complete application configuration as parsed from config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub staging: StagingConfig,
    pub sync: SyncConfig,
    pub s3: S3Config,
    pub hdfs: HdfsConfig,
    pub stores: HashMap<String, StoreConfig>,
}
