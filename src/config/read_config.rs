//! Configuration file reading and parsing.
//!
//! This module handles locating, reading, and parsing INI-format configuration files,
//! with support for layered overrides.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use thiserror::Error;

use super::{Config, HdfsConfig, S3Config, S3Settings, StagingConfig, StoreConfig, SyncConfig};
use crate::backend::DEFAULT_WEBHDFS_PORT;
use crate::sync::DEFAULT_MAX_CONCURRENT_UPLOADS;

// =============================================================================
// Constants - Default Values
// =============================================================================

const DEFAULT_STAGING_SUBDIR: &str = "runstore";

const ENV_CONFIG_FILE: &str = "RUNSTORE_CONFIG_FILE";
const DEFAULT_CONFIG_FILENAME: &str = ".runstoreconfig";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid integer '{value}' for key '{key}': {source}")]
    InvalidInteger {
        key: String,
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("invalid override key '{key}': {message}")]
    InvalidOverrideKey { key: String, message: String },

    #[error("missing required field '{field}' in section '{section}'")]
    MissingRequiredField { section: String, field: String },
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Specifies how to locate and layer configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit config file path from CLI. If specified and doesn't exist, error.
    /// If None, fall back to RUNSTORE_CONFIG_FILE env var, then ~/.runstoreconfig.
    pub config_file: Option<PathBuf>,

    /// Additional override config file (layered on top of base config).
    pub override_file: Option<PathBuf>,

    /// Individual key=value overrides (applied last).
    /// Keys use dot-notation: "staging.dir", "store.models.url"
    pub overrides: Vec<(String, String)>,
}

// =============================================================================
// Value Parsing
// =============================================================================

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidInteger {
            key: key.to_string(),
            value: value.to_string(),
            source: e,
        })
}

fn parse_u16(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidInteger {
            key: key.to_string(),
            value: value.to_string(),
            source: e,
        })
}

// =============================================================================
// Config File Resolution
// =============================================================================

/// Information about how the config file was resolved.
#[derive(Debug)]
pub struct ResolvedConfigFile {
    /// The path to the config file, if one was found.
    pub path: Option<PathBuf>,
    /// Warning message if env var pointed to nonexistent file.
    pub warning: Option<String>,
}

/// Resolve which config file to use based on the ConfigSource and environment.
fn resolve_config_file(source: &ConfigSource) -> Result<ResolvedConfigFile> {
    // If explicit path provided, it must exist
    if let Some(ref path) = source.config_file {
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path.clone()),
                warning: None,
            });
        } else {
            return Err(ConfigError::FileNotFound(path.clone()));
        }
    }

    // Check environment variable
    if let Ok(env_path) = env::var(ENV_CONFIG_FILE) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path),
                warning: None,
            });
        } else {
            // Warn but continue with defaults
            return Ok(ResolvedConfigFile {
                path: None,
                warning: Some(format!(
                    "config file specified by {} does not exist: {}",
                    ENV_CONFIG_FILE, env_path
                )),
            });
        }
    }

    // Check ~/.runstoreconfig
    if let Some(home) = home_dir() {
        let default_path = home.join(DEFAULT_CONFIG_FILENAME);
        if default_path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(default_path),
                warning: None,
            });
        }
    }

    Ok(ResolvedConfigFile {
        path: None,
        warning: None,
    })
}

/// Get the user's home directory.
fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

// =============================================================================
// Default Config
// =============================================================================

/// Create a Config with all default values.
pub(crate) fn default_config() -> Config {
    Config {
        staging: StagingConfig {
            dir: env::temp_dir().join(DEFAULT_STAGING_SUBDIR),
        },
        sync: SyncConfig {
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
        },
        s3: S3Config::default(),
        hdfs: HdfsConfig {
            webhdfs_url: None,
            webhdfs_port: DEFAULT_WEBHDFS_PORT,
            user: None,
        },
        stores: HashMap::new(),
    }
}

// =============================================================================
// INI Parsing
// =============================================================================

/// Parse S3 settings from an INI section.
fn parse_s3_settings(ini: &Ini, section: &str) -> S3Settings {
    S3Settings {
        endpoint_url: ini.get(section, "endpoint_url"),
        region: ini.get(section, "region"),
    }
}

/// Apply an INI file's contents to a Config, layering on top of existing values.
fn apply_ini_to_config(config: &mut Config, ini: &Ini) -> Result<()> {
    // [staging] section
    if let Some(dir) = ini.get("staging", "dir") {
        config.staging.dir = PathBuf::from(dir);
    }

    // [sync] section
    if let Some(max) = ini.get("sync", "max_concurrent_uploads") {
        config.sync.max_concurrent_uploads = parse_usize("sync.max_concurrent_uploads", &max)?;
    }

    // [s3] section
    let s3_settings = parse_s3_settings(ini, "s3");
    if s3_settings.endpoint_url.is_some() {
        config.s3.settings.endpoint_url = s3_settings.endpoint_url;
    }
    if s3_settings.region.is_some() {
        config.s3.settings.region = s3_settings.region;
    }

    // [hdfs] section
    if let Some(url) = ini.get("hdfs", "webhdfs_url") {
        config.hdfs.webhdfs_url = Some(url);
    }
    if let Some(port) = ini.get("hdfs", "webhdfs_port") {
        config.hdfs.webhdfs_port = parse_u16("hdfs.webhdfs_port", &port)?;
    }
    if let Some(user) = ini.get("hdfs", "user") {
        config.hdfs.user = Some(user);
    }

    // [store.*] sections
    for section_name in ini.sections() {
        if let Some(store_name) = section_name.strip_prefix("store.") {
            let url =
                ini.get(&section_name, "url")
                    .ok_or_else(|| ConfigError::MissingRequiredField {
                        section: section_name.clone(),
                        field: "url".to_string(),
                    })?;

            let store_config = StoreConfig {
                url,
                settings: parse_s3_settings(ini, &section_name),
            };

            config.stores.insert(store_name.to_string(), store_config);
        }
    }

    Ok(())
}

/// Load and parse an INI file.
fn load_ini(path: &Path) -> Result<Ini> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e,
    })?;
    Ok(ini)
}

// =============================================================================
// Override Application
// =============================================================================

/// Apply a single key=value override to the config.
fn apply_override(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.splitn(3, '.').collect();

    match parts.as_slice() {
        ["staging", "dir"] => {
            config.staging.dir = PathBuf::from(value);
            Ok(())
        }
        ["sync", "max_concurrent_uploads"] => {
            config.sync.max_concurrent_uploads = parse_usize(key, value)?;
            Ok(())
        }
        ["s3", param] => apply_s3_settings_override(&mut config.s3.settings, key, param, value),
        ["hdfs", param] => apply_hdfs_override(&mut config.hdfs, key, param, value),
        ["store", name, param] => apply_store_override(config, key, name, param, value),
        _ => Err(ConfigError::InvalidOverrideKey {
            key: key.to_string(),
            message: "unrecognized key format".to_string(),
        }),
    }
}

fn apply_s3_settings_override(
    settings: &mut S3Settings,
    key: &str,
    param: &str,
    value: &str,
) -> Result<()> {
    match param {
        "endpoint_url" => {
            settings.endpoint_url = Some(value.to_string());
            Ok(())
        }
        "region" => {
            settings.region = Some(value.to_string());
            Ok(())
        }
        _ => Err(ConfigError::InvalidOverrideKey {
            key: key.to_string(),
            message: "unknown parameter".to_string(),
        }),
    }
}

fn apply_hdfs_override(hdfs: &mut HdfsConfig, key: &str, param: &str, value: &str) -> Result<()> {
    match param {
        "webhdfs_url" => {
            hdfs.webhdfs_url = Some(value.to_string());
            Ok(())
        }
        "webhdfs_port" => {
            hdfs.webhdfs_port = parse_u16(key, value)?;
            Ok(())
        }
        "user" => {
            hdfs.user = Some(value.to_string());
            Ok(())
        }
        _ => Err(ConfigError::InvalidOverrideKey {
            key: key.to_string(),
            message: "unknown parameter".to_string(),
        }),
    }
}

fn apply_store_override(
    config: &mut Config,
    key: &str,
    name: &str,
    param: &str,
    value: &str,
) -> Result<()> {
    let store = config
        .stores
        .entry(name.to_string())
        .or_insert_with(|| StoreConfig {
            url: String::new(),
            settings: S3Settings::default(),
        });

    match param {
        "url" => {
            store.url = value.to_string();
            Ok(())
        }
        _ => apply_s3_settings_override(&mut store.settings, key, param, value),
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Result of reading configuration, including any warnings.
#[derive(Debug)]
pub struct ConfigResult {
    /// The parsed configuration.
    pub config: Config,
    /// Any warnings generated during config loading.
    pub warnings: Vec<String>,
}

/// Read and parse configuration from the specified sources.
///
/// Configuration is layered in this order:
/// 1. Built-in defaults
/// 2. Base config file (from CLI, env var, or ~/.runstoreconfig)
/// 3. Override config file (if specified)
/// 4. Individual overrides (applied last)
pub fn read_config(source: &ConfigSource) -> Result<ConfigResult> {
    let mut warnings = Vec::new();

    let mut config = default_config();

    let resolved = resolve_config_file(source)?;
    if let Some(warning) = resolved.warning {
        warnings.push(warning);
    }
    if let Some(ref path) = resolved.path {
        let ini = load_ini(path)?;
        apply_ini_to_config(&mut config, &ini)?;
    }

    if let Some(ref override_path) = source.override_file {
        if !override_path.exists() {
            return Err(ConfigError::FileNotFound(override_path.clone()));
        }
        let ini = load_ini(override_path)?;
        apply_ini_to_config(&mut config, &ini)?;
    }

    for (key, value) in &source.overrides {
        apply_override(&mut config, key, value)?;
    }

    Ok(ConfigResult { config, warnings })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = default_config();
        assert_eq!(config.staging.dir, env::temp_dir().join("runstore"));
        assert_eq!(
            config.sync.max_concurrent_uploads,
            DEFAULT_MAX_CONCURRENT_UPLOADS
        );
        assert_eq!(config.hdfs.webhdfs_port, 9870);
        assert!(config.s3.settings.endpoint_url.is_none());
        assert!(config.stores.is_empty());
    }

    #[test]
    fn test_apply_override_staging_and_sync() {
        let mut config = default_config();
        apply_override(&mut config, "staging.dir", "/scratch/jobs").unwrap();
        apply_override(&mut config, "sync.max_concurrent_uploads", "1").unwrap();
        assert_eq!(config.staging.dir, PathBuf::from("/scratch/jobs"));
        assert_eq!(config.sync.max_concurrent_uploads, 1);

        let result = apply_override(&mut config, "sync.max_concurrent_uploads", "many");
        assert!(matches!(result, Err(ConfigError::InvalidInteger { .. })));
    }

    #[test]
    fn test_apply_override_store() {
        let mut config = default_config();
        apply_override(&mut config, "store.models.url", "s3://bucket/prefix").unwrap();
        apply_override(&mut config, "store.models.region", "us-west-2").unwrap();

        let store = config.stores.get("models").unwrap();
        assert_eq!(store.url, "s3://bucket/prefix");
        assert_eq!(store.settings.region, Some("us-west-2".to_string()));
    }

    #[test]
    fn test_apply_override_unknown_key() {
        let mut config = default_config();
        assert!(matches!(
            apply_override(&mut config, "cache.path", "/x"),
            Err(ConfigError::InvalidOverrideKey { .. })
        ));
        assert!(matches!(
            apply_override(&mut config, "hdfs.password", "x"),
            Err(ConfigError::InvalidOverrideKey { .. })
        ));
    }

    #[test]
    fn test_parse_ini_config() {
        let mut ini = Ini::new();
        ini.read(
            r#"
[staging]
dir = /scratch/runstore

[sync]
max_concurrent_uploads = 8

[s3]
endpoint_url = http://localhost:9000

[hdfs]
webhdfs_port = 50070
user = etl

[store.checkpoints]
url = hdfs://namenode:8020/user/etl/checkpoints

[store.models]
url = s3://my-bucket/models
region = us-east-1
"#
            .to_string(),
        )
        .unwrap();

        let mut config = default_config();
        apply_ini_to_config(&mut config, &ini).unwrap();

        assert_eq!(config.staging.dir, PathBuf::from("/scratch/runstore"));
        assert_eq!(config.sync.max_concurrent_uploads, 8);
        assert_eq!(
            config.s3.settings.endpoint_url,
            Some("http://localhost:9000".to_string())
        );
        assert_eq!(config.hdfs.webhdfs_port, 50070);
        assert_eq!(config.hdfs.user, Some("etl".to_string()));

        let store = config.stores.get("checkpoints").unwrap();
        assert_eq!(store.url, "hdfs://namenode:8020/user/etl/checkpoints");

        let store = config.stores.get("models").unwrap();
        assert_eq!(store.settings.region, Some("us-east-1".to_string()));
    }

    #[test]
    fn test_store_section_requires_url() {
        let mut ini = Ini::new();
        ini.read("[store.broken]\nregion = us-east-1\n".to_string())
            .unwrap();

        let mut config = default_config();
        let result = apply_ini_to_config(&mut config, &ini);
        assert!(matches!(
            result,
            Err(ConfigError::MissingRequiredField { .. })
        ));
    }

    #[test]
    fn test_read_config_layers_files_and_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("base.ini");
        let overrides = temp_dir.path().join("overrides.ini");
        std::fs::write(&base, "[staging]\ndir = /base\n[sync]\nmax_concurrent_uploads = 2\n")
            .unwrap();
        std::fs::write(&overrides, "[staging]\ndir = /override\n").unwrap();

        let source = ConfigSource {
            config_file: Some(base),
            override_file: Some(overrides),
            overrides: vec![("sync.max_concurrent_uploads".to_string(), "6".to_string())],
        };
        let result = read_config(&source).unwrap();

        assert_eq!(result.config.staging.dir, PathBuf::from("/override"));
        assert_eq!(result.config.sync.max_concurrent_uploads, 6);
    }

    #[test]
    fn test_read_config_missing_explicit_file() {
        let source = ConfigSource {
            config_file: Some(PathBuf::from("/nonexistent/runstore.ini")),
            ..Default::default()
        };
        assert!(matches!(
            read_config(&source),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
