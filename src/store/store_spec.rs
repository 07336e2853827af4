//! Store specification parsing.
//!
//! A store is named by its root: a URL whose scheme picks the backend, a
//! bare local path, or the name of a `[store.{name}]` config section.

use std::collections::HashMap;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

use crate::backend::{
    AdapterFactory, FsAdapterFactory, HdfsAdapterConfig, HdfsAdapterFactory, S3AdapterConfig,
    S3AdapterFactory,
};
use crate::config::ConfigHelper;
use crate::store::error::{Result, StoreError};

/// The kind of backend a store root selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// S3-compatible storage (s3:// URL).
    S3,
    /// HDFS via WebHDFS (hdfs:// URL).
    Hdfs,
    /// Local or mounted filesystem (file:// URL or bare path).
    Local,
    /// An adapter supplied directly by the caller.
    Custom,
}

/// A parsed store specification.
#[derive(Debug, Clone)]
pub struct ParsedStoreSpec {
    pub kind: StoreKind,

    /// The root that run paths are composed under, without any query string.
    pub root: String,

    /// For HDFS: the namenode host.
    pub namenode: Option<String>,

    /// Optional endpoint URL (S3 only).
    pub endpoint_url: Option<String>,

    /// Optional region (S3 only).
    pub region: Option<String>,
}

impl ParsedStoreSpec {
    /// Parse a store specification string.
    ///
    /// Accepts:
    /// - `s3://bucket/prefix?endpoint_url=...&region=...`
    /// - `hdfs://namenode[:port]/path`
    /// - `file:///path/to/directory`
    /// - A bare path (`/path`, `./path`, `path/to/dir`)
    /// - A bare name (looked up in config)
    pub fn parse(spec: &str, config: Option<&ConfigHelper>) -> Result<Self> {
        if let Some(rest) = spec.strip_prefix("s3://") {
            return Self::parse_s3_url(rest);
        }
        if let Some(rest) = spec.strip_prefix("hdfs://") {
            return Self::parse_hdfs_url(rest);
        }
        if let Some(path) = spec.strip_prefix("file://") {
            if path.is_empty() {
                return Err(StoreError::InvalidSpec(
                    "file:// URL must include a path".to_string(),
                ));
            }
            return Ok(Self::local(spec));
        }
        if let Some((scheme, _)) = spec.split_once("://") {
            return Err(StoreError::UnsupportedScheme(scheme.to_string()));
        }
        if spec.is_empty() {
            return Err(StoreError::InvalidSpec("empty store spec".to_string()));
        }
        if spec.contains('/') || spec.starts_with('.') {
            return Ok(Self::local(spec));
        }

        Self::parse_named(spec, config)
    }

    fn local(root: &str) -> Self {
        Self {
            kind: StoreKind::Local,
            root: root.to_string(),
            namenode: None,
            endpoint_url: None,
            region: None,
        }
    }

    fn parse_s3_url(without_scheme: &str) -> Result<Self> {
        let (path_part, query_part) = match without_scheme.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (without_scheme, None),
        };

        let bucket = path_part.split('/').next().unwrap_or_default();
        if bucket.is_empty() {
            return Err(StoreError::InvalidSpec(
                "S3 URL must include bucket name".to_string(),
            ));
        }

        let params = parse_query_string(query_part.unwrap_or(""))?;

        Ok(Self {
            kind: StoreKind::S3,
            root: format!("s3://{}", path_part.trim_end_matches('/')),
            namenode: None,
            endpoint_url: params.get("endpoint_url").cloned(),
            region: params.get("region").cloned(),
        })
    }

    fn parse_hdfs_url(without_scheme: &str) -> Result<Self> {
        let authority = without_scheme.split('/').next().unwrap_or_default();
        let host = authority.split(':').next().unwrap_or_default();
        if host.is_empty() {
            return Err(StoreError::InvalidSpec(
                "hdfs URL must include the namenode host".to_string(),
            ));
        }

        Ok(Self {
            kind: StoreKind::Hdfs,
            root: format!("hdfs://{}", without_scheme),
            namenode: Some(host.to_string()),
            endpoint_url: None,
            region: None,
        })
    }

    fn parse_named(name: &str, config: Option<&ConfigHelper>) -> Result<Self> {
        let config = config.ok_or_else(|| {
            StoreError::InvalidSpec(format!(
                "'{}' looks like a store name but no config provided",
                name
            ))
        })?;

        let store_config = config
            .get_store(name)
            .ok_or_else(|| StoreError::StoreNotFound(name.to_string()))?;

        let mut parsed = Self::parse(&store_config.url, None)?;

        // URL query params win over the store's settings, which win over [s3].
        let settings = config.resolve_s3_settings(Some(&store_config.settings));
        if parsed.endpoint_url.is_none() {
            parsed.endpoint_url = settings.endpoint_url;
        }
        if parsed.region.is_none() {
            parsed.region = settings.region;
        }

        Ok(parsed)
    }

    /// Build the factory that constructs this store's filesystem adapter.
    ///
    /// Nothing is connected here; that happens on the store's first use.
    pub fn adapter_factory(&self, config: &ConfigHelper) -> Result<Arc<dyn AdapterFactory>> {
        match self.kind {
            StoreKind::S3 => {
                let defaults = config.resolve_s3_settings(None);
                let mut s3_config = S3AdapterConfig::new();
                if let Some(endpoint_url) = self.endpoint_url.clone().or(defaults.endpoint_url) {
                    s3_config = s3_config.with_endpoint_url(endpoint_url);
                }
                if let Some(region) = self.region.clone().or(defaults.region) {
                    s3_config = s3_config.with_region(region);
                }
                Ok(Arc::new(S3AdapterFactory::new(s3_config)))
            }

            StoreKind::Hdfs => {
                let namenode = self.namenode.clone().ok_or_else(|| {
                    StoreError::InvalidSpec(format!("no namenode in {}", self.root))
                })?;
                let hdfs = config.hdfs();
                let mut hdfs_config =
                    HdfsAdapterConfig::new(namenode).with_webhdfs_port(hdfs.webhdfs_port);
                if let Some(url) = &hdfs.webhdfs_url {
                    hdfs_config = hdfs_config.with_webhdfs_url(url);
                }
                if let Some(user) = &hdfs.user {
                    hdfs_config = hdfs_config.with_user(user);
                }
                Ok(Arc::new(HdfsAdapterFactory::new(hdfs_config)))
            }

            StoreKind::Local => Ok(Arc::new(FsAdapterFactory)),

            StoreKind::Custom => Err(StoreError::InvalidSpec(
                "custom stores are built from an adapter, not a spec".to_string(),
            )),
        }
    }
}

/// Parse a query string into percent-decoded key-value pairs.
fn parse_query_string(query: &str) -> Result<HashMap<String, String>> {
    let mut params = HashMap::new();

    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            let decoded = percent_decode_str(value).decode_utf8().map_err(|_| {
                StoreError::InvalidSpec(format!(
                    "query parameter '{}' is not valid UTF-8 once decoded",
                    key
                ))
            })?;
            params.insert(key.to_string(), decoded.into_owned());
        }
    }

    Ok(params)
}

// =============================================================================
// Tests
// =============================================================================
