use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;

use super::filesystem_adapter::{AdapterFactory, BackendError, FilesystemAdapter, Result};

/// Configuration for S3Adapter.
#[derive(Debug, Clone, Default)]
pub struct S3AdapterConfig {
    /// Optional custom endpoint URL (for LocalStack/MinIO testing).
    pub endpoint_url: Option<String>,
    /// Optional region override.
    pub region: Option<String>,
}

impl S3AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom endpoint URL (for LocalStack/MinIO).
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// An S3-based implementation of `FilesystemAdapter`.
///
/// Remote paths have the form `s3://bucket/key`. S3 has no directories, so
/// intermediate structure is implied by the key.
pub struct S3Adapter {
    client: Client,
}

impl S3Adapter {
    /// Create a new S3 adapter with the given configuration.
    ///
    /// Uses the standard AWS credential chain (env vars, ~/.aws, IAM roles, etc.).
    pub async fn new(config: S3AdapterConfig) -> Self {
        let mut aws_config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            aws_config_loader = aws_config_loader.region(aws_config::Region::new(region.clone()));
        }

        let aws_config = aws_config_loader.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

        if let Some(endpoint_url) = &config.endpoint_url {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint_url)
                .force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
        }
    }

    /// Create an adapter around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Split an `s3://bucket/key` path into its bucket and key.
pub(crate) fn split_s3_url(remote: &str) -> Result<(&str, &str)> {
    let without_scheme = remote
        .strip_prefix("s3://")
        .ok_or_else(|| BackendError::InvalidPath(remote.to_string()))?;

    match without_scheme.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(BackendError::InvalidPath(remote.to_string())),
    }
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(e) if e.raw().status().as_u16() == 404)
}

fn map_sdk_error<E: std::fmt::Debug>(err: SdkError<E>) -> BackendError {
    match err {
        SdkError::DispatchFailure(e) => BackendError::Connection(format!("{:?}", e)),
        SdkError::TimeoutError(e) => BackendError::Connection(format!("{:?}", e)),
        other => BackendError::Other(format!("{:?}", other)),
    }
}

#[async_trait]
impl FilesystemAdapter for S3Adapter {
    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let (bucket, key) = split_s3_url(remote)?;

        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| BackendError::Other(format!("failed to read {}: {}", local.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    async fn exists(&self, remote: &str) -> Result<bool> {
        let (bucket, key) = split_s3_url(remote)?;

        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => return Ok(true),
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(map_sdk_error(err)),
        }

        // No object with that exact key; treat it as a directory if anything
        // lives beneath it.
        let prefix = format!("{}/", key.trim_end_matches('/'));
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(&prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(!response.contents().is_empty())
    }
}

/// Creates [`S3Adapter`]s from an [`S3AdapterConfig`].
pub struct S3AdapterFactory {
    config: S3AdapterConfig,
}

impl S3AdapterFactory {
    pub fn new(config: S3AdapterConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AdapterFactory for S3AdapterFactory {
    async fn create(&self) -> Result<Arc<dyn FilesystemAdapter>> {
        Ok(Arc::new(S3Adapter::new(self.config.clone()).await))
    }
}
