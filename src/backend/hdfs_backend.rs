use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{CONTENT_LENGTH, LOCATION};
use reqwest::{Body, Client, StatusCode, redirect};
use serde::Deserialize;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::filesystem_adapter::{AdapterFactory, BackendError, FilesystemAdapter, Result};

/// Default WebHDFS port on the namenode (Hadoop 3).
pub const DEFAULT_WEBHDFS_PORT: u16 = 9870;

/// Bytes left as-is in a path segment or query value; everything else is
/// percent-encoded.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Configuration for HdfsAdapter.
#[derive(Debug, Clone)]
pub struct HdfsAdapterConfig {
    /// Namenode host, taken from the `hdfs://host` part of the store root.
    pub namenode: String,
    /// Full WebHDFS base URL (e.g. `https://gateway:8443/gateway/default`).
    /// Overrides `namenode` and `webhdfs_port` when set.
    pub webhdfs_url: Option<String>,
    pub webhdfs_port: u16,
    /// Passed as `user.name` on every request (simple auth).
    pub user: Option<String>,
}

impl HdfsAdapterConfig {
    pub fn new(namenode: impl Into<String>) -> Self {
        Self {
            namenode: namenode.into(),
            webhdfs_url: None,
            webhdfs_port: DEFAULT_WEBHDFS_PORT,
            user: None,
        }
    }

    pub fn with_webhdfs_url(mut self, url: impl Into<String>) -> Self {
        self.webhdfs_url = Some(url.into());
        self
    }

    pub fn with_webhdfs_port(mut self, port: u16) -> Self {
        self.webhdfs_port = port;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// The `.../webhdfs/v1` URL that file paths are appended to.
    fn base_url(&self) -> String {
        let root = match &self.webhdfs_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.namenode, self.webhdfs_port),
        };
        format!("{}/webhdfs/v1", root)
    }
}

/// Error payload returned by WebHDFS.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemoteExceptionBody {
    remote_exception: RemoteException,
}

#[derive(Debug, Deserialize)]
struct RemoteException {
    exception: String,
    message: String,
}

/// An HDFS implementation of `FilesystemAdapter` speaking the WebHDFS REST API.
///
/// Remote paths are `hdfs://host[:port]/abs/path` or plain absolute paths.
/// Creating a file makes its parent directories.
pub struct HdfsAdapter {
    client: Client,
    base_url: String,
    user: Option<String>,
}

impl HdfsAdapter {
    /// Connect to the namenode and verify it answers.
    ///
    /// Fails with [`BackendError::Connection`] if the endpoint can't be reached.
    pub async fn connect(config: HdfsAdapterConfig) -> Result<Self> {
        let adapter = Self::from_config(config)?;

        let response = adapter
            .client
            .get(adapter.op_url("/", "GETFILESTATUS"))
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Connection(format!(
                "namenode at {} answered {}",
                adapter.base_url,
                response.status()
            )));
        }

        Ok(adapter)
    }

    fn from_config(config: HdfsAdapterConfig) -> Result<Self> {
        // Redirects are followed by hand so the file body goes only to the datanode.
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| BackendError::Other(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            user: config.user,
        })
    }

    /// Build a WebHDFS operation URL for an absolute HDFS path.
    ///
    /// Each path segment and the user name are percent-encoded, so names
    /// containing `#`, `?`, `%` or `&` reach the namenode unchanged.
    fn op_url(&self, hdfs_path: &str, op: &str) -> String {
        let path = hdfs_path
            .split('/')
            .map(|segment| utf8_percent_encode(segment, URL_COMPONENT).to_string())
            .collect::<Vec<_>>()
            .join("/");

        let mut url = format!("{}{}?op={}", self.base_url, path, op);
        if let Some(user) = &self.user {
            url.push_str("&user.name=");
            url.extend(utf8_percent_encode(user, URL_COMPONENT));
        }
        url
    }

    /// Turn a non-success response into an error, using the RemoteException
    /// message when the server sent one.
    async fn response_error(response: reqwest::Response, path: &str) -> BackendError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let detail = match serde_json::from_str::<RemoteExceptionBody>(&body) {
            Ok(parsed) => format!(
                "{}: {}",
                parsed.remote_exception.exception, parsed.remote_exception.message
            ),
            Err(_) => format!("unexpected status code: {}", status),
        };

        if status == StatusCode::NOT_FOUND {
            BackendError::NotFound(path.to_string())
        } else {
            BackendError::Other(detail)
        }
    }
}

/// Extract the absolute HDFS path from a remote path.
pub(crate) fn hdfs_path(remote: &str) -> Result<&str> {
    let path = match remote.strip_prefix("hdfs://") {
        Some(rest) => match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => return Err(BackendError::InvalidPath(remote.to_string())),
        },
        None => remote,
    };

    if !path.starts_with('/') {
        return Err(BackendError::InvalidPath(remote.to_string()));
    }
    Ok(path)
}

#[async_trait]
impl FilesystemAdapter for HdfsAdapter {
    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let path = hdfs_path(remote)?;
        let file = File::open(local).await?;
        let len = file.metadata().await?.len();

        let url = format!("{}&overwrite=true", self.op_url(path, "CREATE"));
        let response = self
            .client
            .put(&url)
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let datanode_url = match response.status() {
            StatusCode::TEMPORARY_REDIRECT => response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| {
                    BackendError::Other("CREATE redirect without a Location header".to_string())
                })?,
            _ => return Err(Self::response_error(response, path).await),
        };

        let response = self
            .client
            .put(&datanode_url)
            .header(CONTENT_LENGTH, len)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::response_error(response, path).await)
        }
    }

    async fn exists(&self, remote: &str) -> Result<bool> {
        let path = hdfs_path(remote)?;

        let response = self
            .client
            .get(self.op_url(path, "GETFILESTATUS"))
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::response_error(response, path).await),
        }
    }
}

/// Creates [`HdfsAdapter`]s, connecting to the namenode on each `create`.
pub struct HdfsAdapterFactory {
    config: HdfsAdapterConfig,
}

impl HdfsAdapterFactory {
    pub fn new(config: HdfsAdapterConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AdapterFactory for HdfsAdapterFactory {
    async fn create(&self) -> Result<Arc<dyn FilesystemAdapter>> {
        Ok(Arc::new(HdfsAdapter::connect(self.config.clone()).await?))
    }
}
