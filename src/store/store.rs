//! The store façade.
//!
//! A [`Store`] binds a remote root to the adapter that writes under it and to
//! the local staging area. A job driver asks it for three things per run: a
//! local output directory, a sync handle, and the run's remote path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::backend::{AdapterFactory, FilesystemAdapter, SharedAdapterFactory};
use crate::config::ConfigHelper;
use crate::store::error::{Result, StoreError};
use crate::store::run_path::run_path;
use crate::store::staging::{LocalOutputDir, StagingDirs};
use crate::store::store_spec::{ParsedStoreSpec, StoreKind};
use crate::sync::{self, SyncOptions, SyncState, run_sync};

// =============================================================================
// Options
// =============================================================================

/// Local settings for a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Base directory for per-run local output directories.
    pub staging_dir: PathBuf,
    pub sync: SyncOptions,
}

impl Default for StoreOptions {
    fn default() -> Self {
        let config = ConfigHelper::default();
        Self::from_config(&config)
    }
}

impl StoreOptions {
    pub fn from_config(config: &ConfigHelper) -> Self {
        Self {
            staging_dir: config.staging_dir().to_path_buf(),
            sync: config.sync_options(),
        }
    }

    pub fn with_staging_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.staging_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_sync_options(mut self, sync: SyncOptions) -> Self {
        self.sync = sync;
        self
    }
}

// =============================================================================
// Store
// =============================================================================

struct StoreInner {
    root: String,
    kind: StoreKind,
    factory: Arc<dyn AdapterFactory>,
    /// Built by `factory` on first use, then reused for the store's lifetime.
    adapter: OnceCell<Arc<dyn FilesystemAdapter>>,
    staging: StagingDirs,
    sync_options: SyncOptions,
}

/// A remote root plus the adapter and staging area that serve it.
///
/// Cloning is cheap; clones share the same adapter.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store whose adapter will be built by `factory` on first use.
    pub fn new(
        root: impl Into<String>,
        kind: StoreKind,
        factory: Arc<dyn AdapterFactory>,
        options: StoreOptions,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                root: root.into(),
                kind,
                factory,
                adapter: OnceCell::new(),
                staging: StagingDirs::new(&options.staging_dir),
                sync_options: options.sync,
            }),
        }
    }

    /// Create a store around an adapter the caller already has.
    pub fn with_adapter(
        root: impl Into<String>,
        adapter: Arc<dyn FilesystemAdapter>,
        options: StoreOptions,
    ) -> Self {
        Self::new(
            root,
            StoreKind::Custom,
            Arc::new(SharedAdapterFactory::new(adapter)),
            options,
        )
    }

    /// Create a store from a specification string (URL, path, or configured name).
    ///
    /// The backend is chosen from the spec but not contacted yet.
    pub fn from_spec(spec: &str, config: &ConfigHelper) -> Result<Self> {
        let parsed = ParsedStoreSpec::parse(spec, Some(config))?;
        let factory = parsed.adapter_factory(config)?;
        Ok(Self::new(
            parsed.root,
            parsed.kind,
            factory,
            StoreOptions::from_config(config),
        ))
    }

    pub fn root(&self) -> &str {
        &self.inner.root
    }

    pub fn kind(&self) -> StoreKind {
        self.inner.kind
    }

    pub fn staging(&self) -> &StagingDirs {
        &self.inner.staging
    }

    /// The store's filesystem adapter, constructing it on first call.
    ///
    /// A construction failure is returned to this caller and the next call
    /// tries again.
    pub async fn filesystem(&self) -> Result<Arc<dyn FilesystemAdapter>> {
        let adapter = self
            .inner
            .adapter
            .get_or_try_init(|| async {
                let adapter = self.inner.factory.create().await.map_err(|source| {
                    StoreError::AdapterConstructionFailed {
                        root: self.inner.root.clone(),
                        source,
                    }
                })?;
                info!(root = %self.inner.root, kind = ?self.inner.kind, "filesystem adapter ready");
                Ok::<_, StoreError>(adapter)
            })
            .await?;
        Ok(Arc::clone(adapter))
    }

    /// Check whether a remote path exists.
    pub async fn exists(&self, remote: &str) -> Result<bool> {
        let adapter = self.filesystem().await?;
        Ok(adapter.exists(remote).await?)
    }

    /// The remote root for a run.
    pub fn get_run_path(&self, run_id: &str) -> String {
        run_path(&self.inner.root, run_id)
    }

    /// A provider of the run's local output directory.
    pub fn local_output_dir_fn(&self, run_id: &str) -> LocalOutputDirFn {
        LocalOutputDirFn {
            store: self.clone(),
            run_id: run_id.to_string(),
        }
    }

    /// A sync handle for the run, with fresh (empty) sync state.
    ///
    /// Every call returns an independent handle: a second handle for the same
    /// run knows nothing of what the first uploaded and will upload
    /// everything again. Keep one handle per run.
    pub fn sync_fn(&self, run_id: &str) -> RunSync {
        RunSync {
            store: self.clone(),
            run_id: run_id.to_string(),
            run_root: self.get_run_path(run_id),
            state: SyncState::new(),
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.inner.root)
            .field("kind", &self.inner.kind)
            .field("staging", &self.inner.staging)
            .finish()
    }
}

// =============================================================================
// Per-run handles
// =============================================================================

/// Hands out the local output directory of one run.
#[derive(Debug, Clone)]
pub struct LocalOutputDirFn {
    store: Store,
    run_id: String,
}

impl LocalOutputDirFn {
    /// Ensure the run's directory exists and return a handle to it.
    ///
    /// Also makes sure the store's adapter can be constructed, so a bad
    /// remote is reported before the job starts writing.
    pub async fn acquire(&self) -> Result<LocalOutputDir> {
        self.store.filesystem().await?;
        self.store.staging().acquire(&self.run_id).await
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Syncs one run's local directory to its remote root.
///
/// Holds the run's [`SyncState`], so reuse the same handle for every sync of
/// the run.
#[derive(Debug)]
pub struct RunSync {
    store: Store,
    run_id: String,
    run_root: String,
    state: SyncState,
}

impl RunSync {
    /// Upload every file under `local_dir` that is new or changed since the
    /// last sync through this handle. Returns the number of files uploaded.
    pub async fn sync(&mut self, local_dir: impl AsRef<Path>) -> sync::Result<usize> {
        let adapter = self.store.filesystem().await?;
        run_sync(
            adapter.as_ref(),
            &self.run_root,
            &mut self.state,
            local_dir.as_ref(),
            &self.store.inner.sync_options,
        )
        .await
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_root(&self) -> &str {
        &self.run_root
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryAdapter};
    use crate::sync::SyncError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    const T1: u64 = 1330712280;
    const T2: u64 = 1330712292;

    fn touch(path: &Path, secs: u64) {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    /// Counts how often the store asks for an adapter.
    struct CountingFactory {
        adapter: Arc<MemoryAdapter>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AdapterFactory for CountingFactory {
        async fn create(&self) -> crate::backend::Result<Arc<dyn FilesystemAdapter>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.adapter.clone())
        }
    }

    struct UnreachableFactory;

    #[async_trait]
    impl AdapterFactory for UnreachableFactory {
        async fn create(&self) -> crate::backend::Result<Arc<dyn FilesystemAdapter>> {
            Err(BackendError::Connection("connection refused".to_string()))
        }
    }

    fn memory_store(staging: &Path) -> (Store, Arc<MemoryAdapter>) {
        let adapter = Arc::new(MemoryAdapter::new());
        let store = Store::with_adapter(
            "/user/test/output",
            adapter.clone(),
            StoreOptions::default().with_staging_dir(staging),
        );
        (store, adapter)
    }

    #[tokio::test]
    async fn test_sync_scenario() {
        let staging = TempDir::new().unwrap();
        let (store, adapter) = memory_store(staging.path());

        let run_id = "run_001";
        let get_local_output_dir = store.local_output_dir_fn(run_id);
        let mut sync_to_store = store.sync_fn(run_id);
        let run_root = store.get_run_path(run_id);
        assert_eq!(run_root, "/user/test/output/run_001");

        let local_dir = get_local_output_dir.acquire().await.unwrap();

        touch(&local_dir.join("a.txt"), T1);
        assert_eq!(sync_to_store.sync(&*local_dir).await.unwrap(), 1);
        assert_eq!(
            adapter.last_upload().unwrap().remote,
            format!("{}/a.txt", run_root)
        );

        touch(&local_dir.join("b.txt"), T1);
        assert_eq!(sync_to_store.sync(&*local_dir).await.unwrap(), 1);
        assert_eq!(
            adapter.last_upload().unwrap().remote,
            format!("{}/b.txt", run_root)
        );

        let subdir = local_dir.join("subdir");
        std::fs::create_dir(&subdir).unwrap();
        touch(&subdir.join("c.txt"), T1);
        assert_eq!(sync_to_store.sync(&*local_dir).await.unwrap(), 1);
        assert_eq!(
            adapter.last_upload().unwrap().remote,
            format!("{}/subdir/c.txt", run_root)
        );

        touch(&local_dir.join("a.txt"), T2);
        touch(&local_dir.join("b.txt"), T2);
        assert_eq!(adapter.upload_count(), 3);

        assert_eq!(sync_to_store.sync(&*local_dir).await.unwrap(), 2);
        assert_eq!(adapter.upload_count(), 5);

        let last_two: Vec<String> = adapter.uploads()[3..]
            .iter()
            .map(|r| r.remote.clone())
            .collect();
        assert_eq!(
            last_two,
            vec![format!("{}/a.txt", run_root), format!("{}/b.txt", run_root)]
        );
    }

    #[tokio::test]
    async fn test_sync_fn_handles_are_independent() {
        let staging = TempDir::new().unwrap();
        let (store, adapter) = memory_store(staging.path());
        let local_dir = store.local_output_dir_fn("run_001").acquire().await.unwrap();
        touch(&local_dir.join("a.txt"), T1);

        let mut first = store.sync_fn("run_001");
        assert_eq!(first.sync(&*local_dir).await.unwrap(), 1);
        assert_eq!(first.sync(&*local_dir).await.unwrap(), 0);

        let mut second = store.sync_fn("run_001");
        assert!(second.state().is_empty());
        assert_eq!(second.sync(&*local_dir).await.unwrap(), 1);
        assert_eq!(adapter.upload_count(), 2);
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let staging = TempDir::new().unwrap();
        let (store, adapter) = memory_store(staging.path());

        let dir_a = store.local_output_dir_fn("run_a").acquire().await.unwrap();
        let dir_b = store.local_output_dir_fn("run_b").acquire().await.unwrap();
        assert_ne!(dir_a.path(), dir_b.path());

        touch(&dir_a.join("model.bin"), T1);
        touch(&dir_b.join("model.bin"), T1);

        store.sync_fn("run_a").sync(&*dir_a).await.unwrap();
        store.sync_fn("run_b").sync(&*dir_b).await.unwrap();

        assert!(adapter.get("/user/test/output/run_a/model.bin").is_some());
        assert!(adapter.get("/user/test/output/run_b/model.bin").is_some());
        assert!(store.exists("/user/test/output/run_a").await.unwrap());
    }

    #[tokio::test]
    async fn test_adapter_created_lazily_once() {
        let staging = TempDir::new().unwrap();
        let factory = Arc::new(CountingFactory {
            adapter: Arc::new(MemoryAdapter::new()),
            calls: AtomicUsize::new(0),
        });
        let store = Store::new(
            "/user/test/output",
            StoreKind::Custom,
            factory.clone(),
            StoreOptions::default().with_staging_dir(staging.path()),
        );

        let mut sync = store.sync_fn("run_001");
        let dir_fn = store.local_output_dir_fn("run_001");
        assert_eq!(store.get_run_path("run_001"), "/user/test/output/run_001");
        assert_eq!(factory.calls.load(Ordering::SeqCst), 0);

        let local_dir = dir_fn.acquire().await.unwrap();
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);

        touch(&local_dir.join("a.txt"), T1);
        sync.sync(&*local_dir).await.unwrap();
        sync.sync(&*local_dir).await.unwrap();
        store.clone().sync_fn("run_002").sync(&*local_dir).await.unwrap();
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_adapter_failure_surfaces_on_first_use() {
        let staging = TempDir::new().unwrap();
        let store = Store::new(
            "hdfs://unreachable/output",
            StoreKind::Hdfs,
            Arc::new(UnreachableFactory),
            StoreOptions::default().with_staging_dir(staging.path()),
        );

        // Building handles never touches the remote
        let dir_fn = store.local_output_dir_fn("run_001");
        let mut sync = store.sync_fn("run_001");

        let result = dir_fn.acquire().await;
        assert!(matches!(
            result,
            Err(StoreError::AdapterConstructionFailed { .. })
        ));

        let result = sync.sync(staging.path()).await;
        assert!(matches!(
            result,
            Err(SyncError::Store(StoreError::AdapterConstructionFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_from_spec_local_store_end_to_end() {
        let remote = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let config = ConfigHelper::default();

        let store = Store::from_spec(&remote.path().to_string_lossy(), &config).unwrap();
        assert_eq!(store.kind(), StoreKind::Local);

        let local_dir = StagingDirs::new(staging.path()).acquire("run_001").await.unwrap();
        std::fs::create_dir_all(local_dir.join("checkpoints")).unwrap();
        std::fs::write(local_dir.join("checkpoints/epoch_1.ckpt"), b"weights").unwrap();

        let mut sync = store.sync_fn("run_001");
        assert_eq!(sync.sync(&*local_dir).await.unwrap(), 1);

        let uploaded = remote.path().join("run_001/checkpoints/epoch_1.ckpt");
        assert_eq!(std::fs::read(uploaded).unwrap(), b"weights");
        assert!(
            store
                .exists(&format!("{}/checkpoints", sync.run_root()))
                .await
                .unwrap()
        );
    }

    #[test]
    fn test_from_spec_selects_backend() {
        let config = ConfigHelper::default();
        let store = Store::from_spec("s3://bucket/output", &config).unwrap();
        assert_eq!(store.kind(), StoreKind::S3);
        assert_eq!(store.get_run_path("run_001"), "s3://bucket/output/run_001");

        let store = Store::from_spec("hdfs://namenode:8020/user/test/output/", &config).unwrap();
        assert_eq!(store.kind(), StoreKind::Hdfs);
        assert_eq!(
            store.get_run_path("run_001"),
            "hdfs://namenode:8020/user/test/output/run_001"
        );
    }
}
