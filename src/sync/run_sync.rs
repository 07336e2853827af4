//! The sync pass.
//!
//! [`run_sync`] walks a local directory, compares every file's modification
//! time with the [`SyncState`], and uploads the files that are new or have
//! changed since their last upload.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use futures::StreamExt;
use futures::stream;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::backend::FilesystemAdapter;
use crate::store::remote_path;
use crate::sync::SyncState;
use crate::sync::error::{Result, SyncError};

/// Default number of uploads allowed in flight during one pass.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 4;

/// Options for a sync pass.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Uploads allowed in flight at once. 0 and 1 both mean sequential.
    pub max_concurrent_uploads: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
        }
    }
}

impl SyncOptions {
    pub fn with_max_concurrent_uploads(mut self, max: usize) -> Self {
        self.max_concurrent_uploads = max;
        self
    }
}

/// A regular file found under the local directory.
#[derive(Debug, Clone)]
struct LocalFile {
    /// Forward-slash path relative to the walked directory.
    relative: String,
    path: PathBuf,
    modified: SystemTime,
}

/// Run one sync pass and return the number of files uploaded.
///
/// Files are visited in lexicographic order of their relative path. The
/// first failed upload ends the pass with [`SyncError::UploadFailed`]; files
/// uploaded before it keep their updated state, so the next pass retries
/// only what is still stale.
pub async fn run_sync(
    adapter: &dyn FilesystemAdapter,
    run_root: &str,
    state: &mut SyncState,
    local_dir: &Path,
    options: &SyncOptions,
) -> Result<usize> {
    let files = walk_local_dir(local_dir).await?;
    let scanned = files.len();

    let pending: Vec<LocalFile> = files
        .into_iter()
        .filter(|file| {
            let stale = state.needs_upload(&file.relative, file.modified);
            if !stale {
                debug!(file = %file.relative, "unchanged, skipping");
            }
            stale
        })
        .collect();

    // `buffered` yields in input order, so state updates and the reported
    // error follow walk order no matter which upload finishes first.
    let mut uploads = stream::iter(pending)
        .map(move |file| async move {
            let remote = remote_path(run_root, &file.relative);
            let result = adapter.upload(&file.path, &remote).await;
            (file, remote, result)
        })
        .buffered(options.max_concurrent_uploads.max(1));

    let mut uploaded = 0;
    while let Some((file, remote, result)) = uploads.next().await {
        match result {
            Ok(()) => {
                debug!(file = %file.relative, remote = %remote, "uploaded");
                state.record(file.relative, file.modified);
                uploaded += 1;
            }
            Err(source) => {
                warn!(file = %file.relative, remote = %remote, error = %source, "upload failed");
                return Err(SyncError::UploadFailed {
                    local: file.path,
                    remote,
                    source,
                });
            }
        }
    }

    info!(run_root, scanned, uploaded, "sync pass complete");
    Ok(uploaded)
}

/// Collect every regular file under `root`, sorted by relative path.
///
/// Symlinks are neither followed nor reported.
async fn walk_local_dir(root: &Path) -> Result<Vec<LocalFile>> {
    let walk_error = |path: &Path, source: std::io::Error| SyncError::Walk {
        path: path.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let mut dirs = vec![root.to_path_buf()];

    while let Some(dir) = dirs.pop() {
        let mut entries = fs::read_dir(&dir).await.map_err(|e| walk_error(&dir, e))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| walk_error(&dir, e))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| walk_error(&path, e))?;

            if file_type.is_dir() {
                dirs.push(path);
            } else if file_type.is_file() {
                let metadata = entry.metadata().await.map_err(|e| walk_error(&path, e))?;
                let modified = metadata.modified().map_err(|e| walk_error(&path, e))?;
                let Some(relative) = relative_path_string(root, &path) else {
                    warn!(path = %path.display(), "skipping file with a non-UTF-8 name");
                    continue;
                };
                files.push(LocalFile {
                    relative,
                    path,
                    modified,
                });
            }
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// Path of `path` relative to `root`, joined with `/` on every platform.
///
/// `None` if any component is not valid UTF-8.
fn relative_path_string(root: &Path, path: &Path) -> Option<String> {
    let components = path
        .strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(components.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryAdapter;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    const T1: u64 = 1330712280;
    const T2: u64 = 1330712292;
    const RUN_ROOT: &str = "/user/test/output/run_001";

    /// Create the file if needed and set its modification time.
    fn touch(path: &Path, secs: u64) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn sequential() -> SyncOptions {
        SyncOptions::default().with_max_concurrent_uploads(1)
    }

    #[tokio::test]
    async fn test_new_file_uploaded_to_run_root() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.txt"), T1);

        let adapter = MemoryAdapter::new();
        let mut state = SyncState::new();
        let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
            .await
            .unwrap();

        assert_eq!(uploaded, 1);
        let record = adapter.last_upload().unwrap();
        assert_eq!(record.remote, "/user/test/output/run_001/a.txt");
        assert_eq!(record.local, dir.path().join("a.txt"));
        assert_eq!(
            state.get("a.txt"),
            Some(UNIX_EPOCH + Duration::from_secs(T1))
        );
    }

    #[tokio::test]
    async fn test_unchanged_files_not_reuploaded() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.txt"), T1);
        touch(&dir.path().join("b.txt"), T1);

        let adapter = MemoryAdapter::new();
        let mut state = SyncState::new();
        run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
            .await
            .unwrap();
        let before = state.clone();

        for _ in 0..3 {
            let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
                .await
                .unwrap();
            assert_eq!(uploaded, 0);
        }
        assert_eq!(adapter.upload_count(), 2);
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_modification_time_controls_reupload() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        touch(&a, T2);

        let adapter = MemoryAdapter::new();
        let mut state = SyncState::new();
        run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
            .await
            .unwrap();

        // Same timestamp: no upload
        touch(&a, T2);
        let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
            .await
            .unwrap();
        assert_eq!(uploaded, 0);

        // Earlier timestamp: no upload
        touch(&a, T1);
        let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
            .await
            .unwrap();
        assert_eq!(uploaded, 0);

        // Later timestamp, identical content: upload
        touch(&a, T2 + 1);
        let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
            .await
            .unwrap();
        assert_eq!(uploaded, 1);
        assert_eq!(adapter.upload_count(), 2);
    }

    #[tokio::test]
    async fn test_nested_directories_use_forward_slashes() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("subdir/deeper/c.txt"), T1);
        touch(&dir.path().join("subdir/b.txt"), T1);
        touch(&dir.path().join("a.txt"), T1);

        let adapter = MemoryAdapter::new();
        let mut state = SyncState::new();
        let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
            .await
            .unwrap();

        assert_eq!(uploaded, 3);
        let remotes: Vec<String> = adapter.uploads().into_iter().map(|r| r.remote).collect();
        assert_eq!(
            remotes,
            vec![
                "/user/test/output/run_001/a.txt",
                "/user/test/output/run_001/subdir/b.txt",
                "/user/test/output/run_001/subdir/deeper/c.txt",
            ]
        );
        assert!(state.get("subdir/deeper/c.txt").is_some());
    }

    #[tokio::test]
    async fn test_empty_directories_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("empty/nested")).unwrap();

        let adapter = MemoryAdapter::new();
        let mut state = SyncState::new();
        let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
            .await
            .unwrap();

        assert_eq!(uploaded, 0);
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_partial_progress() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.txt"), T1);
        touch(&dir.path().join("b.txt"), T1);
        touch(&dir.path().join("c.txt"), T1);

        let adapter = MemoryAdapter::new();
        adapter.fail_uploads_to("/user/test/output/run_001/b.txt");
        let mut state = SyncState::new();

        let result = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential()).await;
        match result {
            Err(SyncError::UploadFailed { local, remote, .. }) => {
                assert_eq!(local, dir.path().join("b.txt"));
                assert_eq!(remote, "/user/test/output/run_001/b.txt");
            }
            other => panic!("expected UploadFailed, got {:?}", other),
        }

        // a.txt made it, c.txt was never attempted
        assert_eq!(adapter.upload_count(), 1);
        assert!(state.get("a.txt").is_some());
        assert!(state.get("b.txt").is_none());
        assert!(state.get("c.txt").is_none());
        assert!(dir.path().join("b.txt").exists());

        // The next pass retries exactly the unsynced files
        adapter.clear_failure("/user/test/output/run_001/b.txt");
        let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
            .await
            .unwrap();
        assert_eq!(uploaded, 2);
        assert_eq!(adapter.upload_count(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_match_sequential() {
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            touch(&dir.path().join(format!("shard_{:02}/part.bin", i)), T1);
        }

        let adapter = MemoryAdapter::new();
        let mut state = SyncState::new();
        let options = SyncOptions::default().with_max_concurrent_uploads(8);

        let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &options)
            .await
            .unwrap();
        assert_eq!(uploaded, 20);
        assert_eq!(state.len(), 20);

        let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &options)
            .await
            .unwrap();
        assert_eq!(uploaded, 0);
        assert_eq!(adapter.upload_count(), 20);
    }

    #[tokio::test]
    async fn test_concurrent_failure_reports_first_in_walk_order() {
        let dir = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
            touch(&dir.path().join(name), T1);
        }

        let adapter = MemoryAdapter::new();
        adapter.fail_uploads_to("/user/test/output/run_001/b.txt");
        adapter.fail_uploads_to("/user/test/output/run_001/d.txt");
        let mut state = SyncState::new();
        let options = SyncOptions::default().with_max_concurrent_uploads(4);

        let result = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &options).await;
        assert!(matches!(
            result,
            Err(SyncError::UploadFailed { ref remote, .. }) if remote == "/user/test/output/run_001/b.txt"
        ));
        assert!(state.get("a.txt").is_some());
        assert!(state.get("b.txt").is_none());
    }

    #[tokio::test]
    async fn test_missing_local_dir() {
        let dir = TempDir::new().unwrap();
        let adapter = MemoryAdapter::new();
        let mut state = SyncState::new();

        let result = run_sync(
            &adapter,
            RUN_ROOT,
            &mut state,
            &dir.path().join("missing"),
            &sequential(),
        )
        .await;
        assert!(matches!(result, Err(SyncError::Walk { .. })));
    }

    #[test]
    fn test_relative_path_string() {
        let root = Path::new("/tmp/stage");
        assert_eq!(
            relative_path_string(root, Path::new("/tmp/stage/subdir/c.txt")).as_deref(),
            Some("subdir/c.txt")
        );
        assert_eq!(
            relative_path_string(root, Path::new("/tmp/stage/a.txt")).as_deref(),
            Some("a.txt")
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_relative_path_string_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new("/tmp/stage");
        let path = root.join(OsStr::from_bytes(b"bad\xff.txt"));
        assert_eq!(relative_path_string(root, &path), None);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.txt"), T1);
        // These two would collapse to the same lossy name "bad\u{FFFD}.txt".
        touch(&dir.path().join(OsStr::from_bytes(b"bad\xff.txt")), T1);
        touch(&dir.path().join(OsStr::from_bytes(b"bad\xfe.txt")), T1);

        let adapter = MemoryAdapter::new();
        let mut state = SyncState::new();
        let uploaded = run_sync(&adapter, RUN_ROOT, &mut state, dir.path(), &sequential())
            .await
            .unwrap();

        assert_eq!(uploaded, 1);
        assert_eq!(state.len(), 1);
        assert!(state.get("a.txt").is_some());
        assert_eq!(
            adapter.last_upload().unwrap().remote,
            "/user/test/output/run_001/a.txt"
        );
    }
}
