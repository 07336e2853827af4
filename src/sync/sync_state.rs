use std::collections::HashMap;
use std::time::SystemTime;

/// Last-synced modification times for one run, keyed by the file's
/// forward-slash path relative to the staging directory.
///
/// Lives only in memory; a fresh state means every file is considered new.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    synced: HashMap<String, SystemTime>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The modification time recorded at the last successful upload.
    pub fn get(&self, relative: &str) -> Option<SystemTime> {
        self.synced.get(relative).copied()
    }

    /// A file needs uploading if it was never synced or its modification time
    /// has moved strictly past the recorded one.
    pub fn needs_upload(&self, relative: &str, modified: SystemTime) -> bool {
        match self.synced.get(relative) {
            None => true,
            Some(synced) => *synced < modified,
        }
    }

    /// Record a successful upload.
    pub fn record(&mut self, relative: impl Into<String>, modified: SystemTime) {
        self.synced.insert(relative.into(), modified);
    }

    pub fn len(&self) -> usize {
        self.synced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synced.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SystemTime)> {
        self.synced.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
