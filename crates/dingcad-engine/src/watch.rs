//! Polling file watcher for hot reload
//!
//! Each poll re-probes every watched path. Scene graphs are a handful of
//! files, so this runs once per frame without a background thread.

use dingcad_script::{DependencySet, ModulePath};

/// Watches the files of the last accepted module graph
#[derive(Debug, Clone, Default)]
pub struct FileWatcher {
    watched: DependencySet,
}

impl FileWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the watched set wholesale
    pub fn watch(&mut self, set: DependencySet) {
        tracing::debug!(files = set.len(), "watching scene files");
        self.watched = set;
    }

    pub fn watched(&self) -> &DependencySet {
        &self.watched
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    /// Paths whose change-token differs from the recorded one
    pub fn poll(&self) -> Vec<ModulePath> {
        let changed = self.watched.changed();
        for path in &changed {
            tracing::debug!(path = %path, "scene file changed");
        }
        changed
    }

    /// Accept the current on-disk state without changing which paths are
    /// watched
    pub fn acknowledge(&mut self) {
        self.watched.refresh();
    }
}
