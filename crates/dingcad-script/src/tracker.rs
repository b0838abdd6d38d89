//! Dependency tracking for the module graph of one scene

use crate::probe::{ChangeToken, probe};
use crate::resolver::ModulePath;
use std::collections::BTreeMap;

/// Files that contributed to a scene, each with the token seen at load time
///
/// A `None` token records a file that was missing when observed; it counts
/// as changed once it appears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    entries: BTreeMap<ModulePath, Option<ChangeToken>>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: ModulePath, token: Option<ChangeToken>) {
        self.entries.insert(path, token);
    }

    pub fn contains(&self, path: &ModulePath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &ModulePath> {
        self.entries.keys()
    }

    /// Recorded token for `path`; outer `None` when the path is not tracked
    pub fn token(&self, path: &ModulePath) -> Option<Option<ChangeToken>> {
        self.entries.get(path).copied()
    }

    /// Re-probe every path and list those whose token differs
    pub fn changed(&self) -> Vec<ModulePath> {
        self.entries
            .iter()
            .filter(|(path, recorded)| probe(path.as_path()) != **recorded)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Accept the current on-disk state of every path as seen
    pub fn refresh(&mut self) {
        for (path, token) in &mut self.entries {
            *token = probe(path.as_path());
        }
    }
}

/// Builds the [`DependencySet`] of one load attempt
#[derive(Debug, Default)]
pub struct DependencyTracker {
    working: DependencySet,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh attempt, forgetting everything recorded so far
    pub fn begin_tracking(&mut self) {
        self.working = DependencySet::new();
    }

    /// Record a module together with its current change token
    pub fn record(&mut self, path: ModulePath) {
        let token = probe(path.as_path());
        self.record_with_token(path, token);
    }

    pub fn record_with_token(&mut self, path: ModulePath, token: Option<ChangeToken>) {
        tracing::trace!(path = %path, present = token.is_some(), "recorded dependency");
        self.working.insert(path, token);
    }

    /// The set recorded since the last [`begin_tracking`](Self::begin_tracking)
    pub fn snapshot(&self) -> DependencySet {
        self.working.clone()
    }
}
