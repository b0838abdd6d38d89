//! File probe: cheap change detection without reading file contents

use std::path::Path;
use std::time::SystemTime;

/// Observation of a file's metadata
///
/// Two tokens compare equal only when both the modification time and the
/// length match, which catches same-second edits that change the size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeToken {
    modified: Option<SystemTime>,
    len: u64,
}

/// Stat `path`; `None` when the file is missing or cannot be inspected
pub fn probe(path: &Path) -> Option<ChangeToken> {
    let metadata = std::fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some(ChangeToken {
        modified: metadata.modified().ok(),
        len: metadata.len(),
    })
}
