//! Import specifier resolution
//!
//! Resolution is purely lexical: `.` and `..` are collapsed without touching
//! the filesystem, so a path that does not exist yet still has a stable
//! identity (and can be watched until it appears).

use crate::error::LoadError;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Extension assumed when an import names a module without one
pub const MODULE_EXTENSION: &str = "rhai";

/// Absolute, normalized path identifying one module file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModulePath(PathBuf);

impl ModulePath {
    /// Normalize an absolute path into a module identity
    pub fn new(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or(path);
        resolve(&path.to_string_lossy(), dir)
    }

    pub(crate) fn from_normalized(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Directory that relative imports inside this module resolve against
    pub fn dir(&self) -> &Path {
        self.0.parent().unwrap_or(&self.0)
    }

    /// Identity string handed to the scripting engine as the AST source
    pub fn source_name(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for ModulePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Resolve an import specifier against the importing module's directory
///
/// Relative specifiers are joined onto `importing_dir`; absolute ones are
/// only normalized. A specifier without an extension gets `.rhai`.
pub fn resolve(specifier: &str, importing_dir: &Path) -> Result<ModulePath, LoadError> {
    let fail = |reason: &str| LoadError::Path {
        specifier: specifier.to_string(),
        base: importing_dir.to_path_buf(),
        reason: reason.to_string(),
    };

    if specifier.trim().is_empty() {
        return Err(fail("empty module specifier"));
    }
    if specifier.contains('\0') {
        return Err(fail("specifier contains a NUL byte"));
    }

    let requested = Path::new(specifier);
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else if importing_dir.is_absolute() {
        importing_dir.join(requested)
    } else {
        return Err(fail("importing directory is not absolute"));
    };

    let mut normalized = normalize(&joined).ok_or_else(|| fail("path escapes the filesystem root"))?;
    if normalized.file_name().is_none() {
        return Err(fail("path does not name a file"));
    }
    if normalized.extension().is_none() {
        normalized.set_extension(MODULE_EXTENSION);
    }

    tracing::debug!(specifier, resolved = %normalized.display(), "resolved module");
    Ok(ModulePath(normalized))
}

/// Collapse `.` and `..` lexically; `None` if `..` climbs above the root
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}
