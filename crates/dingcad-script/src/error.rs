//! Failures of a scene load, tagged for the status line

use crate::resolver::ModulePath;
use std::fmt;
use thiserror::Error;

/// Why a module file could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoErrorKind {
    NotFound,
    Unreadable,
}

impl From<std::io::ErrorKind> for IoErrorKind {
    fn from(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Unreadable,
        }
    }
}

impl fmt::Display for IoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found"),
            Self::Unreadable => f.write_str("unreadable"),
        }
    }
}

/// Everything that can go wrong between an entry path and a solid
///
/// The `Display` text starts with the error's tag so it can be shown to the
/// user as is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("PathError: cannot resolve '{specifier}' from {}: {reason}", .base.display())]
    Path {
        specifier: String,
        base: std::path::PathBuf,
        reason: String,
    },

    #[error("IoError: {path} is {kind}: {message}")]
    Io {
        path: ModulePath,
        kind: IoErrorKind,
        message: String,
    },

    #[error("CircularDependencyError: {path} is already being loaded ({chain})")]
    CircularDependency { path: ModulePath, chain: String },

    #[error("CompileError: {path}: {message}")]
    Compile { path: ModulePath, message: String },

    #[error("ExecutionError: {path}: {message}")]
    Execution { path: ModulePath, message: String },

    #[error("MissingExportError: {path} exports no '{name}' value or function")]
    MissingExport { path: ModulePath, name: String },

    #[error("TypeError: {path}: exported '{name}' is {found}, not a Solid")]
    Type {
        path: ModulePath,
        name: String,
        found: String,
    },
}

impl LoadError {
    /// The taxonomy tag leading the message
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Path { .. } => "PathError",
            Self::Io { .. } => "IoError",
            Self::CircularDependency { .. } => "CircularDependencyError",
            Self::Compile { .. } => "CompileError",
            Self::Execution { .. } => "ExecutionError",
            Self::MissingExport { .. } => "MissingExportError",
            Self::Type { .. } => "TypeError",
        }
    }

    /// The module the failure is attributed to, if any
    pub fn path(&self) -> Option<&ModulePath> {
        match self {
            Self::Path { .. } => None,
            Self::Io { path, .. }
            | Self::CircularDependency { path, .. }
            | Self::Compile { path, .. }
            | Self::Execution { path, .. }
            | Self::MissingExport { path, .. }
            | Self::Type { path, .. } => Some(path),
        }
    }

    /// Whether this is a read failure caused by a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Io {
                kind: IoErrorKind::NotFound,
                ..
            }
        )
    }
}
