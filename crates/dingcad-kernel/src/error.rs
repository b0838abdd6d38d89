//! Error types for the kernel

use thiserror::Error;

/// Result type alias using the kernel's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or meshing solids
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A constructor or transform received an unusable argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Mesh generation failed
    #[error("Mesh generation failed: {0}")]
    MeshGeneration(String),
}
