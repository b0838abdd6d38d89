//! Viewer configuration
//!
//! Settings are stored as JSON in `{config_dir}/dingcad/viewer.json`. Every
//! field has a default, so a partial file only overrides what it names and a
//! missing file means defaults.

use crate::chunker::{ChunkConfig, ShadingConfig, U16_INDEX_LIMIT};
use dingcad_kernel::MeshSettings;
use dingcad_script::EvalOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Settings for the hot-reload viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub shading: ShadingConfig,
    /// Maximum vertices per uploaded chunk
    pub index_limit: usize,
    /// Scene units (millimetres) to renderer units
    pub scene_scale: f32,
    /// Scene is Z-up, renderer is Y-up
    pub z_up: bool,
    /// Exported variable holding the scene
    pub export_name: String,
    /// Zero-argument function used when the export is missing
    pub fallback_fn: Option<String>,
    /// Surface-nets cells along the longest axis for implicit meshing
    pub mesh_resolution: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let eval = EvalOptions::default();
        let chunk = ChunkConfig::default();
        Self {
            shading: chunk.shading,
            index_limit: U16_INDEX_LIMIT,
            scene_scale: chunk.scene_scale,
            z_up: chunk.z_up,
            export_name: eval.export_name,
            fallback_fn: eval.fallback_fn,
            mesh_resolution: eval.mesh.resolution,
        }
    }
}

impl ViewerConfig {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| Self::path_in(&dir))
    }

    fn path_in(config_dir: &Path) -> PathBuf {
        config_dir.join("dingcad").join("viewer.json")
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the user config directory
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from_config_dir(dirs::config_dir().as_deref())
    }

    fn load_from_config_dir(config_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let config_dir = config_dir.ok_or(ConfigError::NoConfigDir)?;
        Self::load(&Self::path_in(config_dir))
    }

    /// [`load_default`](Self::load_default), falling back to defaults on any
    /// error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|error| {
            tracing::warn!(%error, "using default viewer config");
            Self::default()
        })
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io)
    }

    pub fn mesh_settings(&self) -> MeshSettings {
        MeshSettings::default().with_resolution(self.mesh_resolution)
    }

    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            export_name: self.export_name.clone(),
            fallback_fn: self.fallback_fn.clone(),
            mesh: self.mesh_settings(),
        }
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            shading: self.shading.clone(),
            index_limit: self.index_limit,
            scene_scale: self.scene_scale,
            z_up: self.z_up,
        }
    }
}
