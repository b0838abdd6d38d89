//! dingcad Engine - hot-reload viewer runtime
//!
//! The engine keeps a rendered scene in sync with a Rhai scene script and
//! everything it imports. Once per frame it re-probes the watched files; on a
//! change it re-evaluates the script in a fresh context, meshes the solid,
//! splits the mesh into `u16`-indexed chunks, uploads them and swaps them in.
//! A broken edit never blanks the view: the last good scene stays up and the
//! error goes to the status line.
//!
//! ## Example
//!
//! ```ignore
//! use dingcad_engine::{Viewer, ViewerConfig, WgpuRenderer, find_default_scene};
//!
//! let config = ViewerConfig::load_or_default();
//! let mut viewer = Viewer::open(WgpuRenderer::new(device), find_default_scene(), &config)?;
//!
//! loop {
//!     viewer.frame();
//!     if let Some(scene) = viewer.scene() {
//!         for chunk in scene.handles() {
//!             // draw chunk.vertex_buffer / chunk.index_buffer
//!         }
//!     }
//!     draw_status(viewer.status().message());
//! }
//! ```

pub mod chunker;
pub mod config;
pub mod reload;
pub mod renderer;
pub mod scene;
pub mod watch;

use dingcad_kernel::GeometryHandle;
use glam::Vec3;
use std::path::PathBuf;
use thiserror::Error;

pub use chunker::{ChunkConfig, ChunkError, MeshChunk, ShadingConfig, U16_INDEX_LIMIT, chunk};
pub use config::{ConfigError, ViewerConfig};
pub use reload::{ReloadError, ReloadOrchestrator, ReloadState, ReloadTrigger};
pub use renderer::Renderer;
pub use scene::{SceneHolder, SceneState, SceneStats, StatusChannel};
pub use watch::FileWatcher;

#[cfg(feature = "wgpu")]
pub use renderer::{ChunkVertex, GpuChunk, WgpuRenderer};

// Re-export for convenience
pub use dingcad_kernel::{MeshSettings, RawMesh};
pub use dingcad_script::{DependencySet, LoadError, ModulePath};

/// File name looked up when no scene is given
pub const DEFAULT_SCENE_FILE: &str = "scene.rhai";

/// Status shown with the built-in sample when nothing else explains it
pub const NO_SCENE_MESSAGE: &str = "No scene.rhai found. Using built-in sample.";

/// The viewer could not show anything at all
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("StartupError: could not show the built-in sample scene: {0}")]
    Placeholder(#[source] ReloadError),
}

/// Look for `scene.rhai` in the working directory, then the home directory
pub fn find_default_scene() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok();
    find_scene_in(cwd.into_iter().chain(dirs::home_dir()))
}

/// First of `candidates` that contains a `scene.rhai` file
pub fn find_scene_in(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .map(|dir| dir.join(DEFAULT_SCENE_FILE))
        .find(|path| path.is_file())
}

/// Sample solid shown when there is no usable scene script
pub fn placeholder_scene() -> dingcad_kernel::Result<GeometryHandle> {
    let cube = GeometryHandle::cube(Vec3::splat(2.0), true)?;
    let sphere = GeometryHandle::sphere(1.2, 0)?.translate(Vec3::new(0.0, 0.8, 0.0));
    Ok(cube.union(&sphere))
}

/// A running viewer: one entry script, one displayed scene
pub struct Viewer<R: Renderer> {
    orchestrator: ReloadOrchestrator<R>,
}

impl<R: Renderer> Viewer<R> {
    /// Load `entry`, falling back to the built-in sample
    ///
    /// A missing or failing entry script is not fatal; only failing to show
    /// the sample is.
    pub fn open(
        renderer: R,
        entry: Option<PathBuf>,
        config: &ViewerConfig,
    ) -> Result<Self, StartupError> {
        let mut orchestrator = ReloadOrchestrator::new(renderer, entry, config);

        let loaded = orchestrator.entry().is_some() && orchestrator.reload().is_ok();
        if !loaded {
            let placeholder = placeholder_scene()
                .map_err(|e| StartupError::Placeholder(ReloadError::Mesh(e)))?;
            orchestrator
                .install(&placeholder, None, None)
                .map_err(StartupError::Placeholder)?;
            if orchestrator.status().is_empty() {
                orchestrator.status_mut().publish(NO_SCENE_MESSAGE);
            }
        }

        Ok(Self { orchestrator })
    }

    /// Per-frame work: poll for changes and reload if needed
    pub fn frame(&mut self) -> Option<Result<SceneStats, ReloadError>> {
        self.orchestrator.poll()
    }

    pub fn request_reload(&mut self) {
        self.orchestrator.request_reload();
    }

    pub fn scene(&self) -> Option<&SceneState<R::Handle>> {
        self.orchestrator.scene()
    }

    pub fn status(&self) -> &StatusChannel {
        self.orchestrator.status()
    }

    pub fn orchestrator(&self) -> &ReloadOrchestrator<R> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut ReloadOrchestrator<R> {
        &mut self.orchestrator
    }

    /// Release GPU resources and return the renderer
    pub fn close(self) -> R {
        self.orchestrator.shutdown()
    }
}
