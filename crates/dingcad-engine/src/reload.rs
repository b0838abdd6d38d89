//! Reload orchestration
//!
//! The orchestrator runs the whole hot-reload cycle on the render thread:
//! poll the watched files, re-evaluate the entry script in a fresh context,
//! mesh and chunk the result, upload it, and only then swap it in. Any
//! failure along the way leaves the displayed scene and the watch list as
//! they were and publishes the error on the status channel.

use crate::chunker::{self, ChunkConfig, ChunkError, MeshChunk};
use crate::config::ViewerConfig;
use crate::renderer::Renderer;
use crate::scene::{SceneHolder, SceneState, SceneStats, StatusChannel};
use crate::watch::FileWatcher;
use dingcad_kernel::{GeometryHandle, MeshSettings};
use dingcad_script::{DependencySet, DependencyTracker, LoadError, ModulePath, SceneEvaluator};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a reload attempt did not replace the scene
#[derive(Error, Debug)]
pub enum ReloadError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("MeshError: {0}")]
    Mesh(#[from] dingcad_kernel::Error),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error("UploadError: {0}")]
    Upload(String),

    #[error("No entry script to reload")]
    NoEntry,
}

/// Where the orchestrator is in a reload cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    Evaluating,
    Swapping,
}

/// What started a reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTrigger {
    Manual,
    Changed(Vec<ModulePath>),
}

/// Drives hot reload of one entry script into one scene slot
pub struct ReloadOrchestrator<R: Renderer> {
    renderer: R,
    entry: Option<PathBuf>,
    evaluator: SceneEvaluator,
    mesh: MeshSettings,
    chunking: ChunkConfig,
    tracker: DependencyTracker,
    watcher: FileWatcher,
    holder: SceneHolder<R::Handle>,
    status: StatusChannel,
    state: ReloadState,
    manual_pending: bool,
}

impl<R: Renderer> ReloadOrchestrator<R> {
    pub fn new(renderer: R, entry: Option<PathBuf>, config: &ViewerConfig) -> Self {
        let entry = entry.map(|path| std::path::absolute(&path).unwrap_or(path));
        Self {
            renderer,
            entry,
            evaluator: SceneEvaluator::new(config.eval_options()),
            mesh: config.mesh_settings(),
            chunking: config.chunk_config(),
            tracker: DependencyTracker::new(),
            watcher: FileWatcher::new(),
            holder: SceneHolder::new(),
            status: StatusChannel::new(),
            state: ReloadState::Idle,
            manual_pending: false,
        }
    }

    // ========================================================================
    // Per-frame driving
    // ========================================================================

    /// Ask for a reload on the next [`poll`](Self::poll) even if nothing
    /// changed on disk
    pub fn request_reload(&mut self) {
        self.manual_pending = true;
    }

    /// Check for a reload trigger and, if there is one, run a full reload
    ///
    /// Returns `None` when nothing was attempted. Call once per frame.
    pub fn poll(&mut self) -> Option<Result<SceneStats, ReloadError>> {
        if self.state != ReloadState::Idle || self.entry.is_none() {
            return None;
        }
        let trigger = self.next_trigger()?;
        tracing::debug!(?trigger, "reload triggered");
        Some(self.reload())
    }

    fn next_trigger(&mut self) -> Option<ReloadTrigger> {
        if std::mem::take(&mut self.manual_pending) {
            return Some(ReloadTrigger::Manual);
        }
        let changed = self.watcher.poll();
        (!changed.is_empty()).then_some(ReloadTrigger::Changed(changed))
    }

    /// Evaluate the entry script and swap in the result
    ///
    /// On failure the current scene and watch list stay in place; the watch
    /// list only has its change-tokens refreshed so the same broken edit is
    /// not retried every frame. Before the first success there is no watch
    /// list yet, so the files of the failed attempt are watched instead.
    pub fn reload(&mut self) -> Result<SceneStats, ReloadError> {
        let Some(entry) = self.entry.clone() else {
            return Err(ReloadError::NoEntry);
        };

        self.state = ReloadState::Evaluating;
        self.tracker.begin_tracking();
        let outcome = match self.evaluator.evaluate(&entry, &mut self.tracker) {
            Ok(geometry) => {
                self.state = ReloadState::Swapping;
                let source = ModulePath::new(&entry).ok();
                self.install(&geometry, source, Some(self.tracker.snapshot()))
            }
            Err(e) => Err(e.into()),
        };
        self.state = ReloadState::Idle;

        match &outcome {
            Ok(stats) => {
                tracing::info!(
                    entry = %entry.display(),
                    chunks = stats.chunks,
                    vertices = stats.vertices,
                    triangles = stats.triangles,
                    "scene reloaded"
                );
                self.status.publish(format!("Loaded {}", entry.display()));
            }
            Err(error) => {
                tracing::warn!(entry = %entry.display(), %error, "scene reload failed");
                self.status.publish(error.to_string());
                self.acknowledge_failure();
            }
        }
        outcome
    }

    fn acknowledge_failure(&mut self) {
        if self.watcher.is_empty() {
            self.watcher.watch(self.tracker.snapshot());
        } else {
            self.watcher.acknowledge();
        }
    }

    // ========================================================================
    // Build-before-replace
    // ========================================================================

    /// Mesh, chunk and upload `geometry`, then make it the displayed scene
    ///
    /// The previous scene is released only after every chunk of the new one
    /// uploaded. `watched`, when given, becomes the new watch list.
    pub fn install(
        &mut self,
        geometry: &GeometryHandle,
        source: Option<ModulePath>,
        watched: Option<DependencySet>,
    ) -> Result<SceneStats, ReloadError> {
        let mesh = geometry.to_raw_mesh(&self.mesh)?;
        let chunks = chunker::chunk(&mesh, &self.chunking)?;
        let stats = SceneStats::from_chunks(&chunks);
        let handles = self.upload_all(&chunks)?;

        let next = SceneState::new(handles, stats, geometry.clone(), source);
        self.holder.replace(next, &mut self.renderer);
        if let Some(watched) = watched {
            self.watcher.watch(watched);
        }
        Ok(stats)
    }

    fn upload_all(&mut self, chunks: &[MeshChunk]) -> Result<Vec<R::Handle>, ReloadError> {
        let mut handles = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match self.renderer.upload(chunk) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for handle in handles {
                        self.renderer.destroy(handle);
                    }
                    return Err(ReloadError::Upload(format!("{e:#}")));
                }
            }
        }
        Ok(handles)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn entry(&self) -> Option<&Path> {
        self.entry.as_deref()
    }

    pub fn state(&self) -> ReloadState {
        self.state
    }

    pub fn scene(&self) -> Option<&SceneState<R::Handle>> {
        self.holder.current()
    }

    pub fn status(&self) -> &StatusChannel {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusChannel {
        &mut self.status
    }

    pub fn watched(&self) -> &DependencySet {
        self.watcher.watched()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Release the displayed scene and hand back the renderer
    pub fn shutdown(mut self) -> R {
        self.holder.clear(&mut self.renderer);
        self.renderer
    }
}
