//! The displayed scene
//!
//! A [`SceneState`] is what the viewer currently draws: uploaded chunk
//! handles plus the geometry and statistics they came from. The
//! [`SceneHolder`] owns the single current state and swaps it wholesale; a
//! state is never edited in place.

use crate::chunker::MeshChunk;
use crate::renderer::Renderer;
use dingcad_kernel::GeometryHandle;
use dingcad_script::ModulePath;

/// Size of a displayed scene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub chunks: usize,
    pub vertices: usize,
    pub triangles: usize,
}

impl SceneStats {
    pub fn from_chunks(chunks: &[MeshChunk]) -> Self {
        Self {
            chunks: chunks.len(),
            vertices: chunks.iter().map(MeshChunk::vertex_count).sum(),
            triangles: chunks.iter().map(MeshChunk::triangle_count).sum(),
        }
    }
}

/// Render resources of one successfully built scene
#[derive(Debug)]
pub struct SceneState<H> {
    handles: Vec<H>,
    stats: SceneStats,
    geometry: GeometryHandle,
    /// Entry script, `None` for the built-in placeholder
    source: Option<ModulePath>,
}

impl<H> SceneState<H> {
    pub fn new(
        handles: Vec<H>,
        stats: SceneStats,
        geometry: GeometryHandle,
        source: Option<ModulePath>,
    ) -> Self {
        Self {
            handles,
            stats,
            geometry,
            source,
        }
    }

    pub fn handles(&self) -> &[H] {
        &self.handles
    }

    pub fn stats(&self) -> SceneStats {
        self.stats
    }

    /// The solid this scene was meshed from
    pub fn geometry(&self) -> &GeometryHandle {
        &self.geometry
    }

    pub fn source(&self) -> Option<&ModulePath> {
        self.source.as_ref()
    }

    pub fn is_placeholder(&self) -> bool {
        self.source.is_none()
    }

    /// Give every handle back to the renderer
    pub fn release<R: Renderer<Handle = H>>(self, renderer: &mut R) {
        for handle in self.handles {
            renderer.destroy(handle);
        }
    }
}

/// Slot holding the scene currently shown
#[derive(Debug)]
pub struct SceneHolder<H> {
    current: Option<SceneState<H>>,
}

impl<H> Default for SceneHolder<H> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<H> SceneHolder<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SceneState<H>> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Install a fully built state, then release the one it replaces
    pub fn replace<R: Renderer<Handle = H>>(&mut self, next: SceneState<H>, renderer: &mut R) {
        if let Some(previous) = self.current.replace(next) {
            previous.release(renderer);
        }
    }

    /// Release the current state, leaving the slot empty
    pub fn clear<R: Renderer<Handle = H>>(&mut self, renderer: &mut R) {
        if let Some(previous) = self.current.take() {
            previous.release(renderer);
        }
    }
}

/// The one human-readable line describing the latest reload attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusChannel {
    message: String,
    revision: u64,
}

impl StatusChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.revision += 1;
        tracing::info!(target: "dingcad::status", "{}", self.message);
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Bumped on every publish, so readers can tell a repeated message apart
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        next: u32,
        destroyed: Vec<u32>,
    }

    impl Renderer for Counting {
        type Handle = u32;

        fn upload(&mut self, _chunk: &MeshChunk) -> anyhow::Result<u32> {
            self.next += 1;
            Ok(self.next)
        }

        fn destroy(&mut self, handle: u32) {
            self.destroyed.push(handle);
        }
    }

    fn state(handles: Vec<u32>) -> SceneState<u32> {
        SceneState::new(handles, SceneStats::default(), GeometryHandle::empty(), None)
    }

    #[test]
    fn test_replace_releases_previous() {
        let mut renderer = Counting::default();
        let mut holder = SceneHolder::new();
        holder.replace(state(vec![1, 2]), &mut renderer);
        assert!(renderer.destroyed.is_empty());

        holder.replace(state(vec![3]), &mut renderer);
        assert_eq!(renderer.destroyed, vec![1, 2]);
        assert_eq!(holder.current().map(SceneState::handles), Some(&[3][..]));

        holder.clear(&mut renderer);
        assert!(holder.is_empty());
        assert_eq!(renderer.destroyed, vec![1, 2, 3]);
    }

    #[test]
    fn test_stats_sum_chunks() {
        let chunk = MeshChunk {
            positions: vec![[0.0; 3]; 4],
            indices: vec![0, 1, 2, 0, 2, 3],
            ..MeshChunk::default()
        };
        let stats = SceneStats::from_chunks(&[chunk.clone(), chunk]);
        assert_eq!(
            stats,
            SceneStats {
                chunks: 2,
                vertices: 8,
                triangles: 4
            }
        );
    }

    #[test]
    fn test_status_revisions() {
        let mut status = StatusChannel::new();
        assert!(status.is_empty());
        status.publish("Loaded a.rhai");
        status.publish("Loaded a.rhai");
        assert_eq!(status.message(), "Loaded a.rhai");
        assert_eq!(status.revision(), 2);
    }
}
