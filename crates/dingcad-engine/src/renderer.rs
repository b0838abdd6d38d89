//! Renderer boundary
//!
//! The engine never draws. It hands finished [`MeshChunk`]s to a [`Renderer`]
//! and gets back opaque handles, which it destroys once the scene that owns
//! them has been replaced.

use crate::chunker::MeshChunk;

/// Uploads mesh chunks into renderer-owned resources
pub trait Renderer {
    /// GPU-resident form of one chunk
    type Handle;

    /// Upload a chunk; backend failures are reported, never panicked on
    fn upload(&mut self, chunk: &MeshChunk) -> anyhow::Result<Self::Handle>;

    /// Release a handle returned by [`Renderer::upload`]
    fn destroy(&mut self, handle: Self::Handle);
}

#[cfg(feature = "wgpu")]
pub use gpu::{ChunkVertex, GpuChunk, WgpuRenderer};

#[cfg(feature = "wgpu")]
mod gpu {
    use super::Renderer;
    use crate::chunker::MeshChunk;
    use bytemuck::{Pod, Zeroable};
    use std::sync::Arc;
    use wgpu::util::DeviceExt;

    /// Interleaved vertex layout of an uploaded chunk
    #[repr(C)]
    #[derive(Debug, Clone, Copy, Pod, Zeroable)]
    pub struct ChunkVertex {
        pub position: [f32; 3],
        pub normal: [f32; 3],
        pub color: [u8; 4],
    }

    impl ChunkVertex {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Unorm8x4];

        /// Vertex buffer layout for pipelines drawing [`GpuChunk`]s
        pub fn layout() -> wgpu::VertexBufferLayout<'static> {
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &Self::ATTRIBUTES,
            }
        }
    }

    /// Buffers of one uploaded chunk, drawn with `IndexFormat::Uint16`
    #[derive(Debug)]
    pub struct GpuChunk {
        pub vertex_buffer: wgpu::Buffer,
        pub index_buffer: wgpu::Buffer,
        pub index_count: u32,
    }

    /// Uploads chunks as wgpu vertex and index buffers
    pub struct WgpuRenderer {
        device: Arc<wgpu::Device>,
    }

    impl WgpuRenderer {
        pub fn new(device: Arc<wgpu::Device>) -> Self {
            Self { device }
        }
    }

    impl Renderer for WgpuRenderer {
        type Handle = GpuChunk;

        fn upload(&mut self, chunk: &MeshChunk) -> anyhow::Result<GpuChunk> {
            if chunk.indices.is_empty() {
                anyhow::bail!("cannot upload a chunk without triangles");
            }

            let vertices: Vec<ChunkVertex> = chunk
                .positions
                .iter()
                .zip(&chunk.normals)
                .zip(&chunk.colors)
                .map(|((&position, &normal), &color)| ChunkVertex {
                    position,
                    normal,
                    color,
                })
                .collect();

            let vertex_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Scene Chunk Vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            let index_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Scene Chunk Indices"),
                    contents: bytemuck::cast_slice(&chunk.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });

            Ok(GpuChunk {
                vertex_buffer,
                index_buffer,
                index_count: u32::try_from(chunk.indices.len())?,
            })
        }

        fn destroy(&mut self, handle: GpuChunk) {
            handle.vertex_buffer.destroy();
            handle.index_buffer.destroy();
        }
    }
}
