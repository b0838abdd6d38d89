//! Mesh chunking
//!
//! The renderer indexes triangles with `u16`, so one vertex buffer can hold at
//! most [`U16_INDEX_LIMIT`] vertices. [`chunk`] walks a [`RawMesh`] once, in
//! triangle order, and greedily packs triangles into [`MeshChunk`]s that each
//! stay under the limit. Vertices are converted to renderer space, given a
//! smooth normal and a baked toon-shaded color on the way.
//!
//! ## Algorithm
//!
//! 1. Map positions into renderer space (scale, then Z-up to Y-up)
//! 2. Accumulate unnormalized face normals into each corner vertex and
//!    normalize the sums
//! 3. Shade each vertex from its normal
//! 4. Pack triangles: a per-vertex chunk token tells in O(1) whether a vertex
//!    was already emitted into the current chunk; a triangle that would push
//!    the chunk past the limit closes it and starts the next one

use dingcad_kernel::RawMesh;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest vertex count addressable with `u16` indices
pub const U16_INDEX_LIMIT: usize = u16::MAX as usize;

/// Local indices must fit in a `u16`
const MAX_INDEX_LIMIT: usize = U16_INDEX_LIMIT + 1;

/// A malformed raw mesh or an unusable chunking configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("ChunkingError: vertex stride {0} cannot hold x, y and z")]
    InvalidStride(usize),

    #[error("ChunkingError: {len} vertex properties do not divide into stride {stride}")]
    TruncatedPositions { len: usize, stride: usize },

    #[error(
        "ChunkingError: triangle {triangle} references vertex {index} but the mesh has {vertex_count} vertices"
    )]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("ChunkingError: {0} triangle indices do not form whole triangles")]
    IncompleteTriangle(usize),

    #[error("ChunkingError: index limit {0} cannot hold a single triangle")]
    LimitTooSmall(usize),
}

/// Baked cel shading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    /// RGBA base color; alpha is passed through unlit
    pub base_color: [u8; 4],
    /// Direction towards the light in renderer space
    pub light_dir: [f32; 3],
    /// Number of discrete bands; 0 or 1 disables quantization
    pub toon_steps: u32,
    pub ambient: f32,
    pub diffuse: f32,
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            base_color: [210, 210, 220, 255],
            light_dir: [0.45, 0.85, 0.35],
            toon_steps: 3,
            ambient: 0.3,
            diffuse: 0.7,
        }
    }
}

impl ShadingConfig {
    /// Normalized light direction, straight up if the configured one is zero
    pub fn light(&self) -> Vec3 {
        Vec3::from(self.light_dir).try_normalize().unwrap_or(Vec3::Y)
    }

    /// Light intensity in `[0, 1]` after quantization
    pub fn quantize(&self, intensity: f32) -> f32 {
        let intensity = intensity.clamp(0.0, 1.0);
        match self.toon_steps {
            0 | 1 => intensity,
            steps => {
                let level = ((intensity * steps as f32).floor() as u32).min(steps - 1);
                level as f32 / (steps - 1) as f32
            }
        }
    }

    /// Color for a vertex with the given unit normal
    pub fn shade(&self, normal: Vec3) -> [u8; 4] {
        let toon = self.quantize(normal.dot(self.light()));
        let lit = (self.ambient + self.diffuse * toon).clamp(0.0, 1.0);
        let [r, g, b, a] = self.base_color;
        let channel = |c: u8| (f32::from(c) * lit).clamp(0.0, 255.0) as u8;
        [channel(r), channel(g), channel(b), a]
    }
}

/// How a raw mesh becomes renderer chunks
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkConfig {
    pub shading: ShadingConfig,
    /// Maximum distinct vertices per chunk; values above 65536 are clamped
    pub index_limit: usize,
    /// Scene units to renderer units
    pub scene_scale: f32,
    /// Treat the scene as Z-up and map it to the renderer's Y-up frame
    pub z_up: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            shading: ShadingConfig::default(),
            index_limit: U16_INDEX_LIMIT,
            scene_scale: 0.1,
            z_up: true,
        }
    }
}

impl ChunkConfig {
    /// Renderer-space position of a scene-space point
    pub fn to_render_space(&self, p: Vec3) -> Vec3 {
        let p = p * self.scene_scale;
        if self.z_up { Vec3::new(p.x, p.z, -p.y) } else { p }
    }
}

/// A renderer-ready piece of a mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshChunk {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[u8; 4]>,
    /// Local triangle indices into this chunk's vertices
    pub indices: Vec<u16>,
    /// Index of each local vertex in the source mesh
    pub source_vertices: Vec<u32>,
}

impl MeshChunk {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Triangles with their indices mapped back to the source mesh
    pub fn source_triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                self.source_vertices[usize::from(t[0])],
                self.source_vertices[usize::from(t[1])],
                self.source_vertices[usize::from(t[2])],
            ]
        })
    }

    fn push_vertex(&mut self, source: u32, position: Vec3, normal: Vec3, color: [u8; 4]) {
        self.positions.push(position.to_array());
        self.normals.push(normal.to_array());
        self.colors.push(color);
        self.source_vertices.push(source);
    }
}

/// Split `mesh` into chunks that each hold at most `config.index_limit`
/// vertices
///
/// An empty mesh yields no chunks.
pub fn chunk(mesh: &RawMesh, config: &ChunkConfig) -> Result<Vec<MeshChunk>, ChunkError> {
    if config.index_limit < 3 {
        return Err(ChunkError::LimitTooSmall(config.index_limit));
    }
    let limit = config.index_limit.min(MAX_INDEX_LIMIT);

    let positions = render_positions(mesh, config)?;
    if mesh.tri_verts.len() % 3 != 0 {
        return Err(ChunkError::IncompleteTriangle(mesh.tri_verts.len()));
    }
    if positions.is_empty() || mesh.tri_verts.is_empty() {
        return Ok(Vec::new());
    }
    let triangles = checked_triangles(&mesh.tri_verts, positions.len())?;

    let normals = smooth_normals(&positions, &triangles);
    let colors: Vec<[u8; 4]> = normals.iter().map(|&n| config.shading.shade(n)).collect();

    // Token 0 means "never emitted"
    let mut marker = vec![0_u32; positions.len()];
    let mut local = vec![0_u16; positions.len()];
    let mut token = 1_u32;

    let mut chunks = Vec::new();
    let mut current = MeshChunk::default();

    for tri in &triangles {
        let needed = tri
            .iter()
            .enumerate()
            .filter(|&(i, &v)| marker[v as usize] != token && !tri[..i].contains(&v))
            .count();

        if current.vertex_count() + needed > limit {
            chunks.push(std::mem::take(&mut current));
            token += 1;
        }

        for &v in tri {
            let vi = v as usize;
            if marker[vi] != token {
                marker[vi] = token;
                local[vi] = current.vertex_count() as u16;
                current.push_vertex(v, positions[vi], normals[vi], colors[vi]);
            }
            current.indices.push(local[vi]);
        }
    }
    if !current.indices.is_empty() {
        chunks.push(current);
    }

    for (i, c) in chunks.iter().enumerate() {
        tracing::trace!(
            chunk = i,
            vertices = c.vertex_count(),
            triangles = c.triangle_count(),
            "packed mesh chunk"
        );
    }
    Ok(chunks)
}

fn render_positions(mesh: &RawMesh, config: &ChunkConfig) -> Result<Vec<Vec3>, ChunkError> {
    let stride = mesh.num_prop;
    if stride < 3 {
        return Err(ChunkError::InvalidStride(stride));
    }
    let len = mesh.vert_properties.len();
    if len % stride != 0 {
        return Err(ChunkError::TruncatedPositions { len, stride });
    }
    Ok(mesh
        .vert_properties
        .chunks_exact(stride)
        .map(|p| config.to_render_space(Vec3::new(p[0], p[1], p[2])))
        .collect())
}

fn checked_triangles(tri_verts: &[u32], vertex_count: usize) -> Result<Vec<[u32; 3]>, ChunkError> {
    tri_verts
        .chunks_exact(3)
        .enumerate()
        .map(|(triangle, t)| {
            match t.iter().find(|&&index| index as usize >= vertex_count) {
                Some(&index) => Err(ChunkError::IndexOutOfRange {
                    triangle,
                    index,
                    vertex_count,
                }),
                None => Ok([t[0], t[1], t[2]]),
            }
        })
        .collect()
}

/// Area-weighted vertex normals; unreferenced or degenerate vertices face up
pub fn smooth_normals(positions: &[Vec3], triangles: &[[u32; 3]]) -> Vec<Vec3> {
    let mut accum = vec![Vec3::ZERO; positions.len()];
    for &[a, b, c] in triangles {
        let (a, b, c) = (a as usize, b as usize, c as usize);
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        accum[a] += n;
        accum[b] += n;
        accum[c] += n;
    }
    accum
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dingcad_kernel::{GeometryHandle, MeshSettings};
    use glam::Quat;

    fn flat() -> ChunkConfig {
        ChunkConfig {
            scene_scale: 1.0,
            z_up: false,
            ..ChunkConfig::default()
        }
    }

    fn cube_mesh() -> RawMesh {
        GeometryHandle::cube(Vec3::ONE, false)
            .unwrap()
            .to_raw_mesh(&MeshSettings::default())
            .unwrap()
    }

    /// A strip of quads sharing edges, `n` triangles long
    fn strip(n: u32) -> RawMesh {
        let columns = n / 2 + 2;
        let mut positions = Vec::new();
        for i in 0..columns {
            positions.push(Vec3::new(i as f32, 0.0, 0.0));
            positions.push(Vec3::new(i as f32, 1.0, 0.0));
        }
        let triangles: Vec<[u32; 3]> = (0..n)
            .map(|t| {
                let q = (t / 2) * 2;
                if t % 2 == 0 { [q, q + 2, q + 1] } else { [q + 1, q + 2, q + 3] }
            })
            .collect();
        RawMesh::from_positions(&positions, &triangles)
    }

    fn source_triangles(chunks: &[MeshChunk]) -> Vec<[u32; 3]> {
        chunks.iter().flat_map(|c| c.source_triangles()).collect()
    }

    #[test]
    fn test_cube_fits_one_chunk() {
        let chunks = chunk(&cube_mesh(), &ChunkConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].vertex_count(), 8);
        assert_eq!(chunks[0].triangle_count(), 12);
        assert_eq!(chunks[0].normals.len(), 8);
        assert_eq!(chunks[0].colors.len(), 8);
    }

    #[test]
    fn test_empty_mesh_yields_no_chunks() {
        assert!(chunk(&RawMesh::new(), &ChunkConfig::default()).unwrap().is_empty());

        let vertices_only = RawMesh::from_positions(&[Vec3::ZERO, Vec3::X, Vec3::Y], &[]);
        assert!(chunk(&vertices_only, &ChunkConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_chunks_respect_limit() {
        let mesh = strip(200);
        let config = ChunkConfig {
            index_limit: 10,
            ..flat()
        };
        let chunks = chunk(&mesh, &config).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.vertex_count() <= 10);
            assert!(c.indices.iter().all(|&i| usize::from(i) < c.vertex_count()));
        }
    }

    #[test]
    fn test_triangles_survive_in_order() {
        let mesh = strip(157);
        let config = ChunkConfig {
            index_limit: 7,
            ..flat()
        };
        let chunks = chunk(&mesh, &config).unwrap();
        let original: Vec<[u32; 3]> = mesh.triangles().collect();
        assert_eq!(source_triangles(&chunks), original);
    }

    #[test]
    fn test_packing_is_greedy() {
        let mesh = strip(120);
        let limit = 9;
        let config = ChunkConfig {
            index_limit: limit,
            ..flat()
        };
        let chunks = chunk(&mesh, &config).unwrap();
        for pair in chunks.windows(2) {
            let [first, next] = pair else { unreachable!() };
            let overflow = next
                .source_triangles()
                .next()
                .unwrap()
                .iter()
                .filter(|v| !first.source_vertices.contains(v))
                .count();
            assert!(first.vertex_count() + overflow > limit);
        }
    }

    #[test]
    fn test_shared_vertices_emitted_once_per_chunk() {
        let chunks = chunk(&strip(40), &flat()).unwrap();
        assert_eq!(chunks.len(), 1);
        let mut seen = chunks[0].source_vertices.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), chunks[0].vertex_count());
    }

    #[test]
    fn test_unshared_worst_case() {
        let triangles = 200_000_u32;
        let positions: Vec<Vec3> = (0..triangles * 3)
            .map(|i| Vec3::new(i as f32, (i % 3) as f32, 0.0))
            .collect();
        let tris: Vec<[u32; 3]> = (0..triangles).map(|t| [t * 3, t * 3 + 1, t * 3 + 2]).collect();
        let mesh = RawMesh::from_positions(&positions, &tris);

        let chunks = chunk(&mesh, &ChunkConfig::default()).unwrap();
        assert!(chunks.len() >= 600_000_usize.div_ceil(U16_INDEX_LIMIT));
        assert!(chunks.iter().all(|c| c.vertex_count() <= U16_INDEX_LIMIT));
        let total: usize = chunks.iter().map(MeshChunk::triangle_count).sum();
        assert_eq!(total, triangles as usize);
    }

    #[test]
    fn test_oversized_limit_is_clamped() {
        let triangles = 30_000_u32;
        let positions: Vec<Vec3> = (0..triangles * 3)
            .map(|i| Vec3::new(i as f32, (i % 3) as f32, 0.0))
            .collect();
        let tris: Vec<[u32; 3]> = (0..triangles).map(|t| [t * 3, t * 3 + 1, t * 3 + 2]).collect();
        let mesh = RawMesh::from_positions(&positions, &tris);
        let config = ChunkConfig {
            index_limit: usize::MAX,
            ..flat()
        };

        let chunks = chunk(&mesh, &config).unwrap();
        assert_eq!(chunks.len(), 2);
        for c in &chunks {
            assert!(c.vertex_count() <= MAX_INDEX_LIMIT);
            assert!(c.indices.iter().all(|&i| usize::from(i) < c.vertex_count()));
        }
        assert_eq!(source_triangles(&chunks), tris);
    }

    #[test]
    fn test_normals_rotate_with_mesh() {
        let mesh = GeometryHandle::sphere(1.0, 16)
            .unwrap()
            .to_raw_mesh(&MeshSettings::default())
            .unwrap();
        let rotation = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -1.1, 2.0);
        let rotated = RawMesh::from_positions(
            &mesh.positions().map(|p| rotation * p).collect::<Vec<_>>(),
            &mesh.triangles().collect::<Vec<_>>(),
        );

        let a = chunk(&mesh, &flat()).unwrap();
        let b = chunk(&rotated, &flat()).unwrap();
        for (na, nb) in a[0].normals.iter().zip(&b[0].normals) {
            let expected = rotation * Vec3::from(*na);
            let actual = Vec3::from(*nb);
            assert_relative_eq!(expected.x, actual.x, epsilon = 1e-4);
            assert_relative_eq!(expected.y, actual.y, epsilon = 1e-4);
            assert_relative_eq!(expected.z, actual.z, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_unreferenced_vertex_faces_up() {
        let normals = smooth_normals(&[Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z], &[[0, 1, 2]]);
        assert_eq!(normals[0], Vec3::Z);
        assert_eq!(normals[3], Vec3::Y);
    }

    #[test]
    fn test_z_up_mapping() {
        let config = ChunkConfig::default();
        let p = config.to_render_space(Vec3::new(10.0, 20.0, 30.0));
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, 3.0);
        assert_relative_eq!(p.z, -2.0);
    }

    #[test]
    fn test_toon_bands() {
        let shading = ShadingConfig::default();
        assert_relative_eq!(shading.quantize(0.1), 0.0);
        assert_relative_eq!(shading.quantize(0.5), 0.5);
        assert_relative_eq!(shading.quantize(1.0), 1.0);
        assert_relative_eq!(shading.quantize(-3.0), 0.0);

        let smooth = ShadingConfig {
            toon_steps: 1,
            ..ShadingConfig::default()
        };
        assert_relative_eq!(smooth.quantize(0.42), 0.42);
    }

    #[test]
    fn test_shade_lit_and_unlit() {
        let shading = ShadingConfig::default();
        let lit = shading.shade(shading.light());
        assert_eq!(lit, [210, 210, 220, 255]);

        let dark = shading.shade(-shading.light());
        // ambient only
        assert_eq!(dark, [63, 63, 66, 255]);
    }

    #[test]
    fn test_malformed_meshes() {
        let mut mesh = cube_mesh();
        mesh.tri_verts[5] = 99;
        assert!(matches!(
            chunk(&mesh, &ChunkConfig::default()),
            Err(ChunkError::IndexOutOfRange { triangle: 1, index: 99, .. })
        ));

        let mut mesh = cube_mesh();
        mesh.tri_verts.pop();
        assert!(matches!(
            chunk(&mesh, &ChunkConfig::default()),
            Err(ChunkError::IncompleteTriangle(35))
        ));

        let mut mesh = cube_mesh();
        mesh.vert_properties.pop();
        assert!(matches!(
            chunk(&mesh, &ChunkConfig::default()),
            Err(ChunkError::TruncatedPositions { .. })
        ));

        let mut mesh = cube_mesh();
        mesh.num_prop = 2;
        assert!(matches!(
            chunk(&mesh, &ChunkConfig::default()),
            Err(ChunkError::InvalidStride(2))
        ));

        let config = ChunkConfig {
            index_limit: 2,
            ..ChunkConfig::default()
        };
        assert!(matches!(
            chunk(&cube_mesh(), &config),
            Err(ChunkError::LimitTooSmall(2))
        ));
    }
}
