//! Indexed triangle meshes produced from solids
//!
//! Exact tessellation lives in [`tessellate`]; implicit meshing of boolean
//! nodes lives in [`surface_nets`]. Both produce a [`RawMesh`].

mod surface_nets;
mod tessellate;

use crate::sdf::Aabb;
use glam::{Affine3A, Vec3};

pub use surface_nets::surface_nets;
pub use tessellate::Tessellate;

/// An indexed triangle soup
///
/// `vert_properties` is a flat buffer of `num_prop` floats per vertex, the
/// first three of which are x/y/z. `tri_verts` holds three vertex indices per
/// triangle, wound counter-clockwise when seen from outside.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMesh {
    pub num_prop: usize,
    pub vert_properties: Vec<f32>,
    pub tri_verts: Vec<u32>,
}

impl Default for RawMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMesh {
    /// An empty mesh with position-only vertices
    pub fn new() -> Self {
        Self {
            num_prop: 3,
            vert_properties: Vec::new(),
            tri_verts: Vec::new(),
        }
    }

    pub fn from_positions(positions: &[Vec3], triangles: &[[u32; 3]]) -> Self {
        Self {
            num_prop: 3,
            vert_properties: positions.iter().flat_map(|p| p.to_array()).collect(),
            tri_verts: triangles.iter().flatten().copied().collect(),
        }
    }

    /// Get number of vertices
    pub fn num_vert(&self) -> usize {
        if self.num_prop == 0 {
            return 0;
        }
        self.vert_properties.len() / self.num_prop
    }

    /// Get number of triangles
    pub fn num_tri(&self) -> usize {
        self.tri_verts.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.num_tri() == 0 || self.num_vert() == 0
    }

    /// Position of vertex `index`
    ///
    /// Panics if `index` is out of range.
    pub fn position(&self, index: usize) -> Vec3 {
        let base = index * self.num_prop;
        Vec3::from_slice(&self.vert_properties[base..base + 3])
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        (0..self.num_vert()).map(|i| self.position(i))
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.tri_verts
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
    }

    /// Concatenate another mesh, re-basing its indices
    ///
    /// Vertices of `other` keep their first `num_prop` properties; missing
    /// properties are zero-filled.
    pub fn append(&mut self, other: &RawMesh) {
        let base = self.num_vert() as u32;
        let mut props = vec![0.0; self.num_prop];
        for i in 0..other.num_vert() {
            let src = &other.vert_properties[i * other.num_prop..(i + 1) * other.num_prop];
            let n = src.len().min(props.len());
            props.fill(0.0);
            props[..n].copy_from_slice(&src[..n]);
            self.vert_properties.extend_from_slice(&props);
        }
        self.tri_verts
            .extend(other.tri_verts.iter().map(|&i| i + base));
    }

    /// Apply an affine map to every position
    ///
    /// Mirroring transforms flip the winding so faces stay outward.
    pub fn transformed(mut self, transform: &Affine3A) -> Self {
        for i in 0..self.num_vert() {
            let base = i * self.num_prop;
            let p = transform.transform_point3(self.position(i));
            self.vert_properties[base..base + 3].copy_from_slice(&p.to_array());
        }
        if transform.matrix3.determinant() < 0.0 {
            for tri in self.tri_verts.chunks_exact_mut(3) {
                tri.swap(1, 2);
            }
        }
        self
    }

    /// Enclosed volume, assuming a closed and outward-wound surface
    pub fn volume(&self) -> f32 {
        let six_v: f32 = self
            .triangles()
            .map(|[a, b, c]| {
                let (p0, p1, p2) = self.corners(a, b, c);
                p0.dot(p1.cross(p2))
            })
            .sum();
        six_v / 6.0
    }

    pub fn surface_area(&self) -> f32 {
        self.triangles()
            .map(|[a, b, c]| {
                let (p0, p1, p2) = self.corners(a, b, c);
                (p1 - p0).cross(p2 - p0).length() * 0.5
            })
            .sum()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions())
    }

    fn corners(&self, a: u32, b: u32, c: u32) -> (Vec3, Vec3, Vec3) {
        (
            self.position(a as usize),
            self.position(b as usize),
            self.position(c as usize),
        )
    }
}

/// Configuration for mesh generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshSettings {
    /// Grid cells along the longest axis when a solid is meshed implicitly
    pub resolution: u32,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self { resolution: 64 }
    }
}

impl MeshSettings {
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }
}
