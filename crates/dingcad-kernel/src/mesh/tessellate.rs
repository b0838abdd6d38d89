//! Exact tessellation of primitives
//!
//! Every mesh here is closed, welded and wound counter-clockwise seen from
//! outside. Round primitives share their seam and pole vertices.

use super::RawMesh;
use crate::sdf::{Cuboid, Frustum, Sphere, Tetrahedron};
use glam::Vec3;
use std::f32::consts::{PI, TAU};

/// Anything that tessellates into an exact triangle mesh
pub trait Tessellate {
    fn tessellate(&self) -> RawMesh;
}

/// Box faces over corners indexed `x + 2y + 4z`
const CUBE_FACES: [[u32; 3]; 12] = [
    // -Z
    [0, 2, 1],
    [1, 2, 3],
    // +Z
    [4, 5, 6],
    [5, 7, 6],
    // -Y
    [0, 1, 4],
    [1, 5, 4],
    // +Y
    [2, 6, 3],
    [3, 6, 7],
    // -X
    [0, 4, 2],
    [2, 4, 6],
    // +X
    [1, 3, 5],
    [3, 7, 5],
];

impl Tessellate for Cuboid {
    fn tessellate(&self) -> RawMesh {
        let origin = self.origin();
        let corners: Vec<Vec3> = (0..8u32)
            .map(|i| {
                let unit = Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32);
                origin + unit * self.size
            })
            .collect();
        RawMesh::from_positions(&corners, &CUBE_FACES)
    }
}

impl Tessellate for Sphere {
    fn tessellate(&self) -> RawMesh {
        let n_lon = self.segments;
        let n_lat = (self.segments / 2).max(2);
        let r = self.radius;

        let mut positions = Vec::with_capacity((2 + (n_lat - 1) * n_lon) as usize);
        positions.push(Vec3::new(0.0, 0.0, r));
        for i in 1..n_lat {
            let theta = PI * i as f32 / n_lat as f32;
            let (rho, z) = (r * theta.sin(), r * theta.cos());
            for j in 0..n_lon {
                let phi = TAU * j as f32 / n_lon as f32;
                positions.push(Vec3::new(rho * phi.cos(), rho * phi.sin(), z));
            }
        }
        let south = positions.len() as u32;
        positions.push(Vec3::new(0.0, 0.0, -r));

        let ring = |i: u32, j: u32| 1 + (i - 1) * n_lon + j % n_lon;
        let mut tris = Vec::with_capacity((2 * n_lon * (n_lat - 1)) as usize);
        for j in 0..n_lon {
            tris.push([0, ring(1, j), ring(1, j + 1)]);
        }
        for i in 1..n_lat - 1 {
            for j in 0..n_lon {
                let (a, b) = (ring(i, j), ring(i, j + 1));
                let (c, d) = (ring(i + 1, j), ring(i + 1, j + 1));
                tris.push([a, c, d]);
                tris.push([a, d, b]);
            }
        }
        for j in 0..n_lon {
            tris.push([south, ring(n_lat - 1, j + 1), ring(n_lat - 1, j)]);
        }

        RawMesh::from_positions(&positions, &tris)
    }
}

impl Tessellate for Frustum {
    fn tessellate(&self) -> RawMesh {
        let n = self.segments;
        let z0 = self.z_min();
        let z1 = z0 + self.height;
        let is_cone = self.radius_high <= 0.0;

        let ring = |radius: f32, z: f32| {
            (0..n).map(move |j| {
                let phi = TAU * j as f32 / n as f32;
                Vec3::new(radius * phi.cos(), radius * phi.sin(), z)
            })
        };

        let mut positions: Vec<Vec3> = ring(self.radius_low, z0).collect();
        if is_cone {
            positions.push(Vec3::new(0.0, 0.0, z1));
        } else {
            positions.extend(ring(self.radius_high, z1));
        }
        let bottom_center = positions.len() as u32;
        positions.push(Vec3::new(0.0, 0.0, z0));

        let b = |j: u32| j % n;
        let mut tris = Vec::new();
        for j in 0..n {
            tris.push([bottom_center, b(j + 1), b(j)]);
        }

        if is_cone {
            let apex = n;
            for j in 0..n {
                tris.push([b(j), b(j + 1), apex]);
            }
        } else {
            let top_center = positions.len() as u32;
            positions.push(Vec3::new(0.0, 0.0, z1));
            let t = |j: u32| n + j % n;
            for j in 0..n {
                tris.push([b(j), b(j + 1), t(j + 1)]);
                tris.push([b(j), t(j + 1), t(j)]);
            }
            for j in 0..n {
                tris.push([top_center, t(j), t(j + 1)]);
            }
        }

        RawMesh::from_positions(&positions, &tris)
    }
}

impl Tessellate for Tetrahedron {
    fn tessellate(&self) -> RawMesh {
        RawMesh::from_positions(&Self::VERTICES, &Self::FACES)
    }
}
