//! Naive surface nets over a sampled distance field
//!
//! Uses Rayon for parallel processing of voxel grids. One vertex is placed
//! per surface-crossing cell (the mean of its edge crossings) and one quad is
//! emitted per sign-changing grid edge, so the output is welded by
//! construction.

use super::RawMesh;
use crate::sdf::Sdf;
use crate::{Error, Result};
use glam::{UVec3, Vec3};
use rayon::prelude::*;

/// Upper bound on sampled grid points
const MAX_GRID_POINTS: usize = 512 * 512 * 512;

/// Empty cells never receive a vertex
const NO_VERTEX: u32 = u32::MAX;

/// Cell corner pairs, corners indexed `x + 2y + 4z`
const CELL_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

struct Grid {
    origin: Vec3,
    step: f32,
    /// Grid points per axis
    dims: UVec3,
}

impl Grid {
    fn point_index(&self, x: u32, y: u32, z: u32) -> usize {
        (x + self.dims.x * (y + self.dims.y * z)) as usize
    }

    fn cell_index(&self, x: u32, y: u32, z: u32) -> usize {
        let cells = self.dims - UVec3::ONE;
        (x + cells.x * (y + cells.y * z)) as usize
    }

    fn point(&self, x: u32, y: u32, z: u32) -> Vec3 {
        self.origin + Vec3::new(x as f32, y as f32, z as f32) * self.step
    }
}

/// Mesh the zero level set of `sdf` with `resolution` cells along its
/// longest axis
pub fn surface_nets<S: Sdf + ?Sized>(sdf: &S, resolution: u32) -> Result<RawMesh> {
    if resolution == 0 {
        return Err(Error::MeshGeneration(
            "resolution must be at least 1".to_string(),
        ));
    }
    let bounds = sdf.bounds();
    if bounds.is_empty() || bounds.size().max_element() <= 0.0 {
        return Ok(RawMesh::new());
    }

    // Two cells of padding keep the surface away from the grid border.
    let step = bounds.size().max_element() / resolution as f32;
    let cells = (bounds.size() / step).ceil().as_uvec3() + UVec3::splat(4);
    let grid = Grid {
        origin: bounds.min - Vec3::splat(2.0 * step),
        step,
        dims: cells + UVec3::ONE,
    };
    let total_points = grid_len(grid.dims);
    if total_points > MAX_GRID_POINTS {
        return Err(Error::MeshGeneration(format!(
            "sampling grid of {total_points} points is too large"
        )));
    }

    // === Phase 1: Parallel SDF sampling ===
    let values: Vec<f32> = (0..total_points)
        .into_par_iter()
        .map(|idx| {
            let (x, y, z) = unflatten(idx, grid.dims);
            sdf.distance(grid.point(x, y, z))
        })
        .collect();

    // === Phase 2: Parallel cell vertex placement ===
    let cell_dims = grid.dims - UVec3::ONE;
    let total_cells = grid_len(cell_dims);
    let cell_vertices: Vec<Option<Vec3>> = (0..total_cells)
        .into_par_iter()
        .map(|idx| {
            let (x, y, z) = unflatten(idx, cell_dims);
            cell_vertex(&grid, &values, x, y, z)
        })
        .collect();

    let mut positions = Vec::new();
    let cell_to_vertex: Vec<u32> = cell_vertices
        .iter()
        .map(|v| match v {
            Some(p) => {
                positions.push(*p);
                (positions.len() - 1) as u32
            }
            None => NO_VERTEX,
        })
        .collect();

    // === Phase 3: Parallel quad emission, one z-slab per task ===
    let slabs: Vec<Vec<[u32; 3]>> = (0..grid.dims.z)
        .into_par_iter()
        .map(|z| emit_slab(&grid, &values, &cell_to_vertex, z))
        .collect();
    let triangles: Vec<[u32; 3]> = slabs.into_iter().flatten().collect();

    tracing::trace!(
        vertices = positions.len(),
        triangles = triangles.len(),
        "surface nets extracted"
    );
    Ok(RawMesh::from_positions(&positions, &triangles))
}

fn grid_len(dims: UVec3) -> usize {
    dims.x as usize * dims.y as usize * dims.z as usize
}

fn unflatten(idx: usize, dims: UVec3) -> (u32, u32, u32) {
    let (nx, ny) = (dims.x as usize, dims.y as usize);
    ((idx % nx) as u32, ((idx / nx) % ny) as u32, (idx / (nx * ny)) as u32)
}

fn cell_vertex(grid: &Grid, values: &[f32], x: u32, y: u32, z: u32) -> Option<Vec3> {
    let mut corner_values = [0.0f32; 8];
    let mut corner_points = [Vec3::ZERO; 8];
    for (i, (value, point)) in corner_values
        .iter_mut()
        .zip(corner_points.iter_mut())
        .enumerate()
    {
        let (dx, dy, dz) = ((i & 1) as u32, ((i >> 1) & 1) as u32, ((i >> 2) & 1) as u32);
        *value = values[grid.point_index(x + dx, y + dy, z + dz)];
        *point = grid.point(x + dx, y + dy, z + dz);
    }

    let mut sum = Vec3::ZERO;
    let mut crossings = 0u32;
    for (a, b) in CELL_EDGES {
        let (va, vb) = (corner_values[a], corner_values[b]);
        if (va < 0.0) != (vb < 0.0) {
            let t = va / (va - vb);
            sum += corner_points[a].lerp(corner_points[b], t);
            crossings += 1;
        }
    }
    (crossings > 0).then(|| sum / crossings as f32)
}

/// Quads for every sign-changing edge starting on grid plane `z`
fn emit_slab(grid: &Grid, values: &[f32], cell_to_vertex: &[u32], z: u32) -> Vec<[u32; 3]> {
    let d = grid.dims;
    let mut tris = Vec::new();
    let vertex = |x: u32, y: u32, z: u32| cell_to_vertex[grid.cell_index(x, y, z)];

    for y in 0..d.y {
        for x in 0..d.x {
            let inside = values[grid.point_index(x, y, z)] < 0.0;

            if x + 1 < d.x && y >= 1 && z >= 1 && y < d.y - 1 && z < d.z - 1 {
                let other = values[grid.point_index(x + 1, y, z)] < 0.0;
                if inside != other {
                    let quad = [
                        vertex(x, y - 1, z - 1),
                        vertex(x, y, z - 1),
                        vertex(x, y, z),
                        vertex(x, y - 1, z),
                    ];
                    push_quad(&mut tris, quad, inside);
                }
            }

            if y + 1 < d.y && x >= 1 && z >= 1 && x < d.x - 1 && z < d.z - 1 {
                let other = values[grid.point_index(x, y + 1, z)] < 0.0;
                if inside != other {
                    let quad = [
                        vertex(x - 1, y, z - 1),
                        vertex(x - 1, y, z),
                        vertex(x, y, z),
                        vertex(x, y, z - 1),
                    ];
                    push_quad(&mut tris, quad, inside);
                }
            }

            if z + 1 < d.z && x >= 1 && y >= 1 && x < d.x - 1 && y < d.y - 1 {
                let other = values[grid.point_index(x, y, z + 1)] < 0.0;
                if inside != other {
                    let quad = [
                        vertex(x - 1, y - 1, z),
                        vertex(x, y - 1, z),
                        vertex(x, y, z),
                        vertex(x - 1, y, z),
                    ];
                    push_quad(&mut tris, quad, inside);
                }
            }
        }
    }
    tris
}

/// Quads arrive wound for a surface facing the +axis direction; flip them
/// when the inside lies at the far end of the edge
fn push_quad(tris: &mut Vec<[u32; 3]>, quad: [u32; 4], inside_at_start: bool) {
    if quad.contains(&NO_VERTEX) {
        return;
    }
    let [q0, q1, q2, q3] = if inside_at_start {
        quad
    } else {
        [quad[0], quad[3], quad[2], quad[1]]
    };
    tris.push([q0, q1, q2]);
    tris.push([q0, q2, q3]);
}
