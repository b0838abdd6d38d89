//! Solid trees and the shared handle scripts and viewers hold
//!
//! A [`Solid`] never changes once built. Every operation on a
//! [`GeometryHandle`] returns a new handle whose tree points at its operands,
//! so sub-trees are shared rather than copied.

use crate::mesh::{MeshSettings, RawMesh, Tessellate, surface_nets};
use crate::sdf::{Aabb, Cuboid, Frustum, Sdf, Sphere, Tetrahedron};
use crate::{Error, Result};
use glam::{Affine3A, Mat3, Vec3};
use std::sync::Arc;

// ============================================================================
// Tree nodes
// ============================================================================

/// Leaf shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Cuboid(Cuboid),
    Sphere(Sphere),
    Frustum(Frustum),
    Tetrahedron(Tetrahedron),
}

impl Primitive {
    fn as_sdf(&self) -> &dyn Sdf {
        match self {
            Self::Cuboid(s) => s,
            Self::Sphere(s) => s,
            Self::Frustum(s) => s,
            Self::Tetrahedron(s) => s,
        }
    }
}

impl Tessellate for Primitive {
    fn tessellate(&self) -> RawMesh {
        match self {
            Self::Cuboid(s) => s.tessellate(),
            Self::Sphere(s) => s.tessellate(),
            Self::Frustum(s) => s.tessellate(),
            Self::Tetrahedron(s) => s.tessellate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    /// The first operand minus every other operand
    Difference,
    Intersection,
}

#[derive(Debug, Clone)]
pub enum Solid {
    Primitive(Primitive),
    Transform {
        solid: GeometryHandle,
        transform: Affine3A,
        inverse: Affine3A,
    },
    /// Disjoint parts kept side by side; an empty list is the empty solid
    Compose(Vec<GeometryHandle>),
    Boolean {
        op: BooleanOp,
        operands: Vec<GeometryHandle>,
    },
}

impl Solid {
    fn contains_boolean(&self) -> bool {
        match self {
            Self::Primitive(_) => false,
            Self::Transform { solid, .. } => solid.0.contains_boolean(),
            Self::Compose(parts) => parts.iter().any(|p| p.0.contains_boolean()),
            Self::Boolean { .. } => true,
        }
    }
}

impl Sdf for Solid {
    fn distance(&self, p: Vec3) -> f32 {
        match self {
            Self::Primitive(prim) => prim.as_sdf().distance(p),
            Self::Transform {
                solid,
                transform,
                inverse,
            } => {
                // Shortest column bounds how much the map can shrink distances.
                let m = transform.matrix3;
                let shrink = m.x_axis.length().min(m.y_axis.length()).min(m.z_axis.length());
                solid.0.distance(inverse.transform_point3(p)) * shrink
            }
            Self::Compose(parts) => parts
                .iter()
                .map(|s| s.0.distance(p))
                .fold(f32::MAX, f32::min),
            Self::Boolean { op, operands } => match op {
                BooleanOp::Union => operands
                    .iter()
                    .map(|s| s.0.distance(p))
                    .fold(f32::MAX, f32::min),
                BooleanOp::Difference => {
                    let Some((first, rest)) = operands.split_first() else {
                        return f32::MAX;
                    };
                    rest.iter()
                        .fold(first.0.distance(p), |d, s| d.max(-s.0.distance(p)))
                }
                BooleanOp::Intersection => operands
                    .iter()
                    .map(|s| s.0.distance(p))
                    .fold(f32::MIN, f32::max),
            },
        }
    }

    fn bounds(&self) -> Aabb {
        match self {
            Self::Primitive(prim) => prim.as_sdf().bounds(),
            Self::Transform {
                solid, transform, ..
            } => solid.0.bounds().transformed(transform),
            Self::Compose(parts)
            | Self::Boolean {
                op: BooleanOp::Union,
                operands: parts,
            } => parts
                .iter()
                .fold(Aabb::empty(), |acc, s| acc.union(&s.0.bounds())),
            Self::Boolean {
                op: BooleanOp::Difference,
                operands,
            } => operands.first().map_or_else(Aabb::empty, |s| s.0.bounds()),
            Self::Boolean {
                op: BooleanOp::Intersection,
                operands,
            } => {
                let Some((first, rest)) = operands.split_first() else {
                    return Aabb::empty();
                };
                rest.iter()
                    .fold(first.0.bounds(), |acc, s| acc.intersection(&s.0.bounds()))
            }
        }
    }
}

// ============================================================================
// Shared handle
// ============================================================================

/// Reference-counted handle to an immutable solid
///
/// Cloning is cheap; the tree is freed when the last handle drops.
#[derive(Debug, Clone)]
pub struct GeometryHandle(Arc<Solid>);

impl GeometryHandle {
    pub fn new(solid: Solid) -> Self {
        Self(Arc::new(solid))
    }

    /// The solid with no volume
    pub fn empty() -> Self {
        Self::new(Solid::Compose(Vec::new()))
    }

    pub fn solid(&self) -> &Solid {
        &self.0
    }

    /// Whether both handles share the same tree
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles sharing this tree
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    // ------------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------------

    pub fn cube(size: Vec3, center: bool) -> Result<Self> {
        Ok(Self::new(Solid::Primitive(Primitive::Cuboid(Cuboid::new(
            size, center,
        )?))))
    }

    /// Sphere centered at the origin; `segments == 0` picks a default
    pub fn sphere(radius: f32, segments: u32) -> Result<Self> {
        Ok(Self::new(Solid::Primitive(Primitive::Sphere(Sphere::new(
            radius, segments,
        )?))))
    }

    /// Cylinder or cone along +Z
    pub fn cylinder(
        height: f32,
        radius_low: f32,
        radius_high: f32,
        segments: u32,
        center: bool,
    ) -> Result<Self> {
        Ok(Self::new(Solid::Primitive(Primitive::Frustum(Frustum::new(
            height,
            radius_low,
            radius_high,
            segments,
            center,
        )?))))
    }

    pub fn tetrahedron() -> Self {
        Self::new(Solid::Primitive(Primitive::Tetrahedron(Tetrahedron)))
    }

    // ------------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------------

    /// Apply an affine map; consecutive transforms collapse into one node
    pub fn transform(&self, transform: Affine3A) -> Self {
        let (solid, combined) = match &*self.0 {
            Solid::Transform {
                solid,
                transform: inner,
                ..
            } => (solid.clone(), transform * *inner),
            _ => (self.clone(), transform),
        };
        Self::new(Solid::Transform {
            solid,
            transform: combined,
            inverse: combined.inverse(),
        })
    }

    pub fn translate(&self, offset: Vec3) -> Self {
        self.transform(Affine3A::from_translation(offset))
    }

    /// Rotate by Euler angles in degrees, about X first, then Y, then Z
    pub fn rotate(&self, degrees: Vec3) -> Self {
        let r = degrees * (std::f32::consts::PI / 180.0);
        let m = Mat3::from_rotation_z(r.z) * Mat3::from_rotation_y(r.y) * Mat3::from_rotation_x(r.x);
        self.transform(Affine3A::from_mat3(m))
    }

    pub fn scale(&self, factors: Vec3) -> Result<Self> {
        if !factors.is_finite() || factors.cmpeq(Vec3::ZERO).any() {
            return Err(Error::InvalidParameter(format!(
                "scale factors must be finite and non-zero, got {factors}"
            )));
        }
        Ok(self.transform(Affine3A::from_scale(factors)))
    }

    /// Reflect across the plane through the origin with the given normal
    pub fn mirror(&self, normal: Vec3) -> Result<Self> {
        let n = normal.try_normalize().ok_or_else(|| {
            Error::InvalidParameter(format!("mirror normal must be non-zero, got {normal}"))
        })?;
        let outer = Mat3::from_cols(n * n.x, n * n.y, n * n.z);
        Ok(self.transform(Affine3A::from_mat3(Mat3::IDENTITY - outer * 2.0)))
    }

    // ------------------------------------------------------------------------
    // Combination
    // ------------------------------------------------------------------------

    pub fn union(&self, other: &Self) -> Self {
        Self::boolean(BooleanOp::Union, vec![self.clone(), other.clone()])
    }

    pub fn difference(&self, other: &Self) -> Self {
        Self::boolean(BooleanOp::Difference, vec![self.clone(), other.clone()])
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self::boolean(BooleanOp::Intersection, vec![self.clone(), other.clone()])
    }

    /// N-ary boolean; no operands give the empty solid, one gives itself
    pub fn boolean(op: BooleanOp, operands: Vec<Self>) -> Self {
        match operands.len() {
            0 => Self::empty(),
            1 => operands.into_iter().next().unwrap_or_else(Self::empty),
            _ => Self::new(Solid::Boolean { op, operands }),
        }
    }

    /// Keep parts side by side without merging them
    pub fn compose(parts: Vec<Self>) -> Self {
        Self::new(Solid::Compose(parts))
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn bounding_box(&self) -> Aabb {
        self.0.bounds()
    }

    pub fn is_empty(&self) -> bool {
        match &*self.0 {
            Solid::Compose(parts) => parts.iter().all(Self::is_empty),
            Solid::Transform { solid, .. } => solid.is_empty(),
            _ => self.bounding_box().is_empty(),
        }
    }

    /// Triangulate the solid
    ///
    /// Trees without booleans tessellate exactly. A union whose operands
    /// have disjoint bounds is composed exactly as well; other booleans are
    /// meshed with surface nets at `settings.resolution`.
    pub fn to_raw_mesh(&self, settings: &MeshSettings) -> Result<RawMesh> {
        match &*self.0 {
            Solid::Primitive(prim) => Ok(prim.tessellate()),
            Solid::Transform {
                solid, transform, ..
            } => Ok(solid.to_raw_mesh(settings)?.transformed(transform)),
            Solid::Compose(parts) => concat_meshes(parts, settings),
            Solid::Boolean {
                op: BooleanOp::Union,
                operands,
            } if bounds_disjoint(operands) => concat_meshes(operands, settings),
            Solid::Boolean { .. } => {
                tracing::debug!(resolution = settings.resolution, "meshing boolean implicitly");
                surface_nets(&*self.0, settings.resolution)
            }
        }
    }

    /// Whether meshing this solid needs implicit sampling
    pub fn is_exact(&self) -> bool {
        !self.0.contains_boolean()
    }
}

fn concat_meshes(parts: &[GeometryHandle], settings: &MeshSettings) -> Result<RawMesh> {
    parts.iter().try_fold(RawMesh::new(), |mut acc, part| {
        acc.append(&part.to_raw_mesh(settings)?);
        Ok(acc)
    })
}

fn bounds_disjoint(operands: &[GeometryHandle]) -> bool {
    let boxes: Vec<Aabb> = operands.iter().map(GeometryHandle::bounding_box).collect();
    boxes.iter().enumerate().all(|(i, a)| {
        boxes[i + 1..]
            .iter()
            .all(|b| a.intersection(b).is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube() -> GeometryHandle {
        GeometryHandle::cube(Vec3::ONE, false).unwrap()
    }

    #[test]
    fn test_cube_meshes_exactly() {
        let mesh = unit_cube().to_raw_mesh(&MeshSettings::default()).unwrap();
        assert_eq!(mesh.num_vert(), 8);
        assert_eq!(mesh.num_tri(), 12);
    }

    #[test]
    fn test_translate_moves_bounds() {
        let b = unit_cube().translate(Vec3::new(1.0, 2.0, 3.0)).bounding_box();
        assert_relative_eq!(b.min.x, 1.0);
        assert_relative_eq!(b.max.z, 4.0);
    }

    #[test]
    fn test_transforms_collapse() {
        let moved = unit_cube().translate(Vec3::X).translate(Vec3::Y);
        match moved.solid() {
            Solid::Transform { solid, transform, .. } => {
                assert!(matches!(solid.solid(), Solid::Primitive(_)));
                assert_eq!(Vec3::from(transform.translation), Vec3::new(1.0, 1.0, 0.0));
            }
            other => panic!("expected a transform node, got {other:?}"),
        }
    }

    #[test]
    fn test_rotate_degrees() {
        let b = GeometryHandle::cube(Vec3::new(2.0, 1.0, 1.0), false)
            .unwrap()
            .rotate(Vec3::new(0.0, 0.0, 90.0))
            .bounding_box();
        assert_relative_eq!(b.min.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(b.max.y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_mirror_keeps_volume_positive() {
        let mesh = unit_cube()
            .mirror(Vec3::X)
            .unwrap()
            .to_raw_mesh(&MeshSettings::default())
            .unwrap();
        assert_relative_eq!(mesh.volume(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(mesh.bounds().min.x, -1.0);
    }

    #[test]
    fn test_invalid_transforms() {
        assert!(unit_cube().mirror(Vec3::ZERO).is_err());
        assert!(unit_cube().scale(Vec3::new(1.0, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_disjoint_union_is_exact() {
        let a = unit_cube();
        let b = unit_cube().translate(Vec3::splat(5.0));
        let mesh = a.union(&b).to_raw_mesh(&MeshSettings::default()).unwrap();
        assert_eq!(mesh.num_vert(), 16);
        assert_eq!(mesh.num_tri(), 24);
    }

    #[test]
    fn test_overlapping_union_is_sampled() {
        let a = GeometryHandle::cube(Vec3::splat(2.0), true).unwrap();
        let b = GeometryHandle::sphere(1.2, 0).unwrap().translate(Vec3::new(0.0, 0.8, 0.0));
        let u = a.union(&b);
        assert!(!u.is_exact());
        let mesh = u.to_raw_mesh(&MeshSettings::default().with_resolution(24)).unwrap();
        assert!(mesh.num_tri() > 12);
        assert!(mesh.volume() > 8.0);
    }

    #[test]
    fn test_difference_distance() {
        let a = GeometryHandle::cube(Vec3::splat(2.0), true).unwrap();
        let b = GeometryHandle::sphere(0.5, 0).unwrap();
        let d = a.difference(&b);
        assert!(d.solid().distance(Vec3::ZERO) > 0.0);
        assert!(d.solid().distance(Vec3::splat(0.8)) < 0.0);
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let a = unit_cube();
        let b = unit_cube().translate(Vec3::splat(3.0));
        let i = a.intersection(&b);
        assert!(i.is_empty());
        assert!(i.to_raw_mesh(&MeshSettings::default()).unwrap().is_empty());
    }

    #[test]
    fn test_boolean_arity() {
        assert!(GeometryHandle::boolean(BooleanOp::Union, vec![]).is_empty());
        let c = unit_cube();
        assert!(GeometryHandle::boolean(BooleanOp::Union, vec![c.clone()]).ptr_eq(&c));
    }

    #[test]
    fn test_handles_share_trees() {
        let c = unit_cube();
        let moved = c.translate(Vec3::X);
        assert_eq!(c.strong_count(), 2);
        drop(moved);
        assert_eq!(c.strong_count(), 1);
    }
}
