//! SDF Primitive shapes
//!
//! Placement follows the usual CAD conventions: boxes and cylinders sit on
//! the origin unless `center` is set, spheres and tetrahedra are centered.
//! Cylinders run along +Z.

use super::{Aabb, Sdf};
use crate::{Error, Result};
use glam::{Vec2, Vec3};

/// Segment count used when a caller passes `0` for a round primitive
pub const DEFAULT_SEGMENTS: u32 = 32;

/// Largest segment count a round primitive accepts
pub const MAX_SEGMENTS: u32 = 4096;

fn resolve_segments(segments: u32) -> Result<u32> {
    match segments {
        0 => Ok(DEFAULT_SEGMENTS),
        1 | 2 => Err(Error::InvalidParameter(format!(
            "segments must be at least 3, got {segments}"
        ))),
        n if n > MAX_SEGMENTS => Err(Error::InvalidParameter(format!(
            "segments must be at most {MAX_SEGMENTS}, got {n}"
        ))),
        n => Ok(n),
    }
}

fn require_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cuboid {
    pub size: Vec3,
    pub center: bool,
}

impl Cuboid {
    pub fn new(size: Vec3, center: bool) -> Result<Self> {
        require_positive("cube size x", size.x)?;
        require_positive("cube size y", size.y)?;
        require_positive("cube size z", size.z)?;
        Ok(Self { size, center })
    }

    /// Minimum corner of the box
    pub fn origin(&self) -> Vec3 {
        if self.center {
            -self.size * 0.5
        } else {
            Vec3::ZERO
        }
    }
}

impl Sdf for Cuboid {
    fn distance(&self, p: Vec3) -> f32 {
        let half = self.size * 0.5;
        let q = (p - self.origin() - half).abs() - half;
        q.max(Vec3::ZERO).length() + q.x.max(q.y.max(q.z)).min(0.0)
    }

    fn bounds(&self) -> Aabb {
        Aabb::new(self.origin(), self.origin() + self.size)
    }
}

/// Sphere centered at origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub radius: f32,
    pub segments: u32,
}

impl Sphere {
    pub fn new(radius: f32, segments: u32) -> Result<Self> {
        require_positive("sphere radius", radius)?;
        Ok(Self {
            radius,
            segments: resolve_segments(segments)?,
        })
    }
}

impl Sdf for Sphere {
    fn distance(&self, p: Vec3) -> f32 {
        p.length() - self.radius
    }

    fn bounds(&self) -> Aabb {
        Aabb::from_center(Vec3::ZERO, Vec3::splat(self.radius))
    }
}

/// Capped cone along +Z; equal radii make a cylinder, a zero top radius a cone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub height: f32,
    pub radius_low: f32,
    pub radius_high: f32,
    pub segments: u32,
    pub center: bool,
}

impl Frustum {
    pub fn new(
        height: f32,
        radius_low: f32,
        radius_high: f32,
        segments: u32,
        center: bool,
    ) -> Result<Self> {
        require_positive("cylinder height", height)?;
        require_positive("cylinder radius", radius_low)?;
        if !radius_high.is_finite() || radius_high < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "cylinder top radius must be zero or positive, got {radius_high}"
            )));
        }
        Ok(Self {
            height,
            radius_low,
            radius_high,
            segments: resolve_segments(segments)?,
            center,
        })
    }

    /// Z coordinate of the bottom cap
    pub fn z_min(&self) -> f32 {
        if self.center { -self.height * 0.5 } else { 0.0 }
    }
}

impl Sdf for Frustum {
    fn distance(&self, p: Vec3) -> f32 {
        let h = self.height * 0.5;
        let (r1, r2) = (self.radius_low, self.radius_high);
        let q = Vec2::new(p.truncate().length(), p.z - self.z_min() - h);

        let k1 = Vec2::new(r2, h);
        let k2 = Vec2::new(r2 - r1, 2.0 * h);
        let cap_radius = if q.y < 0.0 { r1 } else { r2 };
        let ca = Vec2::new(q.x - q.x.min(cap_radius), q.y.abs() - h);
        let cb = q - k1 + k2 * ((k1 - q).dot(k2) / k2.length_squared()).clamp(0.0, 1.0);
        let s = if cb.x < 0.0 && ca.y < 0.0 { -1.0 } else { 1.0 };
        s * ca.length_squared().min(cb.length_squared()).sqrt()
    }

    fn bounds(&self) -> Aabb {
        let r = self.radius_low.max(self.radius_high);
        let z0 = self.z_min();
        Aabb::new(Vec3::new(-r, -r, z0), Vec3::new(r, r, z0 + self.height))
    }
}

/// Regular tetrahedron inscribed in the cube `[-1, 1]^3`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tetrahedron;

impl Tetrahedron {
    pub const VERTICES: [Vec3; 4] = [
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, 1.0),
    ];

    /// Faces wound counter-clockwise seen from outside
    pub const FACES: [[u32; 3]; 4] = [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];
}

impl Sdf for Tetrahedron {
    fn distance(&self, p: Vec3) -> f32 {
        // Each face plane faces away from the opposite vertex.
        let inradius = 1.0 / 3.0_f32.sqrt();
        Self::VERTICES
            .iter()
            .map(|v| -v.normalize().dot(p) - inradius)
            .fold(f32::MIN, f32::max)
    }

    fn bounds(&self) -> Aabb {
        Aabb::from_center(Vec3::ZERO, Vec3::ONE)
    }
}
