//! # dingcad Kernel
//!
//! Solid modeling for scripted scenes.
//!
//! Solids are immutable trees of primitives, affine transforms, disjoint
//! compositions and booleans. A [`GeometryHandle`] shares one tree between
//! every owner (the scripting context that built it and the viewer that
//! displays it) and turns it into an indexed triangle soup on demand.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dingcad_kernel::prelude::*;
//!
//! let body = GeometryHandle::cube(Vec3::splat(2.0), true)?;
//! let dome = GeometryHandle::sphere(1.2, 0)?.translate(Vec3::new(0.0, 0.0, 0.8));
//! let part = body.union(&dome);
//!
//! let mesh = part.to_raw_mesh(&MeshSettings::default())?;
//! println!("{} triangles", mesh.num_tri());
//! ```
//!
//! ## Units and Conventions
//!
//! - **Distances**: millimetres by convention; the kernel itself is unitless
//! - **Angles**: rotation functions take **degrees**, applied X then Y then Z
//! - **Coordinate system**: Right-handed, Z-up
//! - **Precision**: `f32` positions, matching the renderer's vertex buffers
//!
//! ## Meshing
//!
//! Trees made of primitives, transforms and compositions tessellate exactly
//! (a cube is 8 vertices and 12 triangles). Boolean nodes are meshed
//! implicitly: their signed distance is sampled on a grid and a welded
//! surface is extracted with surface nets.

pub mod mesh;
pub mod sdf;
pub mod solid;

mod error;

pub use error::{Error, Result};
pub use mesh::{MeshSettings, RawMesh};
pub use solid::{BooleanOp, GeometryHandle, Primitive, Solid};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::mesh::{MeshSettings, RawMesh};
    pub use crate::sdf::{Aabb, Sdf};
    pub use crate::solid::{BooleanOp, GeometryHandle, Primitive, Solid};

    // Math (re-export glam)
    pub use glam::{Affine3A, Mat3, Quat, Vec3};

    pub use crate::{Error, Result};
}
