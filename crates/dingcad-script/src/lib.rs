//! dingcad Script - Rhai scene scripts
//!
//! A scene is a Rhai module that exports a solid. Modules may import other
//! modules by path relative to themselves; every file that took part in the
//! last evaluation is tracked so a viewer can reload when any of them
//! changes.
//!
//! ## Example Script
//!
//! ```rhai
//! // parts/bracket.rhai
//! export const plate = cube(40, 20, 4);
//! fn hole(x) { cylinder(10, 3).translate(x, 10, -1) }
//! ```
//!
//! ```rhai
//! // scene.rhai
//! import "parts/bracket" as bracket;
//!
//! export const scene = bracket::plate - bracket::hole(8) - bracket::hole(32);
//! ```
//!
//! Instead of a `scene` value, the entry module may define a zero-argument
//! `fn scene()`; it is called once when the value is absent.
//!
//! ## Precision Notes
//!
//! Rhai scripts use `f64` for numeric literals, but all values are
//! converted to `f32` when constructing solids.

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod geometry_api;
pub mod loader;
pub mod probe;
pub mod resolver;
pub mod tracker;

pub use engine::ScriptEngine;
pub use error::{IoErrorKind, LoadError};
pub use evaluator::{EvalOptions, SceneEvaluator};
pub use geometry_api::register_geometry_api;
pub use loader::{CompiledModule, LoadContext, ModuleLoader};
pub use probe::{ChangeToken, probe};
pub use resolver::{ModulePath, resolve};
pub use tracker::{DependencySet, DependencyTracker};

// Re-export for convenience
pub use dingcad_kernel::{GeometryHandle, MeshSettings};
