//! Rhai API for solids
//!
//! This module provides every geometry function accessible from scene
//! scripts. Numeric arguments accept both integers and floats; sizes and
//! offsets also accept a `[x, y, z]` array.

use dingcad_kernel::{BooleanOp, GeometryHandle, MeshSettings, Primitive, RawMesh, Solid};
use glam::Vec3;
use rhai::{Array, Dynamic, Engine, EvalAltResult, INT, Map};

type ApiResult<T> = Result<T, Box<EvalAltResult>>;

fn kernel(err: dingcad_kernel::Error) -> Box<EvalAltResult> {
    err.to_string().into()
}

// ============================================================================
// Argument conversion
// ============================================================================

fn float(value: &Dynamic, what: &str) -> ApiResult<f64> {
    if let Ok(v) = value.as_float() {
        return Ok(v);
    }
    if let Ok(v) = value.as_int() {
        return Ok(v as f64);
    }
    Err(format!("{what} must be a number, got {}", value.type_name()).into())
}

fn number(value: &Dynamic, what: &str) -> ApiResult<f32> {
    float(value, what).map(|v| v as f32)
}

fn count(value: &Dynamic, what: &str) -> ApiResult<u32> {
    let n = number(value, what)?.round();
    if n < 0.0 || n > u32::MAX as f32 {
        return Err(format!("{what} must be a non-negative integer, got {n}").into());
    }
    Ok(n as u32)
}

/// A scalar broadcast to all three axes, or a three-element array
fn vector(value: &Dynamic, what: &str) -> ApiResult<Vec3> {
    if !value.is_array() {
        return Ok(Vec3::splat(number(value, what)?));
    }
    let items = value
        .clone()
        .into_array()
        .map_err(|t| format!("{what} must be an array, got {t}"))?;
    match items.as_slice() {
        [x, y, z] => Ok(Vec3::new(
            number(x, what)?,
            number(y, what)?,
            number(z, what)?,
        )),
        _ => Err(format!("{what} needs 3 components, got {}", items.len()).into()),
    }
}

fn vector3(x: &Dynamic, y: &Dynamic, z: &Dynamic, what: &str) -> ApiResult<Vec3> {
    Ok(Vec3::new(number(x, what)?, number(y, what)?, number(z, what)?))
}

fn solids(items: Array, what: &str) -> ApiResult<Vec<GeometryHandle>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let found = item.type_name();
            item.try_cast::<GeometryHandle>().ok_or_else(|| {
                Box::<EvalAltResult>::from(format!("{what}: element {i} is {found}, not a Solid"))
            })
        })
        .collect()
}

fn to_array(v: Vec3) -> Array {
    v.to_array()
        .into_iter()
        .map(|c| Dynamic::from_float(f64::from(c)))
        .collect()
}

/// Short label used by `print` and `to_string`
fn describe(solid: &GeometryHandle) -> String {
    let kind = match solid.solid() {
        Solid::Primitive(Primitive::Cuboid(_)) => "cube",
        Solid::Primitive(Primitive::Sphere(_)) => "sphere",
        Solid::Primitive(Primitive::Frustum(_)) => "cylinder",
        Solid::Primitive(Primitive::Tetrahedron(_)) => "tetrahedron",
        Solid::Transform { .. } => "transformed",
        Solid::Compose(parts) if parts.is_empty() => "empty",
        Solid::Compose(_) => "composition",
        Solid::Boolean {
            op: BooleanOp::Union,
            ..
        } => "union",
        Solid::Boolean {
            op: BooleanOp::Difference,
            ..
        } => "difference",
        Solid::Boolean {
            op: BooleanOp::Intersection,
            ..
        } => "intersection",
    };
    format!("Solid({kind})")
}

// ============================================================================
// Registration
// ============================================================================

/// Register all geometry functions with a Rhai engine
///
/// Queries that need a triangle mesh (`num_tri`, `volume`, ...) mesh with
/// `settings`.
pub fn register_geometry_api(engine: &mut Engine, settings: MeshSettings) {
    engine
        .register_type_with_name::<GeometryHandle>("Solid")
        .register_fn("to_string", |s: &mut GeometryHandle| describe(s))
        .register_fn("to_debug", |s: &mut GeometryHandle| describe(s));

    register_primitives(engine);
    register_booleans(engine);
    register_transforms(engine);
    register_queries(engine, settings);

    // === Math helpers ===
    engine.register_fn("PI", || std::f64::consts::PI);
    engine.register_fn("TAU", || std::f64::consts::TAU);
    engine.register_fn("deg", |d: Dynamic| -> ApiResult<f64> {
        Ok(float(&d, "deg")?.to_radians())
    });
    engine.register_fn("rad", |r: Dynamic| -> ApiResult<f64> {
        Ok(float(&r, "rad")?.to_degrees())
    });
}

fn register_primitives(engine: &mut Engine) {
    engine.register_fn("cube", || -> ApiResult<GeometryHandle> {
        GeometryHandle::cube(Vec3::ONE, false).map_err(kernel)
    });
    engine.register_fn("cube", |size: Dynamic| -> ApiResult<GeometryHandle> {
        GeometryHandle::cube(vector(&size, "cube size")?, false).map_err(kernel)
    });
    engine.register_fn(
        "cube",
        |size: Dynamic, center: bool| -> ApiResult<GeometryHandle> {
            GeometryHandle::cube(vector(&size, "cube size")?, center).map_err(kernel)
        },
    );
    engine.register_fn(
        "cube",
        |x: Dynamic, y: Dynamic, z: Dynamic| -> ApiResult<GeometryHandle> {
            GeometryHandle::cube(vector3(&x, &y, &z, "cube size")?, false).map_err(kernel)
        },
    );
    engine.register_fn(
        "cube",
        |x: Dynamic, y: Dynamic, z: Dynamic, center: bool| -> ApiResult<GeometryHandle> {
            GeometryHandle::cube(vector3(&x, &y, &z, "cube size")?, center).map_err(kernel)
        },
    );

    engine.register_fn("sphere", |r: Dynamic| -> ApiResult<GeometryHandle> {
        GeometryHandle::sphere(number(&r, "sphere radius")?, 0).map_err(kernel)
    });
    engine.register_fn(
        "sphere",
        |r: Dynamic, segments: Dynamic| -> ApiResult<GeometryHandle> {
            GeometryHandle::sphere(
                number(&r, "sphere radius")?,
                count(&segments, "sphere segments")?,
            )
            .map_err(kernel)
        },
    );

    engine.register_fn(
        "cylinder",
        |h: Dynamic, r: Dynamic| -> ApiResult<GeometryHandle> {
            let r = number(&r, "cylinder radius")?;
            GeometryHandle::cylinder(number(&h, "cylinder height")?, r, r, 0, false)
                .map_err(kernel)
        },
    );
    engine.register_fn(
        "cylinder",
        |h: Dynamic, r_low: Dynamic, r_high: Dynamic| -> ApiResult<GeometryHandle> {
            GeometryHandle::cylinder(
                number(&h, "cylinder height")?,
                number(&r_low, "cylinder radius")?,
                number(&r_high, "cylinder top radius")?,
                0,
                false,
            )
            .map_err(kernel)
        },
    );
    engine.register_fn(
        "cylinder",
        |h: Dynamic,
         r_low: Dynamic,
         r_high: Dynamic,
         segments: Dynamic,
         center: bool|
         -> ApiResult<GeometryHandle> {
            GeometryHandle::cylinder(
                number(&h, "cylinder height")?,
                number(&r_low, "cylinder radius")?,
                number(&r_high, "cylinder top radius")?,
                count(&segments, "cylinder segments")?,
                center,
            )
            .map_err(kernel)
        },
    );

    engine.register_fn("tetrahedron", GeometryHandle::tetrahedron);
}

fn register_booleans(engine: &mut Engine) {
    // Method and free-function forms share one registration.
    engine.register_fn("union", |a: &mut GeometryHandle, b: GeometryHandle| {
        a.union(&b)
    });
    engine.register_fn("difference", |a: &mut GeometryHandle, b: GeometryHandle| {
        a.difference(&b)
    });
    engine.register_fn(
        "intersection",
        |a: &mut GeometryHandle, b: GeometryHandle| a.intersection(&b),
    );

    // === Operators ===
    engine.register_fn("+", |a: GeometryHandle, b: GeometryHandle| a.union(&b));
    engine.register_fn("-", |a: GeometryHandle, b: GeometryHandle| a.difference(&b));
    engine.register_fn("^", |a: GeometryHandle, b: GeometryHandle| {
        a.intersection(&b)
    });

    // === Array forms ===
    engine.register_fn("union", |items: Array| -> ApiResult<GeometryHandle> {
        Ok(GeometryHandle::boolean(BooleanOp::Union, solids(items, "union")?))
    });
    engine.register_fn("difference", |items: Array| -> ApiResult<GeometryHandle> {
        Ok(GeometryHandle::boolean(
            BooleanOp::Difference,
            solids(items, "difference")?,
        ))
    });
    engine.register_fn("intersection", |items: Array| -> ApiResult<GeometryHandle> {
        Ok(GeometryHandle::boolean(
            BooleanOp::Intersection,
            solids(items, "intersection")?,
        ))
    });
    engine.register_fn("compose", |items: Array| -> ApiResult<GeometryHandle> {
        Ok(GeometryHandle::compose(solids(items, "compose")?))
    });
}

fn register_transforms(engine: &mut Engine) {
    engine.register_fn(
        "translate",
        |s: &mut GeometryHandle, x: Dynamic, y: Dynamic, z: Dynamic| -> ApiResult<GeometryHandle> {
            Ok(s.translate(vector3(&x, &y, &z, "translate offset")?))
        },
    );
    engine.register_fn(
        "translate",
        |s: &mut GeometryHandle, offset: Dynamic| -> ApiResult<GeometryHandle> {
            Ok(s.translate(vector(&offset, "translate offset")?))
        },
    );

    engine.register_fn(
        "rotate",
        |s: &mut GeometryHandle, x: Dynamic, y: Dynamic, z: Dynamic| -> ApiResult<GeometryHandle> {
            Ok(s.rotate(vector3(&x, &y, &z, "rotate angles")?))
        },
    );
    engine.register_fn(
        "rotate",
        |s: &mut GeometryHandle, angles: Dynamic| -> ApiResult<GeometryHandle> {
            Ok(s.rotate(vector(&angles, "rotate angles")?))
        },
    );

    engine.register_fn(
        "scale",
        |s: &mut GeometryHandle, factor: Dynamic| -> ApiResult<GeometryHandle> {
            s.scale(vector(&factor, "scale factor")?).map_err(kernel)
        },
    );
    engine.register_fn(
        "scale",
        |s: &mut GeometryHandle, x: Dynamic, y: Dynamic, z: Dynamic| -> ApiResult<GeometryHandle> {
            s.scale(vector3(&x, &y, &z, "scale factor")?).map_err(kernel)
        },
    );

    engine.register_fn(
        "mirror",
        |s: &mut GeometryHandle, x: Dynamic, y: Dynamic, z: Dynamic| -> ApiResult<GeometryHandle> {
            s.mirror(vector3(&x, &y, &z, "mirror normal")?).map_err(kernel)
        },
    );
    engine.register_fn(
        "mirror",
        |s: &mut GeometryHandle, normal: Dynamic| -> ApiResult<GeometryHandle> {
            s.mirror(vector(&normal, "mirror normal")?).map_err(kernel)
        },
    );
}

fn register_queries(engine: &mut Engine, settings: MeshSettings) {
    let mesh = move |s: &GeometryHandle| -> ApiResult<RawMesh> {
        s.to_raw_mesh(&settings).map_err(kernel)
    };

    engine.register_fn("num_tri", move |s: &mut GeometryHandle| -> ApiResult<INT> {
        Ok(mesh(s)?.num_tri() as INT)
    });
    engine.register_fn("num_vert", move |s: &mut GeometryHandle| -> ApiResult<INT> {
        Ok(mesh(s)?.num_vert() as INT)
    });
    engine.register_fn("volume", move |s: &mut GeometryHandle| -> ApiResult<f64> {
        Ok(f64::from(mesh(s)?.volume()))
    });
    engine.register_fn(
        "surface_area",
        move |s: &mut GeometryHandle| -> ApiResult<f64> {
            Ok(f64::from(mesh(s)?.surface_area()))
        },
    );
    engine.register_fn("is_empty", |s: &mut GeometryHandle| s.is_empty());
    engine.register_fn("bounding_box", |s: &mut GeometryHandle| {
        let b = s.bounding_box();
        let mut map = Map::new();
        map.insert("min".into(), Dynamic::from_array(to_array(b.min)));
        map.insert("max".into(), Dynamic::from_array(to_array(b.max)));
        map
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        register_geometry_api(&mut engine, MeshSettings::default().with_resolution(16));
        engine
    }

    fn solid(script: &str) -> GeometryHandle {
        engine().eval::<GeometryHandle>(script).unwrap()
    }

    #[test]
    fn test_cube_forms() {
        let e = engine();
        assert_eq!(e.eval::<INT>("cube().num_tri()").unwrap(), 12);
        assert_eq!(e.eval::<INT>("cube(2).num_vert()").unwrap(), 8);
        let b = solid("cube([2, 4, 6], true)").bounding_box();
        assert_relative_eq!(b.min.y, -2.0);
        let b = solid("cube(1.0, 2, 3.5)").bounding_box();
        assert_relative_eq!(b.max.z, 3.5);
    }

    #[test]
    fn test_operators_build_booleans() {
        let s = solid("cube(2) + sphere(1).translate(3, 0, 0)");
        assert!(matches!(
            s.solid(),
            Solid::Boolean {
                op: BooleanOp::Union,
                ..
            }
        ));
        let s = solid("cube(2) - sphere(1)");
        assert!(matches!(
            s.solid(),
            Solid::Boolean {
                op: BooleanOp::Difference,
                ..
            }
        ));
        let s = solid("intersection(cube(2), sphere(1.5))");
        assert!(matches!(
            s.solid(),
            Solid::Boolean {
                op: BooleanOp::Intersection,
                ..
            }
        ));
    }

    #[test]
    fn test_array_forms() {
        let e = engine();
        assert_eq!(
            e.eval::<INT>("compose([cube(), cube().translate(5, 0, 0)]).num_tri()")
                .unwrap(),
            24
        );
        assert!(e.eval::<bool>("union([]).is_empty()").unwrap());
        let err = e.eval::<GeometryHandle>("union([cube(), 3])").unwrap_err();
        assert!(err.to_string().contains("element 1"));
    }

    #[test]
    fn test_volume_query() {
        let v = engine().eval::<f64>("cube(2).volume()").unwrap();
        assert_relative_eq!(v, 8.0, epsilon = 1e-4);
    }

    #[test]
    fn test_bounding_box_map() {
        let max_x = engine()
            .eval::<f64>("let b = cube(2).translate([1, 0, 0]).bounding_box(); b.max[0]")
            .unwrap();
        assert_relative_eq!(max_x, 3.0);
    }

    #[test]
    fn test_bad_arguments_raise() {
        let e = engine();
        assert!(e.eval::<GeometryHandle>("sphere(-1)").is_err());
        assert!(e.eval::<GeometryHandle>("cube(\"big\")").is_err());
        assert!(e.eval::<GeometryHandle>("cube([1, 2])").is_err());
        assert!(e.eval::<GeometryHandle>("cube().mirror(0, 0, 0)").is_err());
    }

    #[test]
    fn test_math_helpers() {
        let e = engine();
        assert_relative_eq!(e.eval::<f64>("deg(180)").unwrap(), std::f64::consts::PI);
        assert_relative_eq!(e.eval::<f64>("rad(PI())").unwrap(), 180.0);
        assert_relative_eq!(e.eval::<f64>("rad(deg(37.5))").unwrap(), 37.5, epsilon = 1e-12);
    }

    #[test]
    fn test_to_string() {
        assert_eq!(engine().eval::<String>("cube().to_string()").unwrap(), "Solid(cube)");
    }
}
