//! Integration tests for loading scene scripts from disk

// Tests are allowed to use expect/unwrap for cleaner error messages
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use dingcad_script::{
    DependencyTracker, EvalOptions, LoadError, MeshSettings, ModulePath, SceneEvaluator,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Write `files` into a fresh directory
fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    for (name, source) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, source).unwrap();
    }
    dir
}

fn module(dir: &Path, name: &str) -> ModulePath {
    ModulePath::new(dir.join(name)).unwrap()
}

fn evaluate(entry: PathBuf) -> (Result<dingcad_script::GeometryHandle, LoadError>, DependencyTracker) {
    init_logging();
    let mut tracker = DependencyTracker::new();
    tracker.begin_tracking();
    let result = SceneEvaluator::default().evaluate(&entry, &mut tracker);
    (result, tracker)
}

#[test]
fn single_cube_scene() {
    let dir = project(&[("scene.rhai", "export const scene = cube();")]);
    let (result, tracker) = evaluate(dir.path().join("scene.rhai"));

    let mesh = result
        .expect("scene should evaluate")
        .to_raw_mesh(&MeshSettings::default())
        .unwrap();
    assert_eq!(mesh.num_vert(), 8);
    assert_eq!(mesh.num_tri(), 12);

    let deps = tracker.snapshot();
    assert_eq!(deps.len(), 1);
    assert!(deps.contains(&module(dir.path(), "scene.rhai")));
}

#[test]
fn imports_are_tracked() {
    let dir = project(&[
        (
            "scene.rhai",
            r#"
                import "parts/plate" as plate;
                export const scene = plate::body.translate(0, 0, 1);
            "#,
        ),
        (
            "parts/plate.rhai",
            r#"
                import "../common" as common;
                export const body = cube(common::WIDTH, 2, 1);
            "#,
        ),
        ("common.rhai", "export const WIDTH = 4;"),
    ]);
    let (result, tracker) = evaluate(dir.path().join("scene.rhai"));
    let solid = result.expect("relative imports should resolve");
    assert!((solid.bounding_box().max.x - 4.0).abs() < 1e-6);

    let deps = tracker.snapshot();
    assert_eq!(deps.len(), 3);
    for name in ["scene.rhai", "parts/plate.rhai", "common.rhai"] {
        assert!(deps.contains(&module(dir.path(), name)), "{name} not tracked");
    }
}

#[test]
fn diamond_imports_load_once() {
    let dir = project(&[
        (
            "scene.rhai",
            r#"
                import "left" as left;
                import "right" as right;
                export const scene = left::part + right::part;
            "#,
        ),
        ("left.rhai", "import \"base\" as base; export const part = base::unit;"),
        (
            "right.rhai",
            "import \"base\" as base; export const part = base::unit.translate(3, 0, 0);",
        ),
        ("base.rhai", "export const unit = cube();"),
    ]);
    let (result, tracker) = evaluate(dir.path().join("scene.rhai"));
    let solid = result.expect("diamond should evaluate");
    assert!(!solid.is_empty());
    assert_eq!(tracker.snapshot().len(), 4);
}

#[test]
fn circular_import_is_reported() {
    let dir = project(&[
        ("a.rhai", "import \"b\" as b; export const scene = cube();"),
        ("b.rhai", "import \"a\" as a; export const x = 1;"),
    ]);
    let (result, _) = evaluate(dir.path().join("a.rhai"));
    match result {
        Err(LoadError::CircularDependency { path, chain }) => {
            assert_eq!(path, module(dir.path(), "a.rhai"));
            assert!(chain.contains("b.rhai"));
        }
        other => panic!("expected a circular dependency, got {other:?}"),
    }
}

#[test]
fn self_import_is_reported() {
    let dir = project(&[("a.rhai", "import \"a\" as me; export const scene = cube();")]);
    let (result, _) = evaluate(dir.path().join("a.rhai"));
    assert!(matches!(result, Err(LoadError::CircularDependency { .. })));
}

#[test]
fn throwing_helper_is_an_execution_error() {
    let dir = project(&[
        (
            "scene.rhai",
            "import \"helper\" as helper; export const scene = cube();",
        ),
        ("helper.rhai", "throw \"helper exploded\";"),
    ]);
    let (result, _) = evaluate(dir.path().join("scene.rhai"));
    match result {
        Err(err @ LoadError::Execution { .. }) => {
            assert_eq!(err.path(), Some(&module(dir.path(), "helper.rhai")));
            let text = err.to_string();
            assert!(text.starts_with("ExecutionError"));
            assert!(text.contains("helper exploded"), "{text}");
        }
        other => panic!("expected an execution error, got {other:?}"),
    }
}

#[test]
fn missing_import_is_not_found() {
    let dir = project(&[(
        "scene.rhai",
        "import \"nowhere\" as n; export const scene = cube();",
    )]);
    let (result, tracker) = evaluate(dir.path().join("scene.rhai"));
    let err = result.unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert_eq!(err.path(), Some(&module(dir.path(), "nowhere.rhai")));
    // The entry is still watched so fixing it triggers a reload
    assert!(tracker.snapshot().contains(&module(dir.path(), "scene.rhai")));
}

#[test]
fn missing_entry_is_not_found() {
    let dir = project(&[]);
    let (result, tracker) = evaluate(dir.path().join("scene.rhai"));
    assert!(result.unwrap_err().is_not_found());
    assert_eq!(tracker.snapshot().len(), 1);
}

#[test]
fn syntax_error_in_import_is_a_compile_error() {
    let dir = project(&[
        ("scene.rhai", "import \"broken\" as b; export const scene = cube();"),
        ("broken.rhai", "export const = ;"),
    ]);
    let (result, _) = evaluate(dir.path().join("scene.rhai"));
    match result {
        Err(LoadError::Compile { path, .. }) => assert_eq!(path, module(dir.path(), "broken.rhai")),
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[test]
fn missing_export_without_fallback() {
    let dir = project(&[("scene.rhai", "export const other = cube();")]);
    let (result, _) = evaluate(dir.path().join("scene.rhai"));
    assert!(matches!(result, Err(LoadError::MissingExport { .. })));
}

#[test]
fn fallback_function_is_called() {
    let dir = project(&[(
        "scene.rhai",
        r#"
            import "parts" as parts;
            fn scene() { parts::body.scale(2) }
        "#,
    ), ("parts.rhai", "export const body = sphere(1);")]);
    let (result, _) = evaluate(dir.path().join("scene.rhai"));
    let solid = result.expect("fallback should produce the scene");
    assert!((solid.bounding_box().max.x - 2.0).abs() < 1e-5);
}

#[test]
fn fallback_can_be_disabled() {
    let dir = project(&[("scene.rhai", "fn scene() { cube() }")]);
    let options = EvalOptions {
        fallback_fn: None,
        ..EvalOptions::default()
    };
    let mut tracker = DependencyTracker::new();
    let result = SceneEvaluator::new(options).evaluate(&dir.path().join("scene.rhai"), &mut tracker);
    assert!(matches!(result, Err(LoadError::MissingExport { .. })));
}

#[test]
fn wrong_export_type_names_the_type() {
    let dir = project(&[("scene.rhai", "export const scene = \"not a solid\";")]);
    let (result, _) = evaluate(dir.path().join("scene.rhai"));
    match result {
        Err(LoadError::Type { found, .. }) => assert!(found.contains("string"), "{found}"),
        other => panic!("expected a type error, got {other:?}"),
    }
}

#[test]
fn kernel_argument_errors_surface_as_execution_errors() {
    let dir = project(&[("scene.rhai", "export const scene = sphere(-2);")]);
    let (result, _) = evaluate(dir.path().join("scene.rhai"));
    let err = result.unwrap_err();
    assert!(matches!(err, LoadError::Execution { .. }));
    assert!(err.to_string().contains("radius"));
}

#[test]
fn oversized_segment_count_is_an_execution_error() {
    let dir = project(&[("scene.rhai", "export const scene = sphere(1, 100000);")]);
    let (result, _) = evaluate(dir.path().join("scene.rhai"));
    let err = result.unwrap_err();
    assert!(matches!(err, LoadError::Execution { .. }));
    assert!(err.to_string().contains("segments"));
}

#[test]
fn each_evaluation_starts_fresh() {
    let dir = project(&[("scene.rhai", "export const scene = cube();")]);
    let evaluator = SceneEvaluator::default();
    let mut tracker = DependencyTracker::new();
    let a = evaluator.evaluate(&dir.path().join("scene.rhai"), &mut tracker).unwrap();
    tracker.begin_tracking();
    let b = evaluator.evaluate(&dir.path().join("scene.rhai"), &mut tracker).unwrap();
    assert!(!a.ptr_eq(&b));
    assert_eq!(tracker.snapshot().len(), 1);
}
