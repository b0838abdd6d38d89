//! Module loading for one evaluation
//!
//! Rhai resolves `import` statements while a module body runs, so the
//! "currently loading" marker of a module stays set from the moment it is
//! compiled until its body has finished executing. Seeing a marked module
//! again means the import graph has a cycle.

use crate::error::{IoErrorKind, LoadError};
use crate::probe::probe;
use crate::resolver::{ModulePath, resolve};
use crate::tracker::DependencyTracker;
use rhai::{AST, Engine, EvalAltResult, Module, ModuleResolver, Position, Scope, Shared};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug)]
struct LoadState {
    base_dir: PathBuf,
    /// Modules between compile start and end of execution, outermost first
    loading: Vec<ModulePath>,
    cache: HashMap<ModulePath, Shared<Module>>,
    tracker: DependencyTracker,
    /// Innermost typed failure seen so far
    failure: Option<LoadError>,
}

/// State shared by every loader callback of one evaluation
///
/// Created per attempt and dropped with it, so concurrent pipelines never
/// see each other's markers or caches.
#[derive(Debug, Clone)]
pub struct LoadContext {
    state: Rc<RefCell<LoadState>>,
}

impl LoadContext {
    /// `base_dir` anchors imports made from code without a source path
    pub fn new(base_dir: impl Into<PathBuf>, tracker: DependencyTracker) -> Self {
        Self {
            state: Rc::new(RefCell::new(LoadState {
                base_dir: base_dir.into(),
                loading: Vec::new(),
                cache: HashMap::new(),
                tracker,
                failure: None,
            })),
        }
    }

    /// Mark `path` as loading until the returned guard drops
    pub fn enter(&self, path: &ModulePath) -> Result<LoadingGuard, LoadError> {
        let mut state = self.state.borrow_mut();
        if let Some(start) = state.loading.iter().position(|p| p == path) {
            let chain = state.loading[start..]
                .iter()
                .chain(std::iter::once(path))
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(LoadError::CircularDependency {
                path: path.clone(),
                chain,
            });
        }
        state.loading.push(path.clone());
        Ok(LoadingGuard {
            context: self.clone(),
            path: path.clone(),
        })
    }

    pub fn is_loading(&self, path: &ModulePath) -> bool {
        self.state.borrow().loading.contains(path)
    }

    pub fn record(&self, path: ModulePath) {
        self.state.borrow_mut().tracker.record(path);
    }

    fn cached(&self, path: &ModulePath) -> Option<Shared<Module>> {
        self.state.borrow().cache.get(path).cloned()
    }

    fn cache(&self, path: ModulePath, module: Shared<Module>) {
        self.state.borrow_mut().cache.insert(path, module);
    }

    fn base_dir(&self) -> PathBuf {
        self.state.borrow().base_dir.clone()
    }

    /// Keep the first typed failure; outer frames report it again on unwind
    pub fn note_failure(&self, error: &LoadError) {
        let mut state = self.state.borrow_mut();
        if state.failure.is_none() {
            state.failure = Some(error.clone());
        }
    }

    pub fn take_failure(&self) -> Option<LoadError> {
        self.state.borrow_mut().failure.take()
    }

    /// Turn an engine error raised while running `path` into a typed failure
    ///
    /// A failure already noted by a nested loader wins over the generic
    /// wrapper the engine hands back.
    pub fn classify(&self, path: &ModulePath, error: &EvalAltResult) -> LoadError {
        if let Some(typed) = self.take_failure() {
            return typed;
        }
        match error {
            EvalAltResult::ErrorParsing(..) => LoadError::Compile {
                path: path.clone(),
                message: error.to_string(),
            },
            _ => LoadError::Execution {
                path: path.clone(),
                message: error.to_string(),
            },
        }
    }

    /// Hand the recorded dependencies back once the evaluation is over
    pub fn into_tracker(self) -> DependencyTracker {
        match Rc::try_unwrap(self.state) {
            Ok(cell) => cell.into_inner().tracker,
            Err(shared) => std::mem::take(&mut shared.borrow_mut().tracker),
        }
    }
}

/// Clears a module's loading marker on drop, on success and failure alike
#[derive(Debug)]
pub struct LoadingGuard {
    context: LoadContext,
    path: ModulePath,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let mut state = self.context.state.borrow_mut();
        if let Some(pos) = state.loading.iter().rposition(|p| *p == self.path) {
            state.loading.remove(pos);
        }
    }
}

/// Reads, compiles and instantiates modules on behalf of the engine
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    context: LoadContext,
}

impl ModuleLoader {
    pub fn new(context: LoadContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &LoadContext {
        &self.context
    }

    /// Read and compile one module, tagging the AST with its path
    ///
    /// Fails with a circular dependency if `path` is still being loaded
    /// further up the import chain. The path is recorded as a dependency
    /// only when compilation succeeds.
    pub fn load(&self, engine: &Engine, path: &ModulePath) -> Result<CompiledModule, LoadError> {
        let loading = self.context.enter(path)?;

        let token = probe(path.as_path());
        let source = std::fs::read_to_string(path.as_path()).map_err(|e| LoadError::Io {
            path: path.clone(),
            kind: IoErrorKind::from(e.kind()),
            message: e.to_string(),
        })?;

        let mut ast = engine.compile(&source).map_err(|e| LoadError::Compile {
            path: path.clone(),
            message: e.to_string(),
        })?;
        ast.set_source(path.source_name());

        self.context
            .state
            .borrow_mut()
            .tracker
            .record_with_token(path.clone(), token);
        Ok(CompiledModule {
            path: path.clone(),
            ast,
            _loading: loading,
        })
    }

    /// Resolve, load and run an imported module, reusing this attempt's cache
    pub fn import(
        &self,
        engine: &Engine,
        specifier: &str,
        importing_dir: &Path,
    ) -> Result<Shared<Module>, LoadError> {
        let path = resolve(specifier, importing_dir)?;
        if let Some(module) = self.context.cached(&path) {
            tracing::trace!(path = %path, "module cache hit");
            return Ok(module);
        }

        let module = self
            .load(engine, &path)?
            .instantiate(engine)
            .map_err(|e| self.context.classify(&path, &e))?;

        let module: Shared<Module> = module.into();
        self.context.cache(path, module.clone());
        Ok(module)
    }
}

/// A compiled module whose loading marker is held until it has run
#[derive(Debug)]
pub struct CompiledModule {
    path: ModulePath,
    ast: AST,
    _loading: LoadingGuard,
}

impl CompiledModule {
    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    pub fn ast(&self) -> &AST {
        &self.ast
    }

    /// Run the module body and collect its exports
    ///
    /// Imports made by the body resolve while this module is still marked as
    /// loading; the marker clears when this returns.
    pub fn instantiate(self, engine: &Engine) -> Result<Module, Box<EvalAltResult>> {
        Module::eval_ast_as_new(Scope::new(), &self.ast, engine)
    }
}

impl ModuleResolver for ModuleLoader {
    fn resolve(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        let importing_dir = source
            .and_then(|s| Path::new(s).parent().map(Path::to_path_buf))
            .unwrap_or_else(|| self.context.base_dir());

        self.import(engine, path, &importing_dir).map_err(|error| {
            tracing::debug!(specifier = path, %error, "import failed");
            self.context.note_failure(&error);
            let inner = match &error {
                LoadError::Path { .. } | LoadError::Io { .. } => {
                    EvalAltResult::ErrorModuleNotFound(path.to_string(), pos)
                }
                _ => EvalAltResult::ErrorRuntime(error.to_string().into(), pos),
            };
            Box::new(EvalAltResult::ErrorInModule(
                path.to_string(),
                Box::new(inner),
                pos,
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(path: &str) -> ModulePath {
        ModulePath::from_normalized(path)
    }

    #[test]
    fn test_reentry_is_circular() {
        let ctx = LoadContext::new("/", DependencyTracker::new());
        let a = module("/a.rhai");
        let b = module("/b.rhai");
        let _ga = ctx.enter(&a).unwrap();
        let _gb = ctx.enter(&b).unwrap();
        match ctx.enter(&a) {
            Err(LoadError::CircularDependency { chain, .. }) => {
                assert_eq!(chain, "/a.rhai -> /b.rhai -> /a.rhai");
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_guard_clears_marker() {
        let ctx = LoadContext::new("/", DependencyTracker::new());
        let a = module("/a.rhai");
        {
            let _guard = ctx.enter(&a).unwrap();
            assert!(ctx.is_loading(&a));
        }
        assert!(!ctx.is_loading(&a));
        assert!(ctx.enter(&a).is_ok());
    }

    #[test]
    fn test_first_failure_wins() {
        let ctx = LoadContext::new("/", DependencyTracker::new());
        let inner = LoadError::Compile {
            path: module("/inner.rhai"),
            message: "bad".into(),
        };
        ctx.note_failure(&inner);
        ctx.note_failure(&LoadError::Execution {
            path: module("/outer.rhai"),
            message: "wrapped".into(),
        });
        let runtime = EvalAltResult::ErrorRuntime("x".into(), Position::NONE);
        assert_eq!(ctx.classify(&module("/outer.rhai"), &runtime), inner);
        // Slot is consumed
        assert!(matches!(
            ctx.classify(&module("/outer.rhai"), &runtime),
            LoadError::Execution { .. }
        ));
    }

    #[test]
    fn test_failed_compile_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = ModulePath::new(dir.path().join("bad.rhai")).unwrap();
        std::fs::write(path.as_path(), "let = ;").unwrap();

        let ctx = LoadContext::new(dir.path(), DependencyTracker::new());
        let loader = ModuleLoader::new(ctx.clone());
        let err = loader.load(&Engine::new(), &path).unwrap_err();
        assert!(matches!(err, LoadError::Compile { .. }));
        assert!(ctx.into_tracker().snapshot().is_empty());
    }

    #[test]
    fn test_load_while_loading_is_circular() {
        let dir = tempfile::tempdir().unwrap();
        let path = ModulePath::new(dir.path().join("a.rhai")).unwrap();
        std::fs::write(path.as_path(), "export const x = 1;").unwrap();

        let ctx = LoadContext::new(dir.path(), DependencyTracker::new());
        let loader = ModuleLoader::new(ctx.clone());
        let engine = Engine::new();
        let first = loader.load(&engine, &path).unwrap();
        assert!(matches!(
            loader.load(&engine, &path),
            Err(LoadError::CircularDependency { .. })
        ));
        drop(first);
        assert!(!ctx.is_loading(&path));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = ModulePath::new(dir.path().join("gone.rhai")).unwrap();
        let loader = ModuleLoader::new(LoadContext::new(dir.path(), DependencyTracker::new()));
        assert!(loader.load(&Engine::new(), &path).unwrap_err().is_not_found());
    }
}
