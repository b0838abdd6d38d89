//! Scene evaluation: one full compile, resolve and execute cycle

use crate::engine::ScriptEngine;
use crate::error::LoadError;
use crate::loader::{LoadContext, ModuleLoader};
use crate::resolver::ModulePath;
use crate::tracker::DependencyTracker;
use dingcad_kernel::{GeometryHandle, MeshSettings};
use rhai::{Dynamic, EvalAltResult, Module};
use std::path::Path;

/// What to read out of the entry module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOptions {
    /// Exported variable holding the scene
    pub export_name: String,
    /// Zero-argument function called when the export is absent; `None`
    /// turns the fallback off
    pub fallback_fn: Option<String>,
    /// Meshing used by script-side queries such as `num_tri()`
    pub mesh: MeshSettings,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            export_name: "scene".to_string(),
            fallback_fn: Some("scene".to_string()),
            mesh: MeshSettings::default(),
        }
    }
}

/// Turns an entry script into a solid
#[derive(Debug, Clone, Default)]
pub struct SceneEvaluator {
    options: EvalOptions,
}

impl SceneEvaluator {
    pub fn new(options: EvalOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    /// Evaluate `entry` in a fresh scripting context
    ///
    /// Every module touched along the way is recorded into `tracker`
    /// whatever the outcome; the entry script is always recorded so a broken
    /// first load can still be watched. Callers decide whether to keep the
    /// recorded set.
    pub fn evaluate(
        &self,
        entry: &Path,
        tracker: &mut DependencyTracker,
    ) -> Result<GeometryHandle, LoadError> {
        let entry = entry_module(entry)?;
        tracker.record(entry.clone());

        let context = LoadContext::new(entry.dir(), std::mem::take(tracker));
        let result = self.run(&context, &entry);
        *tracker = context.into_tracker();

        match &result {
            Ok(_) => tracing::debug!(entry = %entry, "scene evaluated"),
            Err(error) => tracing::debug!(entry = %entry, %error, "scene evaluation failed"),
        }
        result
    }

    fn run(&self, context: &LoadContext, entry: &ModulePath) -> Result<GeometryHandle, LoadError> {
        let loader = ModuleLoader::new(context.clone());
        let mut script = ScriptEngine::new(self.options.mesh).with_loader(loader.clone());

        let module = loader
            .load(script.inner(), entry)?
            .instantiate(script.inner())
            .map_err(|e| context.classify(entry, &e))?;

        let value = match module.get_var(&self.options.export_name) {
            Some(value) => value,
            None => self.call_fallback(&mut script, module, context, entry)?,
        };

        let found = script.inner().map_type_name(value.type_name()).to_string();
        value
            .try_cast::<GeometryHandle>()
            .ok_or_else(|| LoadError::Type {
                path: entry.clone(),
                name: self.options.export_name.clone(),
                found,
            })
    }

    /// Call the exported zero-argument fallback function once
    fn call_fallback(
        &self,
        script: &mut ScriptEngine,
        module: Module,
        context: &LoadContext,
        entry: &ModulePath,
    ) -> Result<Dynamic, LoadError> {
        let missing = || LoadError::MissingExport {
            path: entry.clone(),
            name: self.options.export_name.clone(),
        };
        let Some(name) = self
            .options
            .fallback_fn
            .as_deref()
            .filter(|name| is_identifier(name))
        else {
            return Err(missing());
        };

        script.inner_mut().register_global_module(module.into());
        match script.inner().eval::<Dynamic>(&format!("{name}()")) {
            Ok(value) => Ok(value),
            Err(e) if matches!(*e, EvalAltResult::ErrorFunctionNotFound(..)) => Err(missing()),
            Err(e) => Err(context.classify(entry, &e)),
        }
    }
}

fn entry_module(entry: &Path) -> Result<ModulePath, LoadError> {
    let absolute = std::path::absolute(entry).map_err(|e| LoadError::Path {
        specifier: entry.display().to_string(),
        base: std::path::PathBuf::new(),
        reason: e.to_string(),
    })?;
    ModulePath::new(absolute)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
