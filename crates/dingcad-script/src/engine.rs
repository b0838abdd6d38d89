//! Script engine construction
//!
//! Every scene evaluation builds a brand new engine so no binding, module or
//! registered global survives from one reload to the next.

use crate::geometry_api::register_geometry_api;
use crate::loader::ModuleLoader;
use dingcad_kernel::MeshSettings;
use rhai::Engine;

/// dingcad script engine with the geometry API registered
pub struct ScriptEngine {
    engine: Engine,
}

impl ScriptEngine {
    /// Create a new script engine with all geometry functions registered
    pub fn new(settings: MeshSettings) -> Self {
        let mut engine = Engine::new();

        register_geometry_api(&mut engine, settings);

        // Configure engine for better errors
        engine.set_max_expr_depths(64, 64);

        // Script output goes to the log rather than stdout
        engine.on_print(|text| tracing::info!(target: "dingcad::script", "{text}"));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(target: "dingcad::script", source = source.unwrap_or("<eval>"), %pos, "{text}");
        });

        Self { engine }
    }

    /// Route `import` statements through `loader`
    pub fn with_loader(mut self, loader: ModuleLoader) -> Self {
        self.engine.set_module_resolver(loader);
        self
    }

    /// Get a reference to the underlying Rhai engine
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    /// Get a mutable reference to the underlying Rhai engine
    pub fn inner_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(MeshSettings::default())
    }
}
