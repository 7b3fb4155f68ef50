//! The application-lifetime context.
//!
//! A [`GomContext`] replaces process-wide singletons: it owns the registry,
//! the configuration and the interpreters. Modules are initialized by
//! explicit calls in dependency order:
//!
//! ```ignore
//! let ctx = GomContext::new(GomConfig::load("gom.toml")?);
//! gom_lua::initialize(&ctx)?;
//! gom_rhai::initialize(&ctx)?;
//! Point::register_meta_class(ctx.meta());
//! ctx.run_startup()?;
//! ```

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::arg_list::ArgList;
use crate::config::GomConfig;
use crate::error::{GomError, Result};
use crate::fpe::enable_fpe;
use crate::interpreter::Interpreter;
use crate::logging::targets;
use crate::object::ObjectRef;
use crate::registry::Meta;

/// Registry, configuration and interpreters of an application.
pub struct GomContext {
    meta: Arc<Meta>,
    config: GomConfig,
    interpreters: RwLock<Vec<Arc<dyn Interpreter>>>,
}

impl GomContext {
    /// A context with a fresh registry.
    ///
    /// Applies the configured floating-point trap policy to the calling
    /// thread.
    pub fn new(config: GomConfig) -> Self {
        Self::with_meta(Arc::new(Meta::new()), config)
    }

    pub fn with_meta(meta: Arc<Meta>, config: GomConfig) -> Self {
        enable_fpe(config.trap_fpe);
        tracing::debug!(target: targets::META, types = meta.nb_types(), "context created");
        Self {
            meta,
            config,
            interpreters: RwLock::new(Vec::new()),
        }
    }

    /// A context configured from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(GomConfig::load(path)?))
    }

    pub fn meta(&self) -> &Arc<Meta> {
        &self.meta
    }

    pub fn config(&self) -> &GomConfig {
        &self.config
    }

    /// Add an interpreter, replacing any previous one of the same language.
    pub fn register_interpreter(&self, interpreter: Arc<dyn Interpreter>) {
        let mut interpreters = self.interpreters.write();
        interpreters.retain(|i| !i.language().eq_ignore_ascii_case(interpreter.language()));
        tracing::debug!(
            target: targets::INTERPRETER,
            language = %interpreter.language(),
            extension = %interpreter.filename_extension(),
            "interpreter registered"
        );
        interpreters.push(interpreter);
    }

    /// The interpreter of `language` (case-insensitive).
    pub fn interpreter(&self, language: &str) -> Result<Arc<dyn Interpreter>> {
        self.interpreters
            .read()
            .iter()
            .find(|i| i.language().eq_ignore_ascii_case(language))
            .cloned()
            .ok_or_else(|| GomError::UnknownInterpreter(language.to_string()))
    }

    /// The interpreter registered for the extension of `path`.
    pub fn interpreter_for_file(&self, path: &Path) -> Result<Arc<dyn Interpreter>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| GomError::UnknownInterpreter(path.display().to_string()))?;
        self.interpreters
            .read()
            .iter()
            .find(|i| i.filename_extension().eq_ignore_ascii_case(extension))
            .cloned()
            .ok_or_else(|| GomError::UnknownInterpreter(format!(".{extension}")))
    }

    /// The first registered interpreter.
    pub fn default_interpreter(&self) -> Option<Arc<dyn Interpreter>> {
        self.interpreters.read().first().cloned()
    }

    pub fn interpreters(&self) -> Vec<Arc<dyn Interpreter>> {
        self.interpreters.read().clone()
    }

    /// Run the configured startup scripts in order, stopping at the first
    /// failure.
    pub fn run_startup(&self) -> Result<()> {
        for script in &self.config.startup_scripts {
            let interpreter = self.interpreter_for_file(script)?;
            tracing::info!(target: targets::INTERPRETER, script = %script.display(), "startup script");
            interpreter.execute_file(script)?;
        }
        Ok(())
    }

    pub fn create(&self, classname: &str, args: &ArgList) -> Result<ObjectRef> {
        self.meta.create(classname, args)
    }
}

impl std::fmt::Debug for GomContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let languages: Vec<String> = self
            .interpreters
            .read()
            .iter()
            .map(|i| i.language().to_string())
            .collect();
        f.debug_struct("GomContext")
            .field("meta", &self.meta)
            .field("interpreters", &languages)
            .finish()
    }
}
