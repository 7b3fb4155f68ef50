//! GOM - a generic object model for Rust.
//!
//! This is the umbrella crate that re-exports the public APIs of the object
//! model and of the enabled interpreter bridges.
//!
//! # Example
//!
//! ```no_run
//! use gom::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = gom::init(GomConfig::default())?;
//!     let lua = ctx.interpreter("lua")?;
//!     lua.execute("root = gom.create{classname = 'Node'}", false, true)?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `lua` (default): the Lua 5.4 bridge, as [`lua`]
//! - `rhai` (default): the Rhai bridge, as [`rhai`]
//!
//! Code generated by `#[derive(Object)]` and `#[slots]` refers to
//! `::gom_core`, so crates declaring reflected classes depend on
//! `gom-core` as well.

pub use gom_core::*;
pub use gom_macros::*;

pub mod prelude;

/// Lua 5.4 interpreter bridge.
#[cfg(feature = "lua")]
pub mod lua {
    pub use gom_lua::*;
}

/// Rhai interpreter bridge.
#[cfg(feature = "rhai")]
pub mod rhai {
    pub use gom_rhai::*;
}

/// Create a context and register the interpreters of the enabled bridges.
///
/// Startup scripts are not run; call [`GomContext::run_startup`] once the
/// application classes are registered.
pub fn init(config: GomConfig) -> Result<GomContext> {
    let ctx = GomContext::new(config);
    #[cfg(feature = "lua")]
    gom_lua::initialize(&ctx).map_err(|err| GomError::Interpreter(err.into()))?;
    #[cfg(feature = "rhai")]
    gom_rhai::initialize(&ctx);
    tracing::debug!(
        target: logging::targets::CORE,
        interpreters = ctx.interpreters().len(),
        "context initialized"
    );
    Ok(ctx)
}

/// Like [`init`], with the configuration read from a TOML file.
pub fn init_from_file(path: impl AsRef<std::path::Path>) -> Result<GomContext> {
    init(GomConfig::load(path)?)
}
