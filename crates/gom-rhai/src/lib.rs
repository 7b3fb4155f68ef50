//! Rhai bridge for the GOM reflection runtime.
//!
//! Reflected objects are a Rhai custom type. Properties read and write like
//! fields, methods take positional arguments or a single object map:
//!
//! ```text
//! let p = gom.create(#{ classname: "Point", x: 1.0 });
//! p.y = 2.0;
//! p.translate(1.0, 1.0);
//! p.translate(#{ dx: 1.0, dy: 0.0 });
//! gom.connect(p.moved, |args| print(`moved to ${args.value}`));
//! ```
//!
//! Function pointers and closures passed where a callable is expected become
//! [`RhaiCallable`] objects. A callable object is invoked with
//! `obj.call(...)`.
//!
//! # Setup
//!
//! ```ignore
//! let ctx = GomContext::new(GomConfig::default());
//! let rhai = gom_rhai::initialize(&ctx);
//! rhai.execute("print(gom.language);", false, true)?;
//! ```

mod bridge;
mod callable;
mod error;
mod interpreter;
mod object;

use std::sync::Arc;

use gom_core::logging::targets;
use gom_core::GomContext;

pub use bridge::RhaiBridge;
pub use callable::RhaiCallable;
pub use error::RhaiBridgeError;
pub use interpreter::{RhaiInterpreter, RhaiRuntime, GOM_VARIABLE};
pub use object::{RhaiObject, MAX_ARGS};

/// Register the Rhai classes and interpreter with `ctx`.
pub fn initialize(ctx: &GomContext) -> Arc<RhaiInterpreter> {
    callable::meta_class(ctx.meta());
    let interpreter = RhaiInterpreter::new(ctx.meta(), ctx.config());
    ctx.register_interpreter(interpreter.clone());
    tracing::info!(target: targets::RHAI, "Rhai bridge initialized");
    interpreter
}
