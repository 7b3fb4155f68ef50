//! Lua 5.4 bridge for the GOM reflection runtime.
//!
//! Reflected objects are visible from Lua as userdata; properties read and
//! write like fields, methods are called with the colon syntax or with a
//! single table of named arguments:
//!
//! ```lua
//! local p = gom.create{classname = "Point", x = 1}
//! p.y = 2
//! p:translate(1, 1)
//! p.translate{dx = 1, dy = 0}
//! gom.connect(p.moved, function(args) print("moved to", args.value) end)
//! ```
//!
//! Lua functions passed where a callable is expected become
//! [`LuaCallable`] objects.
//!
//! # Setup
//!
//! ```ignore
//! let ctx = GomContext::new(GomConfig::default());
//! let lua = gom_lua::initialize(&ctx)?;
//! lua.execute("print(gom.language)", false, true)?;
//! ```

mod bridge;
mod callable;
mod error;
mod interpreter;
mod userdata;

use std::sync::Arc;

use gom_core::logging::targets;
use gom_core::GomContext;

pub use bridge::LuaBridge;
pub use callable::LuaCallable;
pub use error::LuaBridgeError;
pub use interpreter::{LuaInterpreter, GOM_GLOBAL};
pub use userdata::LuaObject;

/// Register the Lua classes and interpreter with `ctx`.
pub fn initialize(ctx: &GomContext) -> Result<Arc<LuaInterpreter>, LuaBridgeError> {
    callable::meta_class(ctx.meta());
    let interpreter = LuaInterpreter::new(ctx.meta(), ctx.config())?;
    ctx.register_interpreter(interpreter.clone());
    tracing::info!(target: targets::LUA, "Lua bridge initialized");
    Ok(interpreter)
}
