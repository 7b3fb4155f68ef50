//! Error types for the Lua bridge.

use gom_core::logging::targets;
use gom_core::{InterpreterError, InvokeError};

/// Errors raised while crossing the Lua boundary.
#[derive(Debug, thiserror::Error)]
pub enum LuaBridgeError {
    /// Error raised by the Lua runtime (syntax, runtime or memory error).
    #[error("{}", script_message(.0))]
    Lua(#[from] mlua::Error),

    /// A reflective call made on behalf of a script failed.
    #[error("{0}")]
    Invoke(#[from] InvokeError),

    /// A Lua value has no native counterpart.
    #[error("cannot convert a Lua {type_name} to {expected}")]
    Conversion {
        type_name: &'static str,
        expected: String,
    },
}

impl From<LuaBridgeError> for InterpreterError {
    fn from(err: LuaBridgeError) -> Self {
        match err {
            LuaBridgeError::Invoke(err) => InterpreterError::Invoke(err),
            other => InterpreterError::Script(other.to_string()),
        }
    }
}

impl From<LuaBridgeError> for InvokeError {
    fn from(err: LuaBridgeError) -> Self {
        match err {
            LuaBridgeError::Invoke(err) => err,
            other => InvokeError::Failed(other.to_string()),
        }
    }
}

/// The message of a Lua error, without the callback wrapping.
///
/// Errors raised in a native callback reach scripts wrapped with the Lua
/// traceback; the traceback is logged, the innermost message is kept.
pub(crate) fn script_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { traceback, cause } => {
            tracing::debug!(target: targets::LUA, "{traceback}");
            script_message(cause)
        }
        mlua::Error::RuntimeError(msg) => match msg.split_once("\nstack traceback:") {
            Some((message, traceback)) => {
                tracing::debug!(target: targets::LUA, "stack traceback:{traceback}");
                message.to_string()
            }
            None => msg.clone(),
        },
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::ExternalError(err) => err.to_string(),
        other => other.to_string(),
    }
}

/// A native failure raised into Lua.
pub(crate) fn to_lua_error(err: impl Into<LuaBridgeError>) -> mlua::Error {
    match err.into() {
        LuaBridgeError::Lua(err) => err,
        other => mlua::Error::RuntimeError(other.to_string()),
    }
}
