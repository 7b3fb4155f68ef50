//! Error types for the Rhai bridge.

use gom_core::logging::targets;
use gom_core::{InterpreterError, InvokeError};
use rhai::EvalAltResult;

/// Errors raised while crossing the Rhai boundary.
#[derive(Debug, thiserror::Error)]
pub enum RhaiBridgeError {
    #[error("{}", parse_message(.0))]
    Parse(#[from] rhai::ParseError),

    /// Error raised while evaluating a script.
    #[error("{}", script_message(.0))]
    Script(#[from] Box<EvalAltResult>),

    /// A reflective call made on behalf of a script failed.
    #[error("{0}")]
    Invoke(#[from] InvokeError),

    /// A Rhai value has no native counterpart.
    #[error("cannot convert a Rhai {type_name} to {expected}")]
    Conversion {
        type_name: String,
        expected: String,
    },

    /// The operation needs the interpreter idle and a command is running.
    #[error("interpreter is busy")]
    Busy,
}

impl From<RhaiBridgeError> for InterpreterError {
    fn from(err: RhaiBridgeError) -> Self {
        match err {
            RhaiBridgeError::Invoke(err) => InterpreterError::Invoke(err),
            RhaiBridgeError::Busy => InterpreterError::Busy,
            other => InterpreterError::Script(other.to_string()),
        }
    }
}

impl From<RhaiBridgeError> for InvokeError {
    fn from(err: RhaiBridgeError) -> Self {
        match err {
            RhaiBridgeError::Invoke(err) => err,
            other => InvokeError::Failed(other.to_string()),
        }
    }
}

/// The message of an evaluation error, without position or call wrapping.
///
/// Errors raised inside script functions reach the caller wrapped once per
/// call frame; the innermost error is kept and positions go to the log.
pub(crate) fn script_message(err: &EvalAltResult) -> String {
    match err {
        EvalAltResult::ErrorInFunctionCall(name, _, inner, position) => {
            tracing::debug!(target: targets::RHAI, "in call to {name} at {position}");
            script_message(inner)
        }
        EvalAltResult::ErrorRuntime(value, position) => {
            tracing::debug!(target: targets::RHAI, "runtime error at {position}");
            value.to_string()
        }
        other => {
            let message = other.to_string();
            let position = other.position();
            if position.is_none() {
                return message;
            }
            tracing::debug!(target: targets::RHAI, "error at {position}");
            match message.strip_suffix(&format!(" ({position})")) {
                Some(stripped) => stripped.to_string(),
                None => message,
            }
        }
    }
}

fn parse_message(err: &rhai::ParseError) -> String {
    err.0.to_string()
}

/// A native failure raised into Rhai.
pub(crate) fn to_rhai_error(err: impl Into<RhaiBridgeError>) -> Box<EvalAltResult> {
    match err.into() {
        RhaiBridgeError::Script(err) => err,
        other => other.to_string().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_message() {
        let engine = rhai::Engine::new();
        let err = engine.run("throw \"boom\";").unwrap_err();
        assert_eq!(script_message(&err), "boom");
    }

    #[test]
    fn test_native_error_reaches_rhai() {
        let err = to_rhai_error(InvokeError::Failed("division by zero".to_string()));
        assert_eq!(script_message(&err), "division by zero");
    }

    #[test]
    fn test_busy_maps_to_interpreter_busy() {
        assert!(matches!(
            InterpreterError::from(RhaiBridgeError::Busy),
            InterpreterError::Busy
        ));
    }

    #[test]
    fn test_conversion_message() {
        let err = RhaiBridgeError::Conversion {
            type_name: "map".to_string(),
            expected: "f64".to_string(),
        };
        assert_eq!(err.to_string(), "cannot convert a Rhai map to f64");
    }
}
