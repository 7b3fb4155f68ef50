//! Error types for the GOM runtime.
//!
//! Recoverable failures (unknown names, invocation failures, script errors)
//! are returned as values. Broken invariants of the meta model (duplicate
//! registrations, removing a node that is not a child, querying an enum for a
//! missing entry) are programming errors and panic instead.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failure of a reflective call: method, property access or construction.
///
/// This is the "returned false" side of the dispatcher contract. Whatever
/// produced it has already logged a diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeError {
    /// The class has no invocable member with that name.
    NoSuchMethod { class: String, method: String },
    /// The class has no property with that name.
    NoSuchProperty { class: String, property: String },
    /// Attempt to write a read-only property.
    ReadOnlyProperty { class: String, property: String },
    /// A formal argument without default value was not supplied.
    MissingArgument { method: String, arg: String },
    /// More positional arguments than formal arguments.
    TooManyArguments {
        method: String,
        expected: usize,
        found: usize,
    },
    /// A supplied argument could not be converted to the formal type.
    ArgumentType {
        method: String,
        arg: String,
        expected: String,
        found: String,
    },
    /// The target object is not an instance of the adapter's class.
    TargetType { expected: String, found: String },
    /// The method has no adapter bound to it.
    NoAdapter { method: String },
    /// Abstract classes cannot be instantiated.
    AbstractClass { class: String },
    /// No constructor of the class accepts the supplied arguments.
    NoMatchingConstructor { class: String },
    /// The factory declined to create an instance.
    ConstructionFailed { class: String },
    /// The object does not implement an optional protocol.
    NotImplemented { class: String, operation: &'static str },
    /// Re-parenting would make a node its own ancestor.
    CircularParentage,
    /// The target of an unmanaged handle has already been destroyed.
    Detached,
    /// Free-form failure reported by a callable (typically a script error).
    Failed(String),
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchMethod { class, method } => {
                write!(f, "{class}::{method} : no such method")
            }
            Self::NoSuchProperty { class, property } => {
                write!(f, "{class}::{property} : no such property")
            }
            Self::ReadOnlyProperty { class, property } => {
                write!(f, "{class}::{property} : property is read-only")
            }
            Self::MissingArgument { method, arg } => {
                write!(f, "{method} : missing argument '{arg}'")
            }
            Self::TooManyArguments {
                method,
                expected,
                found,
            } => write!(f, "{method} : expects {expected} arguments, got {found}"),
            Self::ArgumentType {
                method,
                arg,
                expected,
                found,
            } => write!(
                f,
                "{method} : argument '{arg}' expects {expected}, got {found}"
            ),
            Self::TargetType { expected, found } => {
                write!(f, "target is a {found}, expected a {expected}")
            }
            Self::NoAdapter { method } => write!(f, "{method} : no method adapter"),
            Self::AbstractClass { class } => {
                write!(f, "{class} : cannot create an instance of an abstract class")
            }
            Self::NoMatchingConstructor { class } => {
                write!(f, "{class} : no constructor matches the arguments")
            }
            Self::ConstructionFailed { class } => write!(f, "{class} : construction failed"),
            Self::NotImplemented { class, operation } => {
                write!(f, "{class} : {operation} is not implemented")
            }
            Self::CircularParentage => write!(f, "a node cannot be its own ancestor"),
            Self::Detached => write!(f, "the object has been destroyed"),
            Self::Failed(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for InvokeError {}

/// Errors reported by an embedded interpreter.
#[derive(Debug)]
pub enum InterpreterError {
    /// Syntax or runtime error raised inside the embedded runtime.
    Script(String),
    /// A script file could not be read.
    Io { path: PathBuf, source: io::Error },
    /// The interpreter is already executing a command on this thread.
    Busy,
    /// A reflective call made on behalf of the script failed.
    Invoke(InvokeError),
}

impl InterpreterError {
    /// Message suitable for an interactive console.
    ///
    /// Runtimes prefix their messages with a chunk name and position
    /// (`[string "..."]:1: message`); the prefix up to the closing bracket and
    /// the position are stripped.
    pub fn display_message(&self) -> String {
        match self {
            Self::Script(msg) => strip_location(msg).to_string(),
            other => other.to_string(),
        }
    }
}

fn strip_location(msg: &str) -> &str {
    let Some(bracket) = msg.find(']') else {
        return msg;
    };
    let rest = &msg[bracket + 1..];
    // ":<line>: "
    match rest.strip_prefix(':') {
        Some(after) => match after.find(':') {
            Some(colon) if after[..colon].chars().all(|c| c.is_ascii_digit()) => {
                after[colon + 1..].trim_start()
            }
            _ => after.trim_start(),
        },
        None => rest.trim_start(),
    }
}

impl fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script(msg) => write!(f, "script error: {msg}"),
            Self::Io { path, source } => {
                write!(f, "could not read {}: {source}", path.display())
            }
            Self::Busy => write!(f, "interpreter is busy"),
            Self::Invoke(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for InterpreterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Invoke(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvokeError> for InterpreterError {
    fn from(err: InvokeError) -> Self {
        Self::Invoke(err)
    }
}

/// Errors loading a [`GomConfig`](crate::GomConfig).
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io { path: PathBuf, source: io::Error },
    /// The configuration is not valid TOML for the expected schema.
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "could not read configuration {}: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err)
    }
}

/// The main error type for GOM operations.
#[derive(Debug)]
pub enum GomError {
    /// A name did not resolve to a registered type.
    UnknownType(String),
    /// A type of the same name is already registered.
    DuplicateType(String),
    /// No interpreter is registered for a language or file extension.
    UnknownInterpreter(String),
    /// Reflective call failure.
    Invoke(InvokeError),
    /// Embedded interpreter failure.
    Interpreter(InterpreterError),
    /// Configuration failure.
    Config(ConfigError),
}

impl fmt::Display for GomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(name) => write!(f, "unknown type: {name}"),
            Self::DuplicateType(name) => write!(f, "type already registered: {name}"),
            Self::UnknownInterpreter(name) => write!(f, "no interpreter for: {name}"),
            Self::Invoke(err) => write!(f, "Invocation error: {err}"),
            Self::Interpreter(err) => write!(f, "Interpreter error: {err}"),
            Self::Config(err) => write!(f, "Configuration error: {err}"),
        }
    }
}

impl std::error::Error for GomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invoke(err) => Some(err),
            Self::Interpreter(err) => Some(err),
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvokeError> for GomError {
    fn from(err: InvokeError) -> Self {
        Self::Invoke(err)
    }
}

impl From<InterpreterError> for GomError {
    fn from(err: InterpreterError) -> Self {
        Self::Interpreter(err)
    }
}

impl From<ConfigError> for GomError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// A specialized Result type for GOM operations.
pub type Result<T> = std::result::Result<T, GomError>;

/// Result of a reflective call.
pub type InvokeResult<T> = std::result::Result<T, InvokeError>;
