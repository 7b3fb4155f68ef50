//! Prelude module for GOM.
//!
//! This module re-exports the most commonly used types for convenient importing:
//!
//! ```ignore
//! use gom::prelude::*;
//! ```
//!
//! This provides access to:
//! - Values and calls (`Any`, `ArgList`, `InvokeError`)
//! - The object model (`Object`, `ObjectBase`, `Property`, `Node`)
//! - The registry (`Meta`, `MetaClass`)
//! - Interpreters and the application context (`Interpreter`, `GomContext`)
//! - The derive and attribute macros (`Object`, `slots`)

// ============================================================================
// Values
// ============================================================================

pub use crate::{Any, ArgList, FromAny, InvokeError, InvokeResult};

// ============================================================================
// Object System
// ============================================================================

pub use crate::{
    add_child, new_object, object_cast, remove_child, Callable, Node, NodeLinks, Object,
    ObjectBase, ObjectHandle, ObjectRef, Property,
};

// ============================================================================
// Meta Model
// ============================================================================

pub use crate::{Meta, MetaClass, MetaEnum, MetaMethod, MetaProperty};

// ============================================================================
// Interpreters and Context
// ============================================================================

pub use crate::{FpeGuard, GomConfig, GomContext, GomError, Interpreter, InterpreterError};

// ============================================================================
// Macros (the `Object` derive comes with the trait above)
// ============================================================================

pub use crate::slots;
