//! Core of the GOM reflection runtime.
//!
//! This crate provides the object model every reflected class builds on:
//!
//! - **Values**: [`Any`], the dynamically typed value container, and
//!   [`ArgList`], the named argument list of a reflective call
//! - **Meta model**: builtin types, enums, structs and classes described at
//!   runtime, kept in an explicit [`Meta`] registry
//! - **Dispatch**: calling slots, signals, constructors and property
//!   accessors by name through their [`MethodAdapter`]
//! - **Objects**: shared ownership, signal connections, node trees,
//!   callables and classes declared at runtime
//! - **Interpreters**: the contract embedded languages implement, and the
//!   shared [`Bridge`] helpers
//!
//! # Example
//!
//! ```
//! use gom_core::{Any, ArgList, Meta};
//!
//! let meta = Meta::new();
//! let root = meta.create("Node", &ArgList::new()).unwrap();
//! let child = meta
//!     .create("Node", &ArgList::new().with("parent", root.clone()))
//!     .unwrap();
//!
//! assert_eq!(root.get_property("nb_children"), Ok(Any::UInt(1)));
//! assert!(child.is_a("Node"));
//! ```
//!
//! # Reflected classes
//!
//! Native classes are usually declared with the `gom-macros` crate:
//!
//! ```ignore
//! #[derive(Object)]
//! #[object(super_class = "Node")]
//! struct Point {
//!     base: ObjectBase,
//!     #[node]
//!     links: NodeLinks,
//!     #[property(notify = "moved")]
//!     x: Property<f64>,
//! }
//!
//! #[slots]
//! impl Point {
//!     #[constructor]
//!     fn new(base: ObjectBase, #[default(0.0)] x: f64) -> Self { ... }
//!
//!     #[signal]
//!     fn moved(&self, value: f64) {}
//! }
//!
//! Point::register_meta_class(&meta);
//! ```

pub mod any;
pub mod arg_list;
pub mod bridge;
pub mod callable;
mod config;
pub mod connection;
mod context;
pub mod custom_attributes;
pub mod dynamic;
mod error;
pub mod fpe;
pub mod interpreter;
pub mod logging;
pub mod meta_class;
pub mod meta_enum;
pub mod meta_member;
pub mod meta_type;
pub mod node;
pub mod object;
pub mod property;
pub mod registry;

pub use any::{Any, FromAny};
pub use arg_list::{unnamed_arg_name, ArgList};
pub use bridge::{Bridge, ExpectedType};
pub use callable::{Callable, FunctionCallable, Request};
pub use config::GomConfig;
pub use connection::{Connection, ConnectionId, ConnectionTarget};
pub use context::GomContext;
pub use custom_attributes::CustomAttributes;
pub use dynamic::{DynamicClassBuilder, DynamicObject};
pub use error::{ConfigError, GomError, InterpreterError, InvokeError, InvokeResult, Result};
pub use fpe::{enable_fpe, fpe_enabled, FpeGuard};
pub use interpreter::{Interpreter, InterpreterCore};
pub use logging::{ClassTreeDebug, NodeTreeDebug, TreeFormatOptions, TreeStyle};
pub use meta_class::{MetaClass, MetaClassBuilder};
pub use meta_enum::MetaEnum;
pub use meta_member::{
    factory_failed, Factory, MemberKind, MetaArg, MetaMember, MetaMethod, MetaProperty,
    MethodAdapter,
};
pub use meta_type::{pointer_type_name, MetaBuiltinType, MetaStruct, MetaType, MetaTypeKind};
pub use node::{add_child, remove_child, Node, NodeLinks};
pub use object::{
    new_object, object_cast, same_object, Object, ObjectBase, ObjectHandle, ObjectRef,
    WeakObjectRef,
};
pub use property::Property;
pub use registry::Meta;
