//! The meta-type registry.
//!
//! [`Meta`] maps type names (and, as an alternate key, Rust [`TypeId`]s) to
//! their descriptors. It is an explicit value rather than a process global:
//! create one with [`Meta::new`], share it as `Arc<Meta>`, and register the
//! classes of each module in dependency order.
//!
//! # Bootstrap
//!
//! `Meta::new` registers the builtin types and the runtime classes every
//! other module builds on: `Object`, `Node`, `Callable`, `Request`,
//! `FunctionCallable`, `DynamicObject` and `Interpreter`.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::any::Any;
use crate::arg_list::ArgList;
use crate::callable::{build_callable_class, build_function_callable_class, build_request_class};
use crate::dynamic::build_dynamic_object_class;
use crate::error::{GomError, InvokeError, Result};
use crate::interpreter::build_interpreter_class;
use crate::logging::targets;
use crate::meta_class::MetaClass;
use crate::meta_enum::MetaEnum;
use crate::meta_type::{MetaBuiltinType, MetaStruct, MetaType, POINTER_SUFFIX};
use crate::node::build_node_class;
use crate::object::{build_object_class, ObjectRef};

/// The runtime classes registered by [`Meta::new`].
struct CoreClasses {
    object: Arc<MetaClass>,
    node: Arc<MetaClass>,
    callable: Arc<MetaClass>,
    request: Arc<MetaClass>,
    function_callable: Arc<MetaClass>,
    dynamic_object: Arc<MetaClass>,
    interpreter: Arc<MetaClass>,
}

/// Registry of every type known to the runtime.
pub struct Meta {
    types: RwLock<HashMap<String, MetaType>>,
    order: RwLock<Vec<String>>,
    aliases: RwLock<HashMap<String, String>>,
    type_ids: RwLock<HashMap<TypeId, String>>,
    core: CoreClasses,
}

static_assertions::assert_impl_all!(Meta: Send, Sync);

impl Meta {
    /// A registry holding the builtin types and the runtime classes.
    pub fn new() -> Self {
        let object = build_object_class();
        let node = build_node_class(&object);
        let callable = build_callable_class(&object);
        let request = build_request_class(&callable);
        let function_callable = build_function_callable_class(&callable);
        let dynamic_object = build_dynamic_object_class(&object);
        let interpreter = build_interpreter_class(&object);

        let meta = Self {
            types: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            aliases: RwLock::new(HashMap::new()),
            type_ids: RwLock::new(HashMap::new()),
            core: CoreClasses {
                object,
                node,
                callable,
                request,
                function_callable,
                dynamic_object,
                interpreter,
            },
        };
        meta.register_builtins();
        for class in [
            &meta.core.object,
            &meta.core.node,
            &meta.core.callable,
            &meta.core.request,
            &meta.core.function_callable,
            &meta.core.dynamic_object,
            &meta.core.interpreter,
        ] {
            meta.register_class(class);
        }
        tracing::debug!(target: targets::META, types = meta.nb_types(), "registry bootstrapped");
        meta
    }

    fn register_builtins(&self) {
        self.register_builtin(MetaBuiltinType::of::<()>("()"));
        self.register_builtin(MetaBuiltinType::of::<bool>("bool"));
        self.register_builtin(MetaBuiltinType::of::<i32>("i32"));
        self.register_builtin(MetaBuiltinType::of::<i64>("i64"));
        self.register_builtin(MetaBuiltinType::of::<u32>("u32"));
        self.register_builtin(MetaBuiltinType::of::<u64>("u64"));
        self.register_builtin(MetaBuiltinType::of::<usize>("usize"));
        self.register_builtin(MetaBuiltinType::of::<f32>("f32"));
        self.register_builtin(MetaBuiltinType::of::<f64>("f64"));
        self.register_builtin(MetaBuiltinType::of::<String>("String"));
        self.register_builtin(MetaBuiltinType::of::<[f64; 2]>("[f64;2]"));
        self.register_builtin(MetaBuiltinType::of::<[f64; 3]>("[f64;3]"));
        self.register_builtin(MetaBuiltinType::of::<[f64; 4]>("[f64;4]"));
        self.register_builtin(MetaBuiltinType::of::<[[f64; 2]; 2]>("[[f64;2];2]"));
        self.register_builtin(MetaBuiltinType::of::<[[f64; 3]; 3]>("[[f64;3];3]"));
        self.register_builtin(MetaBuiltinType::of::<[[f64; 4]; 4]>("[[f64;4];4]"));
        self.register_builtin(MetaBuiltinType::of::<Vec<f64>>("Vec<f64>"));
        self.register_builtin(MetaBuiltinType::of::<Any>("Any"));
        self.register_builtin(MetaBuiltinType::of::<ArgList>("ArgList"));
    }

    /// Register a type.
    ///
    /// # Panics
    ///
    /// Panics if a type of the same name (or bound to the same Rust type) is
    /// already registered.
    pub fn register_type(&self, meta_type: MetaType) {
        let name = meta_type.name().to_string();
        {
            let mut types = self.types.write();
            assert!(
                !types.contains_key(&name),
                "type {name} is already registered"
            );
            types.insert(name.clone(), meta_type.clone());
        }
        if let Some(type_id) = meta_type.type_id() {
            let previous = self.type_ids.write().insert(type_id, name.clone());
            assert!(
                previous.is_none(),
                "type {name} is bound to a Rust type already registered"
            );
        }
        tracing::debug!(target: targets::META, kind = ?meta_type.kind(), %name, "type registered");
        self.order.write().push(name);
    }

    pub fn register_builtin(&self, builtin: MetaBuiltinType) -> Arc<MetaBuiltinType> {
        let builtin = Arc::new(builtin);
        self.register_type(MetaType::Builtin(builtin.clone()));
        builtin
    }

    /// Register a class and its pointer type `Class*`.
    ///
    /// # Panics
    ///
    /// Panics if the name is taken, or if the super class is not registered.
    pub fn register_class(&self, class: &Arc<MetaClass>) {
        if let Some(base) = class.super_class() {
            assert!(
                self.resolve_class(base.name())
                    .is_some_and(|registered| Arc::ptr_eq(&registered, base)),
                "{}: super class {} is not registered",
                class.name(),
                base.name()
            );
        }
        self.register_type(MetaType::Class(class.clone()));
        self.register_type(MetaType::Builtin(Arc::new(MetaBuiltinType::pointer_to(
            MetaType::Class(class.clone()),
        ))));
    }

    /// Register an enumeration.
    ///
    /// # Panics
    ///
    /// Panics if the name is taken.
    pub fn register_enum(&self, meta_enum: &Arc<MetaEnum>) {
        self.register_type(MetaType::Enum(meta_enum.clone()));
    }

    /// Register a struct.
    ///
    /// # Panics
    ///
    /// Panics if the name is taken.
    pub fn register_struct(&self, meta_struct: &Arc<MetaStruct>) {
        self.register_type(MetaType::Struct(meta_struct.clone()));
    }

    /// Make `alias` resolve to the registered type `name`.
    pub fn bind_alias(&self, alias: impl Into<String>, name: &str) -> Result<()> {
        if self.resolve(name).is_none() {
            return Err(GomError::UnknownType(name.to_string()));
        }
        let alias = alias.into();
        tracing::debug!(target: targets::META, %alias, %name, "alias bound");
        self.aliases.write().insert(alias, name.to_string());
        Ok(())
    }

    pub fn nb_types(&self) -> usize {
        self.order.read().len()
    }

    /// Look a type up by name or alias.
    pub fn resolve(&self, name: &str) -> Option<MetaType> {
        if let Some(found) = self.types.read().get(name) {
            return Some(found.clone());
        }
        let target = self.aliases.read().get(name).cloned()?;
        self.types.read().get(&target).cloned()
    }

    pub fn resolve_class(&self, name: &str) -> Option<Arc<MetaClass>> {
        self.resolve(name).and_then(|t| t.as_class().cloned())
    }

    pub fn resolve_enum(&self, name: &str) -> Option<Arc<MetaEnum>> {
        self.resolve(name).and_then(|t| t.as_enum().cloned())
    }

    pub fn resolve_struct(&self, name: &str) -> Option<Arc<MetaStruct>> {
        self.resolve(name).and_then(|t| t.as_struct().cloned())
    }

    pub fn resolve_builtin(&self, name: &str) -> Option<Arc<MetaBuiltinType>> {
        self.resolve(name).and_then(|t| t.as_builtin().cloned())
    }

    /// Look a type up by the Rust type it was registered for.
    pub fn resolve_by_type_id(&self, type_id: TypeId) -> Option<MetaType> {
        let name = self.type_ids.read().get(&type_id).cloned()?;
        self.resolve(&name)
    }

    /// The descriptor registered for the Rust type `T`.
    pub fn resolve_type_of<T: 'static>(&self) -> Option<MetaType> {
        self.resolve_by_type_id(TypeId::of::<T>())
    }

    /// Every registered type, in registration order.
    pub fn list_types(&self) -> Vec<MetaType> {
        let types = self.types.read();
        self.order
            .read()
            .iter()
            .filter_map(|name| types.get(name).cloned())
            .collect()
    }

    /// Every registered class, in registration order.
    pub fn list_classes(&self) -> Vec<Arc<MetaClass>> {
        self.list_types()
            .into_iter()
            .filter_map(|t| t.as_class().cloned())
            .collect()
    }

    pub fn type_names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Whether a value of type `a` can be used where `b` is expected.
    ///
    /// Pointer names (`Class*`) are compared through their pointees, so
    /// `Circle*` is a subtype of `Shape*` even when only the classes were
    /// registered. Unregistered names are subtypes of nothing.
    pub fn is_subtype_of(&self, a: &str, b: &str) -> bool {
        match (a.strip_suffix(POINTER_SUFFIX), b.strip_suffix(POINTER_SUFFIX)) {
            (Some(pa), Some(pb)) => self.is_subtype_of(pa, pb),
            (None, None) => match (self.resolve(a), self.resolve(b)) {
                (Some(ta), Some(tb)) => ta.is_subtype_of(&tb),
                _ => false,
            },
            _ => false,
        }
    }

    /// Value of the enum entry `name`, `None` if either is unknown.
    pub fn enum_value(&self, enum_name: &str, name: &str) -> Option<i64> {
        self.resolve_enum(enum_name)?.find_value_by_name(name)
    }

    /// Name of the enum entry with `value`, `None` if either is unknown.
    pub fn enum_name(&self, enum_name: &str, value: i64) -> Option<String> {
        self.resolve_enum(enum_name)?.find_name_by_value(value)
    }

    /// Convert a stored value (entry name or integer) into an enum value.
    pub fn enum_from_any(&self, enum_name: &str, value: &Any) -> Option<i64> {
        let meta_enum = self.resolve_enum(enum_name)?;
        match value {
            Any::String(name) => meta_enum.find_value_by_name(name),
            other => other
                .get_value::<i64>()
                .filter(|v| meta_enum.has_value(*v)),
        }
    }

    /// Create an instance of the class `classname`.
    pub fn create(&self, classname: &str, args: &ArgList) -> Result<ObjectRef> {
        let class = self.resolve_class(classname).ok_or_else(|| {
            tracing::warn!(target: targets::META, %classname, "unknown class");
            GomError::UnknownType(classname.to_string())
        })?;
        class.create(args).map_err(GomError::from)
    }

    pub fn object_class(&self) -> &Arc<MetaClass> {
        &self.core.object
    }

    pub fn node_class(&self) -> &Arc<MetaClass> {
        &self.core.node
    }

    pub fn callable_class(&self) -> &Arc<MetaClass> {
        &self.core.callable
    }

    pub fn request_class(&self) -> &Arc<MetaClass> {
        &self.core.request
    }

    pub fn function_callable_class(&self) -> &Arc<MetaClass> {
        &self.core.function_callable
    }

    pub fn dynamic_object_class(&self) -> &Arc<MetaClass> {
        &self.core.dynamic_object
    }

    pub fn interpreter_class(&self) -> &Arc<MetaClass> {
        &self.core.interpreter
    }

    /// Whether the registry knows a class named `classname`.
    pub fn has_class(&self, classname: &str) -> bool {
        self.resolve_class(classname).is_some()
    }

    pub(crate) fn unknown_class(classname: &str) -> InvokeError {
        InvokeError::Failed(format!("unknown class: {classname}"))
    }
}

impl Default for Meta {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Meta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meta")
            .field("nb_types", &self.nb_types())
            .finish()
    }
}
