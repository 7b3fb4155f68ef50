//! Classes declared at runtime.
//!
//! A dynamic class derives from `DynamicObject`, whose instances keep their
//! property values in a map. Slots of dynamic classes are callables (usually
//! script functions) receiving `self`, `method` and the call arguments.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::any::Any;
use crate::arg_list::ArgList;
use crate::error::{GomError, InvokeError, InvokeResult, Result};
use crate::logging::targets;
use crate::meta_class::MetaClass;
use crate::meta_member::{factory_failed, MetaArg, MetaMethod, MetaProperty, ARG_LIST_TYPE};
use crate::object::{new_object, object_cast, Object, ObjectBase, ObjectRef};
use crate::registry::Meta;

/// Instance of a dynamic class.
pub struct DynamicObject {
    base: ObjectBase,
    properties: RwLock<HashMap<String, Any>>,
}

impl DynamicObject {
    pub fn new(class: Arc<MetaClass>) -> Arc<Self> {
        new_object(Self {
            base: ObjectBase::new(class),
            properties: RwLock::new(HashMap::new()),
        })
    }

    /// The stored value of `name`, `None` while it still has its default.
    pub fn value(&self, name: &str) -> Option<Any> {
        self.properties.read().get(name).cloned()
    }

    pub fn set_value(&self, name: &str, value: Any) {
        self.properties.write().insert(name.to_string(), value);
    }
}

impl Object for DynamicObject {
    fn base(&self) -> &ObjectBase {
        &self.base
    }
}

impl fmt::Debug for DynamicObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicObject")
            .field("id", &self.base.string_id())
            .field("properties", &*self.properties.read())
            .finish()
    }
}

fn cast_dynamic(obj: &dyn Object) -> InvokeResult<&DynamicObject> {
    object_cast::<DynamicObject>(obj).ok_or_else(|| InvokeError::TargetType {
        expected: "DynamicObject".to_string(),
        found: obj.meta_class().name().to_string(),
    })
}

/// Convert `value` to the declared type of a dynamic property.
///
/// Scalar and string types are converted; other types are stored as given.
fn coerce(type_name: &str, value: &Any, method: &str) -> InvokeResult<Any> {
    Ok(match type_name {
        "bool" => Any::Bool(value.convert(method, "value")?),
        "i32" | "i64" => Any::Int(value.convert(method, "value")?),
        "u32" | "u64" | "usize" => Any::UInt(value.convert(method, "value")?),
        "f32" => Any::Float(value.convert(method, "value")?),
        "f64" => Any::Double(value.convert(method, "value")?),
        "String" => Any::String(value.as_string()),
        _ => value.clone(),
    })
}

/// Declares and extends dynamic classes.
pub struct DynamicClassBuilder {
    class: Arc<MetaClass>,
}

impl DynamicClassBuilder {
    /// Declare and register a new class.
    ///
    /// `super_class` defaults to `DynamicObject` and must derive from it.
    pub fn new(
        meta: &Meta,
        name: &str,
        super_class: Option<&Arc<MetaClass>>,
        is_abstract: bool,
    ) -> Result<Self> {
        if meta.resolve(name).is_some() {
            return Err(GomError::DuplicateType(name.to_string()));
        }
        let super_class = super_class.unwrap_or(meta.dynamic_object_class());
        if !super_class.is_subclass_of(meta.dynamic_object_class()) {
            return Err(GomError::Invoke(InvokeError::TargetType {
                expected: "DynamicObject".to_string(),
                found: super_class.name().to_string(),
            }));
        }
        let mut builder = MetaClass::builder(name).super_class(super_class);
        if is_abstract {
            builder = builder.abstract_class();
        }
        let class = builder.build();
        class.add_constructor(default_constructor(&class));
        meta.register_class(&class);
        tracing::debug!(target: targets::META, class = %name, base = %super_class.name(), "dynamic class declared");
        Ok(Self { class })
    }

    /// Resume declaring members of a registered dynamic class.
    pub fn extend(meta: &Meta, name: &str) -> Result<Self> {
        let class = meta
            .resolve_class(name)
            .ok_or_else(|| GomError::UnknownType(name.to_string()))?;
        if !class.is_subclass_of(meta.dynamic_object_class())
            || Arc::ptr_eq(&class, meta.dynamic_object_class())
        {
            return Err(GomError::Invoke(InvokeError::TargetType {
                expected: "dynamic class".to_string(),
                found: name.to_string(),
            }));
        }
        Ok(Self { class })
    }

    pub fn meta_class(&self) -> &Arc<MetaClass> {
        &self.class
    }

    /// Add a writable property holding `default` until first assigned.
    pub fn add_property(&self, name: &str, type_name: &str, default: Any) -> &Self {
        let key = name.to_string();
        let getter_key = key.clone();
        let setter_type = type_name.to_string();
        let setter_method = format!("{}::set_{name}", self.class.name());
        let property = MetaProperty::new(name, &self.class, type_name, move |obj| {
            Ok(cast_dynamic(obj)?
                .value(&getter_key)
                .unwrap_or_else(|| default.clone()))
        })
        .with_setter(move |obj, value| {
            let value = coerce(&setter_type, value, &setter_method)?;
            cast_dynamic(obj)?.set_value(&key, value);
            Ok(())
        });
        self.class.add_property(property);
        self
    }

    /// Add a slot whose body is the callable `action`.
    ///
    /// The action receives `self`, `method` (the slot name) and the bound
    /// call arguments.
    pub fn add_slot(&self, name: &str, action: ObjectRef, args: Vec<MetaArg>) -> InvokeResult<&Self> {
        check_callable(&action)?;
        let slot_name = name.to_string();
        let mut method = MetaMethod::slot(name, &self.class, "Any", move |obj, args| {
            invoke_action(&action, obj, &slot_name, args)
        });
        for arg in args {
            method.add_arg(arg);
        }
        self.class.add_slot(method);
        Ok(self)
    }

    /// Add a signal with the given arguments.
    pub fn add_signal(&self, name: &str, args: Vec<MetaArg>) -> &Self {
        let mut method = MetaMethod::signal(name, &self.class);
        for arg in args {
            method.add_arg(arg);
        }
        self.class.add_signal(method);
        self
    }

    /// Add a constructor running `action` on the new instance.
    ///
    /// The action receives `self` and the construction arguments; without
    /// constructor action, construction arguments initialize properties.
    pub fn add_constructor(&self, action: ObjectRef, args: Vec<MetaArg>) -> InvokeResult<&Self> {
        check_callable(&action)?;
        let mut method = MetaMethod::constructor(
            &self.class,
            move |class: &Arc<MetaClass>, args: &ArgList| -> Option<ObjectRef> {
                let object: ObjectRef = DynamicObject::new(class.clone());
                match invoke_action(&action, object.as_ref(), "constructor", args) {
                    Ok(_) => Some(object),
                    Err(err) => factory_failed(class, &err),
                }
            },
        );
        for arg in args {
            method.add_arg(arg);
        }
        self.class.add_constructor(method);
        Ok(self)
    }
}

fn check_callable(action: &ObjectRef) -> InvokeResult<()> {
    match action.as_callable() {
        Some(_) => Ok(()),
        None => Err(InvokeError::TargetType {
            expected: "Callable".to_string(),
            found: action.meta_class().name().to_string(),
        }),
    }
}

fn invoke_action(action: &ObjectRef, target: &dyn Object, method: &str, args: &ArgList) -> InvokeResult<Any> {
    let target = target.base().self_ref().ok_or(InvokeError::Detached)?;
    let mut call_args = ArgList::new().with("self", target).with("method", method);
    call_args.append(args, false);
    match action.as_callable() {
        Some(callable) => callable.invoke(&call_args),
        None => Err(InvokeError::TargetType {
            expected: "Callable".to_string(),
            found: action.meta_class().name().to_string(),
        }),
    }
}

/// Every dynamic class starts with a constructor taking the whole argument
/// list; named arguments initialize writable properties.
fn default_constructor(class: &Arc<MetaClass>) -> MetaMethod {
    MetaMethod::constructor(class, |class: &Arc<MetaClass>, args: &ArgList| -> Option<ObjectRef> {
        let object: ObjectRef = DynamicObject::new(class.clone());
        if args.has_unnamed_args() {
            tracing::warn!(target: targets::OBJECT, class = %class.name(), "positional construction arguments ignored");
            return Some(object);
        }
        match object.set_properties(args) {
            Ok(()) => Some(object),
            Err(err) => factory_failed(class, &err),
        }
    })
    .with_arg(MetaArg::new("args", ARG_LIST_TYPE))
}

pub(crate) fn build_dynamic_object_class(object_class: &Arc<MetaClass>) -> Arc<MetaClass> {
    MetaClass::builder("DynamicObject")
        .super_class(object_class)
        .abstract_class()
        .type_id::<DynamicObject>()
        .help("Base class of the classes declared at runtime.")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::FunctionCallable;

    fn declare_counter(meta: &Meta) -> DynamicClassBuilder {
        let builder = DynamicClassBuilder::new(meta, "Counter", None, false).unwrap();
        builder
            .add_property("count", "i64", Any::Int(0))
            .add_property("label", "String", Any::from("counter"));
        builder
    }

    #[test]
    fn test_properties_start_at_default() {
        let meta = Meta::new();
        declare_counter(&meta);
        let counter = meta.create("Counter", &ArgList::new()).unwrap();
        assert_eq!(counter.get_property("count"), Ok(Any::Int(0)));
        assert_eq!(counter.get_property("label"), Ok(Any::from("counter")));
        assert!(counter.is_a("DynamicObject"));
    }

    #[test]
    fn test_construction_args_initialize_properties() {
        let meta = Meta::new();
        declare_counter(&meta);
        let counter = meta
            .create("Counter", &ArgList::new().with("count", "5"))
            .unwrap();
        assert_eq!(counter.get_property("count"), Ok(Any::Int(5)));
        assert!(meta
            .create("Counter", &ArgList::new().with("missing", 1))
            .is_err());
    }

    #[test]
    fn test_slot_action_receives_self_and_method() {
        let meta = Meta::new();
        let builder = declare_counter(&meta);
        let action: ObjectRef = FunctionCallable::new(&meta, |args: &ArgList| {
            let this: ObjectRef = args.require("increment", "self")?;
            let method: String = args.require("increment", "method")?;
            let step: i64 = args.require("increment", "step")?;
            let count: i64 = this.get_property("count")?.convert("increment", "count")?;
            this.set_property("count", count + step)?;
            Ok(Any::String(method))
        });
        builder
            .add_slot("increment", action, vec![MetaArg::new("step", "i64").with_default(1)])
            .unwrap();

        let counter = meta.create("Counter", &ArgList::new()).unwrap();
        assert_eq!(
            counter.invoke_method("increment", &ArgList::new()),
            Ok(Any::from("increment"))
        );
        counter
            .invoke_method("increment", &ArgList::new().with("step", 10))
            .unwrap();
        assert_eq!(counter.get_property("count"), Ok(Any::Int(11)));
    }

    #[test]
    fn test_constructor_action() {
        let meta = Meta::new();
        let builder = declare_counter(&meta);
        let init: ObjectRef = FunctionCallable::new(&meta, |args: &ArgList| {
            let this: ObjectRef = args.require("init", "self")?;
            let start: i64 = args.require("init", "start")?;
            this.set_property("count", start * 2)?;
            Ok(Any::Null)
        });
        builder
            .add_constructor(init, vec![MetaArg::new("start", "i64")])
            .unwrap();

        let counter = meta
            .create("Counter", &ArgList::new().with("start", 4))
            .unwrap();
        assert_eq!(counter.get_property("count"), Ok(Any::Int(8)));
    }

    #[test]
    fn test_subclassing_and_duplicates() {
        let meta = Meta::new();
        let counter = declare_counter(&meta);
        let sub = DynamicClassBuilder::new(&meta, "BigCounter", Some(counter.meta_class()), false).unwrap();
        sub.add_property("limit", "u64", Any::UInt(100));
        let big = meta.create("BigCounter", &ArgList::new().with("count", 3)).unwrap();
        assert_eq!(big.get_property("count"), Ok(Any::Int(3)));
        assert_eq!(big.get_property("limit"), Ok(Any::UInt(100)));

        assert!(matches!(
            DynamicClassBuilder::new(&meta, "Counter", None, false),
            Err(GomError::DuplicateType(_))
        ));
        assert!(DynamicClassBuilder::new(&meta, "Bad", Some(meta.node_class()), false).is_err());
        assert!(DynamicClassBuilder::extend(&meta, "Counter").is_ok());
        assert!(DynamicClassBuilder::extend(&meta, "Node").is_err());
    }
}
