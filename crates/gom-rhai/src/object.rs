//! Native objects seen from Rhai.
//!
//! A [`RhaiObject`] is a custom type holding an [`ObjectHandle`]. The engine
//! learns the reflected names as classes are registered:
//!
//! | Rhai                  | Native                                       |
//! |-----------------------|----------------------------------------------|
//! | `obj.prop`, `obj["prop"]` | property value, or a request for the method |
//! | `obj.prop = v`        | property write                               |
//! | `obj.slot(...)`       | method call, positional or one object map    |
//! | `obj[i]`              | element `i`                                  |
//! | `obj.call(...)`       | invoke a callable (request, function, ...)   |
//! | `len(obj)`            | number of elements                           |
//! | `for e in obj`        | elements                                     |
//! | `to_string(obj)`      | string id                                    |
//! | `a == b`              | identity                                     |

use std::any::TypeId;
use std::sync::{Arc, Weak};

use gom_core::logging::targets;
use gom_core::{
    object_cast, same_object, Bridge, ExpectedType, FpeGuard, InvokeError, Meta, MetaClass,
    ObjectHandle, ObjectRef, Request,
};
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, NativeCallContext, INT};

use crate::bridge::RhaiBridge;
use crate::error::to_rhai_error;

/// Largest number of arguments of a method call from Rhai.
pub const MAX_ARGS: usize = 8;

/// Name of the function invoking a callable object.
const CALL: &str = "call";

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

/// A native object wrapped for Rhai.
#[derive(Clone)]
pub struct RhaiObject {
    handle: ObjectHandle,
    meta: Arc<Meta>,
}

impl RhaiObject {
    pub fn new(handle: ObjectHandle, meta: &Arc<Meta>) -> Self {
        Self {
            handle,
            meta: Arc::clone(meta),
        }
    }

    pub fn handle(&self) -> &ObjectHandle {
        &self.handle
    }

    fn object(&self) -> RhaiResult<ObjectRef> {
        self.handle.get().map_err(to_rhai_error)
    }

    fn string_id(&self) -> String {
        match self.handle.get() {
            Ok(object) => object.string_id(),
            Err(_) => "<destroyed>".to_string(),
        }
    }

    fn designates(&self, other: &RhaiObject) -> bool {
        match (self.handle.get(), other.handle.get()) {
            (Ok(a), Ok(b)) => same_object(a.as_ref(), b.as_ref()),
            _ => false,
        }
    }

    fn elements(&self) -> RhaiResult<Vec<Dynamic>> {
        let object = self.object()?;
        let bridge = RhaiBridge::new(&self.meta, Weak::new());
        let len = object.nb_elements().map_err(to_rhai_error)?;
        (0..len)
            .map(|index| {
                let element = object.get_element(index).map_err(to_rhai_error)?;
                bridge.to_foreign(&element, &ExpectedType::Any).map_err(to_rhai_error)
            })
            .collect()
    }
}

impl IntoIterator for RhaiObject {
    type Item = Dynamic;
    type IntoIter = std::vec::IntoIter<Dynamic>;

    fn into_iter(self) -> Self::IntoIter {
        match self.elements() {
            Ok(elements) => elements.into_iter(),
            Err(err) => {
                tracing::warn!(target: targets::RHAI, object = %self.string_id(), "cannot iterate: {err}");
                Vec::new().into_iter()
            }
        }
    }
}

fn no_member(class: &MetaClass, name: &str) -> Box<EvalAltResult> {
    format!("{}::{name} : no such method nor property", class.name()).into()
}

fn element_index(index: INT) -> RhaiResult<usize> {
    usize::try_from(index).map_err(|_| format!("element index {index} out of range").into())
}

/// `obj.name`: a property value, or a request for the method `name`.
fn get_member(bridge: &RhaiBridge, wrapper: &RhaiObject, name: &str) -> RhaiResult<Dynamic> {
    let object = wrapper.object()?;
    let class = object.meta_class();
    if let Some(property) = class.find_property(name) {
        let value = property.get_value(object.as_ref()).map_err(to_rhai_error)?;
        return bridge
            .to_foreign_as(&value, property.type_name())
            .map_err(to_rhai_error);
    }
    if let Some(method) = class.find_method(name) {
        // the interpreter is reached through `gom`, which must not keep it alive
        let target = if object.as_interpreter().is_some() {
            ObjectHandle::unmanaged(&object)
        } else {
            ObjectHandle::managed(&object)
        };
        let request: ObjectRef = Request::new(bridge.meta(), target, method);
        return bridge
            .wrap_object(ObjectHandle::Managed(request))
            .map_err(to_rhai_error);
    }
    Err(no_member(class, name))
}

fn set_member(bridge: &RhaiBridge, wrapper: &RhaiObject, name: &str, value: Dynamic) -> RhaiResult<()> {
    let object = wrapper.object()?;
    let Some(property) = object.meta_class().find_property(name) else {
        return Err(no_member(object.meta_class(), name));
    };
    let expected = ExpectedType::classify(bridge.meta(), property.type_name());
    let value = bridge.to_native(value, &expected).map_err(to_rhai_error)?;
    object.set_property(name, value).map_err(to_rhai_error)
}

/// `obj.name(...)`: `args[0]` is the object.
fn call_member(bridge: &RhaiBridge, name: &str, args: &mut [&mut Dynamic]) -> RhaiResult<Dynamic> {
    let Some((this, rest)) = args.split_first_mut() else {
        return Err(format!("{name} : missing object").into());
    };
    let wrapper = (**this)
        .clone()
        .try_cast::<RhaiObject>()
        .ok_or_else(|| -> Box<EvalAltResult> { format!("{name} : not an object").into() })?;
    let object = wrapper.object()?;
    let values: Vec<Dynamic> = rest.iter().map(|value| (**value).clone()).collect();

    if name == CALL && object.as_callable().is_some() && !object.has_method(CALL) {
        return call_object(bridge, &object, values);
    }

    let method = object.meta_class().find_method(name);
    let call_args = bridge
        .marshal_args(values, method.as_deref())
        .map_err(to_rhai_error)?;
    let result = {
        let _fpe = FpeGuard::new();
        object.invoke_method(name, &call_args).map_err(to_rhai_error)?
    };
    bridge
        .return_value(&result, method.as_deref().filter(|m| !m.is_signal()))
        .map_err(to_rhai_error)
}

/// `obj.call(...)` on a callable object.
fn call_object(bridge: &RhaiBridge, object: &ObjectRef, values: Vec<Dynamic>) -> RhaiResult<Dynamic> {
    let callable = object.as_callable().ok_or_else(|| {
        to_rhai_error(InvokeError::NotImplemented {
            class: object.meta_class().name().to_string(),
            operation: "call",
        })
    })?;
    let method = object_cast::<Request>(object.as_ref()).map(|r| Arc::clone(r.method()));
    let args = bridge
        .marshal_args(values, method.as_deref())
        .map_err(to_rhai_error)?;
    let result = {
        let _fpe = FpeGuard::new();
        callable.invoke(&args).map_err(to_rhai_error)?
    };
    bridge
        .return_value(&result, method.as_deref().filter(|m| !m.is_signal()))
        .map_err(to_rhai_error)
}

/// Register the object type and the name-independent functions.
pub(crate) fn register_object_api(engine: &mut Engine, bridge: &RhaiBridge) {
    engine.register_type_with_name::<RhaiObject>("Object");

    let by_name = bridge.clone();
    engine.register_indexer_get(
        move |obj: &mut RhaiObject, name: ImmutableString| -> RhaiResult<Dynamic> {
            get_member(&by_name, obj, &name)
        },
    );
    let by_name = bridge.clone();
    engine.register_indexer_set(
        move |obj: &mut RhaiObject, name: ImmutableString, value: Dynamic| -> RhaiResult<()> {
            set_member(&by_name, obj, &name, value)
        },
    );

    let by_index = bridge.clone();
    engine.register_indexer_get(move |obj: &mut RhaiObject, index: INT| -> RhaiResult<Dynamic> {
        let element = obj
            .object()?
            .get_element(element_index(index)?)
            .map_err(to_rhai_error)?;
        by_index.to_foreign(&element, &ExpectedType::Any).map_err(to_rhai_error)
    });
    let by_index = bridge.clone();
    engine.register_indexer_set(
        move |obj: &mut RhaiObject, index: INT, value: Dynamic| -> RhaiResult<()> {
            let value = by_index
                .to_native(value, &ExpectedType::Any)
                .map_err(to_rhai_error)?;
            obj.object()?
                .set_element(element_index(index)?, &value)
                .map_err(to_rhai_error)
        },
    );

    engine.register_fn("len", |obj: &mut RhaiObject| -> RhaiResult<INT> {
        let len = obj.object()?.nb_elements().map_err(to_rhai_error)?;
        INT::try_from(len).map_err(|_| "too many elements".into())
    });
    engine.register_fn("to_string", |obj: &mut RhaiObject| obj.string_id());
    engine.register_fn("to_debug", |obj: &mut RhaiObject| obj.string_id());
    engine.register_fn("==", |a: &mut RhaiObject, b: RhaiObject| a.designates(&b));
    engine.register_fn("!=", |a: &mut RhaiObject, b: RhaiObject| !a.designates(&b));
    engine.register_iterator::<RhaiObject>();

    register_method(engine, bridge, CALL);
}

/// Make `name` callable on objects with up to [`MAX_ARGS`] arguments.
#[allow(deprecated)]
pub(crate) fn register_method(engine: &mut Engine, bridge: &RhaiBridge, name: &str) {
    for nb_args in 0..=MAX_ARGS {
        let mut arg_types = vec![TypeId::of::<RhaiObject>()];
        arg_types.extend(std::iter::repeat_n(TypeId::of::<Dynamic>(), nb_args));
        let bridge = bridge.clone();
        let method = name.to_string();
        engine.register_raw_fn(
            name,
            arg_types,
            move |_: NativeCallContext, args: &mut [&mut Dynamic]| call_member(&bridge, &method, args),
        );
    }
}

/// Property accessors for `name`, ahead of the indexer fallback.
pub(crate) fn register_property(engine: &mut Engine, bridge: &RhaiBridge, name: &str) {
    let getter = bridge.clone();
    let property = name.to_string();
    engine.register_get(name, move |obj: &mut RhaiObject| -> RhaiResult<Dynamic> {
        get_member(&getter, obj, &property)
    });
    let setter = bridge.clone();
    let property = name.to_string();
    engine.register_set(name, move |obj: &mut RhaiObject, value: Dynamic| -> RhaiResult<()> {
        set_member(&setter, obj, &property, value)
    });
}
