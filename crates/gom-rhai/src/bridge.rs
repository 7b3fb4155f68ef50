//! Conversions between [`Any`] and Rhai values.

use std::sync::{Arc, Weak};

use gom_core::bridge::{is_name_value_call, marshal_named, marshal_positional};
use gom_core::{
    Any, ArgList, Bridge, ExpectedType, InvokeError, InvokeResult, Meta, MetaMethod, ObjectHandle,
    ObjectRef,
};
use rhai::{Array, Dynamic, FnPtr, Map};

use crate::callable::RhaiCallable;
use crate::error::RhaiBridgeError;
use crate::interpreter::RhaiRuntime;
use crate::object::RhaiObject;

/// The [`Bridge`] between the registry and a Rhai engine.
///
/// Functions converted to callables run on the engine of `runtime`; the
/// bridge only holds it weakly so that callables stored in the scope do not
/// keep the engine alive.
#[derive(Clone)]
pub struct RhaiBridge {
    meta: Arc<Meta>,
    runtime: Weak<RhaiRuntime>,
}

impl RhaiBridge {
    pub(crate) fn new(meta: &Arc<Meta>, runtime: Weak<RhaiRuntime>) -> Self {
        Self {
            meta: Arc::clone(meta),
            runtime,
        }
    }

    /// Convert a native value with its declared type name.
    pub fn to_foreign_as(&self, value: &Any, type_name: &str) -> InvokeResult<Dynamic> {
        self.to_foreign(value, &ExpectedType::classify(&self.meta, type_name))
    }

    /// The return value of `method`, converted for Rhai.
    pub fn return_value(&self, value: &Any, method: Option<&MetaMethod>) -> InvokeResult<Dynamic> {
        match method {
            Some(method) => self.to_foreign_as(value, method.return_type_name()),
            None => self.to_foreign(value, &ExpectedType::Any),
        }
    }

    /// Best-guess conversion, without looking at the declared type.
    pub(crate) fn guess_native(&self, value: Dynamic) -> InvokeResult<Any> {
        // variables captured by closures are shared
        let value = value.flatten();
        if value.is_unit() {
            return Ok(Any::Null);
        }
        if let Ok(b) = value.as_bool() {
            return Ok(Any::Bool(b));
        }
        if let Ok(i) = value.as_int() {
            return Ok(Any::Int(i));
        }
        if let Ok(x) = value.as_float() {
            return Ok(Any::Double(x));
        }
        if let Ok(c) = value.as_char() {
            return Ok(Any::String(c.to_string()));
        }
        let type_name = value.type_name();
        if value.is_string() {
            return value
                .into_string()
                .map(Any::String)
                .map_err(|_| conversion_error(type_name, "String"));
        }
        if value.is_array() {
            let array = value
                .into_array()
                .map_err(|_| conversion_error(type_name, "Vec<f64>"))?;
            return number_or_row_array(array);
        }
        if value.is::<RhaiObject>() {
            let object = value
                .try_cast::<RhaiObject>()
                .ok_or_else(|| conversion_error(type_name, "Object*"))?;
            return Ok(Any::Object(object.handle().get()?));
        }
        if value.is::<FnPtr>() {
            let function = value
                .try_cast::<FnPtr>()
                .ok_or_else(|| conversion_error(type_name, "Callable*"))?;
            return Ok(Any::Object(self.wrap_callable(function)));
        }
        Err(conversion_error(type_name, "Any"))
    }
}

/// A vector (`[1, 2.5, 3]`) or a matrix given as an array of rows
/// (`[[1, 0], [0, 1]]`).
fn number_or_row_array(array: Array) -> InvokeResult<Any> {
    if !array.first().is_some_and(|item| item.clone().flatten().is_array()) {
        return number_array(array).map(Any::Vector);
    }
    array
        .into_iter()
        .map(|row| {
            let row = row.flatten();
            let type_name = row.type_name();
            row.into_array()
                .map_err(|_| conversion_error(type_name, "Vec<Vec<f64>>"))
                .and_then(number_array)
        })
        .collect::<InvokeResult<Vec<_>>>()
        .map(Any::Matrix)
}

/// The numbers of an array.
fn number_array(array: Array) -> InvokeResult<Vec<f64>> {
    array
        .into_iter()
        .map(|item| {
            if let Ok(i) = item.as_int() {
                Ok(i as f64)
            } else {
                item.as_float()
                    .map_err(|found| conversion_error(found, "Vec<f64>"))
            }
        })
        .collect()
}

fn conversion_error(type_name: &str, expected: &str) -> InvokeError {
    RhaiBridgeError::Conversion {
        type_name: type_name.to_string(),
        expected: expected.to_string(),
    }
    .into()
}

/// Whether a value is a non-empty object map (a name-value record).
pub(crate) fn is_record(value: &Dynamic) -> bool {
    value.is_map() && value.clone().try_cast::<Map>().is_some_and(|map| !map.is_empty())
}

impl Bridge for RhaiBridge {
    type Value = Dynamic;
    type Function = FnPtr;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn to_native(&self, value: Dynamic, expected: &ExpectedType) -> InvokeResult<Any> {
        let guess = self.guess_native(value)?;
        expected.coerce(&self.meta, guess, "rhai", "value")
    }

    fn to_foreign(&self, value: &Any, expected: &ExpectedType) -> InvokeResult<Dynamic> {
        Ok(match value {
            Any::Null => Dynamic::UNIT,
            Any::Bool(b) => Dynamic::from_bool(*b),
            Any::Int(i) => Dynamic::from_int(*i),
            Any::UInt(u) => match i64::try_from(*u) {
                Ok(i) => Dynamic::from_int(i),
                Err(_) => Dynamic::from_float(*u as f64),
            },
            Any::Float(x) => Dynamic::from_float(f64::from(*x)),
            Any::Double(x) => Dynamic::from_float(*x),
            Any::String(s) => match expected {
                ExpectedType::Enum(meta_enum) => match meta_enum.find_value_by_name(s) {
                    Some(entry) => Dynamic::from_int(entry),
                    None => Dynamic::from(s.clone()),
                },
                _ => Dynamic::from(s.clone()),
            },
            Any::Vector(v) => {
                Dynamic::from_array(v.iter().map(|x| Dynamic::from_float(*x)).collect())
            }
            Any::Matrix(rows) => Dynamic::from_array(
                rows.iter()
                    .map(|row| {
                        Dynamic::from_array(row.iter().map(|x| Dynamic::from_float(*x)).collect())
                    })
                    .collect(),
            ),
            Any::Object(object) => self.wrap_object(ObjectHandle::managed(object))?,
        })
    }

    fn wrap_object(&self, handle: ObjectHandle) -> InvokeResult<Dynamic> {
        Ok(Dynamic::from(RhaiObject::new(handle, &self.meta)))
    }

    fn wrap_callable(&self, function: FnPtr) -> ObjectRef {
        RhaiCallable::new(&self.meta, function, self.runtime.clone())
    }

    fn marshal_args(&self, args: Vec<Dynamic>, method: Option<&MetaMethod>) -> InvokeResult<ArgList> {
        let named = is_name_value_call(args.len(), args.first().is_some_and(is_record), method);
        if named {
            let Some(map) = args.into_iter().next().and_then(|v| v.try_cast::<Map>()) else {
                return Ok(ArgList::new());
            };
            let pairs = map.into_iter().map(|(name, value)| (name.to_string(), value));
            marshal_named(&self.meta, method, pairs, |value, expected| {
                self.to_native(value, expected)
            })
        } else {
            marshal_positional(&self.meta, method, args, |value, expected| {
                self.to_native(value, expected)
            })
        }
    }
}
