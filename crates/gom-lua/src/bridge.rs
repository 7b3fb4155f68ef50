//! Conversions between [`Any`] and Lua values.

use std::sync::Arc;

use gom_core::bridge::{is_name_value_call, marshal_named, marshal_positional};
use gom_core::{
    Any, ArgList, Bridge, ExpectedType, InvokeError, InvokeResult, Meta, MetaMethod, ObjectHandle,
    ObjectRef,
};
use mlua::{Function, Lua, Table, Value};

use crate::callable::LuaCallable;
use crate::error::LuaBridgeError;
use crate::userdata::LuaObject;

/// The [`Bridge`] between the registry and a Lua state.
///
/// Cheap to build: the state and the registry are both shared handles.
#[derive(Clone)]
pub struct LuaBridge {
    lua: Lua,
    meta: Arc<Meta>,
}

impl LuaBridge {
    pub fn new(lua: &Lua, meta: &Arc<Meta>) -> Self {
        Self {
            lua: lua.clone(),
            meta: Arc::clone(meta),
        }
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Convert a native value with its declared type name.
    pub fn to_foreign_as(&self, value: &Any, type_name: &str) -> InvokeResult<Value> {
        self.to_foreign(value, &ExpectedType::classify(&self.meta, type_name))
    }

    /// The return value of `method`, converted for Lua.
    pub fn return_value(&self, value: &Any, method: Option<&MetaMethod>) -> InvokeResult<Value> {
        match method {
            Some(method) => self.to_foreign_as(value, method.return_type_name()),
            None => self.to_foreign(value, &ExpectedType::Any),
        }
    }

    fn lua_failed(err: mlua::Error) -> InvokeError {
        LuaBridgeError::from(err).into()
    }
}

/// Best-guess conversion, without looking at the declared type.
pub(crate) fn guess_native(meta: &Arc<Meta>, value: Value) -> InvokeResult<Any> {
    Ok(match value {
        Value::Nil => Any::Null,
        Value::Boolean(b) => Any::Bool(b),
        Value::Integer(i) => Any::Int(i),
        Value::Number(x) => Any::Double(x),
        Value::String(s) => Any::String(s.to_string_lossy().into()),
        Value::Table(table) => number_table(&table)?,
        Value::Function(function) => Any::Object(LuaCallable::new(meta, function)),
        Value::UserData(ud) => match ud.borrow::<LuaObject>() {
            Ok(object) => Any::Object(object.handle().get()?),
            Err(_) => return Err(conversion_error(&Value::UserData(ud.clone()), "Object*")),
        },
        other => return Err(conversion_error(&other, "Any")),
    })
}

/// A vector (`{1, 2.5, 3}`) or a matrix given as a table of rows
/// (`{{1, 0}, {0, 1}}`).
fn number_table(table: &Table) -> InvokeResult<Any> {
    if !matches!(table.raw_get::<Value>(1), Ok(Value::Table(_))) {
        return number_sequence(table).map(Any::Vector);
    }
    let len = table.raw_len();
    let mut rows = Vec::with_capacity(len);
    for index in 1..=len {
        match table.raw_get::<Value>(index) {
            Ok(Value::Table(row)) => rows.push(number_sequence(&row)?),
            _ => return Err(conversion_error(&Value::Table(table.clone()), "Vec<Vec<f64>>")),
        }
    }
    if table.clone().pairs::<Value, Value>().count() != len {
        return Err(conversion_error(&Value::Table(table.clone()), "Vec<Vec<f64>>"));
    }
    Ok(Any::Matrix(rows))
}

/// The numbers of a sequence table.
fn number_sequence(table: &Table) -> InvokeResult<Vec<f64>> {
    let len = table.raw_len();
    let mut numbers = Vec::with_capacity(len);
    for index in 1..=len {
        let entry: mlua::Result<Value> = table.raw_get(index);
        let number = match entry {
            Ok(Value::Integer(i)) => i as f64,
            Ok(Value::Number(x)) => x,
            _ => return Err(conversion_error(&Value::Table(table.clone()), "Vec<f64>")),
        };
        numbers.push(number);
    }
    // keys beyond the sequence make it a record
    if table.clone().pairs::<Value, Value>().count() != len {
        return Err(conversion_error(&Value::Table(table.clone()), "Vec<f64>"));
    }
    Ok(numbers)
}

fn conversion_error(value: &Value, expected: &str) -> InvokeError {
    LuaBridgeError::Conversion {
        type_name: value.type_name(),
        expected: expected.to_string(),
    }
    .into()
}

/// Whether a table has string keys only (a name-value record).
pub(crate) fn is_record(value: &Value) -> bool {
    let Value::Table(table) = value else {
        return false;
    };
    table.raw_len() == 0
        && table
            .clone()
            .pairs::<Value, Value>()
            .all(|pair| matches!(pair, Ok((Value::String(_), _))))
        && table.clone().pairs::<Value, Value>().next().is_some()
}

impl Bridge for LuaBridge {
    type Value = Value;
    type Function = Function;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn to_native(&self, value: Value, expected: &ExpectedType) -> InvokeResult<Any> {
        let guess = guess_native(&self.meta, value)?;
        expected.coerce(&self.meta, guess, "lua", "value")
    }

    fn to_foreign(&self, value: &Any, expected: &ExpectedType) -> InvokeResult<Value> {
        Ok(match value {
            Any::Null => Value::Nil,
            Any::Bool(b) => Value::Boolean(*b),
            Any::Int(i) => Value::Integer(*i),
            Any::UInt(u) => match i64::try_from(*u) {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::Number(*u as f64),
            },
            Any::Float(x) => Value::Number(f64::from(*x)),
            Any::Double(x) => Value::Number(*x),
            Any::String(s) => match expected {
                ExpectedType::Enum(meta_enum) => match meta_enum.find_value_by_name(s) {
                    Some(entry) => Value::Integer(entry),
                    None => Value::String(self.lua.create_string(s).map_err(Self::lua_failed)?),
                },
                _ => Value::String(self.lua.create_string(s).map_err(Self::lua_failed)?),
            },
            Any::Vector(v) => Value::Table(
                self.lua
                    .create_sequence_from(v.iter().copied())
                    .map_err(Self::lua_failed)?,
            ),
            Any::Matrix(rows) => {
                let rows = rows
                    .iter()
                    .map(|row| self.lua.create_sequence_from(row.iter().copied()))
                    .collect::<mlua::Result<Vec<Table>>>()
                    .map_err(Self::lua_failed)?;
                Value::Table(self.lua.create_sequence_from(rows).map_err(Self::lua_failed)?)
            }
            Any::Object(object) => self.wrap_object(ObjectHandle::managed(object))?,
        })
    }

    fn wrap_object(&self, handle: ObjectHandle) -> InvokeResult<Value> {
        let object = LuaObject::new(handle, &self.meta);
        self.lua
            .create_userdata(object)
            .map(Value::UserData)
            .map_err(Self::lua_failed)
    }

    fn wrap_callable(&self, function: Function) -> ObjectRef {
        LuaCallable::new(&self.meta, function)
    }

    fn marshal_args(&self, args: Vec<Value>, method: Option<&MetaMethod>) -> InvokeResult<ArgList> {
        let named = is_name_value_call(args.len(), args.first().is_some_and(is_record), method);
        if named {
            let Some(Value::Table(table)) = args.into_iter().next() else {
                return Ok(ArgList::new());
            };
            let mut pairs = Vec::new();
            for pair in table.pairs::<String, Value>() {
                pairs.push(pair.map_err(Self::lua_failed)?);
            }
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
