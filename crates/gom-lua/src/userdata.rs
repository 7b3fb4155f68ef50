//! Native objects seen from Lua.
//!
//! A [`LuaObject`] is a full userdata holding an [`ObjectHandle`]. Its
//! metatable resolves names against the meta class at each access:
//!
//! | Lua                 | Native                                        |
//! |---------------------|-----------------------------------------------|
//! | `obj[i]`            | element `i - 1`                               |
//! | `obj.name`          | property value, or a request for the method   |
//! | `obj.name = v`      | property write                                |
//! | `obj(...)`          | invoke a callable (request, function, ...)    |
//! | `#obj`              | number of elements                            |
//! | `pairs(obj)`        | property names and values                     |
//! | `tostring(obj)`     | string id                                     |
//! | `a == b`            | identity                                      |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gom_core::{
    object_cast, same_object, Bridge, ExpectedType, InvokeError, Meta, ObjectHandle, ObjectRef,
    Request,
};
use mlua::{AnyUserData, Lua, MultiValue, UserData, UserDataMethods, Value};

use crate::bridge::LuaBridge;
use crate::error::to_lua_error;

/// A native object wrapped for Lua.
pub struct LuaObject {
    handle: ObjectHandle,
    meta: Arc<Meta>,
}

impl LuaObject {
    pub fn new(handle: ObjectHandle, meta: &Arc<Meta>) -> Self {
        Self {
            handle,
            meta: Arc::clone(meta),
        }
    }

    pub fn handle(&self) -> &ObjectHandle {
        &self.handle
    }

    fn object(&self) -> mlua::Result<ObjectRef> {
        self.handle.get().map_err(to_lua_error)
    }

    fn bridge(&self, lua: &Lua) -> LuaBridge {
        LuaBridge::new(lua, &self.meta)
    }

    fn index(&self, lua: &Lua, key: Value) -> mlua::Result<Value> {
        let object = self.object()?;
        let bridge = self.bridge(lua);
        let name = match key {
            Value::Integer(index) => {
                let element = object.get_element(element_index(index)?).map_err(to_lua_error)?;
                return bridge.to_foreign(&element, &ExpectedType::Any).map_err(to_lua_error);
            }
            Value::String(name) => name.to_str()?.to_string(),
            other => {
                return Err(mlua::Error::RuntimeError(format!(
                    "{} : cannot index with a {}",
                    object.meta_class().name(),
                    other.type_name()
                )));
            }
        };

        let class = object.meta_class();
        if let Some(property) = class.find_property(&name) {
            let value = property.get_value(object.as_ref()).map_err(to_lua_error)?;
            return bridge
                .to_foreign_as(&value, property.type_name())
                .map_err(to_lua_error);
        }
        if let Some(method) = class.find_method(&name) {
            // the interpreter is reached through `gom`, which must not keep it alive
            let target = if object.as_interpreter().is_some() {
                ObjectHandle::unmanaged(&object)
            } else {
                ObjectHandle::managed(&object)
            };
            let request: ObjectRef = Request::new(&self.meta, target, method);
            return bridge
                .wrap_object(ObjectHandle::Managed(request))
                .map_err(to_lua_error);
        }
        Err(mlua::Error::RuntimeError(format!(
            "{}::{name} : no such method nor property",
            class.name()
        )))
    }

    fn new_index(&self, lua: &Lua, key: Value, value: Value) -> mlua::Result<()> {
        let object = self.object()?;
        let bridge = self.bridge(lua);
        match key {
            Value::Integer(index) => {
                let index = element_index(index)?;
                let value = bridge.to_native(value, &ExpectedType::Any).map_err(to_lua_error)?;
                object.set_element(index, &value).map_err(to_lua_error)
            }
            Value::String(name) => {
                let name = name.to_str()?.to_string();
                let expected = match object.meta_class().find_property(&name) {
                    Some(property) => ExpectedType::classify(&self.meta, property.type_name()),
                    None => ExpectedType::Any,
                };
                let value = bridge.to_native(value, &expected).map_err(to_lua_error)?;
                object.set_property(&name, value).map_err(to_lua_error)
            }
            other => Err(mlua::Error::RuntimeError(format!(
                "{} : cannot assign with a {} key",
                object.meta_class().name(),
                other.type_name()
            ))),
        }
    }

    fn call(&self, lua: &Lua, args: MultiValue) -> mlua::Result<Value> {
        let object = self.object()?;
        let callable = object.as_callable().ok_or_else(|| {
            to_lua_error(InvokeError::NotImplemented {
                class: object.meta_class().name().to_string(),
                operation: "call",
            })
        })?;
        let method = object_cast::<Request>(object.as_ref()).map(|r| Arc::clone(r.method()));
        let mut args: Vec<Value> = args.into_iter().collect();

        // `obj:method(...)` passes the target again
        if let Some(request) = object_cast::<Request>(object.as_ref()) {
            if args.first().is_some_and(|first| designates(first, request.object())) {
                args.remove(0);
            }
        }

        let bridge = self.bridge(lua);
        let args = bridge
            .marshal_args(args, method.as_deref())
            .map_err(to_lua_error)?;
        let result = {
            let _fpe = gom_core::FpeGuard::new();
            callable.invoke(&args).map_err(to_lua_error)?
        };
        bridge
            .return_value(&result, method.as_deref().filter(|m| !m.is_signal()))
            .map_err(to_lua_error)
    }

    /// An iterator over property names and values, for `pairs()`.
    fn pairs(&self, lua: &Lua) -> mlua::Result<MultiValue> {
        let object = self.object()?;
        let names: Vec<String> = object
            .meta_class()
            .members(true)
            .iter()
            .filter_map(|m| m.as_property().map(|p| p.name().to_string()))
            .collect();
        let meta = Arc::clone(&self.meta);
        let position = AtomicUsize::new(0);
        let next = lua.create_function(move |lua, _: MultiValue| {
            let index = position.fetch_add(1, Ordering::Relaxed);
            let Some(name) = names.get(index) else {
                return Ok(MultiValue::new());
            };
            let value = object.get_property(name).map_err(to_lua_error)?;
            let value = LuaBridge::new(lua, &meta)
                .to_foreign(&value, &ExpectedType::Any)
                .map_err(to_lua_error)?;
            Ok(MultiValue::from_iter([
                Value::String(lua.create_string(name)?),
                value,
            ]))
        })?;
        Ok(MultiValue::from_iter([Value::Function(next), Value::Nil, Value::Nil]))
    }
}

/// Lua element indices start at 1.
fn element_index(index: i64) -> mlua::Result<usize> {
    index
        .checked_sub(1)
        .and_then(|index| usize::try_from(index).ok())
        .ok_or_else(|| mlua::Error::RuntimeError(format!("element index {index} out of range")))
}

/// Whether a Lua value wraps the object behind `handle`.
fn designates(value: &Value, handle: &ObjectHandle) -> bool {
    let Value::UserData(ud) = value else {
        return false;
    };
    let Ok(wrapped) = ud.borrow::<LuaObject>() else {
        return false;
    };
    match (wrapped.handle.get(), handle.get()) {
        (Ok(a), Ok(b)) => same_object(a.as_ref(), b.as_ref()),
        _ => false,
    }
}

impl UserData for LuaObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(mlua::MetaMethod::Index, |lua, this, key: Value| {
            this.index(lua, key)
        });
        methods.add_meta_method(
            mlua::MetaMethod::NewIndex,
            |lua, this, (key, value): (Value, Value)| this.new_index(lua, key, value),
        );
        methods.add_meta_method(mlua::MetaMethod::Call, |lua, this, args: MultiValue| {
            this.call(lua, args)
        });
        methods.add_meta_method(mlua::MetaMethod::Len, |_, this, ()| {
            this.object()?.nb_elements().map_err(to_lua_error)
        });
        methods.add_meta_method(mlua::MetaMethod::Pairs, |lua, this, ()| this.pairs(lua));
        methods.add_meta_method(mlua::MetaMethod::ToString, |_, this, ()| {
            Ok(match this.handle.get() {
                Ok(object) => object.string_id(),
                Err(_) => "<destroyed>".to_string(),
            })
        });
        methods.add_meta_method(mlua::MetaMethod::Eq, |_, this, other: AnyUserData| {
            Ok(designates(&Value::UserData(other), &this.handle))
        });
    }
}

/// Documentation of a wrapped value, for the `help` global.
pub(crate) fn help(value: &Value) -> Option<String> {
    let Value::UserData(ud) = value else {
        return None;
    };
    let wrapped = ud.borrow::<LuaObject>().ok()?;
    let object = wrapped.handle.get().ok()?;
    Some(object.doc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_index_bounds() {
        assert_eq!(element_index(1).unwrap(), 0);
        assert_eq!(element_index(3).unwrap(), 2);
        assert!(element_index(0).is_err());
        assert!(element_index(-4).is_err());
        assert!(element_index(i64::MIN).is_err());
    }
}
