//! Lua functions as native callables.

use std::sync::Arc;

use gom_core::logging::targets;
use gom_core::{
    new_object, Any, ArgList, Bridge, Callable, ExpectedType, FpeGuard, InvokeError, InvokeResult,
    Meta, MetaClass, Object, ObjectBase,
};
use mlua::{Function, IntoLuaMulti, Lua, MultiValue, Value};

use crate::bridge::{guess_native, LuaBridge};
use crate::error::{script_message, to_lua_error};

pub(crate) const CLASS_NAME: &str = "LuaCallable";

/// A Lua function that native code can invoke.
///
/// The function handle holds a reference in the Lua registry, so the
/// function is not collected while the callable lives (typically as the
/// target of a signal connection).
pub struct LuaCallable {
    base: ObjectBase,
    function: Function,
    meta: Arc<Meta>,
}

impl LuaCallable {
    pub fn new(meta: &Arc<Meta>, function: Function) -> Arc<Self> {
        new_object(Self {
            base: ObjectBase::new(meta_class(meta)),
            function,
            meta: Arc::clone(meta),
        })
    }

    pub fn function(&self) -> &Function {
        &self.function
    }
}

/// The `LuaCallable` meta class, registered on first use.
pub(crate) fn meta_class(meta: &Meta) -> Arc<MetaClass> {
    if let Some(class) = meta.resolve_class(CLASS_NAME) {
        return class;
    }
    let class = MetaClass::builder(CLASS_NAME)
        .super_class(meta.callable_class())
        .type_id::<LuaCallable>()
        .help("A Lua function, called with positional arguments or a single name-value table.")
        .build();
    meta.register_class(&class);
    class
}

impl Object for LuaCallable {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        Some(self)
    }
}

impl Callable for LuaCallable {
    /// Unnamed arguments are passed in order; named arguments are passed as
    /// a single table.
    fn invoke(&self, args: &ArgList) -> InvokeResult<Any> {
        let _fpe = FpeGuard::new();
        let call_args = LuaArgs {
            args,
            meta: &self.meta,
        };
        let result: mlua::Result<Value> = self.function.call(call_args);
        match result {
            Ok(value) => guess_native(&self.meta, value),
            Err(err) => {
                let message = script_message(&err);
                tracing::error!(target: targets::LUA, object = %self.base.string_id(), "{message}");
                Err(InvokeError::Failed(message))
            }
        }
    }
}

/// Arguments of a native call, converted once the Lua state is at hand.
struct LuaArgs<'a> {
    args: &'a ArgList,
    meta: &'a Arc<Meta>,
}

impl IntoLuaMulti for LuaArgs<'_> {
    fn into_lua_multi(self, lua: &Lua) -> mlua::Result<MultiValue> {
        let bridge = LuaBridge::new(lua, self.meta);
        if self.args.is_empty() || self.args.has_unnamed_args() {
            return self
                .args
                .iter()
                .map(|(_, value)| bridge.to_foreign(value, &ExpectedType::Any))
                .collect::<InvokeResult<MultiValue>>()
                .map_err(to_lua_error);
        }
        let table = lua.create_table()?;
        for (name, value) in self.args.iter() {
            let value = bridge
                .to_foreign(value, &ExpectedType::Any)
                .map_err(to_lua_error)?;
            table.set(name, value)?;
        }
        Ok(MultiValue::from_iter([Value::Table(table)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_and_named_calls() {
        let meta = Arc::new(Meta::new());
        let lua = Lua::new();
        let add: Function = lua.load("return function(a, b) return a + b end").eval().unwrap();
        let add = LuaCallable::new(&meta, add);
        let mut args = ArgList::new();
        args.create_unnamed_arg(2);
        args.create_unnamed_arg(3);
        assert_eq!(add.invoke(&args), Ok(Any::Int(5)));

        let sub: Function = lua
            .load("return function(t) return t.a - t.b end")
            .eval()
            .unwrap();
        let sub = LuaCallable::new(&meta, sub);
        let args = ArgList::new().with("a", 10).with("b", 4);
        assert_eq!(sub.invoke(&args), Ok(Any::Int(6)));
        assert!(sub.meta_class().inherits("Callable"));
    }

    #[test]
    fn test_lua_error_becomes_invoke_error() {
        let meta = Arc::new(Meta::new());
        let lua = Lua::new();
        let fail: Function = lua
            .load("return function() error('boom', 0) end")
            .eval()
            .unwrap();
        let fail = LuaCallable::new(&meta, fail);
        assert_eq!(
            fail.invoke(&ArgList::new()),
            Err(InvokeError::Failed("boom".to_string()))
        );
    }
}
