//! The Lua interpreter object.

use std::collections::HashSet;
use std::sync::Arc;

use gom_core::logging::targets;
use gom_core::{
    new_object, Any, ArgList, Bridge, ExpectedType, FpeGuard, GomConfig, Interpreter,
    InterpreterCore, InterpreterError, Meta, MetaClass, Object, ObjectBase, ObjectHandle,
};
use mlua::{Lua, MultiValue, Value};

use crate::bridge::LuaBridge;
use crate::error::LuaBridgeError;
use crate::userdata;

/// Global name of the interpreter object in scripts.
pub const GOM_GLOBAL: &str = "gom";

const CLASS_NAME: &str = "LuaInterpreter";

/// A Lua 5.4 state exposed as an [`Interpreter`].
///
/// Scripts see the interpreter itself as the global `gom`, wrapped without
/// a reference so that the state does not keep its owner alive. `print`
/// goes to the log under the `gom_lua` target.
pub struct LuaInterpreter {
    base: ObjectBase,
    core: InterpreterCore,
    lua: Lua,
    /// Globals defined by the standard library, kept by `reset`.
    builtins: HashSet<String>,
}

impl LuaInterpreter {
    pub fn new(meta: &Arc<Meta>, config: &GomConfig) -> Result<Arc<Self>, LuaBridgeError> {
        let lua = Lua::new();
        let builtins = global_names(&lua)?;
        let interpreter = new_object(Self {
            base: ObjectBase::new(meta_class(meta)),
            core: InterpreterCore::from_config(Arc::clone(meta), config),
            lua,
            builtins,
        });
        interpreter.install()?;
        tracing::debug!(target: targets::LUA, object = %interpreter.base.string_id(), "Lua interpreter ready");
        Ok(interpreter)
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn bridge(&self) -> LuaBridge {
        LuaBridge::new(&self.lua, self.core.meta())
    }

    /// Bind `gom`, `print` and `help`.
    fn install(&self) -> Result<(), LuaBridgeError> {
        let globals = self.lua.globals();
        if let Some(this) = self.base.self_ref() {
            let gom = self.bridge().wrap_object(ObjectHandle::unmanaged(&this))?;
            globals.set(GOM_GLOBAL, gom)?;
        }

        let print = self.lua.create_function(|lua, args: MultiValue| {
            let line = display_values(lua, args)?;
            tracing::info!(target: targets::LUA, "{line}");
            Ok(())
        })?;
        globals.set("print", print)?;

        let help = self.lua.create_function(|lua, value: Value| {
            match userdata::help(&value) {
                Some(doc) => tracing::info!(target: targets::LUA, "\n{doc}"),
                None => {
                    let line = display_values(lua, MultiValue::from_iter([value]))?;
                    tracing::info!(target: targets::LUA, "{line} : no documentation");
                }
            }
            Ok(())
        })?;
        globals.set("help", help)?;
        Ok(())
    }

    /// Chunk name of a command: its first line, as Lua quotes strings.
    fn chunk_name(command: &str) -> String {
        let head = command.lines().next().unwrap_or_default();
        let head: String = head
            .chars()
            .filter(|c| !matches!(c, ']' | '"'))
            .take(40)
            .collect();
        format!("=[string \"{head}\"]")
    }

    fn script_error(err: mlua::Error) -> InterpreterError {
        LuaBridgeError::from(err).into()
    }
}

/// `tostring()` of each value, tab-separated.
fn display_values(lua: &Lua, values: MultiValue) -> mlua::Result<String> {
    let tostring: mlua::Function = lua.globals().get("tostring")?;
    let mut parts = Vec::new();
    for value in values {
        let text: String = tostring.call(value)?;
        parts.push(text);
    }
    Ok(parts.join("\t"))
}

fn global_names(lua: &Lua) -> mlua::Result<HashSet<String>> {
    let mut names = HashSet::new();
    for pair in lua.globals().pairs::<Value, Value>() {
        if let (Value::String(name), _) = pair? {
            names.insert(name.to_str()?.to_string());
        }
    }
    Ok(names)
}

fn meta_class(meta: &Meta) -> Arc<MetaClass> {
    if let Some(class) = meta.resolve_class(CLASS_NAME) {
        return class;
    }
    let class = MetaClass::builder(CLASS_NAME)
        .super_class(meta.interpreter_class())
        .type_id::<LuaInterpreter>()
        .help("The Lua 5.4 interpreter.")
        .build();
    meta.register_class(&class);
    class
}

impl Object for LuaInterpreter {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn as_interpreter(&self) -> Option<&dyn Interpreter> {
        Some(self)
    }
}

impl Interpreter for LuaInterpreter {
    fn core(&self) -> &InterpreterCore {
        &self.core
    }

    fn language(&self) -> &str {
        "Lua"
    }

    fn filename_extension(&self) -> &str {
        "lua"
    }

    fn reset(&self) -> Result<(), InterpreterError> {
        let globals = self.lua.globals();
        let defined: Vec<String> = global_names(&self.lua)
            .map_err(Self::script_error)?
            .into_iter()
            .filter(|name| !self.builtins.contains(name))
            .collect();
        for name in &defined {
            globals.raw_set(name.as_str(), Value::Nil).map_err(Self::script_error)?;
        }
        self.install()?;
        self.lua.gc_collect().map_err(Self::script_error)?;
        tracing::debug!(target: targets::LUA, cleared = defined.len(), "interpreter reset");
        Ok(())
    }

    fn execute_command(&self, command: &str) -> Result<(), InterpreterError> {
        let _fpe = FpeGuard::new();
        self.lua
            .load(command)
            .set_name(Self::chunk_name(command))
            .exec()
            .map_err(Self::script_error)
    }

    fn eval(&self, expression: &str) -> Result<Any, InterpreterError> {
        let value: Value = {
            let _fpe = FpeGuard::new();
            self.lua
                .load(expression)
                .set_name(Self::chunk_name(expression))
                .eval()
                .map_err(Self::script_error)?
        };
        Ok(self.bridge().to_native(value, &ExpectedType::Any)?)
    }

    fn bind(&self, name: &str, value: &Any) -> Result<(), InterpreterError> {
        let value = self.bridge().to_foreign(value, &ExpectedType::Any)?;
        self.lua
            .globals()
            .set(name, value)
            .map_err(Self::script_error)
    }

    fn resolve(&self, name: &str) -> Option<Any> {
        let value: Value = self.lua.globals().get(name).ok()?;
        if value.is_nil() {
            return None;
        }
        self.bridge().to_native(value, &ExpectedType::Any).ok()
    }

    fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = global_names(&self.lua).unwrap_or_default().into_iter().collect();
        names.sort();
        names
    }

    /// `{name=value, ...}`: Lua passes a table constructor as the single
    /// argument of `f{...}`.
    fn name_value_pair_call(&self, args: &ArgList) -> String {
        format!("{{{args}}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter() -> Arc<LuaInterpreter> {
        LuaInterpreter::new(&Arc::new(Meta::new()), &GomConfig::default()).unwrap()
    }

    #[test]
    fn test_eval_and_bind() {
        let lua = interpreter();
        assert_eq!(lua.eval("1 + 2").unwrap(), Any::Int(3));
        lua.bind("answer", &Any::Double(4.5)).unwrap();
        assert_eq!(lua.resolve("answer"), Some(Any::Double(4.5)));
        assert_eq!(lua.resolve("nothing"), None);
    }

    #[test]
    fn test_error_message_is_stripped() {
        let lua = interpreter();
        let err = lua.execute("error('bad thing')", false, false).unwrap_err();
        assert_eq!(err.display_message(), "bad thing");
    }

    #[test]
    fn test_reset_keeps_builtins() {
        let lua = interpreter();
        lua.execute_command("counter = 1").unwrap();
        assert!(lua.list_names().contains(&"counter".to_string()));
        lua.reset().unwrap();
        assert_eq!(lua.resolve("counter"), None);
        assert!(lua.resolve(GOM_GLOBAL).is_some());
        assert_eq!(lua.eval("math.floor(2.5)").unwrap(), Any::Int(2));
    }

    #[test]
    fn test_name_value_pair_call() {
        let lua = interpreter();
        let args = ArgList::new().with("x", 1).with("name", "a");
        assert_eq!(lua.name_value_pair_call(&args), "{x=1, name='a'}");
    }
}
