//! Embedded interpreters.
//!
//! An interpreter is itself a reflected object: scripts reach the runtime
//! through the slots of the `Interpreter` class (`gom.create(...)`,
//! `gom.connect(...)`, ...), bound under a global name by each language
//! bridge.
//!
//! The language-independent state (registry, history, environment) lives in
//! [`InterpreterCore`]; bridges implement the [`Interpreter`] trait on top of
//! it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::any::Any;
use crate::arg_list::ArgList;
use crate::callable::Request;
use crate::config::GomConfig;
use crate::dynamic::DynamicClassBuilder;
use crate::error::{InterpreterError, InvokeError, InvokeResult};
use crate::logging::targets;
use crate::meta_class::MetaClass;
use crate::meta_member::{MetaArg, MetaMethod, MetaProperty, ARG_LIST_TYPE};
use crate::object::{object_cast, Object, ObjectRef};
use crate::registry::Meta;

/// State shared by every interpreter implementation.
pub struct InterpreterCore {
    meta: Arc<Meta>,
    history: Mutex<Vec<String>>,
    history_limit: Option<usize>,
    environment: RwLock<BTreeMap<String, String>>,
    log_commands: bool,
}

impl InterpreterCore {
    pub fn new(meta: Arc<Meta>) -> Self {
        Self {
            meta,
            history: Mutex::new(Vec::new()),
            history_limit: None,
            environment: RwLock::new(BTreeMap::new()),
            log_commands: false,
        }
    }

    pub fn from_config(meta: Arc<Meta>, config: &GomConfig) -> Self {
        Self {
            meta,
            history: Mutex::new(Vec::new()),
            history_limit: config.history_limit,
            environment: RwLock::new(config.environment.clone()),
            log_commands: config.log_commands,
        }
    }

    pub fn meta(&self) -> &Arc<Meta> {
        &self.meta
    }

    pub fn log_commands(&self) -> bool {
        self.log_commands
    }

    /// Record a command; the oldest entries go once the limit is reached.
    pub fn add_to_history(&self, command: &str) {
        let mut history = self.history.lock();
        history.push(command.to_string());
        if let Some(limit) = self.history_limit {
            let excess = history.len().saturating_sub(limit);
            history.drain(..excess);
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    pub fn nb_history_lines(&self) -> usize {
        self.history.lock().len()
    }

    pub fn history_line(&self, index: usize) -> Option<String> {
        self.history.lock().get(index).cloned()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn environment_value(&self, name: &str) -> Option<String> {
        self.environment.read().get(name).cloned()
    }

    pub fn set_environment_value(&self, name: impl Into<String>, value: impl Into<String>) {
        self.environment.write().insert(name.into(), value.into());
    }
}

/// An embedded scripting runtime.
///
/// Implementations return `Some(self)` from [`Object::as_interpreter`] and
/// derive their meta class from `Interpreter`.
pub trait Interpreter: Object {
    fn core(&self) -> &InterpreterCore;

    /// Name of the language, e.g. `Lua`.
    fn language(&self) -> &str;

    /// Extension of script files, without the dot.
    fn filename_extension(&self) -> &str;

    /// Discard every script-side definition and rebind the interpreter.
    fn reset(&self) -> Result<(), InterpreterError>;

    /// Run a chunk of code.
    fn execute_command(&self, command: &str) -> Result<(), InterpreterError>;

    /// Evaluate an expression.
    fn eval(&self, expression: &str) -> Result<Any, InterpreterError>;

    /// Bind a global name.
    fn bind(&self, name: &str, value: &Any) -> Result<(), InterpreterError>;

    /// Value of a global name, `None` when unbound.
    fn resolve(&self, name: &str) -> Option<Any>;

    /// Global names currently bound.
    fn list_names(&self) -> Vec<String>;

    /// How a call with named arguments is written in this language.
    fn name_value_pair_call(&self, args: &ArgList) -> String;

    /// Run a command, optionally logging it and recording it in the history.
    ///
    /// Script errors are logged with the position prefix stripped and
    /// returned.
    fn execute(&self, command: &str, save_in_history: bool, log: bool) -> Result<(), InterpreterError> {
        if log && self.core().log_commands() {
            tracing::debug!(target: targets::INTERPRETER, language = %self.language(), "{command}");
        }
        match self.execute_command(command) {
            Ok(()) => {
                if save_in_history {
                    self.core().add_to_history(command);
                }
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    target: targets::INTERPRETER,
                    language = %self.language(),
                    "{}",
                    err.display_message()
                );
                Err(err)
            }
        }
    }

    fn execute_file(&self, path: &Path) -> Result<(), InterpreterError> {
        let source = std::fs::read_to_string(path).map_err(|source| InterpreterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(target: targets::INTERPRETER, path = %path.display(), "executing file");
        self.execute(&source, false, false)
    }
}

fn interpreter(obj: &dyn Object) -> InvokeResult<&dyn Interpreter> {
    obj.as_interpreter().ok_or_else(|| InvokeError::TargetType {
        expected: "Interpreter".to_string(),
        found: obj.meta_class().name().to_string(),
    })
}

fn script_failure(err: InterpreterError) -> InvokeError {
    match err {
        InterpreterError::Invoke(err) => err,
        other => InvokeError::Failed(other.display_message()),
    }
}

/// `Interpreter::create`: `classname` selects the class, the remaining
/// arguments go to its constructor.
fn create_object(meta: &Meta, args: &ArgList) -> InvokeResult<Any> {
    let classname: String = args.require("Interpreter::create", "classname")?;
    let class = meta
        .resolve_class(&classname)
        .ok_or_else(|| Meta::unknown_class(&classname))?;
    let mut ctor_args = args.clone();
    if let Some(index) = ctor_args.find_arg_index("classname") {
        ctor_args.delete_ith_arg(index);
    }
    class.create(&ctor_args).map(Any::Object)
}

/// `Interpreter::connect`: the signal comes as a request on its source.
fn connect_request(signal: &ObjectRef, callable: ObjectRef) -> InvokeResult<Any> {
    let request = object_cast::<Request>(signal.as_ref()).ok_or_else(|| InvokeError::TargetType {
        expected: "Request".to_string(),
        found: signal.meta_class().name().to_string(),
    })?;
    if !request.method().is_signal() {
        return Err(InvokeError::TargetType {
            expected: "signal".to_string(),
            found: request.method().qualified_name(),
        });
    }
    let source = request.object().get()?;
    source.connect_signal_to_callable(request.method().name(), callable)?;
    Ok(Any::Bool(true))
}

fn dynamic_args(spec: &str) -> Vec<MetaArg> {
    spec.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| MetaArg::new(name, "Any"))
        .collect()
}

fn builder_failure(err: crate::error::GomError) -> InvokeError {
    match err {
        crate::error::GomError::Invoke(err) => err,
        other => InvokeError::Failed(other.to_string()),
    }
}

pub(crate) fn build_interpreter_class(object_class: &Arc<MetaClass>) -> Arc<MetaClass> {
    let class = MetaClass::builder("Interpreter")
        .super_class(object_class)
        .abstract_class()
        .help("An embedded scripting language, bound to the global gom.")
        .build();

    class.add_property(MetaProperty::new("language", &class, "String", |obj| {
        Ok(Any::from(interpreter(obj)?.language()))
    }));
    class.add_property(MetaProperty::new("nb_history_lines", &class, "usize", |obj| {
        Ok(Any::from(interpreter(obj)?.core().nb_history_lines()))
    }));

    class.add_slot(
        MetaMethod::slot("create", &class, "Object*", |obj, args| {
            create_object(interpreter(obj)?.core().meta(), args)
        })
        .with_arg(MetaArg::new("args", ARG_LIST_TYPE)),
    );
    class.add_slot(
        MetaMethod::slot("execute", &class, "()", |obj, args| {
            let command: String = args.require("Interpreter::execute", "command")?;
            interpreter(obj)?
                .execute(&command, false, true)
                .map(|()| Any::Null)
                .map_err(script_failure)
        })
        .with_arg(MetaArg::new("command", "String")),
    );
    class.add_slot(
        MetaMethod::slot("bind_object", &class, "()", |obj, args| {
            let name: String = args.require("Interpreter::bind_object", "name")?;
            let object: Option<ObjectRef> = args.require("Interpreter::bind_object", "object")?;
            interpreter(obj)?
                .bind(&name, &Any::from(object))
                .map(|()| Any::Null)
                .map_err(script_failure)
        })
        .with_arg(MetaArg::new("name", "String"))
        .with_arg(MetaArg::new("object", "Object*")),
    );
    class.add_slot(
        MetaMethod::slot("resolve_object", &class, "Object*", |obj, args| {
            let name: String = args.require("Interpreter::resolve_object", "name")?;
            Ok(match interpreter(obj)?.resolve(&name) {
                Some(value @ Any::Object(_)) => value,
                _ => Any::Null,
            })
        })
        .with_arg(MetaArg::new("name", "String")),
    );
    class.add_slot(
        MetaMethod::slot("is_a", &class, "bool", |_, args| {
            let object: Option<ObjectRef> = args.require("Interpreter::is_a", "object")?;
            let classname: String = args.require("Interpreter::is_a", "classname")?;
            Ok(Any::Bool(object.is_some_and(|o| o.is_a(&classname))))
        })
        .with_arg(MetaArg::new("object", "Object*"))
        .with_arg(MetaArg::new("classname", "String")),
    );
    class.add_slot(
        MetaMethod::slot("connect", &class, "bool", |_, args| {
            let signal: ObjectRef = args.require("Interpreter::connect", "signal")?;
            let callable: ObjectRef = args.require("Interpreter::connect", "callable")?;
            connect_request(&signal, callable)
        })
        .with_arg(MetaArg::new("signal", "Request*"))
        .with_arg(MetaArg::new("callable", "Callable*")),
    );
    class.add_slot(
        MetaMethod::slot("class_doc", &class, "String", |obj, args| {
            let classname: String = args.require("Interpreter::class_doc", "classname")?;
            let meta = interpreter(obj)?.core().meta();
            meta.resolve_class(&classname)
                .map(|class| Any::String(class.doc()))
                .ok_or_else(|| Meta::unknown_class(&classname))
        })
        .with_arg(MetaArg::new("classname", "String")),
    );
    class.add_slot(MetaMethod::slot("list_classes", &class, "String", |obj, _| {
        let meta = interpreter(obj)?.core().meta();
        let names: Vec<String> = meta
            .list_classes()
            .iter()
            .map(|class| class.name().to_string())
            .collect();
        Ok(Any::String(names.join("\n")))
    }));
    class.add_slot(
        MetaMethod::slot("create_class", &class, "bool", |obj, args| {
            let name: String = args.require("Interpreter::create_class", "name")?;
            let super_name: String = args.require("Interpreter::create_class", "super_class")?;
            let is_abstract: bool = args.require("Interpreter::create_class", "is_abstract")?;
            let meta = interpreter(obj)?.core().meta();
            let super_class = meta
                .resolve_class(&super_name)
                .ok_or_else(|| Meta::unknown_class(&super_name))?;
            DynamicClassBuilder::new(meta, &name, Some(&super_class), is_abstract)
                .map(|_| Any::Bool(true))
                .map_err(builder_failure)
        })
        .with_arg(MetaArg::new("name", "String"))
        .with_arg(MetaArg::new("super_class", "String").with_default("DynamicObject"))
        .with_arg(MetaArg::new("is_abstract", "bool").with_default(false)),
    );
    class.add_slot(
        MetaMethod::slot("add_property", &class, "bool", |obj, args| {
            let classname: String = args.require("Interpreter::add_property", "classname")?;
            let name: String = args.require("Interpreter::add_property", "name")?;
            let type_name: String = args.require("Interpreter::add_property", "type")?;
            let default: Any = args.require("Interpreter::add_property", "default")?;
            let meta = interpreter(obj)?.core().meta();
            let builder = DynamicClassBuilder::extend(meta, &classname).map_err(builder_failure)?;
            builder.add_property(&name, &type_name, default);
            Ok(Any::Bool(true))
        })
        .with_arg(MetaArg::new("classname", "String"))
        .with_arg(MetaArg::new("name", "String"))
        .with_arg(MetaArg::new("type", "String").with_default("Any"))
        .with_arg(MetaArg::new("default", "Any").with_default(Any::Null)),
    );
    class.add_slot(
        MetaMethod::slot("add_slot", &class, "bool", |obj, args| {
            let classname: String = args.require("Interpreter::add_slot", "classname")?;
            let name: String = args.require("Interpreter::add_slot", "name")?;
            let action: ObjectRef = args.require("Interpreter::add_slot", "action")?;
            let arg_names: String = args.require("Interpreter::add_slot", "args")?;
            let meta = interpreter(obj)?.core().meta();
            let builder = DynamicClassBuilder::extend(meta, &classname).map_err(builder_failure)?;
            builder.add_slot(&name, action, dynamic_args(&arg_names))?;
            Ok(Any::Bool(true))
        })
        .with_arg(MetaArg::new("classname", "String"))
        .with_arg(MetaArg::new("name", "String"))
        .with_arg(MetaArg::new("action", "Callable*"))
        .with_arg(MetaArg::new("args", "String").with_default("")),
    );
    class.add_slot(
        MetaMethod::slot("add_signal", &class, "bool", |obj, args| {
            let classname: String = args.require("Interpreter::add_signal", "classname")?;
            let name: String = args.require("Interpreter::add_signal", "name")?;
            let arg_names: String = args.require("Interpreter::add_signal", "args")?;
            let meta = interpreter(obj)?.core().meta();
            let builder = DynamicClassBuilder::extend(meta, &classname).map_err(builder_failure)?;
            builder.add_signal(&name, dynamic_args(&arg_names));
            Ok(Any::Bool(true))
        })
        .with_arg(MetaArg::new("classname", "String"))
        .with_arg(MetaArg::new("name", "String"))
        .with_arg(MetaArg::new("args", "String").with_default("")),
    );
    class.add_slot(
        MetaMethod::slot("get_environment_value", &class, "String", |obj, args| {
            let name: String = args.require("Interpreter::get_environment_value", "name")?;
            Ok(Any::from(interpreter(obj)?.core().environment_value(&name)))
        })
        .with_arg(MetaArg::new("name", "String")),
    );
    class.add_slot(
        MetaMethod::slot("set_environment_value", &class, "()", |obj, args| {
            let name: String = args.require("Interpreter::set_environment_value", "name")?;
            let value: String = args.require("Interpreter::set_environment_value", "value")?;
            interpreter(obj)?.core().set_environment_value(name, value);
            Ok(Any::Null)
        })
        .with_arg(MetaArg::new("name", "String"))
        .with_arg(MetaArg::new("value", "String")),
    );
    class.add_slot(
        MetaMethod::slot("history_line", &class, "String", |obj, args| {
            let index: usize = args.require("Interpreter::history_line", "index")?;
            Ok(Any::from(interpreter(obj)?.core().history_line(index)))
        })
        .with_arg(MetaArg::new("index", "usize")),
    );
    class
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;
    use crate::object::{new_object, ObjectBase};

    /// A toy language: `name = value` binds a string, `fail` raises.
    pub(crate) struct Toy {
        base: ObjectBase,
        core: InterpreterCore,
        globals: Mutex<HashMap<String, Any>>,
    }

    impl Toy {
        pub(crate) fn new(meta: Arc<Meta>) -> Arc<Self> {
            let class = match meta.resolve_class("Toy") {
                Some(class) => class,
                None => {
                    let class = MetaClass::builder("Toy")
                        .super_class(meta.interpreter_class())
                        .build();
                    meta.register_class(&class);
                    class
                }
            };
            new_object(Self {
                base: ObjectBase::new(class),
                core: InterpreterCore::new(meta),
                globals: Mutex::new(HashMap::new()),
            })
        }
    }

    impl Object for Toy {
        fn base(&self) -> &ObjectBase {
            &self.base
        }

        fn as_interpreter(&self) -> Option<&dyn Interpreter> {
            Some(self)
        }
    }

    impl Interpreter for Toy {
        fn core(&self) -> &InterpreterCore {
            &self.core
        }

        fn language(&self) -> &str {
            "Toy"
        }

        fn filename_extension(&self) -> &str {
            "toy"
        }

        fn reset(&self) -> Result<(), InterpreterError> {
            self.globals.lock().clear();
            Ok(())
        }

        fn execute_command(&self, command: &str) -> Result<(), InterpreterError> {
            match command.split_once('=') {
                Some((name, value)) => {
                    self.globals
                        .lock()
                        .insert(name.trim().to_string(), Any::from(value.trim()));
                    Ok(())
                }
                None => Err(InterpreterError::Script(format!(
                    "[string \"{command}\"]:1: syntax error"
                ))),
            }
        }

        fn eval(&self, expression: &str) -> Result<Any, InterpreterError> {
            self.resolve(expression)
                .ok_or_else(|| InterpreterError::Script(format!("{expression} is not bound")))
        }

        fn bind(&self, name: &str, value: &Any) -> Result<(), InterpreterError> {
            self.globals.lock().insert(name.to_string(), value.clone());
            Ok(())
        }

        fn resolve(&self, name: &str) -> Option<Any> {
            self.globals.lock().get(name).cloned()
        }

        fn list_names(&self) -> Vec<String> {
            self.globals.lock().keys().cloned().collect()
        }

        fn name_value_pair_call(&self, args: &ArgList) -> String {
            args.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Toy;
    use super::*;

    use crate::callable::FunctionCallable;
    use crate::object::ObjectHandle;

    fn toy() -> ObjectRef {
        Toy::new(Arc::new(Meta::new()))
    }

    #[test]
    fn test_execute_records_history() {
        let toy = Toy::new(Arc::new(Meta::new()));
        assert!(toy.execute("x = 1", true, true).is_ok());
        assert!(toy.execute("y = 2", false, true).is_ok());
        let err = toy.execute("fail", true, true).unwrap_err();
        assert_eq!(err.display_message(), "syntax error");
        assert_eq!(toy.core().history(), vec!["x = 1".to_string()]);
        assert_eq!(toy.eval("y").unwrap(), Any::from("2"));
    }

    #[test]
    fn test_history_limit() {
        let config = GomConfig {
            history_limit: Some(2),
            ..GomConfig::default()
        };
        let core = InterpreterCore::from_config(Arc::new(Meta::new()), &config);
        for command in ["a", "b", "c"] {
            core.add_to_history(command);
        }
        assert_eq!(core.history(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(core.history_line(0).as_deref(), Some("b"));
    }

    #[test]
    fn test_execute_file() {
        let toy = Toy::new(Arc::new(Meta::new()));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.toy");
        std::fs::write(&path, "answer = 42").unwrap();
        toy.execute_file(&path).unwrap();
        assert_eq!(toy.resolve("answer"), Some(Any::from("42")));
        assert!(matches!(
            toy.execute_file(&dir.path().join("missing.toy")),
            Err(InterpreterError::Io { .. })
        ));
    }

    #[test]
    fn test_create_through_reflection() {
        let gom = toy();
        let args = ArgList::new().with("classname", "Node");
        let node = gom.invoke_method("create", &args).unwrap();
        assert!(node.as_object().is_some_and(|n| n.is_a("Node")));

        let args = ArgList::new().with("classname", "Nowhere");
        assert!(gom.invoke_method("create", &args).is_err());
        assert_eq!(gom.get_property("language"), Ok(Any::from("Toy")));
    }

    #[test]
    fn test_execute_slot_reports_script_error() {
        let gom = toy();
        let ok = gom.invoke_method("execute", &ArgList::new().with("command", "a = b"));
        assert_eq!(ok, Ok(Any::Null));
        let err = gom.invoke_method("execute", &ArgList::new().with("command", "oops"));
        assert_eq!(err, Err(InvokeError::Failed("syntax error".to_string())));
    }

    #[test]
    fn test_environment_and_history_slots() {
        let gom = toy();
        let args = ArgList::new().with("name", "home").with("value", "/data");
        gom.invoke_method("set_environment_value", &args).unwrap();
        let value = gom.invoke_method("get_environment_value", &ArgList::new().with("name", "home"));
        assert_eq!(value, Ok(Any::from("/data")));
        let missing = gom.invoke_method("history_line", &ArgList::new().with("index", 3));
        assert_eq!(missing, Ok(Any::Null));
    }

    #[test]
    fn test_dynamic_class_from_script_slots() {
        let meta = Arc::new(Meta::new());
        let gom: ObjectRef = Toy::new(meta.clone());
        gom.invoke_method("create_class", &ArgList::new().with("name", "Greeter"))
            .unwrap();
        gom.invoke_method(
            "add_property",
            &ArgList::new()
                .with("classname", "Greeter")
                .with("name", "greeting")
                .with("type", "String")
                .with("default", "hello"),
        )
        .unwrap();
        let action: ObjectRef = FunctionCallable::new(&meta, |args: &ArgList| {
            let this: ObjectRef = args.require("greet", "self")?;
            let who: String = args.require("greet", "who")?;
            let greeting = this.get_property("greeting")?.as_string();
            Ok(Any::String(format!("{greeting} {who}")))
        });
        gom.invoke_method(
            "add_slot",
            &ArgList::new()
                .with("classname", "Greeter")
                .with("name", "greet")
                .with("action", action)
                .with("args", "who"),
        )
        .unwrap();

        let greeter = meta.create("Greeter", &ArgList::new()).unwrap();
        let greeting = greeter.invoke_method("greet", &ArgList::new().with("who", "world"));
        assert_eq!(greeting, Ok(Any::from("hello world")));
        let list = gom.invoke_method("list_classes", &ArgList::new()).unwrap();
        assert!(list.as_string().lines().any(|l| l == "Greeter"));
    }

    #[test]
    fn test_connect_signal_request_to_callable() {
        let meta = Arc::new(Meta::new());
        let gom: ObjectRef = Toy::new(meta.clone());
        let builder = DynamicClassBuilder::new(&meta, "Sensor", None, false).unwrap();
        builder.add_signal("fired", vec![MetaArg::new("level", "i64")]);
        let sensor = meta.create("Sensor", &ArgList::new()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let listener: ObjectRef = FunctionCallable::new(&meta, move |args: &ArgList| {
            recorder.lock().push(args.get_arg::<i64>("level"));
            Ok(Any::Null)
        });
        let signal = sensor.meta_class().find_signal("fired").unwrap();
        let request: ObjectRef = Request::new(&meta, ObjectHandle::managed(&sensor), signal);
        let args = ArgList::new().with("signal", request).with("callable", listener);
        assert_eq!(gom.invoke_method("connect", &args), Ok(Any::Bool(true)));

        assert!(sensor.emit_signal("fired", &ArgList::new().with("level", 7)));
        assert_eq!(*seen.lock(), vec![Some(7)]);
    }
}
