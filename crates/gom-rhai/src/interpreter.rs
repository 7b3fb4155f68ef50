//! The Rhai interpreter object.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use gom_core::logging::targets;
use gom_core::{
    new_object, Any, ArgList, Bridge, ExpectedType, FpeGuard, GomConfig, Interpreter,
    InterpreterCore, InterpreterError, Meta, MetaClass, MetaMember, Object, ObjectBase,
    ObjectHandle,
};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, Scope, AST};

use crate::bridge::RhaiBridge;
use crate::error::RhaiBridgeError;
use crate::object::{register_method, register_object_api, register_property, RhaiObject};

/// Scope variable holding the interpreter object.
pub const GOM_VARIABLE: &str = "gom";

const CLASS_NAME: &str = "RhaiInterpreter";

/// A value bound from native code while a command runs.
struct Binding {
    name: String,
    value: Dynamic,
    /// Written into the running scope.
    applied: bool,
}

/// Bookkeeping for one running command.
///
/// The engine owns the scope of a running command, so native code works on
/// `view`: the variables as of the command's last use of `gom`, with the
/// bindings made since laid over them. Bindings reach the scope at the
/// next top-level variable access, or when the command ends.
struct Frame {
    view: Scope<'static>,
    bindings: Vec<Binding>,
}

impl Frame {
    fn new(view: Scope<'static>) -> Self {
        Self {
            view,
            bindings: Vec::new(),
        }
    }

    fn bind(&mut self, name: &str, value: Dynamic) {
        self.view.set_or_push(name, value.clone());
        self.bindings.push(Binding {
            name: name.to_string(),
            value,
            applied: false,
        });
    }

    /// Write pending bindings into the running `scope`.
    ///
    /// New variables are only pushed when the current access has no
    /// precomputed scope offset (`index == 0`); pushing shifts offsets.
    fn apply_to_running(&mut self, scope: &mut Scope<'_>, index: usize) {
        for binding in self.bindings.iter_mut().filter(|binding| !binding.applied) {
            match scope.is_constant(&binding.name) {
                Some(false) => {
                    scope.set_value(binding.name.as_str(), binding.value.clone());
                    binding.applied = true;
                }
                None if index == 0 => {
                    scope.push_dynamic(binding.name.as_str(), binding.value.clone());
                    binding.applied = true;
                }
                _ => {}
            }
        }
    }

    fn refresh_view(&mut self, scope: &Scope<'_>) {
        self.view = snapshot(scope);
        for binding in self.bindings.iter().filter(|binding| !binding.applied) {
            self.view.set_or_push(binding.name.as_str(), binding.value.clone());
        }
    }

    /// Write the remaining bindings into the scope of a finished command.
    fn apply_to_finished(&self, scope: &mut Scope<'static>) {
        for binding in &self.bindings {
            if !binding.applied {
                scope.set_or_push(binding.name.as_str(), binding.value.clone());
            } else if !scope.contains(&binding.name) {
                // pushed inside a block that has since ended
                scope.push_dynamic(binding.name.as_str(), binding.value.clone());
            }
        }
    }
}

/// Copy of `scope` with the same shadowing order and constness.
fn snapshot(scope: &Scope<'_>) -> Scope<'static> {
    let mut entries: Vec<(String, bool, Dynamic)> = scope
        .iter_raw()
        .map(|(name, constant, value)| (name.to_string(), constant, value.clone()))
        .collect();
    // iter_raw walks from the last entry
    entries.reverse();
    entries.into_iter().collect()
}

/// The engine, scope and function library behind a [`RhaiInterpreter`].
///
/// Callables created from Rhai function pointers hold the runtime weakly
/// and run on its engine.
pub struct RhaiRuntime {
    meta: Arc<Meta>,
    engine: RwLock<Engine>,
    /// Script functions defined by the commands run so far.
    library: Mutex<AST>,
    /// Variables between commands. Empty while a command runs.
    scope: Mutex<Scope<'static>>,
    /// Running commands, innermost last.
    frames: Mutex<Vec<Frame>>,
    /// Held by the thread running commands; nested commands re-enter it.
    running: ReentrantMutex<()>,
    /// Reflected names the engine has functions for.
    registered: Mutex<HashSet<String>>,
    this: Weak<RhaiRuntime>,
}

impl RhaiRuntime {
    fn new(meta: &Arc<Meta>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let mut engine = Engine::new();
            register_object_api(&mut engine, &RhaiBridge::new(meta, this.clone()));
            engine.on_print(|text| tracing::info!(target: targets::RHAI, "{text}"));
            engine.on_debug(|text, source, position| {
                tracing::debug!(target: targets::RHAI, source = source.unwrap_or_default(), "{position}: {text}");
            });
            let runtime = this.clone();
            #[allow(deprecated)]
            engine.on_var(move |name, index, mut context| {
                // script function bodies have their own scope
                if context.call_level() == 0 {
                    if let Some(runtime) = runtime.upgrade() {
                        runtime.on_variable(name, index, context.scope_mut());
                    }
                }
                Ok(None)
            });
            Self {
                meta: Arc::clone(meta),
                engine: RwLock::new(engine),
                library: Mutex::new(AST::empty()),
                scope: Mutex::new(Scope::new()),
                frames: Mutex::new(Vec::new()),
                running: ReentrantMutex::new(()),
                registered: Mutex::new(HashSet::new()),
                this: this.clone(),
            }
        })
    }

    pub fn bridge(&self) -> RhaiBridge {
        RhaiBridge::new(&self.meta, self.this.clone())
    }

    /// Top-level variable access in the innermost running command.
    fn on_variable(&self, name: &str, index: usize, scope: &mut Scope<'_>) {
        let mut frames = self.frames.lock();
        let Some(frame) = frames.last_mut() else {
            return;
        };
        frame.apply_to_running(scope, index);
        if name == GOM_VARIABLE {
            frame.refresh_view(scope);
        }
    }

    /// Register functions for the members of classes registered since the
    /// last command.
    ///
    /// Skipped while a script is running on this engine (nested calls);
    /// the indexers still reach every property.
    fn sync_members(&self) {
        let Some(mut engine) = self.engine.try_write() else {
            tracing::trace!(target: targets::RHAI, "engine in use, member functions deferred to the next command");
            return;
        };
        let bridge = self.bridge();
        let mut registered = self.registered.lock();
        let before = registered.len();
        for class in self.meta.list_classes() {
            for member in class.members(false) {
                let name = member.name().to_string();
                match member {
                    MetaMember::Property(_) => {
                        if registered.insert(format!("property {name}")) {
                            register_property(&mut engine, &bridge, &name);
                        }
                        for accessor in [format!("get_{name}"), format!("set_{name}")] {
                            if registered.insert(accessor.clone()) {
                                register_method(&mut engine, &bridge, &accessor);
                            }
                        }
                    }
                    MetaMember::Slot(_) | MetaMember::Signal(_) => {
                        if registered.insert(name.clone()) {
                            register_method(&mut engine, &bridge, &name);
                        }
                    }
                    MetaMember::Constructor(_) => {}
                }
            }
        }
        if registered.len() > before {
            tracing::trace!(target: targets::RHAI, added = registered.len() - before, "registered member functions");
        }
    }

    /// Compile and run `script`, returning the value of its last statement.
    ///
    /// A command run while another one is running (`gom.execute(...)` from
    /// a script) works on a copy of the caller's variables; the variables
    /// it defines are added to the caller's.
    fn run(&self, script: &str) -> Result<Dynamic, RhaiBridgeError> {
        let _running = self.running.lock();
        self.sync_members();

        let caller = self.frames.lock().last().map(|frame| frame.view.clone());
        let known: Option<HashSet<String>> = caller
            .as_ref()
            .map(|view| view.iter_raw().map(|(name, _, _)| name.to_string()).collect());
        let mut scope = match caller {
            Some(view) => view,
            None => std::mem::take(&mut *self.scope.lock()),
        };

        self.frames.lock().push(Frame::new(scope.clone()));
        let result = self.eval(&mut scope, script);
        if let Some(frame) = self.frames.lock().pop() {
            frame.apply_to_finished(&mut scope);
        }

        match known {
            Some(known) => {
                let mut frames = self.frames.lock();
                if let Some(caller) = frames.last_mut() {
                    let mut seen = HashSet::new();
                    for (name, _, value) in scope.iter_raw() {
                        if !known.contains(name) && seen.insert(name) {
                            caller.bind(name, value.clone());
                        }
                    }
                }
            }
            None => *self.scope.lock() = scope,
        }
        result
    }

    fn eval(&self, scope: &mut Scope<'static>, script: &str) -> Result<Dynamic, RhaiBridgeError> {
        let engine = self.engine.read_recursive();
        let ast = engine.compile_with_scope(scope, script)?;
        let ast = {
            let mut library = self.library.lock();
            library.combine(ast.clone_functions_only());
            library.merge(&ast)
        };
        let _fpe = FpeGuard::new();
        Ok(engine.eval_ast_with_scope::<Dynamic>(scope, &ast)?)
    }

    /// Set a variable; visible to the running command, if any.
    fn bind(&self, name: &str, value: Dynamic) {
        let _running = self.running.lock();
        match self.frames.lock().last_mut() {
            Some(frame) => frame.bind(name, value),
            None => {
                self.scope.lock().set_or_push(name, value);
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<Dynamic> {
        let _running = self.running.lock();
        match self.frames.lock().last() {
            Some(frame) => frame.view.get_value::<Dynamic>(name),
            None => self.scope.lock().get_value::<Dynamic>(name),
        }
    }

    fn names(&self) -> Vec<String> {
        let _running = self.running.lock();
        let collect = |scope: &Scope<'static>| -> Vec<String> {
            scope.iter_raw().map(|(name, _, _)| name.to_string()).collect()
        };
        let mut names = match self.frames.lock().last() {
            Some(frame) => collect(&frame.view),
            None => collect(&self.scope.lock()),
        };
        names.sort();
        names.dedup();
        names
    }

    /// Call a function pointer with the functions defined so far.
    pub(crate) fn call_function(
        &self,
        function: &FnPtr,
        args: Vec<Dynamic>,
    ) -> Result<Dynamic, Box<EvalAltResult>> {
        let engine = self.engine.read_recursive();
        let library = self.library.lock().clone();
        function.call::<Dynamic>(&engine, &library, args)
    }
}

/// A Rhai engine exposed as an [`Interpreter`].
///
/// Variables declared with `let` and functions declared with `fn` persist
/// from one command to the next. The interpreter itself is the variable
/// `gom`, wrapped without a reference. `print` and `debug` go to the log
/// under the `gom_rhai` target.
pub struct RhaiInterpreter {
    base: ObjectBase,
    core: InterpreterCore,
    runtime: Arc<RhaiRuntime>,
}

impl RhaiInterpreter {
    pub fn new(meta: &Arc<Meta>, config: &GomConfig) -> Arc<Self> {
        let interpreter = new_object(Self {
            base: ObjectBase::new(meta_class(meta)),
            core: InterpreterCore::from_config(Arc::clone(meta), config),
            runtime: RhaiRuntime::new(meta),
        });
        interpreter.push_gom(&mut interpreter.runtime.scope.lock());
        tracing::debug!(target: targets::RHAI, object = %interpreter.base.string_id(), "Rhai interpreter ready");
        interpreter
    }

    pub fn runtime(&self) -> &Arc<RhaiRuntime> {
        &self.runtime
    }

    pub fn bridge(&self) -> RhaiBridge {
        self.runtime.bridge()
    }

    fn push_gom(&self, scope: &mut Scope<'static>) {
        if let Some(this) = self.base.self_ref() {
            let gom = RhaiObject::new(ObjectHandle::unmanaged(&this), self.core.meta());
            scope.push(GOM_VARIABLE, gom);
        }
    }
}

fn meta_class(meta: &Meta) -> Arc<MetaClass> {
    if let Some(class) = meta.resolve_class(CLASS_NAME) {
        return class;
    }
    let class = MetaClass::builder(CLASS_NAME)
        .super_class(meta.interpreter_class())
        .type_id::<RhaiInterpreter>()
        .help("The Rhai interpreter.")
        .build();
    meta.register_class(&class);
    class
}

impl Object for RhaiInterpreter {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn as_interpreter(&self) -> Option<&dyn Interpreter> {
        Some(self)
    }
}

impl Interpreter for RhaiInterpreter {
    fn core(&self) -> &InterpreterCore {
        &self.core
    }

    fn language(&self) -> &str {
        "Rhai"
    }

    fn filename_extension(&self) -> &str {
        "rhai"
    }

    fn reset(&self) -> Result<(), InterpreterError> {
        let _running = self.runtime.running.lock();
        if !self.runtime.frames.lock().is_empty() {
            return Err(RhaiBridgeError::Busy.into());
        }
        let mut scope = self.runtime.scope.lock();
        let cleared = scope.len();
        scope.clear();
        *self.runtime.library.lock() = AST::empty();
        self.push_gom(&mut scope);
        tracing::debug!(target: targets::RHAI, cleared, "interpreter reset");
        Ok(())
    }

    fn execute_command(&self, command: &str) -> Result<(), InterpreterError> {
        self.runtime.run(command)?;
        Ok(())
    }

    fn eval(&self, expression: &str) -> Result<Any, InterpreterError> {
        let value = self.runtime.run(expression)?;
        Ok(self.bridge().to_native(value, &ExpectedType::Any)?)
    }

    fn bind(&self, name: &str, value: &Any) -> Result<(), InterpreterError> {
        let value = self.bridge().to_foreign(value, &ExpectedType::Any)?;
        self.runtime.bind(name, value);
        Ok(())
    }

    fn resolve(&self, name: &str) -> Option<Any> {
        let value = self.runtime.lookup(name)?;
        self.bridge().to_native(value, &ExpectedType::Any).ok()
    }

    fn list_names(&self) -> Vec<String> {
        self.runtime.names()
    }

    /// `#{name: value, ...}`: an object map as the single argument.
    fn name_value_pair_call(&self, args: &ArgList) -> String {
        let fields: Vec<String> = args
            .iter()
            .map(|(name, value)| match value {
                Any::String(s) => format!("{name}: {s:?}"),
                other => format!("{name}: {other}"),
            })
            .collect();
        format!("#{{{}}}", fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter() -> Arc<RhaiInterpreter> {
        RhaiInterpreter::new(&Arc::new(Meta::new()), &GomConfig::default())
    }

    #[test]
    fn test_eval_and_bind() {
        let rhai = interpreter();
        assert_eq!(rhai.eval("1 + 2").unwrap(), Any::Int(3));
        rhai.bind("answer", &Any::Double(4.5)).unwrap();
        assert_eq!(rhai.resolve("answer"), Some(Any::Double(4.5)));
        assert_eq!(rhai.resolve("nothing"), None);
    }

    #[test]
    fn test_definitions_persist_between_commands() {
        let rhai = interpreter();
        rhai.execute_command("fn double(x) { x * 2 }").unwrap();
        rhai.execute_command("let base = 20;").unwrap();
        assert_eq!(rhai.eval("double(base + 1)").unwrap(), Any::Int(42));
    }

    #[test]
    fn test_error_message() {
        let rhai = interpreter();
        let err = rhai.execute("throw \"bad thing\";", false, false).unwrap_err();
        assert_eq!(err.display_message(), "bad thing");
    }

    #[test]
    fn test_reset_keeps_gom() {
        let rhai = interpreter();
        rhai.execute_command("let counter = 1; fn f() { 1 }").unwrap();
        assert!(rhai.list_names().contains(&"counter".to_string()));
        rhai.reset().unwrap();
        assert_eq!(rhai.resolve("counter"), None);
        assert!(rhai.eval("f()").is_err());
        assert!(rhai.resolve(GOM_VARIABLE).is_some());
        assert_eq!(rhai.eval("gom.language").unwrap(), Any::from("Rhai"));
    }

    #[test]
    fn test_nested_execution_adds_variables() {
        let rhai = interpreter();
        rhai.execute_command("let outer = 2; gom.execute(\"let inner = outer * 3;\"); let both = outer + inner;")
            .unwrap();
        assert_eq!(rhai.resolve("inner"), Some(Any::Int(6)));
        assert_eq!(rhai.resolve("both"), Some(Any::Int(8)));
    }

    #[test]
    fn test_bind_while_running() {
        let rhai = interpreter();
        rhai.execute_command("let total = 1;").unwrap();
        rhai.execute_command(
            r#"
            gom.execute("let extra = 5;");
            total += extra;
            if true { gom.execute("let scoped = 1;"); }
            "#,
        )
        .unwrap();
        assert_eq!(rhai.resolve("total"), Some(Any::Int(6)));
        assert_eq!(rhai.resolve("scoped"), Some(Any::Int(1)));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_member_sync_deferred_while_running() {
        let rhai = interpreter();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            rhai.execute_command("let one = 1;").unwrap();
            assert!(!String::from_utf8_lossy(&captured.0.lock()).contains("deferred"));
            rhai.execute_command("gom.execute(\"let two = one + 1;\");").unwrap();
        });
        let output = String::from_utf8_lossy(&captured.0.lock()).into_owned();
        assert!(
            output.contains("gom_rhai: engine in use, member functions deferred to the next command"),
            "{output}"
        );
        assert_eq!(rhai.resolve("two"), Some(Any::Int(2)));
    }

    #[test]
    fn test_name_value_pair_call() {
        let rhai = interpreter();
        let args = ArgList::new().with("x", 1).with("name", "a");
        assert_eq!(rhai.name_value_pair_call(&args), "#{x: 1, name: \"a\"}");
    }
}
