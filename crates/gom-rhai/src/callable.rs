//! Rhai function pointers as native callables.

use std::sync::{Arc, Weak};

use gom_core::logging::targets;
use gom_core::{
    new_object, Any, ArgList, Bridge, Callable, ExpectedType, FpeGuard, InvokeError, InvokeResult,
    Meta, MetaClass, Object, ObjectBase,
};
use rhai::{Dynamic, FnPtr, Map};

use crate::error::script_message;
use crate::interpreter::RhaiRuntime;

pub(crate) const CLASS_NAME: &str = "RhaiCallable";

/// A Rhai function (named, anonymous or curried) that native code can
/// invoke.
///
/// The function runs on the engine it was created by. Once that engine is
/// gone, invoking fails with [`InvokeError::Detached`].
pub struct RhaiCallable {
    base: ObjectBase,
    function: FnPtr,
    runtime: Weak<RhaiRuntime>,
}

impl RhaiCallable {
    pub(crate) fn new(meta: &Arc<Meta>, function: FnPtr, runtime: Weak<RhaiRuntime>) -> Arc<Self> {
        new_object(Self {
            base: ObjectBase::new(meta_class(meta)),
            function,
            runtime,
        })
    }

    pub fn function(&self) -> &FnPtr {
        &self.function
    }

    fn arguments(&self, runtime: &RhaiRuntime, args: &ArgList) -> InvokeResult<Vec<Dynamic>> {
        let bridge = runtime.bridge();
        if args.is_empty() || args.has_unnamed_args() {
            return args
                .iter()
                .map(|(_, value)| bridge.to_foreign(value, &ExpectedType::Any))
                .collect();
        }
        let mut map = Map::new();
        for (name, value) in args.iter() {
            map.insert(name.into(), bridge.to_foreign(value, &ExpectedType::Any)?);
        }
        Ok(vec![Dynamic::from_map(map)])
    }
}

/// The `RhaiCallable` meta class, registered on first use.
pub(crate) fn meta_class(meta: &Meta) -> Arc<MetaClass> {
    if let Some(class) = meta.resolve_class(CLASS_NAME) {
        return class;
    }
    let class = MetaClass::builder(CLASS_NAME)
        .super_class(meta.callable_class())
        .type_id::<RhaiCallable>()
        .help("A Rhai function, called with positional arguments or a single object map.")
        .build();
    meta.register_class(&class);
    class
}

impl Object for RhaiCallable {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        Some(self)
    }
}

impl Callable for RhaiCallable {
    /// Unnamed arguments are passed in order; named arguments are passed as
    /// a single object map.
    fn invoke(&self, args: &ArgList) -> InvokeResult<Any> {
        let runtime = self.runtime.upgrade().ok_or(InvokeError::Detached)?;
        let call_args = self.arguments(&runtime, args)?;
        let result = {
            let _fpe = FpeGuard::new();
            runtime.call_function(&self.function, call_args)
        };
        match result {
            Ok(value) => runtime.bridge().guess_native(value),
            Err(err) => {
                let message = script_message(&err);
                tracing::error!(target: targets::RHAI, object = %self.base.string_id(), "{message}");
                Err(InvokeError::Failed(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::RhaiInterpreter;
    use gom_core::{GomConfig, Interpreter};

    fn callable(rhai: &RhaiInterpreter, name: &str) -> gom_core::ObjectRef {
        rhai.resolve(name).and_then(|value| value.as_object().cloned()).unwrap()
    }

    #[test]
    fn test_positional_and_named_calls() {
        let rhai = RhaiInterpreter::new(&Arc::new(Meta::new()), &GomConfig::default());
        rhai.execute_command("let add = |a, b| a + b; let sub = |t| t.a - t.b;")
            .unwrap();

        let add = callable(&rhai, "add");
        assert!(add.is_a(CLASS_NAME));
        let mut args = ArgList::new();
        args.create_unnamed_arg(2);
        args.create_unnamed_arg(3);
        assert_eq!(add.as_callable().unwrap().invoke(&args), Ok(Any::Int(5)));

        let sub = callable(&rhai, "sub");
        let args = ArgList::new().with("a", 10).with("b", 4);
        assert_eq!(sub.as_callable().unwrap().invoke(&args), Ok(Any::Int(6)));
    }

    #[test]
    fn test_script_error_becomes_invoke_error() {
        let rhai = RhaiInterpreter::new(&Arc::new(Meta::new()), &GomConfig::default());
        rhai.execute_command("let fail = || { throw \"boom\"; };").unwrap();
        let fail = callable(&rhai, "fail");
        assert_eq!(
            fail.as_callable().unwrap().invoke(&ArgList::new()),
            Err(InvokeError::Failed("boom".to_string()))
        );
    }

    #[test]
    fn test_detached_after_interpreter_drop() {
        let rhai = RhaiInterpreter::new(&Arc::new(Meta::new()), &GomConfig::default());
        rhai.execute_command("let one = || 1;").unwrap();
        let one = callable(&rhai, "one");
        drop(rhai);
        assert_eq!(
            one.as_callable().unwrap().invoke(&ArgList::new()),
            Err(InvokeError::Detached)
        );
    }
}
