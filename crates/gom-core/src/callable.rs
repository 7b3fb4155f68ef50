//! Callable objects: requests bound to a method, native closures, and (in
//! the bridge crates) functions of an embedded interpreter.

use std::fmt;
use std::sync::Arc;

use crate::any::Any;
use crate::arg_list::ArgList;
use crate::error::{InvokeError, InvokeResult};
use crate::meta_class::MetaClass;
use crate::meta_member::{MetaArg, MetaMethod, MetaProperty, ARG_LIST_TYPE};
use crate::object::{new_object, object_cast, Object, ObjectBase, ObjectHandle};
use crate::registry::Meta;

/// An object that can be invoked with an argument list.
pub trait Callable: Object {
    fn invoke(&self, args: &ArgList) -> InvokeResult<Any>;

    fn doc(&self) -> String {
        self.meta_class().doc()
    }
}

/// A method bound to its target object.
///
/// Scripts obtain requests by reading a method name off an object
/// (`obj.scale`); invoking the request calls the method.
pub struct Request {
    base: ObjectBase,
    object: ObjectHandle,
    method: Arc<MetaMethod>,
}

impl Request {
    pub fn new(meta: &Meta, object: ObjectHandle, method: Arc<MetaMethod>) -> Arc<Self> {
        new_object(Self {
            base: ObjectBase::new(meta.request_class().clone()),
            object,
            method,
        })
    }

    pub fn object(&self) -> &ObjectHandle {
        &self.object
    }

    pub fn method(&self) -> &Arc<MetaMethod> {
        &self.method
    }
}

impl Object for Request {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        Some(self)
    }
}

impl Callable for Request {
    fn invoke(&self, args: &ArgList) -> InvokeResult<Any> {
        let object = self.object.get()?;
        object.invoke_method(self.method.name(), args)
    }

    fn doc(&self) -> String {
        self.method.doc()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("object", &self.object)
            .field("method", &self.method.qualified_name())
            .finish()
    }
}

type NativeFn = dyn Fn(&ArgList) -> InvokeResult<Any> + Send + Sync;

/// A native closure exposed as a callable object.
pub struct FunctionCallable {
    base: ObjectBase,
    function: Box<NativeFn>,
    doc: Option<String>,
}

impl FunctionCallable {
    pub fn new<F>(meta: &Meta, function: F) -> Arc<Self>
    where
        F: Fn(&ArgList) -> InvokeResult<Any> + Send + Sync + 'static,
    {
        new_object(Self {
            base: ObjectBase::new(meta.function_callable_class().clone()),
            function: Box::new(function),
            doc: None,
        })
    }

    pub fn with_doc<F>(meta: &Meta, doc: impl Into<String>, function: F) -> Arc<Self>
    where
        F: Fn(&ArgList) -> InvokeResult<Any> + Send + Sync + 'static,
    {
        new_object(Self {
            base: ObjectBase::new(meta.function_callable_class().clone()),
            function: Box::new(function),
            doc: Some(doc.into()),
        })
    }
}

impl Object for FunctionCallable {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        Some(self)
    }
}

impl Callable for FunctionCallable {
    fn invoke(&self, args: &ArgList) -> InvokeResult<Any> {
        (self.function)(args)
    }

    fn doc(&self) -> String {
        match &self.doc {
            Some(doc) => doc.clone(),
            None => self.meta_class().doc(),
        }
    }
}

pub(crate) fn build_callable_class(object_class: &Arc<MetaClass>) -> Arc<MetaClass> {
    let class = MetaClass::builder("Callable")
        .super_class(object_class)
        .abstract_class()
        .help("An object that can be called with arguments.")
        .build();
    class.add_slot(
        MetaMethod::slot("invoke", &class, "Any", |obj, args| match obj.as_callable() {
            Some(callable) => callable.invoke(args),
            None => Err(InvokeError::TargetType {
                expected: "Callable".to_string(),
                found: obj.meta_class().name().to_string(),
            }),
        })
        .with_arg(MetaArg::new("args", ARG_LIST_TYPE)),
    );
    class
}

pub(crate) fn build_request_class(callable_class: &Arc<MetaClass>) -> Arc<MetaClass> {
    let class = MetaClass::builder("Request")
        .super_class(callable_class)
        .type_id::<Request>()
        .help("A method bound to its target object.")
        .build();
    class.add_property(MetaProperty::new("object", &class, "Object*", |obj| {
        let request = cast_request(obj)?;
        Ok(request.object.get().map(Any::Object).unwrap_or_default())
    }));
    class.add_property(MetaProperty::new("method", &class, "String", |obj| {
        Ok(Any::String(cast_request(obj)?.method.name().to_string()))
    }));
    class
}

fn cast_request(obj: &dyn Object) -> InvokeResult<&Request> {
    object_cast::<Request>(obj).ok_or_else(|| InvokeError::TargetType {
        expected: "Request".to_string(),
        found: obj.meta_class().name().to_string(),
    })
}

pub(crate) fn build_function_callable_class(callable_class: &Arc<MetaClass>) -> Arc<MetaClass> {
    MetaClass::builder("FunctionCallable")
        .super_class(callable_class)
        .type_id::<FunctionCallable>()
        .help("A native function.")
        .build()
}
