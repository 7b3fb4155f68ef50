//! Class members: properties, slots, signals and constructors.
//!
//! Every invocable member is a [`MetaMethod`] carrying a [`MethodAdapter`],
//! the closed set of ways a reflective call reaches native code. Slot and
//! property adapters are usually generated by `#[derive(Object)]` and
//! `#[slots]`; signal and constructor adapters are generic.
//!
//! # Calling convention
//!
//! [`MetaMethod::invoke`] binds the actual arguments to the formal ones
//! (positional arguments are renamed, defaults are filled in, missing
//! arguments are reported) before the adapter runs. Adapters convert every
//! argument before calling into native code, so a failed conversion never
//! leaves the target half-modified.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::any::Any;
use crate::arg_list::ArgList;
use crate::custom_attributes::CustomAttributes;
use crate::error::{InvokeError, InvokeResult};
use crate::logging::targets;
use crate::meta_class::MetaClass;
use crate::object::{Object, ObjectRef};

/// Type name of a formal argument that receives the whole argument list.
pub const ARG_LIST_TYPE: &str = "ArgList";

/// Native code behind a slot.
pub type SlotFn = dyn Fn(&dyn Object, &ArgList) -> InvokeResult<Any> + Send + Sync;
/// Native code behind a property getter.
pub type GetterFn = dyn Fn(&dyn Object) -> InvokeResult<Any> + Send + Sync;
/// Native code behind a property setter.
pub type SetterFn = dyn Fn(&dyn Object, &Any) -> InvokeResult<()> + Send + Sync;

/// Allocates new instances of a class.
///
/// Returning `None` signals a construction failure.
pub trait Factory: Send + Sync {
    fn create(&self, meta_class: &Arc<MetaClass>, args: &ArgList) -> Option<ObjectRef>;
}

impl<F> Factory for F
where
    F: Fn(&Arc<MetaClass>, &ArgList) -> Option<ObjectRef> + Send + Sync,
{
    fn create(&self, meta_class: &Arc<MetaClass>, args: &ArgList) -> Option<ObjectRef> {
        self(meta_class, args)
    }
}

/// Report why a factory declines to construct an instance of `class`.
///
/// Always returns `None`, so factories can end with
/// `.unwrap_or_else(|err| factory_failed(class, &err))`.
pub fn factory_failed(class: &MetaClass, err: &InvokeError) -> Option<ObjectRef> {
    tracing::warn!(target: targets::OBJECT, class = %class.name(), "construction failed: {err}");
    None
}

/// How a [`MetaMethod`] reaches native code.
#[derive(Clone)]
pub enum MethodAdapter {
    /// Ordinary method.
    Slot(Arc<SlotFn>),
    /// Broadcast to the listeners connected to the signal on the target.
    Signal,
    /// Allocation through the bound factory.
    Constructor(Arc<dyn Factory>),
    /// Property read.
    PropertyGet(Arc<GetterFn>),
    /// Property write; receives the argument named `value`.
    PropertySet(Arc<SetterFn>),
}

impl MethodAdapter {
    pub fn slot<F>(f: F) -> Self
    where
        F: Fn(&dyn Object, &ArgList) -> InvokeResult<Any> + Send + Sync + 'static,
    {
        Self::Slot(Arc::new(f))
    }

    pub fn constructor<F: Factory + 'static>(factory: F) -> Self {
        Self::Constructor(Arc::new(factory))
    }
}

impl fmt::Debug for MethodAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Slot(_) => "Slot",
            Self::Signal => "Signal",
            Self::Constructor(_) => "Constructor",
            Self::PropertyGet(_) => "PropertyGet",
            Self::PropertySet(_) => "PropertySet",
        };
        f.write_str(kind)
    }
}

/// A formal argument.
#[derive(Debug, Clone)]
pub struct MetaArg {
    name: String,
    type_name: String,
    default_value: Option<Any>,
    attributes: CustomAttributes,
}

impl MetaArg {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            default_value: None,
            attributes: CustomAttributes::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<Any>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn default_value(&self) -> Option<&Any> {
        self.default_value.as_ref()
    }

    pub fn has_default_value(&self) -> bool {
        self.default_value.is_some()
    }

    pub fn custom_attributes(&self) -> &CustomAttributes {
        &self.attributes
    }
}

/// An invocable member: slot, signal, constructor or property accessor.
pub struct MetaMethod {
    name: String,
    container: Weak<MetaClass>,
    container_name: String,
    return_type_name: String,
    args: Vec<MetaArg>,
    adapter: Option<MethodAdapter>,
    attributes: CustomAttributes,
}

impl MetaMethod {
    /// A method without adapter; see [`with_adapter`](Self::with_adapter).
    pub fn new(
        name: impl Into<String>,
        container: &Arc<MetaClass>,
        return_type_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            container: Arc::downgrade(container),
            container_name: container.name().to_string(),
            return_type_name: return_type_name.into(),
            args: Vec::new(),
            adapter: None,
            attributes: CustomAttributes::new(),
        }
    }

    /// A slot bound to a closure.
    pub fn slot<F>(
        name: impl Into<String>,
        container: &Arc<MetaClass>,
        return_type_name: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(&dyn Object, &ArgList) -> InvokeResult<Any> + Send + Sync + 'static,
    {
        Self::new(name, container, return_type_name).with_adapter(MethodAdapter::slot(f))
    }

    /// A signal. Declare its arguments with [`with_arg`](Self::with_arg).
    pub fn signal(name: impl Into<String>, container: &Arc<MetaClass>) -> Self {
        Self::new(name, container, "bool").with_adapter(MethodAdapter::Signal)
    }

    /// A constructor named after the class's constructor naming convention.
    pub fn constructor<F: Factory + 'static>(container: &Arc<MetaClass>, factory: F) -> Self {
        let return_type = crate::meta_type::pointer_type_name(container.name());
        Self::new(container.new_constructor_name(), container, return_type)
            .with_adapter(MethodAdapter::constructor(factory))
    }

    pub fn with_arg(mut self, arg: MetaArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_adapter(mut self, adapter: MethodAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn add_arg(&mut self, arg: MetaArg) {
        self.args.push(arg);
    }

    pub fn set_adapter(&mut self, adapter: MethodAdapter) {
        self.adapter = Some(adapter);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Class::name`, used in diagnostics.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.container_name, self.name)
    }

    /// The class this method was declared in.
    pub fn container_meta_class(&self) -> Option<Arc<MetaClass>> {
        self.container.upgrade()
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub(crate) fn container_ptr(&self) -> *const MetaClass {
        self.container.as_ptr()
    }

    pub fn return_type_name(&self) -> &str {
        &self.return_type_name
    }

    pub fn adapter(&self) -> Option<&MethodAdapter> {
        self.adapter.as_ref()
    }

    pub fn is_signal(&self) -> bool {
        matches!(self.adapter, Some(MethodAdapter::Signal))
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.adapter, Some(MethodAdapter::Constructor(_)))
    }

    pub fn nb_args(&self) -> usize {
        self.args.len()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn ith_arg(&self, index: usize) -> &MetaArg {
        &self.args[index]
    }

    pub fn args(&self) -> &[MetaArg] {
        &self.args
    }

    pub fn find_arg(&self, name: &str) -> Option<&MetaArg> {
        self.args.iter().find(|a| a.name == name)
    }

    pub fn has_arg(&self, name: &str) -> bool {
        self.find_arg(name).is_some()
    }

    pub fn custom_attributes(&self) -> &CustomAttributes {
        &self.attributes
    }

    /// Whether the single formal argument receives the whole argument list.
    pub fn takes_arg_list(&self) -> bool {
        self.args.len() == 1 && self.args[0].type_name == ARG_LIST_TYPE
    }

    pub fn nb_default_args(&self) -> usize {
        self.args.iter().filter(|a| a.has_default_value()).count()
    }

    /// Whether `args` supplies every formal argument that has no default.
    pub fn check_args(&self, args: &ArgList) -> bool {
        if self.takes_arg_list() {
            return true;
        }
        if args.has_unnamed_args() {
            return args.nb_args() <= self.args.len()
                && self.args[args.nb_args()..]
                    .iter()
                    .all(MetaArg::has_default_value);
        }
        self.args
            .iter()
            .all(|a| a.has_default_value() || args.has_arg(&a.name))
    }

    /// Number of actual arguments that match a formal argument.
    pub fn nb_used_args(&self, args: &ArgList) -> usize {
        args.names().filter(|name| self.has_arg(name)).count()
    }

    /// Append the default value of every formal argument missing from `args`.
    pub fn add_default_args(&self, args: &mut ArgList) {
        for arg in &self.args {
            if let Some(default) = &arg.default_value {
                if !args.has_arg(&arg.name) {
                    args.create_arg(arg.name.clone(), default.clone());
                }
            }
        }
    }

    /// Bind actual arguments to the formal ones.
    ///
    /// Positional arguments are renamed after the formal arguments, missing
    /// arguments receive their default value.
    pub fn bind_args(&self, args: &ArgList) -> InvokeResult<ArgList> {
        if self.takes_arg_list() {
            return Ok(args.clone());
        }
        let mut bound = if args.has_unnamed_args() {
            if args.nb_args() > self.args.len() {
                return Err(InvokeError::TooManyArguments {
                    method: self.qualified_name(),
                    expected: self.args.len(),
                    found: args.nb_args(),
                });
            }
            self.args
                .iter()
                .zip(args.iter())
                .map(|(formal, (_, value))| (formal.name.clone(), value.clone()))
                .collect()
        } else {
            args.clone()
        };
        self.add_default_args(&mut bound);
        if let Some(missing) = self.args.iter().find(|a| !bound.has_arg(&a.name)) {
            return Err(InvokeError::MissingArgument {
                method: self.qualified_name(),
                arg: missing.name.clone(),
            });
        }
        Ok(bound)
    }

    /// Call this method on `target`.
    pub fn invoke(&self, target: &dyn Object, args: &ArgList) -> InvokeResult<Any> {
        let result = self.invoke_adapter(target, args);
        if let Err(err) = &result {
            tracing::warn!(
                target: targets::DISPATCH,
                method = %self.qualified_name(),
                object = %target.base().string_id(),
                "{err}"
            );
        }
        result
    }

    fn invoke_adapter(&self, target: &dyn Object, args: &ArgList) -> InvokeResult<Any> {
        let Some(adapter) = &self.adapter else {
            return Err(InvokeError::NoAdapter {
                method: self.qualified_name(),
            });
        };
        let args = self.bind_args(args)?;
        tracing::trace!(
            target: targets::DISPATCH,
            method = %self.qualified_name(),
            adapter = ?adapter,
            args = %args,
            "invoke"
        );
        match adapter {
            MethodAdapter::Slot(f) => f(target, &args),
            MethodAdapter::Signal => {
                target.base().emit_signal(&self.name, &args);
                Ok(Any::Bool(true))
            }
            MethodAdapter::Constructor(_) => self.construct_bound(&args).map(Any::Object),
            MethodAdapter::PropertyGet(get) => get(target),
            MethodAdapter::PropertySet(set) => {
                let value = args.arg_value("value").cloned().unwrap_or_default();
                set(target, &value).map(|()| Any::Null)
            }
        }
    }

    /// Create an instance through a constructor's factory.
    pub fn construct(&self, args: &ArgList) -> InvokeResult<ObjectRef> {
        let args = self.bind_args(args)?;
        self.construct_bound(&args)
    }

    fn construct_bound(&self, args: &ArgList) -> InvokeResult<ObjectRef> {
        let Some(MethodAdapter::Constructor(factory)) = &self.adapter else {
            return Err(InvokeError::NoAdapter {
                method: self.qualified_name(),
            });
        };
        let class = self.container.upgrade().ok_or(InvokeError::Detached)?;
        factory
            .create(&class, args)
            .ok_or_else(|| InvokeError::ConstructionFailed {
                class: class.name().to_string(),
            })
    }

    /// Interactive help text.
    pub fn doc(&self) -> String {
        let mut result = String::from("GOM function\n============\n");
        let arg_names: Vec<&str> = self.args.iter().map(|a| a.name.as_str()).collect();
        result.push_str(&format!(
            "{}::{}({})\n",
            self.container_name,
            self.name,
            arg_names.join(",")
        ));
        if let Some(help) = self.attributes.help() {
            result.push_str(&help);
            result.push('\n');
        }
        if !self.args.is_empty() {
            result.push_str("Parameters\n==========\n");
            for arg in &self.args {
                result.push_str(&format!("{} : {}", arg.name, arg.type_name));
                match &arg.default_value {
                    Some(Any::String(s)) => result.push_str(&format!(" = '{s}'")),
                    Some(Any::Null) => result.push_str(" = null"),
                    Some(value) => result.push_str(&format!(" = {value}")),
                    None => {}
                }
                result.push('\n');
                if let Some(help) = arg.attributes.help() {
                    result.push_str(&format!("    {help}\n"));
                }
            }
        }
        result
    }
}

impl fmt::Debug for MetaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaMethod")
            .field("name", &self.qualified_name())
            .field("return_type", &self.return_type_name)
            .field("args", &self.args)
            .field("adapter", &self.adapter)
            .finish()
    }
}

/// A property: a name, a type, and accessor methods.
///
/// The getter is the method `get_<name>`; writable properties also have a
/// setter `set_<name>(value)`.
pub struct MetaProperty {
    name: String,
    container: Weak<MetaClass>,
    container_name: String,
    type_name: String,
    getter: Arc<MetaMethod>,
    setter: Option<Arc<MetaMethod>>,
    attributes: CustomAttributes,
}

impl MetaProperty {
    /// A read-only property; add a setter with [`with_setter`](Self::with_setter).
    pub fn new<G>(
        name: impl Into<String>,
        container: &Arc<MetaClass>,
        type_name: impl Into<String>,
        getter: G,
    ) -> Self
    where
        G: Fn(&dyn Object) -> InvokeResult<Any> + Send + Sync + 'static,
    {
        let name = name.into();
        let type_name = type_name.into();
        let getter = MetaMethod::new(format!("get_{name}"), container, type_name.clone())
            .with_adapter(MethodAdapter::PropertyGet(Arc::new(getter)));
        Self {
            name,
            container: Arc::downgrade(container),
            container_name: container.name().to_string(),
            type_name,
            getter: Arc::new(getter),
            setter: None,
            attributes: CustomAttributes::new(),
        }
    }

    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(&dyn Object, &Any) -> InvokeResult<()> + Send + Sync + 'static,
    {
        let method = MetaMethod {
            name: format!("set_{}", self.name),
            container: self.container.clone(),
            container_name: self.container_name.clone(),
            return_type_name: "()".to_string(),
            args: vec![MetaArg::new("value", self.type_name.clone())],
            adapter: Some(MethodAdapter::PropertySet(Arc::new(setter))),
            attributes: CustomAttributes::new(),
        };
        self.setter = Some(Arc::new(method));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn read_only(&self) -> bool {
        self.setter.is_none()
    }

    pub fn getter(&self) -> &Arc<MetaMethod> {
        &self.getter
    }

    pub fn setter(&self) -> Option<&Arc<MetaMethod>> {
        self.setter.as_ref()
    }

    pub fn container_meta_class(&self) -> Option<Arc<MetaClass>> {
        self.container.upgrade()
    }

    pub(crate) fn container_ptr(&self) -> *const MetaClass {
        self.container.as_ptr()
    }

    pub fn custom_attributes(&self) -> &CustomAttributes {
        &self.attributes
    }

    pub fn get_value(&self, target: &dyn Object) -> InvokeResult<Any> {
        self.getter.invoke(target, &ArgList::new())
    }

    pub fn set_value(&self, target: &dyn Object, value: impl Into<Any>) -> InvokeResult<()> {
        let Some(setter) = &self.setter else {
            tracing::warn!(
                target: targets::DISPATCH,
                "{}::{} : property is read-only",
                self.container_name,
                self.name
            );
            return Err(InvokeError::ReadOnlyProperty {
                class: self.container_name.clone(),
                property: self.name.clone(),
            });
        };
        setter
            .invoke(target, &ArgList::new().with("value", value))
            .map(|_| ())
    }

    pub fn doc(&self) -> String {
        let mut result = format!(
            "GOM property\n============\n{}::{} : {}{}\n",
            self.container_name,
            self.name,
            self.type_name,
            if self.read_only() { " (read-only)" } else { "" }
        );
        if let Some(help) = self.attributes.help() {
            result.push_str(&help);
            result.push('\n');
        }
        result
    }
}

impl fmt::Debug for MetaProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaProperty")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("read_only", &self.read_only())
            .finish()
    }
}

/// Kind of a [`MetaMember`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Property,
    Slot,
    Signal,
    Constructor,
}

/// A class member.
#[derive(Debug, Clone)]
pub enum MetaMember {
    Property(Arc<MetaProperty>),
    Slot(Arc<MetaMethod>),
    Signal(Arc<MetaMethod>),
    Constructor(Arc<MetaMethod>),
}

impl MetaMember {
    pub fn name(&self) -> &str {
        match self {
            Self::Property(p) => p.name(),
            Self::Slot(m) | Self::Signal(m) | Self::Constructor(m) => m.name(),
        }
    }

    pub fn kind(&self) -> MemberKind {
        match self {
            Self::Property(_) => MemberKind::Property,
            Self::Slot(_) => MemberKind::Slot,
            Self::Signal(_) => MemberKind::Signal,
            Self::Constructor(_) => MemberKind::Constructor,
        }
    }

    pub fn container_meta_class(&self) -> Option<Arc<MetaClass>> {
        match self {
            Self::Property(p) => p.container_meta_class(),
            Self::Slot(m) | Self::Signal(m) | Self::Constructor(m) => m.container_meta_class(),
        }
    }

    pub(crate) fn container_ptr(&self) -> *const MetaClass {
        match self {
            Self::Property(p) => p.container_ptr(),
            Self::Slot(m) | Self::Signal(m) | Self::Constructor(m) => m.container_ptr(),
        }
    }

    pub fn custom_attributes(&self) -> &CustomAttributes {
        match self {
            Self::Property(p) => p.custom_attributes(),
            Self::Slot(m) | Self::Signal(m) | Self::Constructor(m) => m.custom_attributes(),
        }
    }

    pub fn as_method(&self) -> Option<&Arc<MetaMethod>> {
        match self {
            Self::Property(_) => None,
            Self::Slot(m) | Self::Signal(m) | Self::Constructor(m) => Some(m),
        }
    }

    pub fn as_property(&self) -> Option<&Arc<MetaProperty>> {
        match self {
            Self::Property(p) => Some(p),
            _ => None,
        }
    }

    pub fn doc(&self) -> String {
        match self {
            Self::Property(p) => p.doc(),
            Self::Slot(m) | Self::Signal(m) | Self::Constructor(m) => m.doc(),
        }
    }
}
