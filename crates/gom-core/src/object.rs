//! Object model for GOM.
//!
//! Every reflected instance implements [`Object`] and embeds an
//! [`ObjectBase`] carrying its identity, its dynamic class and its signal
//! connections. Instances are shared through [`ObjectRef`]; the last strong
//! reference going away destroys the object.
//!
//! # Key Types
//!
//! - [`Object`] - Base trait that all reflected objects implement
//! - [`ObjectBase`] - Helper struct for implementing [`Object`]
//! - [`ObjectRef`] / [`WeakObjectRef`] - Strong and weak shared handles
//! - [`ObjectHandle`] - Managed (owning) or unmanaged (observing) handle
//!
//! # Lifetime
//!
//! An object is alive while at least one [`ObjectRef`] exists. Handing an
//! object to a foreign interpreter as [`ObjectHandle::Managed`] keeps it
//! alive for as long as the interpreter holds the wrapper;
//! [`ObjectHandle::Unmanaged`] only observes it.
//!
//! # Dispatch
//!
//! The inherent methods on `dyn Object` ([`invoke_method`], [`get_property`],
//! [`set_property`], ...) resolve names through the object's [`MetaClass`].
//!
//! [`invoke_method`]: trait.Object.html#method.invoke_method
//! [`get_property`]: trait.Object.html#method.get_property
//! [`set_property`]: trait.Object.html#method.set_property

use std::any::Any as StdAny;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::any::Any;
use crate::arg_list::ArgList;
use crate::callable::Callable;
use crate::connection::{Connection, ConnectionId, SignalTable};
use crate::error::{InvokeError, InvokeResult};
use crate::interpreter::Interpreter;
use crate::logging::targets;
use crate::meta_class::MetaClass;
use crate::meta_member::{MetaArg, MetaMethod, MetaProperty};
use crate::node::NodeLinks;

/// Shared, owning reference to an object.
pub type ObjectRef = Arc<dyn Object>;

/// Non-owning reference to an object.
pub type WeakObjectRef = Weak<dyn Object>;

/// Base trait for reflected objects.
///
/// Implementations are usually generated by `#[derive(Object)]`. Only
/// [`base`](Self::base) is required; the other methods are optional
/// protocols.
pub trait Object: StdAny + Send + Sync {
    /// The embedded object state.
    fn base(&self) -> &ObjectBase;

    /// The dynamic class of this object.
    fn meta_class(&self) -> &Arc<MetaClass> {
        self.base().meta_class()
    }

    /// Number of elements of the collection protocol.
    ///
    /// Objects with [`NodeLinks`] expose their children; other objects do
    /// not implement the protocol unless they override it.
    fn nb_elements(&self) -> InvokeResult<usize> {
        match self.node() {
            Some(links) => Ok(links.nb_children()),
            None => Err(not_implemented(self.base(), "nb_elements")),
        }
    }

    fn get_element(&self, index: usize) -> InvokeResult<Any> {
        match self.node() {
            Some(links) => links.ith_child(index).map(Any::Object).ok_or_else(|| {
                InvokeError::Failed(format!(
                    "{} : element index {index} out of range",
                    self.base().string_id()
                ))
            }),
            None => Err(not_implemented(self.base(), "get_element")),
        }
    }

    fn set_element(&self, _index: usize, _value: &Any) -> InvokeResult<()> {
        Err(not_implemented(self.base(), "set_element"))
    }

    /// Tree links, for objects taking part in a node hierarchy.
    fn node(&self) -> Option<&NodeLinks> {
        None
    }

    /// The callable protocol, for objects that can be invoked.
    fn as_callable(&self) -> Option<&dyn Callable> {
        None
    }

    /// The interpreter protocol, for embedded interpreters.
    fn as_interpreter(&self) -> Option<&dyn Interpreter> {
        None
    }
}

fn not_implemented(base: &ObjectBase, operation: &'static str) -> InvokeError {
    tracing::warn!(
        target: targets::OBJECT,
        object = %base.string_id(),
        "{operation} is not implemented"
    );
    InvokeError::NotImplemented {
        class: base.meta_class().name().to_string(),
        operation,
    }
}

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Helper struct embedded in every [`Object`] implementation.
pub struct ObjectBase {
    id: u64,
    meta_class: Arc<MetaClass>,
    self_ref: OnceLock<WeakObjectRef>,
    connections: Mutex<SignalTable>,
    slots_enabled: AtomicBool,
    signals_enabled: AtomicBool,
}

static_assertions::assert_impl_all!(ObjectBase: Send, Sync);

impl ObjectBase {
    /// Create the state of a new instance of `meta_class`.
    pub fn new(meta_class: Arc<MetaClass>) -> Self {
        Self {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            meta_class,
            self_ref: OnceLock::new(),
            connections: Mutex::new(SignalTable::default()),
            slots_enabled: AtomicBool::new(true),
            signals_enabled: AtomicBool::new(true),
        }
    }

    /// Process-unique id.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn meta_class(&self) -> &Arc<MetaClass> {
        &self.meta_class
    }

    /// `@Class::#id`.
    pub fn string_id(&self) -> String {
        format!("@{}::#{}", self.meta_class.name(), self.id)
    }

    /// Record the weak self reference; see [`new_object`].
    ///
    /// Only the first call has an effect.
    pub fn bind_self(&self, weak: WeakObjectRef) {
        let _ = self.self_ref.set(weak);
    }

    /// A strong reference to the object owning this base.
    ///
    /// `None` for objects not created through [`new_object`] (or bound with
    /// [`bind_self`](Self::bind_self)), and while the object is being dropped.
    pub fn self_ref(&self) -> Option<ObjectRef> {
        self.self_ref.get().and_then(Weak::upgrade)
    }

    pub fn slots_enabled(&self) -> bool {
        self.slots_enabled.load(Ordering::Acquire)
    }

    pub fn set_slots_enabled(&self, enabled: bool) {
        self.slots_enabled.store(enabled, Ordering::Release);
    }

    pub fn signals_enabled(&self) -> bool {
        self.signals_enabled.load(Ordering::Acquire)
    }

    pub fn set_signals_enabled(&self, enabled: bool) {
        self.signals_enabled.store(enabled, Ordering::Release);
    }

    /// Add a listener to `signal`. Listeners run in connection order.
    pub fn connect(&self, signal: &str, connection: Connection) -> ConnectionId {
        let id = self.connections.lock().insert(signal, connection);
        tracing::debug!(
            target: targets::SIGNAL,
            object = %self.string_id(),
            %signal,
            "connected"
        );
        id
    }

    /// Remove a listener.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a connection of this object.
    pub fn disconnect(&self, id: ConnectionId) {
        let removed = self.connections.lock().remove(id);
        assert!(
            removed,
            "{}: disconnecting an unknown connection",
            self.string_id()
        );
    }

    /// Remove every listener of `signal`; returns how many were removed.
    pub fn disconnect_signal(&self, signal: &str) -> usize {
        self.connections.lock().remove_signal(signal)
    }

    /// Number of listeners of `signal`.
    pub fn connection_count(&self, signal: &str) -> usize {
        self.connections.lock().count(signal)
    }

    /// Broadcast `signal` to its listeners.
    ///
    /// Returns `true` when every listener succeeded. Listeners connected or
    /// disconnected by a listener take effect at the next emission.
    #[tracing::instrument(skip_all, target = "gom_core::signal", level = "trace", fields(signal = name))]
    pub fn emit_signal(&self, name: &str, args: &ArgList) -> bool {
        if !self.signals_enabled() {
            tracing::trace!(target: targets::SIGNAL, "signals disabled, skipping emit");
            return true;
        }
        let listeners = self.connections.lock().listeners(name);
        tracing::trace!(
            target: targets::SIGNAL,
            connection_count = listeners.len(),
            args = %args,
            "emitting signal"
        );
        let mut ok = true;
        for connection in listeners {
            if let Err(err) = connection.invoke(args) {
                tracing::warn!(
                    target: targets::SIGNAL,
                    object = %self.string_id(),
                    signal = %name,
                    "listener failed: {err}"
                );
                ok = false;
            }
        }
        ok
    }
}

impl fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBase")
            .field("id", &self.string_id())
            .field("slots_enabled", &self.slots_enabled())
            .field("signals_enabled", &self.signals_enabled())
            .finish()
    }
}

impl Drop for ObjectBase {
    fn drop(&mut self) {
        tracing::trace!(target: targets::OBJECT, object = %self.string_id(), "destroyed");
    }
}

/// Move `object` into a new shared allocation and bind its self reference.
pub fn new_object<T: Object>(object: T) -> Arc<T> {
    let object = Arc::new(object);
    let weak: WeakObjectRef = Arc::downgrade(&object) as Weak<dyn Object>;
    object.base().bind_self(weak);
    tracing::trace!(target: targets::OBJECT, object = %object.base().string_id(), "created");
    object
}

/// Safe downcast function for [`Object`] trait objects.
///
/// Returns `Some(&T)` if the object is of type `T`, otherwise `None`.
pub fn object_cast<T: Object>(obj: &dyn Object) -> Option<&T> {
    (obj as &dyn StdAny).downcast_ref::<T>()
}

/// Whether two references designate the same object.
pub fn same_object(a: &dyn Object, b: &dyn Object) -> bool {
    std::ptr::addr_eq(a as *const dyn Object, b as *const dyn Object)
}

/// A wrapper's hold on an object.
#[derive(Clone)]
pub enum ObjectHandle {
    /// Owns a reference: the object lives at least as long as the handle.
    Managed(ObjectRef),
    /// Observes the object without keeping it alive.
    Unmanaged(WeakObjectRef),
}

impl ObjectHandle {
    pub fn managed(object: &ObjectRef) -> Self {
        Self::Managed(object.clone())
    }

    pub fn unmanaged(object: &ObjectRef) -> Self {
        Self::Unmanaged(Arc::downgrade(object))
    }

    /// The designated object, or [`InvokeError::Detached`] once destroyed.
    pub fn get(&self) -> InvokeResult<ObjectRef> {
        match self {
            Self::Managed(object) => Ok(object.clone()),
            Self::Unmanaged(weak) => weak.upgrade().ok_or(InvokeError::Detached),
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed(_))
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Self::Managed(_) => true,
            Self::Unmanaged(weak) => weak.strong_count() > 0,
        }
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self
            .get()
            .map(|o| o.base().string_id())
            .unwrap_or_else(|_| "<destroyed>".to_string());
        if self.is_managed() {
            write!(f, "Managed({id})")
        } else {
            write!(f, "Unmanaged({id})")
        }
    }
}

impl<'a> dyn Object + 'a {
    /// `@Class::#id`.
    pub fn string_id(&self) -> String {
        self.base().string_id()
    }

    /// A strong reference to this object, see [`ObjectBase::self_ref`].
    pub fn self_ref(&self) -> Option<ObjectRef> {
        self.base().self_ref()
    }

    /// Whether the dynamic class is `classname` or derives from it.
    pub fn is_a(&self, classname: &str) -> bool {
        self.meta_class().inherits(classname)
    }

    /// Call a slot, signal, constructor or property accessor by name.
    ///
    /// A property name used as a method reads the property without
    /// argument and writes it from a single argument. With slots disabled
    /// the call succeeds without effect and returns `Null`.
    pub fn invoke_method(&self, name: &str, args: &ArgList) -> InvokeResult<Any> {
        if !self.base().slots_enabled() {
            tracing::trace!(
                target: targets::DISPATCH,
                object = %self.string_id(),
                method = %name,
                "slots disabled, call ignored"
            );
            return Ok(Any::Null);
        }
        let class = self.meta_class();
        if let Some(method) = class.find_method(name) {
            return method.invoke(self, args);
        }
        if let Some(property) = class.find_property(name) {
            return match args.nb_args() {
                0 => property.get_value(self),
                1 => property
                    .set_value(self, args.ith_arg_value(0).clone())
                    .map(|()| Any::Null),
                n => Err(InvokeError::TooManyArguments {
                    method: format!("{}::{name}", class.name()),
                    expected: 1,
                    found: n,
                }),
            };
        }
        tracing::warn!(
            target: targets::DISPATCH,
            object = %self.string_id(),
            "{}::{name} : no such method",
            class.name()
        );
        Err(InvokeError::NoSuchMethod {
            class: class.name().to_string(),
            method: name.to_string(),
        })
    }

    pub fn get_property(&self, name: &str) -> InvokeResult<Any> {
        self.find_property_or_warn(name)?.get_value(self)
    }

    pub fn set_property(&self, name: &str, value: impl Into<Any>) -> InvokeResult<()> {
        self.find_property_or_warn(name)?.set_value(self, value)
    }

    /// Assign every argument to the property of the same name.
    ///
    /// Stops at the first failure.
    pub fn set_properties(&self, args: &ArgList) -> InvokeResult<()> {
        for (name, value) in args.iter() {
            self.set_property(name, value.clone())?;
        }
        Ok(())
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.meta_class().find_property(name).is_some()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.meta_class().find_method(name).is_some()
    }

    fn find_property_or_warn(&self, name: &str) -> InvokeResult<Arc<MetaProperty>> {
        let class = self.meta_class();
        class.find_property(name).ok_or_else(|| {
            tracing::warn!(
                target: targets::DISPATCH,
                object = %self.string_id(),
                "{}::{name} : no such property",
                class.name()
            );
            InvokeError::NoSuchProperty {
                class: class.name().to_string(),
                property: name.to_string(),
            }
        })
    }

    /// Broadcast a declared signal.
    ///
    /// Returns `false` when the class declares no such signal or a listener
    /// failed.
    pub fn emit_signal(&self, name: &str, args: &ArgList) -> bool {
        if self.meta_class().find_signal(name).is_none() {
            tracing::warn!(
                target: targets::SIGNAL,
                object = %self.string_id(),
                "{}::{name} : no such signal",
                self.meta_class().name()
            );
            return false;
        }
        self.base().emit_signal(name, args)
    }

    /// Connect a declared signal to a listener.
    pub fn connect(&self, signal: &str, connection: Connection) -> InvokeResult<ConnectionId> {
        if self.meta_class().find_signal(signal).is_none() {
            tracing::warn!(
                target: targets::SIGNAL,
                object = %self.string_id(),
                "{}::{signal} : no such signal",
                self.meta_class().name()
            );
            return Err(InvokeError::NoSuchMethod {
                class: self.meta_class().name().to_string(),
                method: signal.to_string(),
            });
        }
        Ok(self.base().connect(signal, connection))
    }

    /// Connect a signal to a method of `target`.
    ///
    /// The target is observed, not owned: the connection fails once the
    /// target is destroyed.
    pub fn connect_signal_to_slot(
        &self,
        signal: &str,
        target: &ObjectRef,
        slot: &str,
    ) -> InvokeResult<ConnectionId> {
        if !target.has_method(slot) && !target.has_property(slot) {
            tracing::warn!(
                target: targets::SIGNAL,
                object = %target.string_id(),
                "{}::{slot} : no such method",
                target.meta_class().name()
            );
            return Err(InvokeError::NoSuchMethod {
                class: target.meta_class().name().to_string(),
                method: slot.to_string(),
            });
        }
        self.connect(signal, Connection::to_slot(target, slot))
    }

    /// Connect a signal to a callable object, which the connection owns.
    pub fn connect_signal_to_callable(
        &self,
        signal: &str,
        callable: ObjectRef,
    ) -> InvokeResult<ConnectionId> {
        if callable.as_callable().is_none() {
            return Err(InvokeError::TargetType {
                expected: "Callable".to_string(),
                found: callable.meta_class().name().to_string(),
            });
        }
        self.connect(signal, Connection::to_callable(callable))
    }

    pub fn disconnect_signal(&self, signal: &str) -> usize {
        self.base().disconnect_signal(signal)
    }

    /// Interactive help: the callable's documentation, or the class's.
    pub fn doc(&self) -> String {
        match self.as_callable() {
            Some(callable) => callable.doc(),
            None => self.meta_class().doc(),
        }
    }
}

impl fmt::Debug for dyn Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base().string_id())
    }
}

/// The root `Object` class.
pub(crate) fn build_object_class() -> Arc<MetaClass> {
    let class = MetaClass::builder("Object")
        .abstract_class()
        .help("Base class of every reflected object.")
        .build();

    class.add_property(MetaProperty::new("string_id", &class, "String", |obj| {
        Ok(Any::String(obj.string_id()))
    }));
    class.add_property(
        MetaProperty::new("slots_enabled", &class, "bool", |obj| {
            Ok(Any::Bool(obj.base().slots_enabled()))
        })
        .with_setter(|obj, value| {
            let enabled = value.convert::<bool>("Object::set_slots_enabled", "value")?;
            obj.base().set_slots_enabled(enabled);
            Ok(())
        }),
    );
    class.add_property(
        MetaProperty::new("signals_enabled", &class, "bool", |obj| {
            Ok(Any::Bool(obj.base().signals_enabled()))
        })
        .with_setter(|obj, value| {
            let enabled = value.convert::<bool>("Object::set_signals_enabled", "value")?;
            obj.base().set_signals_enabled(enabled);
            Ok(())
        }),
    );

    class.add_slot(
        MetaMethod::slot("has_method", &class, "bool", |obj, args| {
            let name: String = args.require("Object::has_method", "name")?;
            Ok(Any::Bool(obj.has_method(&name)))
        })
        .with_arg(MetaArg::new("name", "String")),
    );
    class.add_slot(
        MetaMethod::slot("has_property", &class, "bool", |obj, args| {
            let name: String = args.require("Object::has_property", "name")?;
            Ok(Any::Bool(obj.has_property(&name)))
        })
        .with_arg(MetaArg::new("name", "String")),
    );
    class.add_slot(
        MetaMethod::slot("is_a", &class, "bool", |obj, args| {
            let classname: String = args.require("Object::is_a", "classname")?;
            Ok(Any::Bool(obj.is_a(&classname)))
        })
        .with_arg(MetaArg::new("classname", "String")),
    );
    class.add_slot(MetaMethod::slot("doc", &class, "String", |obj, _| {
        Ok(Any::String(obj.doc()))
    }));
    class
}
