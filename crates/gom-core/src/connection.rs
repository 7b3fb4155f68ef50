//! Signal connections.
//!
//! A [`Connection`] links a signal of a source object to a listener: a
//! method of another object, or a callable. Before the listener runs the
//! emitted arguments are translated (discarded, renamed, then completed with
//! constant arguments) and the connection's conditions are checked.
//!
//! # Example
//!
//! ```ignore
//! let connection = Connection::to_slot(&viewer, "refresh")
//!     .if_arg("mode", "!=silent")
//!     .rename_arg("mesh", "target")
//!     .add_arg("full", true);
//! source.connect("changed", connection)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};

use crate::any::Any;
use crate::arg_list::ArgList;
use crate::error::{InvokeError, InvokeResult};
use crate::logging::targets;
use crate::object::{ObjectRef, WeakObjectRef};

new_key_type! {
    /// A unique identifier for a signal connection.
    ///
    /// Returned by [`ObjectBase::connect`](crate::ObjectBase::connect) and
    /// used to disconnect.
    pub struct ConnectionId;
}

/// Where a connection delivers the signal.
#[derive(Clone)]
pub enum ConnectionTarget {
    /// A method of an object the connection does not keep alive.
    Slot { object: WeakObjectRef, slot: String },
    /// A callable object owned by the connection.
    Callable(ObjectRef),
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slot { object, slot } => match object.upgrade() {
                Some(object) => write!(f, "Slot({}.{slot})", object.base().string_id()),
                None => write!(f, "Slot(<destroyed>.{slot})"),
            },
            Self::Callable(callable) => write!(f, "Callable({})", callable.base().string_id()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Equal(String),
    NotEqual(String),
}

impl Condition {
    fn parse(text: &str) -> Self {
        if let Some(value) = text.strip_prefix("==") {
            Self::Equal(value.to_string())
        } else if let Some(value) = text.strip_prefix("!=") {
            Self::NotEqual(value.to_string())
        } else {
            Self::Equal(text.to_string())
        }
    }

    fn holds(&self, value: &Any) -> bool {
        match self {
            Self::Equal(expected) => value.as_string() == *expected,
            Self::NotEqual(expected) => value.as_string() != *expected,
        }
    }
}

/// A listener of a signal together with its argument translation.
#[derive(Debug, Clone)]
pub struct Connection {
    target: ConnectionTarget,
    conditions: Vec<(String, Condition)>,
    discarded: Vec<String>,
    renamed: Vec<(String, String)>,
    added: ArgList,
}

impl Connection {
    fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            conditions: Vec::new(),
            discarded: Vec::new(),
            renamed: Vec::new(),
            added: ArgList::new(),
        }
    }

    /// Deliver to the method `slot` of `object`.
    pub fn to_slot(object: &ObjectRef, slot: impl Into<String>) -> Self {
        Self::new(ConnectionTarget::Slot {
            object: Arc::downgrade(object),
            slot: slot.into(),
        })
    }

    /// Deliver to a callable object.
    pub fn to_callable(callable: ObjectRef) -> Self {
        Self::new(ConnectionTarget::Callable(callable))
    }

    /// Only deliver when the emitted argument `name` satisfies `condition`.
    ///
    /// `==value` and plain `value` require equality of the textual forms,
    /// `!=value` inequality.
    pub fn if_arg(mut self, name: impl Into<String>, condition: &str) -> Self {
        self.conditions.push((name.into(), Condition::parse(condition)));
        self
    }

    /// Add a constant argument, overwriting an emitted one of that name.
    pub fn add_arg(mut self, name: impl Into<String>, value: impl Into<Any>) -> Self {
        self.added.set_arg(&name.into(), value);
        self
    }

    pub fn rename_arg(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renamed.push((from.into(), to.into()));
        self
    }

    pub fn discard_arg(mut self, name: impl Into<String>) -> Self {
        self.discarded.push(name.into());
        self
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Whether every condition holds for the emitted `args`.
    ///
    /// A condition on an argument that was not emitted is ignored.
    pub fn conditions_hold(&self, args: &ArgList) -> bool {
        self.conditions.iter().all(|(name, condition)| match args.arg_value(name) {
            Some(value) => condition.holds(value),
            None => {
                tracing::warn!(
                    target: targets::SIGNAL,
                    arg = %name,
                    "condition on a missing argument ignored"
                );
                true
            }
        })
    }

    /// The arguments the listener receives.
    pub fn translate_args(&self, args: &ArgList) -> ArgList {
        let mut result = args.clone();
        for name in &self.discarded {
            while let Some(index) = result.find_arg_index(name) {
                result.delete_ith_arg(index);
            }
        }
        for (from, to) in &self.renamed {
            result.rename_arg(from, to);
        }
        result.append(&self.added, true);
        result
    }

    /// Deliver an emission.
    ///
    /// A failing condition skips the listener and counts as success.
    pub fn invoke(&self, args: &ArgList) -> InvokeResult<Any> {
        if !self.conditions_hold(args) {
            tracing::trace!(target: targets::SIGNAL, listener = ?self.target, "condition failed, skipped");
            return Ok(Any::Bool(true));
        }
        let args = self.translate_args(args);
        match &self.target {
            ConnectionTarget::Slot { object, slot } => {
                let object = object.upgrade().ok_or(InvokeError::Detached)?;
                object.invoke_method(slot, &args)
            }
            ConnectionTarget::Callable(callable) => match callable.as_callable() {
                Some(callable) => callable.invoke(&args),
                None => Err(InvokeError::TargetType {
                    expected: "Callable".to_string(),
                    found: callable.meta_class().name().to_string(),
                }),
            },
        }
    }
}

/// Connections of one object, by signal.
#[derive(Default)]
pub(crate) struct SignalTable {
    connections: SlotMap<ConnectionId, Arc<Connection>>,
    by_signal: HashMap<String, Vec<ConnectionId>>,
}

impl SignalTable {
    pub(crate) fn insert(&mut self, signal: &str, connection: Connection) -> ConnectionId {
        let id = self.connections.insert(Arc::new(connection));
        self.by_signal.entry(signal.to_string()).or_default().push(id);
        id
    }

    pub(crate) fn remove(&mut self, id: ConnectionId) -> bool {
        if self.connections.remove(id).is_none() {
            return false;
        }
        for ids in self.by_signal.values_mut() {
            ids.retain(|other| *other != id);
        }
        self.by_signal.retain(|_, ids| !ids.is_empty());
        true
    }

    pub(crate) fn remove_signal(&mut self, signal: &str) -> usize {
        let ids = self.by_signal.remove(signal).unwrap_or_default();
        for id in &ids {
            self.connections.remove(*id);
        }
        ids.len()
    }

    /// Snapshot of the listeners of `signal`, in connection order.
    pub(crate) fn listeners(&self, signal: &str) -> Vec<Arc<Connection>> {
        self.by_signal
            .get(signal)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.connections.get(*id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, signal: &str) -> usize {
        self.by_signal.get(signal).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::FunctionCallable;
    use crate::registry::Meta;
    use parking_lot::Mutex;

    fn recorder(meta: &Meta) -> (ObjectRef, Arc<Mutex<Vec<ArgList>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let callable: ObjectRef = FunctionCallable::new(meta, move |args: &ArgList| {
            sink.lock().push(args.clone());
            Ok(Any::Null)
        });
        (callable, calls)
    }

    #[test]
    fn test_translation_order() {
        let meta = Meta::new();
        let (callable, _) = recorder(&meta);
        let connection = Connection::to_callable(callable)
            .discard_arg("noise")
            .rename_arg("a", "b")
            .add_arg("b", 10)
            .add_arg("c", "k");
        let args = ArgList::new().with("noise", 1).with("a", 2).with("d", 3);
        let translated = connection.translate_args(&args);
        assert_eq!(translated.get_arg::<i32>("b"), Some(10));
        assert_eq!(translated.get_arg::<String>("c").as_deref(), Some("k"));
        assert_eq!(translated.get_arg::<i32>("d"), Some(3));
        assert!(!translated.has_arg("noise"));
        assert!(!translated.has_arg("a"));
    }

    #[test]
    fn test_conditions() {
        let meta = Meta::new();
        let (callable, calls) = recorder(&meta);
        let connection = Connection::to_callable(callable)
            .if_arg("mode", "!=silent")
            .if_arg("level", "==2")
            .if_arg("absent", "x");

        assert_eq!(
            connection.invoke(&ArgList::new().with("mode", "silent").with("level", 2)),
            Ok(Any::Bool(true))
        );
        assert!(calls.lock().is_empty());

        connection
            .invoke(&ArgList::new().with("mode", "loud").with("level", 2))
            .ok();
        assert_eq!(calls.lock().len(), 1);

        connection
            .invoke(&ArgList::new().with("mode", "loud").with("level", 3))
            .ok();
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    fn test_table_keeps_connection_order() {
        let meta = Meta::new();
        let (a, _) = recorder(&meta);
        let (b, _) = recorder(&meta);
        let mut table = SignalTable::default();
        let first = table.insert("changed", Connection::to_callable(a.clone()));
        table.insert("changed", Connection::to_callable(b.clone()));
        table.insert("other", Connection::to_callable(a));
        assert_eq!(table.count("changed"), 2);

        let listeners = table.listeners("changed");
        assert!(matches!(
            listeners[1].target(),
            ConnectionTarget::Callable(c) if Arc::ptr_eq(c, &b)
        ));

        assert!(table.remove(first));
        assert!(!table.remove(first));
        assert_eq!(table.count("changed"), 1);
        assert_eq!(table.remove_signal("other"), 1);
        assert_eq!(table.count("other"), 0);
    }

    #[test]
    fn test_dead_slot_target_fails() {
        let meta = Meta::new();
        let node: ObjectRef = crate::node::Node::new(&meta);
        let connection = Connection::to_slot(&node, "nb_children");
        drop(node);
        assert_eq!(connection.invoke(&ArgList::new()), Err(InvokeError::Detached));
    }
}
