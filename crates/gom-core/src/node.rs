//! Object trees.
//!
//! Any object kind can take part in a hierarchy by returning [`NodeLinks`]
//! from [`Object::node`]. A parent owns its children; a child observes its
//! parent, so dropping the root releases the whole tree.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::any::Any;
use crate::arg_list::ArgList;
use crate::error::{InvokeError, InvokeResult};
use crate::logging::targets;
use crate::meta_class::MetaClass;
use crate::meta_member::{MetaArg, MetaMethod, MetaProperty};
use crate::object::{new_object, same_object, Object, ObjectBase, ObjectRef, WeakObjectRef};
use crate::registry::Meta;

/// Parent and children of a tree node.
#[derive(Default)]
pub struct NodeLinks {
    parent: Mutex<Option<WeakObjectRef>>,
    children: Mutex<Vec<ObjectRef>>,
}

impl NodeLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nb_children(&self) -> usize {
        self.children.lock().len()
    }

    pub fn ith_child(&self, index: usize) -> Option<ObjectRef> {
        self.children.lock().get(index).cloned()
    }

    /// Snapshot of the children, in insertion order.
    pub fn children(&self) -> Vec<ObjectRef> {
        self.children.lock().clone()
    }

    pub fn parent(&self) -> Option<ObjectRef> {
        self.parent.lock().as_ref().and_then(|weak| weak.upgrade())
    }

    pub fn is_child(&self, object: &dyn Object) -> bool {
        self.children
            .lock()
            .iter()
            .any(|child| same_object(child.as_ref(), object))
    }

    fn detach(&self, child: &dyn Object) -> bool {
        let mut children = self.children.lock();
        match children.iter().position(|c| same_object(c.as_ref(), child)) {
            Some(index) => {
                children.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Make `child` the last child of `parent`, detaching it from its previous
/// parent first.
pub fn add_child(parent: &ObjectRef, child: &ObjectRef) -> InvokeResult<()> {
    let parent_links = node_links(parent.as_ref())?;
    let child_links = node_links(child.as_ref())?;

    let mut ancestor = Some(parent.clone());
    while let Some(node) = ancestor {
        if same_object(node.as_ref(), child.as_ref()) {
            tracing::warn!(
                target: targets::OBJECT,
                parent = %parent.string_id(),
                child = %child.string_id(),
                "a node cannot be its own ancestor"
            );
            return Err(InvokeError::CircularParentage);
        }
        ancestor = node.node().and_then(NodeLinks::parent);
    }

    if let Some(previous) = child_links.parent() {
        if let Some(previous_links) = previous.node() {
            previous_links.detach(child.as_ref());
        }
    }
    parent_links.children.lock().push(child.clone());
    *child_links.parent.lock() = Some(Arc::downgrade(parent));
    tracing::trace!(
        target: targets::OBJECT,
        parent = %parent.string_id(),
        child = %child.string_id(),
        "child added"
    );
    Ok(())
}

/// Detach `child` from `parent`.
///
/// # Panics
///
/// Panics if `child` is not a child of `parent`, or if either object has no
/// node links.
pub fn remove_child(parent: &ObjectRef, child: &ObjectRef) {
    let (Some(parent_links), Some(child_links)) = (parent.node(), child.node()) else {
        panic!(
            "{} or {} is not a node",
            parent.string_id(),
            child.string_id()
        );
    };
    assert!(
        parent_links.detach(child.as_ref()),
        "{} is not a child of {}",
        child.string_id(),
        parent.string_id()
    );
    *child_links.parent.lock() = None;
}

/// The concrete `Node` class: an object whose only state is its links.
pub struct Node {
    base: ObjectBase,
    links: NodeLinks,
}

impl Node {
    pub fn new(meta: &Meta) -> Arc<Self> {
        Self::with_class(meta.node_class().clone())
    }

    /// A node whose dynamic class is `class`, a subclass of `Node`.
    pub fn with_class(class: Arc<MetaClass>) -> Arc<Self> {
        new_object(Self {
            base: ObjectBase::new(class),
            links: NodeLinks::new(),
        })
    }

    pub fn links(&self) -> &NodeLinks {
        &self.links
    }
}

impl Object for Node {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn node(&self) -> Option<&NodeLinks> {
        Some(&self.links)
    }
}

fn self_ref(obj: &dyn Object) -> InvokeResult<ObjectRef> {
    obj.base().self_ref().ok_or(InvokeError::Detached)
}

pub(crate) fn build_node_class(object_class: &Arc<MetaClass>) -> Arc<MetaClass> {
    let class = MetaClass::builder("Node")
        .super_class(object_class)
        .type_id::<Node>()
        .help("A tree node owning its children.")
        .build();

    class.add_constructor(
        MetaMethod::constructor(&class, |class: &Arc<MetaClass>, args: &ArgList| {
            let node: ObjectRef = Node::with_class(class.clone());
            if let Some(Some(parent)) = args.get_arg::<Option<ObjectRef>>("parent") {
                if let Err(err) = add_child(&parent, &node) {
                    tracing::warn!(target: targets::OBJECT, "Node: {err}");
                    return None;
                }
            }
            Some(node)
        })
        .with_arg(MetaArg::new("parent", "Object*").with_default(Any::Null)),
    );

    class.add_property(MetaProperty::new("nb_children", &class, "usize", |obj| {
        Ok(Any::from(node_links(obj)?.nb_children()))
    }));
    class.add_property(MetaProperty::new("parent", &class, "Object*", |obj| {
        Ok(Any::from(node_links(obj)?.parent()))
    }));
    class.add_slot(
        MetaMethod::slot("ith_child", &class, "Object*", |obj, args| {
            let index: usize = args.require("Node::ith_child", "index")?;
            Ok(Any::from(node_links(obj)?.ith_child(index)))
        })
        .with_arg(MetaArg::new("index", "usize")),
    );
    class.add_slot(
        MetaMethod::slot("add_child", &class, "()", |obj, args| {
            let child: ObjectRef = args.require("Node::add_child", "child")?;
            add_child(&self_ref(obj)?, &child).map(|()| Any::Null)
        })
        .with_arg(MetaArg::new("child", "Object*")),
    );
    // Scripts get an error rather than the native panic.
    class.add_slot(
        MetaMethod::slot("remove_child", &class, "()", |obj, args| {
            let child: ObjectRef = args.require("Node::remove_child", "child")?;
            if !node_links(obj)?.is_child(child.as_ref()) {
                return Err(InvokeError::Failed(format!(
                    "{} is not a child of {}",
                    child.string_id(),
                    obj.base().string_id()
                )));
            }
            remove_child(&self_ref(obj)?, &child);
            Ok(Any::Null)
        })
        .with_arg(MetaArg::new("child", "Object*")),
    );
    class
}

fn node_links(obj: &dyn Object) -> InvokeResult<&NodeLinks> {
    obj.node().ok_or_else(|| InvokeError::TargetType {
        expected: "Node".to_string(),
        found: obj.meta_class().name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(meta: &Meta) -> ObjectRef {
        Node::new(meta)
    }

    #[test]
    fn test_add_child_sets_both_links() {
        let meta = Meta::new();
        let root = node(&meta);
        let child = node(&meta);
        assert_eq!(add_child(&root, &child), Ok(()));
        assert_eq!(root.nb_elements(), Ok(1));
        let parent = child.node().and_then(NodeLinks::parent);
        assert!(parent.is_some_and(|p| Arc::ptr_eq(&p, &root)));
        assert_eq!(root.get_element(0), Ok(Any::Object(child.clone())));
    }

    #[test]
    fn test_reparenting_detaches_from_previous_parent() {
        let meta = Meta::new();
        let a = node(&meta);
        let b = node(&meta);
        let child = node(&meta);
        add_child(&a, &child).ok();
        add_child(&b, &child).ok();
        assert_eq!(a.nb_elements(), Ok(0));
        assert_eq!(b.nb_elements(), Ok(1));
    }

    #[test]
    fn test_cycles_are_rejected() {
        let meta = Meta::new();
        let a = node(&meta);
        let b = node(&meta);
        add_child(&a, &b).ok();
        assert_eq!(add_child(&b, &a), Err(InvokeError::CircularParentage));
        assert_eq!(add_child(&a, &a), Err(InvokeError::CircularParentage));
    }

    #[test]
    fn test_parent_owns_children() {
        let meta = Meta::new();
        let root = node(&meta);
        let child = node(&meta);
        add_child(&root, &child).ok();
        let observed = Arc::downgrade(&child);
        drop(child);
        assert!(observed.upgrade().is_some());
        drop(root);
        assert!(observed.upgrade().is_none());
    }

    #[test]
    #[should_panic(expected = "is not a child of")]
    fn test_remove_non_child_panics() {
        let meta = Meta::new();
        let a = node(&meta);
        let b = node(&meta);
        remove_child(&a, &b);
    }

    #[test]
    fn test_reflected_interface() {
        let meta = Meta::new();
        let root = meta.create("Node", &ArgList::new()).unwrap();
        let child = meta.create("Node", &ArgList::new().with("parent", root.clone()));
        assert!(child.is_ok());
        assert_eq!(root.get_property("nb_children"), Ok(Any::UInt(1)));

        let args = ArgList::new().with("index", 0);
        let first = root.invoke_method("ith_child", &args);
        assert!(matches!(first, Ok(Any::Object(_))));

        let mut remove = ArgList::new();
        remove.create_unnamed_arg(root.clone());
        assert!(root.invoke_method("remove_child", &remove).is_err());
    }
}
