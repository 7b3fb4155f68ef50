//! Integration tests for the #[derive(Object)] and #[slots] macros.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gom_core::{
    add_child, new_object, object_cast, Any, ArgList, ExpectedType, FunctionCallable, InvokeError,
    InvokeResult, Meta, MetaEnum, NodeLinks, Object, ObjectBase, ObjectRef, Property,
};
use gom_macros::{slots, Object};
use parking_lot::Mutex;

#[derive(Object)]
#[object(super_class = "Node", help = "A point in the plane")]
struct Point {
    base: ObjectBase,

    #[node]
    links: NodeLinks,

    #[property(notify = "moved")]
    x: Property<f64>,

    #[property]
    y: Property<f64>,

    #[property(type_name = "Color")]
    color: Property<i64>,

    #[property(read_only)]
    label: String,
}

#[slots]
impl Point {
    /// Create a point.
    #[constructor]
    fn new(base: ObjectBase, #[default(0.0)] x: f64, #[default(0.0)] y: f64) -> Self {
        Self {
            base,
            links: NodeLinks::new(),
            x: Property::new(x),
            y: Property::new(y),
            color: Property::new(0),
            label: "point".to_string(),
        }
    }

    /// Move the point by an offset.
    #[slot]
    fn translate(&self, dx: f64, #[default(0.0)] dy: f64) {
        let x = self.x.get() + dx;
        if self.x.set(x) {
            self.moved(x);
        }
        self.y.set(self.y.get() + dy);
    }

    #[slot]
    fn norm(&self) -> f64 {
        self.x.get().hypot(self.y.get())
    }

    #[slot]
    fn scale(&self, factor: f64) -> InvokeResult<()> {
        if factor == 0.0 {
            return Err(InvokeError::Failed("cannot scale by zero".to_string()));
        }
        self.x.set(self.x.get() * factor);
        self.y.set(self.y.get() * factor);
        Ok(())
    }

    #[slot]
    fn describe(&self, prefix: &str) -> String {
        format!("{prefix}({}, {})", self.x.get(), self.y.get())
    }

    #[slot]
    fn paint(&self, #[type_name = "Color"] color: i64) {
        self.color.set(color);
    }

    #[slot]
    fn count_args(&self, args: &ArgList) -> usize {
        args.nb_args()
    }

    #[signal]
    fn moved(&self, value: f64) {}
}

#[derive(Object)]
#[object(class = "Tracked", no_slots)]
struct TrackedObject {
    base: ObjectBase,
    drops: Arc<AtomicUsize>,
}

impl Drop for TrackedObject {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn setup() -> Meta {
    let meta = Meta::new();
    let color = Arc::new(MetaEnum::new("Color"));
    color.add_value("RED", 0);
    color.add_value("GREEN", 1);
    meta.register_enum(&color);
    Point::register_meta_class(&meta);
    meta
}

fn x_of(point: &ObjectRef) -> f64 {
    point.get_property("x").unwrap().get_value::<f64>().unwrap()
}

#[test]
fn test_class_registration() {
    let meta = setup();
    let class = meta.resolve_class("Point").unwrap();
    assert_eq!(class.name(), Point::CLASS_NAME);
    assert!(class.inherits("Node"));
    assert_eq!(class.custom_attributes().help().as_deref(), Some("A point in the plane"));
    assert!(class.find_property("x").is_some());
    assert!(class.find_property("label").unwrap().read_only());
    assert_eq!(class.find_property("color").unwrap().type_name(), "Color");
    assert!(class.find_signal("moved").is_some());
    assert_eq!(class.nb_constructors(), 1);
    assert_eq!(
        class.find_slot("translate").unwrap().custom_attributes().help().as_deref(),
        Some("Move the point by an offset.")
    );

    // registering again returns the same class
    assert!(Arc::ptr_eq(&class, &Point::register_meta_class(&meta)));
}

#[test]
fn test_construction_with_defaults() {
    let meta = setup();
    let point = meta.create("Point", &ArgList::new().with("x", 1.5)).unwrap();
    assert_eq!(point.get_property("x"), Ok(Any::Double(1.5)));
    assert_eq!(point.get_property("y"), Ok(Any::Double(0.0)));
    assert_eq!(point.get_property("label"), Ok(Any::from("point")));

    let typed = object_cast::<Point>(point.as_ref()).unwrap();
    assert_eq!(typed.x.get(), 1.5);
}

#[test]
fn test_positional_construction() {
    let meta = setup();
    let class = meta.resolve_class("Point").unwrap();
    let point = class.create_with([3.0, 4.0]).unwrap();
    assert_eq!(point.invoke_method("norm", &ArgList::new()), Ok(Any::Double(5.0)));
}

#[test]
fn test_slots() {
    let meta = setup();
    let point = meta.create("Point", &ArgList::new()).unwrap();

    point
        .invoke_method("translate", &ArgList::new().with("dx", 2.0))
        .unwrap();
    assert_eq!(x_of(&point), 2.0);

    let described = point.invoke_method("describe", &ArgList::new().with("prefix", "P"));
    assert_eq!(described, Ok(Any::from("P(2, 0)")));

    let counted = point.invoke_method("count_args", &ArgList::new().with("a", 1).with("b", 2));
    assert_eq!(counted, Ok(Any::from(2_usize)));

    let err = point.invoke_method("scale", &ArgList::new().with("factor", 0.0));
    assert_eq!(err, Err(InvokeError::Failed("cannot scale by zero".to_string())));
    assert_eq!(x_of(&point), 2.0);
}

#[test]
fn test_dispatch_failure_leaves_object_unchanged() {
    let meta = setup();
    let point = meta.create("Point", &ArgList::new().with("x", 1.0)).unwrap();

    assert!(matches!(
        point.set_property("x", "wide"),
        Err(InvokeError::ArgumentType { .. })
    ));
    assert!(matches!(
        point.invoke_method("translate", &ArgList::new()),
        Err(InvokeError::MissingArgument { .. })
    ));
    assert!(matches!(
        point.set_property("label", "other"),
        Err(InvokeError::ReadOnlyProperty { .. })
    ));
    assert!(matches!(
        point.invoke_method("fly", &ArgList::new()),
        Err(InvokeError::NoSuchMethod { .. })
    ));
    assert_eq!(x_of(&point), 1.0);
    assert_eq!(point.get_property("label"), Ok(Any::from("point")));
}

#[test]
fn test_property_notification() {
    let meta = setup();
    let point = meta.create("Point", &ArgList::new()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener = FunctionCallable::new(&meta, move |args| {
        sink.lock().push(args.arg_value("value").cloned().unwrap_or_default());
        Ok(Any::Null)
    });
    point.connect_signal_to_callable("moved", listener).unwrap();

    point.set_property("x", 4.0).unwrap();
    // unchanged value, no notification
    point.set_property("x", 4.0).unwrap();
    point
        .invoke_method("translate", &ArgList::new().with("dx", 1.0))
        .unwrap();
    // y has no notify signal
    point.set_property("y", 9.0).unwrap();

    assert_eq!(*seen.lock(), vec![Any::Double(4.0), Any::Double(5.0)]);
}

#[test]
fn test_signal_to_slot() {
    let meta = setup();
    let source = meta.create("Point", &ArgList::new()).unwrap();
    let target = meta.create("Point", &ArgList::new()).unwrap();
    source
        .connect(
            "moved",
            gom_core::Connection::to_slot(&target, "translate").rename_arg("value", "dx"),
        )
        .unwrap();

    source.set_property("x", 3.0).unwrap();
    assert_eq!(x_of(&target), 3.0);

    let typed = object_cast::<Point>(source.as_ref()).unwrap();
    assert!(typed.moved(1.0));
    assert_eq!(x_of(&target), 4.0);
}

#[test]
fn test_enum_round_trip() {
    let meta = setup();
    let point = meta.create("Point", &ArgList::new()).unwrap();
    let class = meta.resolve_class("Point").unwrap();
    let paint = class.find_slot("paint").unwrap();

    let expected = ExpectedType::of_named_arg(&meta, Some(&paint), "color");
    assert!(matches!(expected, ExpectedType::Enum(_)));
    let value = expected.coerce(&meta, Any::from("GREEN"), "Point::paint", "color").unwrap();
    assert_eq!(value, Any::Int(1));
    assert!(expected.coerce(&meta, Any::from("BLUE"), "Point::paint", "color").is_err());

    point
        .invoke_method("paint", &ArgList::new().with("color", value))
        .unwrap();
    let stored = point.get_property("color").unwrap();
    let stored = meta.enum_from_any("Color", &stored).unwrap();
    assert_eq!(meta.enum_name("Color", stored).as_deref(), Some("GREEN"));
}

#[test]
fn test_node_children() {
    let meta = setup();
    let root = meta.create("Point", &ArgList::new()).unwrap();
    let child = meta.create("Point", &ArgList::new()).unwrap();
    add_child(&root, &child).unwrap();

    assert_eq!(root.nb_elements(), Ok(1));
    assert!(root.node().unwrap().is_child(child.as_ref()));
    assert!(matches!(add_child(&child, &root), Err(InvokeError::CircularParentage)));
}

#[test]
fn test_destroyed_with_last_reference() {
    let meta = Meta::new();
    let class = TrackedObject::register_meta_class(&meta);
    assert!(class.inherits("Object"));

    let drops = Arc::new(AtomicUsize::new(0));
    let object: ObjectRef = new_object(TrackedObject {
        base: ObjectBase::new(class),
        drops: Arc::clone(&drops),
    });
    let weak = Arc::downgrade(&object);
    let other = Arc::clone(&object);

    drop(object);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    assert!(other.self_ref().is_some());

    drop(other);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_wrong_target_type() {
    let meta = setup();
    let class = meta.resolve_class("Point").unwrap();
    let translate = class.find_slot("translate").unwrap();
    let node = meta.create("Node", &ArgList::new()).unwrap();

    let err = translate.invoke(node.as_ref(), &ArgList::new().with("dx", 1.0));
    assert!(matches!(err, Err(InvokeError::TargetType { .. })));
}
