//! Scripts driving reflected objects through the Rhai bridge.

use std::sync::Arc;

use gom_core::{
    Any, ArgList, GomConfig, GomContext, Interpreter, InvokeError, InvokeResult, Meta, ObjectBase,
    Property,
};
use gom_macros::{slots, Object};
use gom_rhai::{RhaiInterpreter, GOM_VARIABLE};

#[derive(Object)]
#[object(help = "A point in the plane")]
struct Point {
    base: ObjectBase,

    #[property(notify = "moved")]
    x: Property<f64>,

    #[property]
    y: Property<f64>,
}

#[slots]
impl Point {
    #[constructor]
    fn new(base: ObjectBase, #[default(0.0)] x: f64, #[default(0.0)] y: f64) -> Self {
        Self {
            base,
            x: Property::new(x),
            y: Property::new(y),
        }
    }

    #[slot]
    fn translate(&self, dx: f64, #[default(0.0)] dy: f64) {
        if self.x.set(self.x.get() + dx) {
            self.moved(self.x.get());
        }
        self.y.set(self.y.get() + dy);
    }

    #[slot]
    fn norm(&self) -> f64 {
        self.x.get().hypot(self.y.get())
    }

    #[slot]
    fn divide(&self, by: f64) -> InvokeResult<f64> {
        if by == 0.0 {
            return Err(InvokeError::Failed("division by zero".to_string()));
        }
        Ok(self.x.get() / by)
    }

    #[signal]
    fn moved(&self, value: f64) {}
}

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn setup() -> (GomContext, Arc<RhaiInterpreter>) {
    init_logging();
    let ctx = GomContext::new(GomConfig::default());
    Point::register_meta_class(ctx.meta());
    let rhai = gom_rhai::initialize(&ctx);
    (ctx, rhai)
}

fn run(rhai: &RhaiInterpreter, command: &str) {
    if let Err(err) = rhai.execute(command, true, true) {
        panic!("{command}: {}", err.display_message());
    }
}

#[test]
fn test_properties_and_slots() {
    let (_ctx, rhai) = setup();
    run(
        &rhai,
        r#"
        let p = gom.create(#{classname: "Point", x: 3});
        p.y = 4;
        let n = p.norm();
        p.translate(1);
        p.translate(#{dx: 1, dy: 2});
        "#,
    );
    assert_eq!(rhai.resolve("n"), Some(Any::Double(5.0)));
    assert_eq!(rhai.eval("p.x").unwrap(), Any::Double(5.0));
    assert_eq!(rhai.eval("p[\"y\"]").unwrap(), Any::Double(6.0));
    assert_eq!(rhai.eval("p.get_x()").unwrap(), Any::Double(5.0));

    let point = rhai.resolve("p").unwrap();
    let point = point.as_object().unwrap();
    assert!(point.is_a("Point"));
    assert_eq!(rhai.eval("p.to_string()").unwrap(), Any::String(point.string_id()));
    assert_eq!(rhai.eval("p == p").unwrap(), Any::Bool(true));
    assert_eq!(rhai.core().nb_history_lines(), 1);
}

#[test]
fn test_integers_convert_to_declared_types() {
    let (_ctx, rhai) = setup();
    run(&rhai, "let p = gom.create(#{classname: \"Point\"}); p.x = 2; let q = p.divide(4);");
    assert_eq!(rhai.resolve("q"), Some(Any::Double(0.5)));
    run(&rhai, "p.x = \"7.5\";");
    assert_eq!(rhai.eval("p.x").unwrap(), Any::Double(7.5));
}

#[test]
fn test_errors_reach_scripts() {
    let (_ctx, rhai) = setup();
    run(&rhai, "let p = gom.create(#{classname: \"Point\"});");

    let err = rhai.execute("p[\"fly\"]", false, false).unwrap_err();
    assert_eq!(err.display_message(), "Point::fly : no such method nor property");

    let err = rhai.execute("p.divide(0)", false, false).unwrap_err();
    assert_eq!(err.display_message(), "division by zero");

    run(
        &rhai,
        r#"
        let ok = true;
        try { p.x = "wide"; } catch { ok = false; }
        let still = p.x;
        "#,
    );
    assert_eq!(rhai.resolve("ok"), Some(Any::Bool(false)));
    assert_eq!(rhai.resolve("still"), Some(Any::Double(0.0)));
}

#[test]
fn test_signal_calls_rhai_closure() {
    let (_ctx, rhai) = setup();
    run(
        &rhai,
        r#"
        let seen = [];
        let p = gom.create(#{classname: "Point"});
        gom.connect(p.moved, |args| seen.push(args.value));
        p.x = 2.0;
        p.translate(0.5);
        "#,
    );
    assert_eq!(rhai.eval("seen.len()").unwrap(), Any::Int(2));
    assert_eq!(rhai.eval("seen[1]").unwrap(), Any::Double(2.5));
}

#[test]
fn test_requests_are_callable() {
    let (_ctx, rhai) = setup();
    run(
        &rhai,
        r#"
        let p = gom.create(#{classname: "Point", x: 3, y: 4});
        let norm = p.norm;
        let n = norm.call();
        p["translate"].call(#{dx: 1});
        "#,
    );
    assert_eq!(rhai.resolve("n"), Some(Any::Double(5.0)));
    assert_eq!(rhai.eval("p.x").unwrap(), Any::Double(4.0));
}

#[test]
fn test_elements() {
    let (_ctx, rhai) = setup();
    run(
        &rhai,
        r#"
        let root = gom.create(#{classname: "Node"});
        let child = gom.create(#{classname: "Node", parent: root});
        let count = root.len();
        let first = root[0];
        let visited = 0;
        for node in root { visited += 1; }
        "#,
    );
    assert_eq!(rhai.resolve("count"), Some(Any::Int(1)));
    assert_eq!(rhai.resolve("visited"), Some(Any::Int(1)));
    assert_eq!(rhai.eval("first == child").unwrap(), Any::Bool(true));
}

#[test]
fn test_dynamic_class_from_rhai() {
    let (ctx, rhai) = setup();
    run(
        &rhai,
        r#"
        gom.create_class(#{"name": "Greeter"});
        gom.add_property(#{"classname": "Greeter", "name": "greeting", "type": "String", "default": "hello"});
        gom.add_slot(#{
            "classname": "Greeter", "name": "greet", "args": "who",
            "action": |t| t["self"].greeting + " " + t.who
        });
        "#,
    );
    // members of the new class are functions from the next command on
    run(&rhai, "let g = gom.create(#{classname: \"Greeter\"}); let result = g.greet(\"world\");");
    assert_eq!(rhai.resolve("result"), Some(Any::from("hello world")));

    let greeter = ctx.create("Greeter", &ArgList::new().with("greeting", "hi")).unwrap();
    let greeting = greeter.invoke_method("greet", &ArgList::new().with("who", "there"));
    assert_eq!(greeting, Ok(Any::from("hi there")));
}

#[test]
fn test_interpreter_slots_from_running_script() {
    let (_ctx, rhai) = setup();
    run(
        &rhai,
        r#"
        let pp = gom.create(#{classname: "Point", x: 7.0});
        let found = gom.resolve_object("pp");
        let missing = gom.resolve_object("nowhere");
        gom.bind_object("q", pp);
        let qx = q.x;
        gom.execute("let nested = 1;");
        let after = nested + 1;
        "#,
    );
    let found = rhai.resolve("found").unwrap();
    let pp = rhai.resolve("pp").unwrap();
    assert!(gom_core::same_object(found.as_object().unwrap().as_ref(), pp.as_object().unwrap().as_ref()));
    assert_eq!(rhai.resolve("missing"), Some(Any::Null));
    assert_eq!(rhai.resolve("qx"), Some(Any::Double(7.0)));
    assert_eq!(rhai.resolve("nested"), Some(Any::Int(1)));
    assert_eq!(rhai.resolve("after"), Some(Any::Int(2)));
    assert!(rhai.resolve("q").unwrap().as_object().unwrap().is_a("Point"));
}

#[test]
fn test_native_bind_during_signal() {
    let (ctx, rhai) = setup();
    run(&rhai, "let p = gom.create(#{classname: \"Point\"});");
    let point = rhai.resolve("p").unwrap();
    let point = point.as_object().unwrap().clone();

    let target = Arc::downgrade(&rhai);
    let callback = gom_core::FunctionCallable::new(ctx.meta(), move |args| {
        if let Some(rhai) = target.upgrade() {
            let value = args.arg_value("value").cloned().unwrap_or_default();
            rhai.bind("last_move", &value)
                .map_err(|err| InvokeError::Failed(err.display_message()))?;
        }
        Ok(Any::Null)
    });
    point.connect_signal_to_callable("moved", callback).unwrap();

    run(&rhai, "p.x = 4.5; let seen = last_move;");
    assert_eq!(rhai.resolve("seen"), Some(Any::Double(4.5)));
    assert_eq!(rhai.resolve("last_move"), Some(Any::Double(4.5)));
}

#[test]
fn test_environment_from_rhai() {
    let (_ctx, rhai) = setup();
    run(&rhai, "gom.set_environment_value(\"mode\", \"test\");");
    assert_eq!(
        rhai.eval("gom.get_environment_value(\"mode\")").unwrap(),
        Any::from("test")
    );
    assert_eq!(rhai.eval("gom.language").unwrap(), Any::from("Rhai"));
}

#[test]
fn test_gom_does_not_keep_interpreter_alive() {
    init_logging();
    let meta = Arc::new(Meta::new());
    let rhai = RhaiInterpreter::new(&meta, &GomConfig::default());
    run(&rhai, "let create = gom.create;");
    assert!(rhai.resolve(GOM_VARIABLE).is_some());

    let weak = Arc::downgrade(&rhai);
    drop(rhai);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_startup_script() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("startup.rhai");
    std::fs::write(&script, "let started = gom.language;\n").unwrap();

    let config = GomConfig {
        startup_scripts: vec![script],
        ..GomConfig::default()
    };
    let ctx = GomContext::new(config);
    let rhai = gom_rhai::initialize(&ctx);
    ctx.run_startup().unwrap();
    assert_eq!(rhai.resolve("started"), Some(Any::from("Rhai")));
    assert!(ctx.interpreter("rhai").is_ok());
}
