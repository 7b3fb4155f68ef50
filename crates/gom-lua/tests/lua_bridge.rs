//! Scripts driving reflected objects through the Lua bridge.

use std::sync::Arc;

use gom_core::{
    Any, ArgList, GomConfig, GomContext, Interpreter, InvokeError, InvokeResult, Meta, ObjectBase,
    Property,
};
use gom_lua::{LuaInterpreter, GOM_GLOBAL};
use gom_macros::{slots, Object};

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

fn setup() -> (GomContext, Arc<LuaInterpreter>) {
    init_logging();
    let ctx = GomContext::new(GomConfig::default());
    Point::register_meta_class(ctx.meta());
    let lua = gom_lua::initialize(&ctx).unwrap();
    (ctx, lua)
}

fn run(lua: &LuaInterpreter, command: &str) {
    if let Err(err) = lua.execute(command, true, true) {
        panic!("{command}: {}", err.display_message());
    }
}

#[test]
fn test_properties_and_slots() {
    let (_ctx, lua) = setup();
    run(
        &lua,
        r#"
        p = gom.create{classname = "Point", x = 3}
        p.y = 4
        n = p:norm()
        p:translate(1)
        p.translate{dx = 1, dy = 2}
        "#,
    );
    assert_eq!(lua.resolve("n"), Some(Any::Double(5.0)));
    assert_eq!(lua.eval("p.x").unwrap(), Any::Double(5.0));
    assert_eq!(lua.eval("p.y").unwrap(), Any::Double(6.0));
    assert_eq!(lua.eval("p:get_x()").unwrap(), Any::Double(5.0));

    let point = lua.resolve("p").unwrap();
    let point = point.as_object().unwrap();
    assert!(point.is_a("Point"));
    assert_eq!(lua.eval("tostring(p)").unwrap(), Any::String(point.string_id()));
    assert_eq!(lua.eval("p == p").unwrap(), Any::Bool(true));
    assert_eq!(lua.core().nb_history_lines(), 1);
}

#[test]
fn test_integers_convert_to_declared_types() {
    let (_ctx, lua) = setup();
    run(&lua, "p = gom.create{classname = 'Point'}; p.x = 2; q = p:divide(4)");
    assert_eq!(lua.resolve("q"), Some(Any::Double(0.5)));
    run(&lua, "p.x = '7.5'");
    assert_eq!(lua.eval("p.x").unwrap(), Any::Double(7.5));
}

#[test]
fn test_errors_reach_scripts() {
    let (_ctx, lua) = setup();
    run(&lua, "p = gom.create{classname = 'Point'}");

    let err = lua.execute("p:fly()", false, false).unwrap_err();
    assert_eq!(err.display_message(), "Point::fly : no such method nor property");

    let err = lua.execute("p:divide(0)", false, false).unwrap_err();
    assert_eq!(err.display_message(), "division by zero");

    run(
        &lua,
        "ok = pcall(function() p.x = 'wide' end); still = p.x",
    );
    assert_eq!(lua.resolve("ok"), Some(Any::Bool(false)));
    assert_eq!(lua.resolve("still"), Some(Any::Double(0.0)));
}

#[test]
fn test_signal_calls_lua_function() {
    let (_ctx, lua) = setup();
    run(
        &lua,
        r#"
        seen = {}
        p = gom.create{classname = "Point"}
        gom.connect(p.moved, function(args) seen[#seen + 1] = args.value end)
        p.x = 2
        p:translate(0.5)
        "#,
    );
    assert_eq!(lua.eval("#seen").unwrap(), Any::Int(2));
    assert_eq!(lua.eval("seen[2]").unwrap(), Any::Double(2.5));
}

#[test]
fn test_pairs_and_len() {
    let (_ctx, lua) = setup();
    run(
        &lua,
        r#"
        p = gom.create{classname = "Point", x = 1, y = 2}
        total = 0
        for name, value in pairs(p) do
            if type(value) == "number" then total = total + value end
        end
        root = gom.create{classname = "Node"}
        child = gom.create{classname = "Node", parent = root}
        count = #root
        first = root[1]
        "#,
    );
    assert_eq!(lua.resolve("total"), Some(Any::Double(3.0)));
    assert_eq!(lua.resolve("count"), Some(Any::Int(1)));
    assert_eq!(lua.eval("first == child").unwrap(), Any::Bool(true));
}

#[test]
fn test_element_index_out_of_range() {
    let (_ctx, lua) = setup();
    run(
        &lua,
        r#"
        root = gom.create{classname = "Node"}
        child = gom.create{classname = "Node", parent = root}
        zero_ok = pcall(function() return root[0] end)
        min_ok, min_err = pcall(function() return root[math.mininteger] end)
        min_err = tostring(min_err)
        set_ok = pcall(function() root[math.mininteger] = child end)
        past_ok = pcall(function() return root[2] end)
        "#,
    );
    assert_eq!(lua.resolve("zero_ok"), Some(Any::Bool(false)));
    assert_eq!(lua.resolve("min_ok"), Some(Any::Bool(false)));
    assert_eq!(lua.resolve("set_ok"), Some(Any::Bool(false)));
    assert_eq!(lua.resolve("past_ok"), Some(Any::Bool(false)));
    let message = lua.resolve("min_err").unwrap().as_string();
    assert!(message.contains("out of range"), "{message}");
}

#[test]
fn test_dynamic_class_from_lua() {
    let (ctx, lua) = setup();
    run(
        &lua,
        r#"
        gom.create_class{name = "Greeter"}
        gom.add_property{classname = "Greeter", name = "greeting", type = "String", default = "hello"}
        gom.add_slot{
            classname = "Greeter", name = "greet", args = "who",
            action = function(t) return t.self.greeting .. " " .. t.who end
        }
        g = gom.create{classname = "Greeter"}
        result = g:greet("world")
        "#,
    );
    assert_eq!(lua.resolve("result"), Some(Any::from("hello world")));

    // native callers reach the Lua slot too
    let greeter = ctx.create("Greeter", &ArgList::new().with("greeting", "hi")).unwrap();
    let greeting = greeter.invoke_method("greet", &ArgList::new().with("who", "there"));
    assert_eq!(greeting, Ok(Any::from("hi there")));
}

#[test]
fn test_environment_from_lua() {
    let (_ctx, lua) = setup();
    run(&lua, "gom:set_environment_value('mode', 'test')");
    assert_eq!(
        lua.eval("gom.get_environment_value('mode')").unwrap(),
        Any::from("test")
    );
    assert_eq!(lua.eval("gom.language").unwrap(), Any::from("Lua"));
}

#[test]
fn test_gom_does_not_keep_interpreter_alive() {
    init_logging();
    let meta = Arc::new(Meta::new());
    let lua = LuaInterpreter::new(&meta, &GomConfig::default()).unwrap();
    run(&lua, "create = gom.create");
    assert!(lua.resolve(GOM_GLOBAL).is_some());

    let weak = Arc::downgrade(&lua);
    drop(lua);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_startup_script() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("startup.lua");
    std::fs::write(&script, "started = gom.language\n").unwrap();

    let config = GomConfig {
        startup_scripts: vec![script],
        ..GomConfig::default()
    };
    let ctx = GomContext::new(config);
    let lua = gom_lua::initialize(&ctx).unwrap();
    ctx.run_startup().unwrap();
    assert_eq!(lua.resolve("started"), Some(Any::from("Lua")));
    assert!(ctx.interpreter("lua").is_ok());
}
