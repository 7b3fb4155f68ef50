//! Objects shared between the Lua and Rhai interpreters of one context.

use gom::prelude::*;

#[derive(Object)]
#[object(help = "A level that reports its changes")]
struct Gauge {
    base: ObjectBase,

    #[property(notify = "changed")]
    level: Property<f64>,
}

#[slots]
impl Gauge {
    #[constructor]
    fn new(base: ObjectBase) -> Self {
        Self {
            base,
            level: Property::new(0.0),
        }
    }

    #[signal]
    fn changed(&self, value: f64) {}
}

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn run(interpreter: &dyn Interpreter, command: &str) {
    if let Err(err) = interpreter.execute(command, false, true) {
        panic!("{command}: {}", err.display_message());
    }
}

#[test]
fn test_init_registers_both_interpreters() {
    init_logging();
    let ctx = gom::init(GomConfig::default()).unwrap();
    assert_eq!(ctx.interpreter("LUA").unwrap().language(), "Lua");
    let rhai = ctx
        .interpreter_for_file(std::path::Path::new("boot.rhai"))
        .unwrap();
    assert_eq!(rhai.language(), "Rhai");
    assert!(matches!(
        ctx.interpreter("python"),
        Err(GomError::UnknownInterpreter(_))
    ));
}

#[test]
fn test_tree_built_from_both_languages() {
    init_logging();
    let ctx = gom::init(GomConfig::default()).unwrap();
    let lua = ctx.interpreter("lua").unwrap();
    let rhai = ctx.interpreter("rhai").unwrap();

    run(lua.as_ref(), "root = gom.create{classname = 'Node'}");
    rhai.bind("root", &lua.resolve("root").unwrap()).unwrap();
    run(
        rhai.as_ref(),
        "let child = gom.create(#{classname: \"Node\", parent: root});",
    );

    assert_eq!(lua.eval("#root").unwrap(), Any::Int(1));
    assert_eq!(rhai.eval("root.nb_children").unwrap(), Any::Int(1));
}

#[test]
fn test_signal_reaches_both_languages() {
    init_logging();
    let ctx = gom::init(GomConfig::default()).unwrap();
    Gauge::register_meta_class(ctx.meta());
    let lua = ctx.interpreter("lua").unwrap();
    let rhai = ctx.interpreter("rhai").unwrap();

    run(
        lua.as_ref(),
        r#"
        gauge = gom.create{classname = "Gauge"}
        lua_seen = 0
        gom.connect(gauge.changed, function(args) lua_seen = args.value end)
        "#,
    );
    rhai.bind("gauge", &lua.resolve("gauge").unwrap()).unwrap();
    run(
        rhai.as_ref(),
        r#"
        let rhai_seen = [];
        gom.connect(gauge.changed, |args| rhai_seen.push(args.value));
        gauge.level = 3.0;
        "#,
    );

    assert_eq!(lua.resolve("lua_seen"), Some(Any::Double(3.0)));
    assert_eq!(rhai.eval("rhai_seen.len()").unwrap(), Any::Int(1));
}

#[test]
fn test_init_from_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("boot.lua"),
        "booted = gom.get_environment_value('mode')\n",
    )
    .unwrap();
    let path = dir.path().join("gom.toml");
    std::fs::write(
        &path,
        "startup_scripts = [\"boot.lua\"]\n\n[environment]\nmode = \"demo\"\n",
    )
    .unwrap();

    let ctx = gom::init_from_file(&path).unwrap();
    ctx.run_startup().unwrap();
    let lua = ctx.interpreter("lua").unwrap();
    assert_eq!(lua.resolve("booted"), Some(Any::from("demo")));
}
