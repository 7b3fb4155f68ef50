//! GOM Scripting Example
//!
//! Declares a reflected class in Rust and drives the same instance from Lua
//! and from Rhai:
//! - construction with named arguments
//! - property reads and writes, slot calls
//! - a signal connected to a script function
//!
//! Run with: RUST_LOG=info cargo run -p gom --example scripting

use gom::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Object)]
#[object(help = "A heater driven towards a target temperature")]
struct Thermostat {
    base: ObjectBase,

    #[property(notify = "changed")]
    temperature: Property<f64>,

    #[property]
    target: Property<f64>,
}

#[slots]
impl Thermostat {
    #[constructor]
    fn new(base: ObjectBase, #[default(20.0)] target: f64) -> Self {
        Self {
            base,
            temperature: Property::new(15.0),
            target: Property::new(target),
        }
    }

    /// Move halfway towards the target.
    #[slot]
    fn step(&self) -> f64 {
        let next = (self.temperature.get() + self.target.get()) / 2.0;
        if self.temperature.set(next) {
            self.changed(next);
        }
        next
    }

    #[signal]
    fn changed(&self, value: f64) {}
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let ctx = gom::init(GomConfig::default())?;
    Thermostat::register_meta_class(ctx.meta());

    let lua = ctx.interpreter("lua")?;
    lua.execute(
        r#"
        heater = gom.create{classname = "Thermostat", target = 22}
        gom.connect(heater.changed, function(args) print("lua sees", args.value) end)
        heater:step()
        "#,
        true,
        true,
    )?;

    // hand the same object to Rhai
    let heater = lua.resolve("heater").ok_or("heater is not defined")?;
    let rhai = ctx.interpreter("rhai")?;
    rhai.bind("heater", &heater)?;
    rhai.execute(
        r#"
        gom.connect(heater.changed, |args| print(`rhai sees ${args.value}`));
        heater.target = 30.0;
        heater.step();
        "#,
        true,
        true,
    )?;

    let heater = heater.as_object().ok_or("heater is not an object")?;
    tracing::info!(
        temperature = %heater.get_property("temperature")?,
        "final state"
    );
    println!("{}", heater.doc());
    Ok(())
}
