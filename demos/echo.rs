//! Echo component - a single action returning its params as an entity.
//!
//! This example demonstrates:
//! - Building a component with the fluent builder
//! - Reading typed params and registering an entity
//! - Logging from a handler in debug mode
//! - Running the supervised process over stdin/stdout
//!
//! The platform starts the binary and speaks the framed protocol on its
//! standard streams. Send SIGTERM to drain and stop.

use std::collections::BTreeMap;

use svc_runtime::{Component, ComponentConfig, Value};

fn main() -> svc_runtime::Result<()> {
    let debug = std::env::var_os("ECHO_DEBUG").is_some();
    let config = ComponentConfig::new("echo", "1.0.0")
        .with_debug(debug)
        .with_workers(2);

    Component::builder(config)
        .action("echo", |mut action| async move {
            let entity: BTreeMap<String, Value> = action
                .params()
                .into_iter()
                .map(|param| (param.name().to_string(), param.value().clone()))
                .collect();
            action.log(format!("echoing {} param(s)", entity.len()));
            action.set_entity(Value::Map(entity))?;
            Ok(action)
        })
        .on_start(|context| tracing::info!("{} ready", context.name()))
        .into_process()?
        .run()
}
