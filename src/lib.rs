//! # svc-runtime
//!
//! Runtime core for service components of a distributed RPC platform.
//!
//! A component registers action handlers. The platform sends commands over
//! an inter-process channel; the runtime decodes each one into a
//! path-addressable [`Payload`], runs the handler with an [`Action`],
//! and replies with the mutated transport plus meta flags telling the
//! platform what follow-up work the handler registered.
//!
//! ## Architecture
//!
//! - **Payload** ([`payload`]): tagged [`Value`] tree with path get/set/push
//! - **Codec** ([`codec`]): msgpack with extension envelopes for decimals and dates
//! - **Protocol** ([`protocol`], [`channel`]): framed requests and replies
//! - **Server** ([`server`]): one request in, one reply out
//! - **Process** ([`process`]): supervised worker units with restart and drain
//!
//! ## Example
//!
//! ```no_run
//! use svc_runtime::component::{Component, ComponentConfig};
//! use svc_runtime::payload::Value;
//!
//! fn main() -> svc_runtime::Result<()> {
//!     Component::builder(ComponentConfig::new("users", "1.0.0"))
//!         .action("read", |mut action| async move {
//!             let id = action.param("id").as_i64()?;
//!             let entity: Value = [("id", Value::Integer(id))].into_iter().collect();
//!             action.set_entity(entity)?;
//!             Ok(action)
//!         })
//!         .into_process()?
//!         .run()
//! }
//! ```

pub mod action;
pub mod channel;
pub mod codec;
pub mod component;
pub mod error;
pub mod logging;
pub mod payload;
pub mod process;
pub mod protocol;
pub mod schema;
pub mod server;

mod writer;

pub use action::{Action, File, Param, ParamType};
pub use component::{Component, ComponentBuilder, ComponentConfig, HandlerError, HandlerResult};
pub use error::{Result, SdkError};
pub use payload::{Payload, TransportPayload, Value};
pub use process::{ComponentProcess, ProcessState};
pub use protocol::ResponseMeta;
