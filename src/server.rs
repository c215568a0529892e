//! Request/response lifecycle of a component.
//!
//! For every [`Request`] the server:
//! 1. decodes the command payload
//! 2. resolves the handler and builds the [`Action`]
//! 3. runs the handler, catching errors and panics
//! 4. on failure, records the error on the transport as it was received
//! 5. derives the reply meta flags from the resulting transport
//! 6. encodes `{"command_reply": {"name", "result": {"transport"}}}`
//!
//! Malformed commands are returned as errors and end the unit that read
//! them. An unknown action is answered with an `{"error": ...}` body.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;

use crate::action::Action;
use crate::channel::{Reply, Request};
use crate::codec::MsgPackCodec;
use crate::component::{Component, HandlerResult};
use crate::error::{Result, SdkError};
use crate::payload::{
    CommandPayload, CommandReply, ErrorRecord, FieldMappings, Payload, TransportPayload, Value,
};
use crate::protocol::ResponseMeta;
use crate::schema::SchemaRegistry;

/// Runs actions of one component.
#[derive(Clone)]
pub struct ComponentServer {
    component: Component,
}

impl ComponentServer {
    pub fn new(component: Component) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Process one request into its reply.
    ///
    /// # Errors
    ///
    /// Protocol and decode errors for malformed commands or mappings.
    pub async fn process(&self, request: Request) -> Result<Reply> {
        let mut payload = Payload::from_value(MsgPackCodec::unpack(&request.command)?);
        if self.component.config().field_mappings {
            payload = payload.with_mappings(FieldMappings::standard());
        }
        let command = CommandPayload::from_payload(payload)?;
        let command_name = command.name().to_string();
        let (action_name, params, transport) = command.into_parts();
        let action_name = action_name.unwrap_or(request.action);

        let Some(handler) = self.component.actions().get(&action_name) else {
            tracing::warn!("Invalid action requested: {}", action_name);
            let error = SdkError::ActionNotFound(action_name);
            return Ok(error_reply(request.request_id, &error.to_string()));
        };

        let schemas = match &request.mappings {
            Some(mappings) => Arc::new(SchemaRegistry::from_msgpack(mappings)?),
            None => Arc::clone(self.component.context().schemas()),
        };

        let context = self.component.context();
        let (service, version) = (context.name(), context.version());
        tracing::debug!(
            "Running action {} of {} ({}) for request {}",
            action_name,
            service,
            version,
            request.request_id
        );

        let pristine = transport.clone();
        let outcome = match normalize_params(&schemas, service, version, &action_name, params) {
            Ok(params) => {
                let action = Action::new(Arc::clone(context), action_name, params, transport)
                    .with_schemas(schemas);
                invoke(async move { handler.call(action).await }).await
            }
            Err(e) => Err(e.to_string()),
        };

        let transport = match outcome {
            Ok(action) => action.into_transport(),
            Err(message) => self.record_failure(pristine, message)?,
        };

        let meta = response_meta(&transport, service, version);
        let body = CommandReply::new(command_name, transport).into_value();
        match MsgPackCodec::pack(&body) {
            Ok(bytes) => Ok(Reply::new(request.request_id, meta, Bytes::from(bytes))),
            Err(e) => {
                tracing::error!("Failed to encode reply: {}", e);
                Ok(error_reply(request.request_id, &e.to_string()))
            }
        }
    }

    /// Record a failed invocation on the transport it received.
    fn record_failure(
        &self,
        mut transport: TransportPayload,
        message: String,
    ) -> Result<TransportPayload> {
        let context = self.component.context();
        tracing::error!(
            "Action failed in {} ({}): {}",
            context.name(),
            context.version(),
            message
        );

        let error = ErrorRecord::new(message);
        self.component.hooks().failed(context, &error);

        let address = transport.public_gateway_address().to_string();
        transport.push_error(&address, context.name(), context.version(), error.to_value())?;
        Ok(transport)
    }
}

/// Validate params against the action schema, when there is one.
fn normalize_params(
    schemas: &SchemaRegistry,
    service: &str,
    version: &str,
    action: &str,
    params: Vec<Value>,
) -> Result<Vec<Value>> {
    let schema = schemas
        .service(service, version)
        .ok()
        .and_then(|s| s.action(action));
    match schema {
        Some(schema) => schema.normalize_params(params),
        None => Ok(params),
    }
}

/// Await a handler, turning errors and panics into messages.
async fn invoke(
    future: impl std::future::Future<Output = HandlerResult> + Send,
) -> std::result::Result<Action, String> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(action)) => Ok(action),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "Handler panicked".to_string()
    }
}

/// Reply meta flags for a transport.
///
/// FILES is set by a download or by files attached to any call made by
/// `service` / `version`; the scan is skipped once FILES is known.
pub fn response_meta(transport: &TransportPayload, service: &str, version: &str) -> ResponseMeta {
    let mut meta = ResponseMeta::EMPTY;
    if transport.has_download() {
        meta |= ResponseMeta::DOWNLOAD | ResponseMeta::FILES;
    }
    if transport.has_transactions() {
        meta |= ResponseMeta::TRANSACTIONS;
    }
    if transport.has_calls_for(service, version) {
        meta |= ResponseMeta::SERVICE_CALL;
    }
    if !meta.contains(ResponseMeta::FILES) && transport.calls_have_files(service, version) {
        meta |= ResponseMeta::FILES;
    }
    meta
}

/// An error reply, falling back to a fixed body when even that fails to encode.
fn error_reply(request_id: u32, message: &str) -> Reply {
    let body = ErrorRecord::new(message).into_error_reply();
    let bytes = MsgPackCodec::pack(&body).unwrap_or_else(|e| {
        tracing::error!("Failed to encode error reply: {}", e);
        // {"error": {"message": "Internal error"}}
        let mut fallback = vec![0x81, 0xa5];
        fallback.extend_from_slice(b"error");
        fallback.extend_from_slice(&[0x81, 0xa7]);
        fallback.extend_from_slice(b"message");
        fallback.push(0xae);
        fallback.extend_from_slice(b"Internal error");
        fallback
    });
    Reply::error(request_id, Bytes::from(bytes))
}
