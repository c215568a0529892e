//! Command payloads (requests) and command replies.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{FieldMappings, Payload, TransportPayload, Value};
use crate::error::{Result, SdkError};

/// Status used when an error record does not specify one.
pub const DEFAULT_ERROR_STATUS: &str = "500 Internal Server Error";

/// Fields of a param record.
const PARAM_FIELDS: &[&str] = &["name", "value", "type"];

/// A decoded request: `command/name`, `command/arguments/{action,params,transport}`
/// and `meta/scope`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPayload {
    payload: Payload,
}

impl CommandPayload {
    /// Build a command for `action` of the component `name`.
    pub fn new(name: &str, action: &str, params: Vec<Value>, transport: TransportPayload) -> Self {
        let mut arguments = BTreeMap::new();
        arguments.insert("action".to_string(), Value::from(action));
        arguments.insert("params".to_string(), Value::Array(params));
        arguments.insert("transport".to_string(), transport.into_payload().into_value());

        let mut command = BTreeMap::new();
        command.insert("name".to_string(), Value::from(name));
        command.insert("arguments".to_string(), Value::Map(arguments));

        let mut meta = BTreeMap::new();
        meta.insert("scope".to_string(), Value::from("service"));

        let mut root = BTreeMap::new();
        root.insert("command".to_string(), Value::Map(command));
        root.insert("meta".to_string(), Value::Map(meta));
        Self {
            payload: Payload::from_value(Value::Map(root)),
        }
    }

    /// Validate and wrap a decoded value.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Protocol`] when `command` or its transport is missing.
    pub fn from_value(value: Value) -> Result<Self> {
        Self::from_payload(Payload::from_value(value))
    }

    /// Validate and wrap a payload, keeping its field mappings.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Protocol`] when `command` or its transport is missing.
    pub fn from_payload(payload: Payload) -> Result<Self> {
        if !payload.get("command").is_some_and(Value::is_map) {
            return Err(SdkError::Protocol("command payload has no command".to_string()));
        }
        if !payload
            .get("command/arguments/transport")
            .is_some_and(Value::is_map)
        {
            return Err(SdkError::Protocol(
                "command payload has no transport".to_string(),
            ));
        }
        Ok(Self { payload })
    }

    /// Name of the component the command is addressed to.
    pub fn name(&self) -> &str {
        self.payload
            .get("command/name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Requested action, when carried inside the command.
    pub fn action(&self) -> Option<&str> {
        self.payload
            .get("command/arguments/action")
            .and_then(Value::as_str)
    }

    /// Raw param records (`{name, value, type}`).
    pub fn params(&self) -> &[Value] {
        self.payload
            .get("command/arguments/params")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn scope(&self) -> Option<&str> {
        self.payload.get("meta/scope").and_then(Value::as_str)
    }

    pub fn as_payload(&self) -> &Payload {
        &self.payload
    }

    /// Consume the command, yielding `(action, params, transport)`.
    ///
    /// With field mappings, param records come back with full field names
    /// and the transport keeps the mappings.
    pub fn into_parts(self) -> (Option<String>, Vec<Value>, TransportPayload) {
        let mappings = self.payload.mappings().cloned();
        let mut payload = self.payload;
        let mut take = |path: &str| {
            payload
                .get_mut(path)
                .map(std::mem::take)
                .unwrap_or_default()
        };

        let action = match take("command/arguments/action") {
            Value::String(s) => Some(s),
            _ => None,
        };
        let mut params = match take("command/arguments/params") {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        let mut transport = Payload::from_value(take("command/arguments/transport"));

        if let Some(mappings) = mappings {
            for param in &mut params {
                mappings.expand(param, PARAM_FIELDS);
            }
            transport = transport.with_mappings(mappings);
        }
        (action, params, TransportPayload::from_payload(transport))
    }

    pub fn into_value(self) -> Value {
        self.payload.into_value()
    }
}

/// An error entry recorded in a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub message: String,
    pub code: i64,
    pub status: String,
}

impl ErrorRecord {
    /// Error with code `0` and status `500 Internal Server Error`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 0,
            status: DEFAULT_ERROR_STATUS.to_string(),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("message".to_string(), Value::from(self.message.as_str()));
        map.insert("code".to_string(), Value::Integer(self.code));
        map.insert("status".to_string(), Value::from(self.status.as_str()));
        Value::Map(map)
    }

    /// Read back a record, filling defaults for missing fields.
    pub fn from_value(value: &Value) -> Option<Self> {
        let message = value.field("message")?.as_str()?.to_string();
        Some(Self {
            message,
            code: value.field("code").and_then(Value::as_i64).unwrap_or(0),
            status: value
                .field("status")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_ERROR_STATUS)
                .to_string(),
        })
    }

    /// Reply body for requests that never reached a handler:
    /// `{"error": {message, code, status}}`.
    pub fn into_error_reply(self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("error".to_string(), self.to_value());
        Value::Map(map)
    }
}

/// Reply to a command: `{"command_reply": {"name", "result": {"transport"}}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    name: String,
    transport: TransportPayload,
}

impl CommandReply {
    pub fn new(name: impl Into<String>, transport: TransportPayload) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &TransportPayload {
        &self.transport
    }

    /// Build the reply body. Field names are aliased when the transport
    /// carries field mappings.
    pub fn into_value(self) -> Value {
        let mappings = self.transport.as_payload().mappings().cloned();
        let key = |name: &str| {
            mappings
                .as_ref()
                .and_then(|m| m.alias(name))
                .unwrap_or(name)
                .to_string()
        };

        let mut result = BTreeMap::new();
        result.insert(key("transport"), self.transport.into_payload().into_value());

        let mut reply = BTreeMap::new();
        reply.insert(key("name"), Value::from(self.name));
        reply.insert(key("result"), Value::Map(result));

        let mut root = BTreeMap::new();
        root.insert("command_reply".to_string(), Value::Map(reply));
        Value::Map(root)
    }

    /// Parse a reply body produced by [`into_value`](Self::into_value).
    ///
    /// Full and aliased field names are both accepted; the transport keeps
    /// the standard mappings.
    pub fn from_value(value: Value) -> Result<Self> {
        let mappings = FieldMappings::standard();
        let payload = Payload::from_value(value).with_mappings(Arc::clone(&mappings));
        let name = payload
            .get("command_reply/name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let transport = payload
            .get("command_reply/result/transport")
            .cloned()
            .ok_or_else(|| SdkError::Protocol("reply has no transport".to_string()))?;
        Ok(Self {
            name,
            transport: TransportPayload::from_payload(
                Payload::from_value(transport).with_mappings(mappings),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> TransportPayload {
        TransportPayload::new("req-1", ["users", "1.0", "read"], ["internal", "public"])
    }

    #[test]
    fn test_command_accessors() {
        let params = vec![[("name", "id"), ("value", "42"), ("type", "integer")]
            .into_iter()
            .collect()];
        let command = CommandPayload::new("users", "read", params, transport());

        assert_eq!(command.name(), "users");
        assert_eq!(command.action(), Some("read"));
        assert_eq!(command.params().len(), 1);
        assert_eq!(command.scope(), Some("service"));
    }

    #[test]
    fn test_into_parts() {
        let command = CommandPayload::new("users", "read", Vec::new(), transport());
        let (action, params, transport) = command.into_parts();

        assert_eq!(action.as_deref(), Some("read"));
        assert!(params.is_empty());
        assert_eq!(transport.request_id(), Some("req-1"));
    }

    #[test]
    fn test_from_value_requires_command() {
        let err = CommandPayload::from_value(Value::map()).unwrap_err();
        assert!(matches!(err, SdkError::Protocol(_)));

        let mut payload = Payload::new();
        payload.set("command/name", "users").unwrap();
        let err = CommandPayload::from_value(payload.into_value()).unwrap_err();
        assert!(matches!(err, SdkError::Protocol(_)));
    }

    #[test]
    fn test_from_value_round_trips_new() {
        let command = CommandPayload::new("users", "read", Vec::new(), transport());
        let value = command.clone().into_value();
        assert_eq!(CommandPayload::from_value(value).unwrap(), command);
    }

    fn short_command() -> Value {
        let param: Value = [
            ("n", Value::from("id")),
            ("v", Value::Integer(42)),
            ("t", Value::from("integer")),
        ]
        .into_iter()
        .collect();
        let mut raw = Payload::new();
        raw.set("c/n", "users").unwrap();
        raw.set("c/a/a", "read").unwrap();
        raw.set("c/a/p", Value::Array(vec![param])).unwrap();
        raw.set("c/a/t/m/i", "req-7").unwrap();
        raw.set("m/s", "service").unwrap();
        raw.into_value()
    }

    #[test]
    fn test_decode_short_field_names() {
        let payload = Payload::from_value(short_command()).with_mappings(FieldMappings::standard());
        let command = CommandPayload::from_payload(payload).unwrap();

        assert_eq!(command.name(), "users");
        assert_eq!(command.action(), Some("read"));
        assert_eq!(command.scope(), Some("service"));

        let (action, params, transport) = command.into_parts();
        assert_eq!(action.as_deref(), Some("read"));
        assert_eq!(params[0].field("name").and_then(Value::as_str), Some("id"));
        assert_eq!(params[0].field("value"), Some(&Value::Integer(42)));
        assert_eq!(transport.request_id(), Some("req-7"));
        assert!(transport.as_payload().mappings().is_some());
    }

    #[test]
    fn test_short_names_rejected_without_mappings() {
        let err = CommandPayload::from_value(short_command()).unwrap_err();
        assert!(matches!(err, SdkError::Protocol(_)));
    }

    #[test]
    fn test_mapped_reply_uses_aliases() {
        let transport = transport().with_field_mappings(FieldMappings::standard());
        let reply = CommandReply::new("users", transport).into_value();

        let raw = Payload::from_value(reply.clone());
        assert_eq!(raw.get("command_reply/n"), Some(&Value::from("users")));
        assert!(raw.exists("command_reply/r/t/meta/id"));

        let back = CommandReply::from_value(reply).unwrap();
        assert_eq!(back.name(), "users");
        assert_eq!(back.transport().request_id(), Some("req-1"));
    }

    #[test]
    fn test_error_record_defaults() {
        let record = ErrorRecord::new("boom");
        assert_eq!(record.code, 0);
        assert_eq!(record.status, DEFAULT_ERROR_STATUS);

        let value = record.clone().with_code(7).to_value();
        let back = ErrorRecord::from_value(&value).unwrap();
        assert_eq!(back.code, 7);
        assert_eq!(back.message, "boom");
    }

    #[test]
    fn test_reply_shape() {
        let reply = CommandReply::new("users", transport()).into_value();
        let payload = Payload::from_value(reply.clone());

        assert_eq!(
            payload.get("command_reply/name"),
            Some(&Value::from("users"))
        );
        assert!(payload.exists("command_reply/result/transport/meta/id"));
        assert_eq!(CommandReply::from_value(reply).unwrap().name(), "users");
    }

    #[test]
    fn test_error_reply_shape() {
        let body = ErrorRecord::new("Invalid action: x").into_error_reply();
        let payload = Payload::from_value(body);
        assert_eq!(
            payload.get("error/message"),
            Some(&Value::from("Invalid action: x"))
        );
    }
}
