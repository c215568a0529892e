//! The transport document.
//!
//! A transport travels with a request across every service it touches and
//! accumulates call state: errors, chained calls, transactions, files, data,
//! relations, links and the optional download body.
//!
//! Layout (paths below use `|` because service names may contain `/`):
//!
//! ```text
//! meta|id, meta|datetime, meta|origin, meta|gateway, meta|properties|{name}
//! body                                               download file
//! files|{address}|{service}|{version}|{action}|{name}  files for chained calls
//! data|{address}|{service}|{version}|{action}        [entity | collection, ...]
//! relations|{address}|{service}|{pk}|{address}|{service}
//! links|{address}|{service}|{link}
//! calls|{service}|{version}                          [call, ...]
//! transactions|{commit|rollback|complete}            [record, ...]
//! errors|{address}|{service}|{version}               [error, ...]
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{nomap, FieldMappings, Payload, Value};
use crate::error::Result;

/// Delimiter for paths whose segments are service or entity names.
pub const NAME_DELIMITER: &str = "|";

/// Kind of a registered transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Runs when the request succeeds.
    Commit,
    /// Runs when the request fails.
    Rollback,
    /// Always runs.
    Complete,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Commit => "commit",
            TransactionKind::Rollback => "rollback",
            TransactionKind::Complete => "complete",
        }
    }
}



/// A request's transport, owned by exactly one invocation at a time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportPayload {
    payload: Payload,
}

impl TransportPayload {
    /// Create a transport with fresh metadata.
    ///
    /// `origin` is `[service, version, action]`; `gateway` is
    /// `[internal, public]`.
    pub fn new(request_id: &str, origin: [&str; 3], gateway: [&str; 2]) -> Self {
        let mut meta = BTreeMap::new();
        meta.insert("id".to_string(), Value::from(request_id));
        meta.insert("datetime".to_string(), Value::from(Utc::now().naive_utc()));
        meta.insert(
            "origin".to_string(),
            Value::Array(origin.iter().map(|s| Value::from(*s)).collect()),
        );
        meta.insert(
            "gateway".to_string(),
            Value::Array(gateway.iter().map(|s| Value::from(*s)).collect()),
        );
        meta.insert("level".to_string(), Value::Integer(1));
        meta.insert("properties".to_string(), Value::map());

        let mut root = BTreeMap::new();
        root.insert("meta".to_string(), Value::Map(meta));
        Self {
            payload: Payload::from_value(Value::Map(root)),
        }
    }

    /// Wrap a decoded payload, keeping its field mappings.
    pub fn from_payload(payload: Payload) -> Self {
        Self { payload }
    }

    /// Resolve field names through `mappings`.
    pub fn with_field_mappings(self, mappings: Arc<FieldMappings>) -> Self {
        Self {
            payload: self.payload.with_mappings(mappings),
        }
    }

    pub fn as_payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Read a node with `|` as delimiter.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.payload.get_with(path, NAME_DELIMITER)
    }

    /// Join a section name and the names under it with `|`.
    ///
    /// Only the section name goes through field mappings; service, address
    /// and entity names are always used verbatim.
    fn key(&self, segments: &[&str]) -> String {
        let Some((section, names)) = segments.split_first() else {
            return String::new();
        };
        if self.payload.mappings().is_none() {
            return segments.join(NAME_DELIMITER);
        }
        let mut key = section.to_string();
        for name in names {
            key.push_str(NAME_DELIMITER);
            key.push_str(&nomap(name));
        }
        key
    }

    fn set_at(&mut self, segments: &[&str], value: impl Into<Value>) -> Result<()> {
        let key = self.key(segments);
        self.payload.set_with(&key, value, NAME_DELIMITER)?;
        Ok(())
    }

    fn push_at(&mut self, segments: &[&str], value: impl Into<Value>) -> Result<()> {
        let key = self.key(segments);
        self.payload.push_with(&key, value, NAME_DELIMITER)?;
        Ok(())
    }

    /// A text field of a call or transaction record, by full or aliased name.
    fn record_str<'a>(&self, record: &'a Value, field: &str) -> &'a str {
        let aliased = || {
            let alias = self.payload.mappings()?.alias(field)?;
            record.field(alias)
        };
        record
            .field(field)
            .or_else(aliased)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    fn section(&self, parts: &[&str]) -> Option<&Value> {
        self.get(&self.key(parts))
    }

    fn list(&self, parts: &[&str]) -> &[Value] {
        self.section(parts)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // Metadata

    /// The request UUID.
    pub fn request_id(&self) -> Option<&str> {
        self.get("meta|id").and_then(Value::as_str)
    }

    /// When the request was received by the gateway.
    pub fn request_timestamp(&self) -> Option<&Value> {
        self.get("meta|datetime")
    }

    /// `[service, version, action]` of the origin of the request.
    pub fn origin(&self) -> Option<&Vec<Value>> {
        self.get("meta|origin").and_then(Value::as_array)
    }

    /// `(service, version, action)` of the origin, when complete.
    pub fn origin_service(&self) -> Option<(&str, &str, &str)> {
        match self.origin()?.as_slice() {
            [service, version, action, ..] => {
                Some((service.as_str()?, version.as_str()?, action.as_str()?))
            }
            _ => None,
        }
    }

    /// Execution time of the origin service, in milliseconds.
    pub fn origin_duration(&self) -> i64 {
        self.get("meta|duration").and_then(Value::as_i64).unwrap_or(0)
    }

    /// Public address of the gateway, or `""` when unknown.
    pub fn public_gateway_address(&self) -> &str {
        self.get("meta|gateway|1")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// A userland property, or `default` when unset.
    pub fn property<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.section(&["meta", "properties", name])
            .and_then(Value::as_str)
            .unwrap_or(default)
    }

    /// All userland properties.
    pub fn properties(&self) -> BTreeMap<String, String> {
        self.get("meta|properties")
            .and_then(Value::as_map)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_property(&mut self, name: &str, value: &str) -> Result<()> {
        self.set_at(&["meta", "properties", name], value)
    }

    // Download

    /// Whether a download body has been registered.
    pub fn has_download(&self) -> bool {
        self.get("body").is_some_and(Value::is_truthy)
    }

    /// The download file record, if any.
    pub fn download(&self) -> Option<&Value> {
        self.get("body").filter(|v| v.is_truthy())
    }

    pub fn set_download(&mut self, file: Value) -> Result<()> {
        self.payload.set("body", file)?;
        Ok(())
    }

    // Data, relations and links

    /// Data registered for an address, optionally narrowed to a service.
    pub fn data(&self, address: Option<&str>, service: Option<&str>) -> Option<&Value> {
        self.scoped("data", address, service)
    }

    pub fn push_data(
        &mut self,
        address: &str,
        service: &str,
        version: &str,
        action: &str,
        entity: Value,
    ) -> Result<()> {
        self.push_at(&["data", address, service, version, action], entity)
    }

    pub fn relations(&self, address: Option<&str>, service: Option<&str>) -> Option<&Value> {
        self.scoped("relations", address, service)
    }

    /// Relate `primary_key` of `service` at `address` to foreign key(s) of
    /// `remote_service` at `remote_address`.
    #[allow(clippy::too_many_arguments)]
    pub fn set_relation(
        &mut self,
        address: &str,
        service: &str,
        primary_key: &str,
        remote_address: &str,
        remote_service: &str,
        foreign: Value,
    ) -> Result<()> {
        self.set_at(
            &[
                "relations",
                address,
                service,
                primary_key,
                remote_address,
                remote_service,
            ],
            foreign,
        )
    }

    pub fn links(&self, address: Option<&str>, service: Option<&str>) -> Option<&Value> {
        self.scoped("links", address, service)
    }

    pub fn set_link(&mut self, address: &str, service: &str, link: &str, uri: &str) -> Result<()> {
        self.set_at(&["links", address, service, link], uri)
    }

    fn scoped(&self, section: &str, address: Option<&str>, service: Option<&str>) -> Option<&Value> {
        match (address, service) {
            (Some(address), Some(service)) => self.section(&[section, address, service]),
            (Some(address), None) => self.section(&[section, address]),
            _ => self.section(&[section]),
        }
    }

    // Calls

    /// All calls registered by `service` / `version`.
    pub fn calls(&self, service: &str, version: &str) -> &[Value] {
        self.list(&["calls", service, version])
    }

    /// The whole `calls` tree.
    pub fn all_calls(&self) -> Option<&Value> {
        self.get("calls")
    }

    pub fn push_call(&mut self, service: &str, version: &str, call: Value) -> Result<()> {
        self.push_at(&["calls", service, version], call)
    }

    /// Whether `service` / `version` registered any call.
    pub fn has_calls_for(&self, service: &str, version: &str) -> bool {
        !self.calls(service, version).is_empty()
    }

    /// Files registered for a call to `service` / `version` / `action`.
    pub fn call_files(&self, address: &str, service: &str, version: &str, action: &str) -> Option<&Value> {
        self.section(&["files", address, service, version, action])
    }

    pub fn set_call_files(
        &mut self,
        address: &str,
        service: &str,
        version: &str,
        action: &str,
        files: Value,
    ) -> Result<()> {
        self.set_at(&["files", address, service, version, action], files)
    }

    /// Whether any call registered by `service` / `version` carries files.
    ///
    /// Stops at the first call with files.
    pub fn calls_have_files(&self, service: &str, version: &str) -> bool {
        if self.get("files").is_none() {
            return false;
        }
        let address = self.public_gateway_address();
        self.calls(service, version).iter().any(|call| {
            self.call_files(
                address,
                self.record_str(call, "name"),
                self.record_str(call, "version"),
                self.record_str(call, "action"),
            )
            .is_some_and(Value::is_truthy)
        })
    }

    // Transactions

    /// Transactions of one kind.
    pub fn transactions(&self, kind: TransactionKind) -> &[Value] {
        self.list(&["transactions", kind.as_str()])
    }

    /// Transactions registered by `service`, grouped by kind.
    pub fn transactions_for(&self, service: &str) -> BTreeMap<&'static str, Vec<&Value>> {
        [
            TransactionKind::Commit,
            TransactionKind::Rollback,
            TransactionKind::Complete,
        ]
        .into_iter()
        .filter_map(|kind| {
            let matching: Vec<&Value> = self
                .transactions(kind)
                .iter()
                .filter(|t| self.record_str(t, "name") == service)
                .collect();
            (!matching.is_empty()).then_some((kind.as_str(), matching))
        })
        .collect()
    }

    pub fn push_transaction(&mut self, kind: TransactionKind, record: Value) -> Result<()> {
        self.push_at(&["transactions", kind.as_str()], record)
    }

    /// Whether any transaction has been registered.
    pub fn has_transactions(&self) -> bool {
        self.get("transactions").is_some_and(Value::is_truthy)
    }

    // Errors

    pub fn errors(&self, address: Option<&str>, service: Option<&str>) -> Option<&Value> {
        self.scoped("errors", address, service)
    }

    /// Errors for one service version.
    pub fn errors_for(&self, address: &str, service: &str, version: &str) -> &[Value] {
        self.list(&["errors", address, service, version])
    }

    pub fn push_error(&mut self, address: &str, service: &str, version: &str, error: Value) -> Result<()> {
        self.push_at(&["errors", address, service, version], error)
    }
}

impl From<Payload> for TransportPayload {
    fn from(payload: Payload) -> Self {
        Self::from_payload(payload)
    }
}
