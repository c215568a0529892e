//! The invocation context handed to action handlers.
//!
//! An [`Action`] owns the request's transport for the duration of the
//! handler. Everything a handler registers (entities, relations, calls,
//! transactions, errors) is written into that transport and returned to
//! the platform with the reply.
//!
//! # Example
//!
//! ```
//! use svc_runtime::component::{Component, ComponentConfig};
//! use svc_runtime::payload::{TransportPayload, Value};
//!
//! let component = Component::builder(ComponentConfig::new("users", "1.0.0"))
//!     .action("read", |action| async move { Ok(action) })
//!     .build()
//!     .unwrap();
//!
//! let transport = TransportPayload::new("req-1", ["users", "1.0.0", "read"], ["gw", "ktp://gw"]);
//! let mut action = component.action("read", Vec::new(), transport);
//!
//! let entity: Value = [("id", Value::Integer(1))].into_iter().collect();
//! action.set_entity(entity).unwrap();
//! assert!(action.transport().data(Some("ktp://gw"), Some("users")).is_some());
//! ```

mod file;
mod param;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use file::{File, DEFAULT_MIME};
pub use param::{Param, ParamType};

use crate::component::ComponentContext;
use crate::error::{Result, SdkError};
use crate::payload::{ErrorRecord, TransactionKind, TransportPayload, Value};
use crate::schema::{SchemaRegistry, ServiceSchema};

/// Longest text written by [`Action::log`].
pub const MAX_LOG_LENGTH: usize = 100_000;

const REMOTE_SCHEME: &str = "ktp://";

/// Fields of a file record.
const FILE_FIELDS: &[&str] = &["path", "mime", "filename", "size", "token"];

/// User-visible context of one action invocation.
#[derive(Debug)]
pub struct Action {
    context: Arc<ComponentContext>,
    schemas: Arc<SchemaRegistry>,
    action: String,
    params: BTreeMap<String, Value>,
    files: BTreeMap<String, File>,
    public_address: String,
    transport: TransportPayload,
}

impl Action {
    /// Create an action over a request's params and transport.
    ///
    /// Schemas default to the process-wide mappings of the context.
    pub fn new(
        context: Arc<ComponentContext>,
        action: impl Into<String>,
        params: Vec<Value>,
        transport: TransportPayload,
    ) -> Self {
        let action = action.into();
        let public_address = transport.public_gateway_address().to_string();

        let params = params
            .into_iter()
            .filter_map(|record| {
                let name = record.field("name")?.as_str()?.to_string();
                Some((name, record))
            })
            .collect();

        let mappings = transport.as_payload().mappings();
        let files = transport
            .call_files(&public_address, context.name(), context.version(), &action)
            .and_then(Value::as_map)
            .map(|files| {
                files
                    .iter()
                    .map(|(name, record)| {
                        let mut record = record.clone();
                        if let Some(mappings) = mappings {
                            mappings.expand(&mut record, FILE_FIELDS);
                        }
                        (name.clone(), File::from_record(name, &record))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            schemas: Arc::clone(context.schemas()),
            context,
            action,
            params,
            files,
            public_address,
            transport,
        }
    }

    /// Replace the schema mappings used for lookups.
    pub fn with_schemas(mut self, schemas: Arc<SchemaRegistry>) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn transport(&self) -> &TransportPayload {
        &self.transport
    }

    pub fn into_transport(self) -> TransportPayload {
        self.transport
    }

    // Identity

    /// Service name.
    pub fn name(&self) -> &str {
        self.context.name()
    }

    /// Service version.
    pub fn version(&self) -> &str {
        self.context.version()
    }

    pub fn action_name(&self) -> &str {
        &self.action
    }

    pub fn platform_version(&self) -> &str {
        &self.context.config().platform_version
    }

    pub fn source_file(&self) -> &str {
        &self.context.config().source_file
    }

    pub fn is_debug(&self) -> bool {
        self.context.is_debug()
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.context.config().variables
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables().get(name).map(String::as_str)
    }

    /// Whether this service, version and action started the request.
    pub fn is_origin(&self) -> bool {
        let expected = [self.name(), self.version(), self.action_name()];
        self.transport.origin().is_some_and(|origin| {
            origin.len() == expected.len()
                && origin
                    .iter()
                    .zip(expected)
                    .all(|(part, name)| part.as_str() == Some(name))
        })
    }

    /// Set a userland property in the transport.
    pub fn set_property(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        self.transport.set_property(name, value)?;
        Ok(self)
    }

    // Params

    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// A request param; an empty, non-existing one when it was not sent.
    pub fn param(&self, name: &str) -> Param {
        self.params
            .get(name)
            .and_then(Param::from_record)
            .unwrap_or_else(|| Param::new(name))
    }

    pub fn params(&self) -> Vec<Param> {
        self.params.values().filter_map(Param::from_record).collect()
    }

    /// Create a param for a call or transaction.
    ///
    /// # Errors
    ///
    /// [`SdkError::TypeMismatch`] when `param_type` disagrees with the value.
    pub fn new_param(
        &self,
        name: &str,
        value: impl Into<Value>,
        param_type: Option<ParamType>,
    ) -> Result<Param> {
        let param = Param::with_value(name, value);
        match param_type {
            Some(expected) if expected != param.param_type() => Err(SdkError::TypeMismatch {
                name: name.to_string(),
                expected: expected.as_str().to_string(),
            }),
            _ => Ok(param.existing()),
        }
    }

    // Files

    pub fn has_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// A file sent with the request; an empty one when absent.
    pub fn file(&self, name: &str) -> File {
        self.files
            .get(name)
            .cloned()
            .unwrap_or_else(|| File::new(name, ""))
    }

    pub fn files(&self) -> Vec<File> {
        self.files.values().cloned().collect()
    }

    pub fn new_file(&self, name: &str, path: &str, mime: Option<&str>) -> File {
        File::new(name, path).with_mime(mime.unwrap_or(DEFAULT_MIME))
    }

    /// Register a file to be downloaded through the gateway.
    ///
    /// # Errors
    ///
    /// [`SdkError::NoFileServer`] when mappings are known and the service
    /// has no file server.
    pub fn set_download(&mut self, file: &File) -> Result<&mut Self> {
        if !self.schemas.is_empty() {
            let has_file_server = self
                .schemas
                .service(self.name(), self.version())
                .is_ok_and(ServiceSchema::has_file_server);
            if !has_file_server {
                return Err(self.no_file_server());
            }
        }
        self.transport.set_download(file.to_record())?;
        Ok(self)
    }

    fn no_file_server(&self) -> SdkError {
        SdkError::NoFileServer {
            service: self.name().to_string(),
            version: self.version().to_string(),
        }
    }

    // Data

    /// Return an entity.
    ///
    /// # Errors
    ///
    /// [`SdkError::Validation`] when the entity is not a map.
    pub fn set_entity(&mut self, entity: Value) -> Result<&mut Self> {
        if !entity.is_map() {
            return Err(SdkError::Validation("Entity must be an object".to_string()));
        }
        self.push_data(entity)
    }

    /// Return a collection of entities.
    pub fn set_collection(&mut self, collection: Vec<Value>) -> Result<&mut Self> {
        if !collection.iter().all(Value::is_map) {
            return Err(SdkError::Validation(
                "Collection entities must be objects".to_string(),
            ));
        }
        self.push_data(Value::Array(collection))
    }

    fn push_data(&mut self, data: Value) -> Result<&mut Self> {
        self.transport.push_data(
            &self.public_address,
            self.context.name(),
            self.context.version(),
            &self.action,
            data,
        )?;
        Ok(self)
    }

    // Relations

    pub fn relate_one(
        &mut self,
        primary_key: &str,
        service: &str,
        foreign_key: impl Into<Value>,
    ) -> Result<&mut Self> {
        let address = self.public_address.clone();
        self.relate(primary_key, &address, service, foreign_key.into())
    }

    pub fn relate_many(
        &mut self,
        primary_key: &str,
        service: &str,
        foreign_keys: Vec<Value>,
    ) -> Result<&mut Self> {
        let address = self.public_address.clone();
        self.relate(primary_key, &address, service, Value::Array(foreign_keys))
    }

    /// Relate to an entity of a service in another realm.
    pub fn relate_one_remote(
        &mut self,
        primary_key: &str,
        address: &str,
        service: &str,
        foreign_key: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.relate(primary_key, address, service, foreign_key.into())
    }

    pub fn relate_many_remote(
        &mut self,
        primary_key: &str,
        address: &str,
        service: &str,
        foreign_keys: Vec<Value>,
    ) -> Result<&mut Self> {
        self.relate(primary_key, address, service, Value::Array(foreign_keys))
    }

    fn relate(
        &mut self,
        primary_key: &str,
        address: &str,
        service: &str,
        foreign: Value,
    ) -> Result<&mut Self> {
        self.transport.set_relation(
            &self.public_address,
            self.context.name(),
            primary_key,
            address,
            service,
            foreign,
        )?;
        Ok(self)
    }

    pub fn set_link(&mut self, link: &str, uri: &str) -> Result<&mut Self> {
        self.transport
            .set_link(&self.public_address, self.context.name(), link, uri)?;
        Ok(self)
    }

    // Transactions

    /// Register an action to run when the request succeeds.
    pub fn commit(&mut self, action: &str, params: &[Param]) -> Result<&mut Self> {
        self.transaction(TransactionKind::Commit, action, params)
    }

    /// Register an action to run when the request fails.
    pub fn rollback(&mut self, action: &str, params: &[Param]) -> Result<&mut Self> {
        self.transaction(TransactionKind::Rollback, action, params)
    }

    /// Register an action to run when the request finishes, whatever the outcome.
    pub fn complete(&mut self, action: &str, params: &[Param]) -> Result<&mut Self> {
        self.transaction(TransactionKind::Complete, action, params)
    }

    fn transaction(
        &mut self,
        kind: TransactionKind,
        callee: &str,
        params: &[Param],
    ) -> Result<&mut Self> {
        let mut record: BTreeMap<String, Value> = [
            ("name", self.name()),
            ("version", self.version()),
            ("action", self.action_name()),
            ("callee", callee),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::from(v)))
        .collect();
        insert_params(&mut record, params);

        self.transport.push_transaction(kind, Value::Map(record))?;
        Ok(self)
    }

    // Calls

    /// Register a call to another service in this realm.
    ///
    /// # Errors
    ///
    /// [`SdkError::NoFileServer`] when a local file is sent and this
    /// service has no file server.
    pub fn call(
        &mut self,
        service: &str,
        version: &str,
        action: &str,
        params: &[Param],
        files: &[File],
    ) -> Result<&mut Self> {
        self.register_call(None, service, version, action, params, files)
    }

    /// Register a call to a service behind another realm's gateway.
    ///
    /// The address gets a `ktp://` scheme when it has none.
    pub fn call_remote(
        &mut self,
        address: &str,
        service: &str,
        version: &str,
        action: &str,
        params: &[Param],
        files: &[File],
    ) -> Result<&mut Self> {
        let address = if address.starts_with("ktp") {
            address.to_string()
        } else {
            format!("{REMOTE_SCHEME}{address}")
        };
        self.register_call(Some(address), service, version, action, params, files)
    }

    fn register_call(
        &mut self,
        gateway: Option<String>,
        service: &str,
        version: &str,
        action: &str,
        params: &[Param],
        files: &[File],
    ) -> Result<&mut Self> {
        if !files.is_empty() {
            let records = self.file_records(files)?;
            self.transport.set_call_files(
                &self.public_address,
                service,
                version,
                action,
                records,
            )?;
        }

        let mut record: BTreeMap<String, Value> = [
            ("name", service),
            ("version", version),
            ("action", action),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::from(v)))
        .collect();
        if let Some(gateway) = gateway {
            record.insert("gateway".to_string(), Value::from(gateway));
        }
        insert_params(&mut record, params);

        self.transport
            .push_call(self.context.name(), self.context.version(), Value::Map(record))?;
        Ok(self)
    }

    fn file_records(&self, files: &[File]) -> Result<Value> {
        // Without mappings for this service there is nothing to check against.
        let has_file_server = self
            .schemas
            .service(self.name(), self.version())
            .map_or(true, ServiceSchema::has_file_server);

        let mut records = BTreeMap::new();
        for file in files {
            if file.is_local() && !has_file_server {
                return Err(self.no_file_server());
            }
            records.insert(file.name().to_string(), file.to_record());
        }
        Ok(Value::Map(records))
    }

    // Errors

    /// Record an error for this service in the transport.
    ///
    /// Code defaults to `0`, status to `500 Internal Server Error`.
    pub fn error(
        &mut self,
        message: &str,
        code: Option<i64>,
        status: Option<&str>,
    ) -> Result<&mut Self> {
        let mut error = ErrorRecord::new(message).with_code(code.unwrap_or(0));
        if let Some(status) = status {
            error = error.with_status(status);
        }
        self.transport.push_error(
            &self.public_address,
            self.context.name(),
            self.context.version(),
            error.to_value(),
        )?;
        Ok(self)
    }

    // Component access

    /// A resource registered with the component.
    pub fn resource<T: std::any::Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.context.resource(name)
    }

    /// Schema of a service, resolving version patterns.
    pub fn service_schema(&self, name: &str, version: &str) -> Result<&ServiceSchema> {
        self.schemas.service(name, version)
    }

    /// Write a value to the log, in debug mode only.
    ///
    /// Returns whether anything was written.
    pub fn log(&self, value: impl Into<Value>) -> bool {
        if !self.is_debug() {
            return false;
        }
        let text = match value.into() {
            Value::String(text) => text,
            other => other.to_json().to_string(),
        };
        tracing::debug!(
            service = self.name(),
            version = self.version(),
            action = self.action_name(),
            "{}",
            truncate(&text, MAX_LOG_LENGTH)
        );
        true
    }
}

fn insert_params(record: &mut BTreeMap<String, Value>, params: &[Param]) {
    if !params.is_empty() {
        record.insert(
            "params".to_string(),
            Value::Array(params.iter().map(Param::to_record).collect()),
        );
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentConfig;
    use crate::payload::FieldMappings;
    use crate::schema::ServiceSchema;

    const PUBLIC: &str = "ktp://gw.example";

    fn context(debug: bool) -> Arc<ComponentContext> {
        let config = ComponentConfig::new("users", "1.0.0")
            .with_debug(debug)
            .with_variable("region", "eu");
        Arc::new(ComponentContext::new(config))
    }

    fn transport() -> TransportPayload {
        TransportPayload::new("req-1", ["users", "1.0.0", "read"], ["gw-internal", PUBLIC])
    }

    fn action() -> Action {
        Action::new(context(false), "read", Vec::new(), transport())
    }

    fn param_record(name: &str, value: impl Into<Value>, ty: &str) -> Value {
        [
            ("name", Value::from(name)),
            ("value", value.into()),
            ("type", Value::from(ty)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_identity() {
        let action = action();
        assert_eq!(action.name(), "users");
        assert_eq!(action.version(), "1.0.0");
        assert_eq!(action.action_name(), "read");
        assert_eq!(action.variable("region"), Some("eu"));
        assert!(action.is_origin());

        let other = Action::new(context(false), "write", Vec::new(), transport());
        assert!(!other.is_origin());
    }

    #[test]
    fn test_params() {
        let action = Action::new(
            context(false),
            "read",
            vec![param_record("id", "42", "integer")],
            transport(),
        );
        assert!(action.has_param("id"));
        let id = action.param("id");
        assert!(id.exists());
        assert_eq!(id.as_i64().unwrap(), 42);

        let missing = action.param("page");
        assert!(!missing.exists());
        assert_eq!(missing.value(), &Value::from(""));
        assert_eq!(action.params().len(), 1);
    }

    #[test]
    fn test_new_param_type_check() {
        let action = action();
        let param = action.new_param("n", 3i64, None).unwrap();
        assert!(param.exists());
        assert_eq!(param.param_type(), ParamType::Integer);
        assert!(action.new_param("n", 3i64, Some(ParamType::String)).is_err());
    }

    #[test]
    fn test_set_entity_and_collection() {
        let mut action = action();
        let entity: Value = [("id", Value::Integer(1))].into_iter().collect();
        action.set_entity(entity.clone()).unwrap();
        action.set_collection(vec![entity.clone()]).unwrap();
        assert!(action.set_entity(Value::from("nope")).is_err());

        let data = action
            .transport()
            .get(&format!("data|{PUBLIC}|users|1.0.0|read"))
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0], entity);
        assert_eq!(data[1], Value::Array(vec![entity]));
    }

    #[test]
    fn test_relations_and_links() {
        let mut action = action();
        action.relate_one("1", "posts", "10").unwrap();
        action
            .relate_many_remote("1", "ktp://other", "comments", vec![Value::from("7")])
            .unwrap();
        action.set_link("self", "/users/1").unwrap();

        let transport = action.transport();
        assert_eq!(
            transport.get(&format!("relations|{PUBLIC}|users|1|{PUBLIC}|posts")),
            Some(&Value::from("10"))
        );
        assert_eq!(
            transport.get(&format!("relations|{PUBLIC}|users|1|ktp://other|comments")),
            Some(&Value::Array(vec![Value::from("7")]))
        );
        assert_eq!(
            transport.get(&format!("links|{PUBLIC}|users|self")),
            Some(&Value::from("/users/1"))
        );
    }

    #[test]
    fn test_transactions() {
        let mut action = action();
        let param = action.new_param("id", 1i64, None).unwrap();
        action.commit("save", &[param]).unwrap();
        action.rollback("undo", &[]).unwrap();

        let transport = action.transport();
        let commit = &transport.transactions(TransactionKind::Commit)[0];
        assert_eq!(commit.field("callee").and_then(Value::as_str), Some("save"));
        assert_eq!(commit.field("action").and_then(Value::as_str), Some("read"));
        assert!(commit.field("params").is_some());
        let rollback = &transport.transactions(TransactionKind::Rollback)[0];
        assert!(rollback.field("params").is_none());
        assert!(transport.has_transactions());
    }

    #[test]
    fn test_call_with_files() {
        let mut action = action();
        let file = action.new_file("avatar", "http://files/a.png", Some("image/png"));
        action.call("posts", "2.0.0", "list", &[], &[file]).unwrap();

        let transport = action.transport();
        assert!(transport.has_calls_for("users", "1.0.0"));
        assert!(transport.calls_have_files("users", "1.0.0"));
        let files = transport
            .call_files(PUBLIC, "posts", "2.0.0", "list")
            .unwrap();
        assert!(files.field("avatar").is_some());
    }

    #[test]
    fn test_call_remote_adds_scheme() {
        let mut action = action();
        action
            .call_remote("other.example", "posts", "2.0.0", "list", &[], &[])
            .unwrap();
        action
            .call_remote("ktp://third", "posts", "2.0.0", "list", &[], &[])
            .unwrap();

        let calls = action.transport().calls("users", "1.0.0");
        assert_eq!(
            calls[0].field("gateway").and_then(Value::as_str),
            Some("ktp://other.example")
        );
        assert_eq!(
            calls[1].field("gateway").and_then(Value::as_str),
            Some("ktp://third")
        );
    }

    #[test]
    fn test_local_file_without_file_server() {
        let mut schemas = SchemaRegistry::new();
        schemas.insert(ServiceSchema::new("users", "1.0.0"));
        let mut action = action().with_schemas(Arc::new(schemas));

        let local = action.new_file("f", "file:///tmp/f", None);
        assert!(matches!(
            action.call("posts", "1", "list", &[], &[local.clone()]),
            Err(SdkError::NoFileServer { .. })
        ));
        assert!(matches!(
            action.set_download(&local),
            Err(SdkError::NoFileServer { .. })
        ));
    }

    #[test]
    fn test_download_without_mappings() {
        let mut action = action();
        let file = action.new_file("report", "http://files/r.pdf", None);
        action.set_download(&file).unwrap();
        assert!(action.transport().has_download());
    }

    #[test]
    fn test_received_files() {
        let mut transport = transport();
        let file = File::new("avatar", "http://files/a").with_filename("a.png");
        let records: Value = [("avatar", file.to_record())].into_iter().collect();
        transport
            .set_call_files(PUBLIC, "users", "1.0.0", "read", records)
            .unwrap();

        let action = Action::new(context(false), "read", Vec::new(), transport);
        assert!(action.has_file("avatar"));
        assert!(action.file("avatar").exists());
        assert_eq!(action.file("avatar").filename(), "a.png");
        assert!(!action.file("other").exists());
        assert_eq!(action.files().len(), 1);
    }

    #[test]
    fn test_received_files_with_short_field_names() {
        let record: Value = [
            ("p", Value::from("http://files/a")),
            ("m", Value::from("image/png")),
            ("f", Value::from("a.png")),
            ("s", Value::Integer(12)),
        ]
        .into_iter()
        .collect();
        let records: Value = [("avatar", record)].into_iter().collect();
        let mut transport = transport().with_field_mappings(FieldMappings::standard());
        transport
            .set_call_files(PUBLIC, "users", "1.0.0", "read", records)
            .unwrap();

        let action = Action::new(context(false), "read", Vec::new(), transport);
        let file = action.file("avatar");
        assert_eq!(file.path(), "http://files/a");
        assert_eq!(file.mime(), "image/png");
        assert_eq!(file.filename(), "a.png");
        assert_eq!(file.size(), 12);
    }

    #[test]
    fn test_error() {
        let mut action = action();
        action.error("Not found", Some(404), Some("404 Not Found")).unwrap();
        let errors = action.transport().errors_for(PUBLIC, "users", "1.0.0");
        let error = ErrorRecord::from_value(&errors[0]).unwrap();
        assert_eq!(error.code, 404);
        assert_eq!(error.status, "404 Not Found");
    }

    #[test]
    fn test_set_property() {
        let mut action = action();
        action.set_property("trace", "abc").unwrap();
        assert_eq!(action.transport().property("trace", ""), "abc");
    }

    #[test]
    fn test_log_only_in_debug() {
        assert!(!action().log("quiet"));
        let debug = Action::new(context(true), "read", Vec::new(), transport());
        assert!(debug.log(Value::Integer(1)));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
