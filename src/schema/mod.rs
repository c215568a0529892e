//! Service schemas supplied by the platform.
//!
//! Mappings arrive as a msgpack map `service → version → schema`, either
//! once for the whole process or with a single request. Lookups take a
//! version pattern (see [`version`]) and resolve it to the highest known
//! version.
//!
//! # Example
//!
//! ```
//! use svc_runtime::payload::Value;
//! use svc_runtime::schema::SchemaRegistry;
//!
//! let schema: Value = [("files", Value::Bool(true))].into_iter().collect();
//! let versions: Value = [("1.2.0", schema)].into_iter().collect();
//! let mappings: Value = [("users", versions)].into_iter().collect();
//!
//! let registry = SchemaRegistry::from_value(&mappings).unwrap();
//! let users = registry.service("users", "1.*.*").unwrap();
//! assert_eq!(users.version(), "1.2.0");
//! assert!(users.has_file_server());
//! ```

mod param;
mod service;
pub mod version;

use std::collections::BTreeMap;

pub use param::{HttpParamSchema, ParamSchema};
pub use service::{ActionSchema, HttpActionSchema, HttpServiceSchema, ServiceSchema};

use crate::codec::MsgPackCodec;
use crate::error::{Result, SdkError};
use crate::payload::Value;

/// Read-only lookup of service schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    services: BTreeMap<String, BTreeMap<String, ServiceSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from decoded mappings.
    ///
    /// # Errors
    ///
    /// [`SdkError::Protocol`] when the mappings are not nested maps,
    /// [`SdkError::Validation`] for an invalid param pattern.
    pub fn from_value(mappings: &Value) -> Result<Self> {
        let services = mappings
            .as_map()
            .ok_or_else(|| SdkError::Protocol("Schema mappings must be a map".to_string()))?;

        let mut registry = Self::new();
        for (name, versions) in services {
            let versions = versions.as_map().ok_or_else(|| {
                SdkError::Protocol(format!("Schema versions for \"{name}\" must be a map"))
            })?;
            for (version, schema) in versions {
                let mut schema: ServiceSchema = MsgPackCodec::from_value(schema)?;
                schema.prepare(name, version)?;
                registry.insert(schema);
            }
        }
        Ok(registry)
    }

    /// Build a registry from msgpack-encoded mappings.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Self::from_value(&MsgPackCodec::unpack(bytes)?)
    }

    pub fn insert(&mut self, schema: ServiceSchema) {
        self.services
            .entry(schema.name().to_string())
            .or_default()
            .insert(schema.version().to_string(), schema);
    }

    /// Whether any mappings are known.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Schema of `name` at the highest version matching `version`.
    ///
    /// # Errors
    ///
    /// [`SdkError::SchemaNotFound`] when nothing matches.
    pub fn service(&self, name: &str, version: &str) -> Result<&ServiceSchema> {
        self.services
            .get(name)
            .and_then(|versions| {
                let resolved = version::resolve(version, versions.keys().map(String::as_str))?;
                versions.get(resolved)
            })
            .ok_or_else(|| SdkError::SchemaNotFound {
                service: name.to_string(),
                version: version.to_string(),
            })
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceSchema> {
        self.services.values().flat_map(BTreeMap::values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ParamType;

    fn mappings() -> Value {
        let param: Value = [
            ("type", Value::from("integer")),
            ("required", Value::Bool(true)),
            ("minimum", Value::Integer(1)),
        ]
        .into_iter()
        .collect();
        let params: Value = [("id", param)].into_iter().collect();
        let read: Value = [("params", params)].into_iter().collect();
        let actions: Value = [("read", read)].into_iter().collect();

        let v1: Value = [("files", Value::Bool(false)), ("actions", actions)]
            .into_iter()
            .collect();
        let v2: Value = [("files", Value::Bool(true))].into_iter().collect();
        let versions: Value = [("1.0.0", v1), ("1.4.2", v2)].into_iter().collect();
        [("users", versions)].into_iter().collect()
    }

    #[test]
    fn test_from_value() {
        let registry = SchemaRegistry::from_value(&mappings()).unwrap();
        assert!(!registry.is_empty());
        assert_eq!(registry.services().count(), 2);

        let users = registry.service("users", "1.0.0").unwrap();
        assert!(!users.has_file_server());
        let read = users.action("read").unwrap();
        assert_eq!(read.name(), "read");

        let id = read.param("id").unwrap();
        assert_eq!(id.name(), "id");
        assert_eq!(id.param_type, ParamType::Integer);
        assert!(id.required);
        assert_eq!(id.minimum, Some(1.0));
        assert!(id.http.gateway);
    }

    #[test]
    fn test_version_pattern() {
        let registry = SchemaRegistry::from_value(&mappings()).unwrap();
        assert_eq!(registry.service("users", "1.*.*").unwrap().version(), "1.4.2");
        assert_eq!(registry.service("users", "*").unwrap().version(), "1.4.2");
        assert!(matches!(
            registry.service("users", "2.*.*"),
            Err(SdkError::SchemaNotFound { .. })
        ));
        assert!(registry.service("posts", "*").is_err());
    }

    #[test]
    fn test_msgpack_mappings() {
        let bytes = MsgPackCodec::pack(&mappings()).unwrap();
        let registry = SchemaRegistry::from_msgpack(&bytes).unwrap();
        assert!(registry.service("users", "1.4.2").unwrap().has_file_server());
    }

    #[test]
    fn test_rejects_non_map() {
        assert!(matches!(
            SchemaRegistry::from_value(&Value::from("nope")),
            Err(SdkError::Protocol(_))
        ));
    }

    #[test]
    fn test_unknown_param_type_is_string() {
        let param: Value = [("type", Value::from("uuid"))].into_iter().collect();
        let schema: ParamSchema = MsgPackCodec::from_value(&param).unwrap();
        assert_eq!(schema.param_type, ParamType::String);
    }
}
