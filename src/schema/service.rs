//! Service and action schemas.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::ParamSchema;
use crate::error::Result;
use crate::payload::Value;

fn default_true() -> bool {
    true
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_delimiter() -> String {
    "/".to_string()
}

/// HTTP exposure of a service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HttpServiceSchema {
    #[serde(default = "default_true")]
    pub gateway: bool,
    #[serde(default)]
    pub base_path: String,
}

impl Default for HttpServiceSchema {
    fn default() -> Self {
        Self {
            gateway: true,
            base_path: String::new(),
        }
    }
}

/// HTTP exposure of an action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpActionSchema {
    pub gateway: bool,
    pub method: String,
    pub path: String,
    pub input: String,
    pub body: String,
}

impl Default for HttpActionSchema {
    fn default() -> Self {
        Self {
            gateway: true,
            method: "get".to_string(),
            path: String::new(),
            input: "query".to_string(),
            body: "text/plain".to_string(),
        }
    }
}

/// Schema of one action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionSchema {
    #[serde(skip)]
    name: String,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub entity_path: String,
    #[serde(default = "default_delimiter")]
    pub path_delimiter: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamSchema>,
    #[serde(default)]
    pub http: HttpActionSchema,
}

impl ActionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path_delimiter: default_delimiter(),
            primary_key: default_primary_key(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, param: ParamSchema) -> Self {
        self.params.insert(param.name().to_string(), param);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn param(&self, name: &str) -> Option<&ParamSchema> {
        self.params.get(name)
    }

    pub(crate) fn prepare(&mut self, name: &str) -> Result<()> {
        self.name = name.to_string();
        for (param_name, param) in self.params.iter_mut() {
            param.prepare(param_name)?;
        }
        Ok(())
    }

    /// Validate and normalise the param records of a request.
    ///
    /// Records without a schema entry pass through untouched; defaulted
    /// params are appended in schema order.
    pub fn normalize_params(&self, records: Vec<Value>) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(records.len());
        let mut seen = Vec::new();
        for record in records {
            let name = record
                .field("name")
                .and_then(Value::as_str)
                .map(str::to_string);
            match name.as_deref().and_then(|n| self.params.get(n)) {
                Some(schema) => {
                    if let Some(normalized) = schema.normalize(Some(&record))? {
                        out.push(normalized);
                    }
                    seen.push(schema.name().to_string());
                }
                None => out.push(record),
            }
        }

        for (name, schema) in &self.params {
            if seen.iter().any(|s| s == name) {
                continue;
            }
            if let Some(normalized) = schema.normalize(None)? {
                out.push(normalized);
            }
        }
        Ok(out)
    }
}

/// Schema of one service version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceSchema {
    #[serde(skip)]
    name: String,
    #[serde(skip)]
    version: String,
    /// Whether the service runs a file server.
    #[serde(default)]
    pub files: bool,
    #[serde(default)]
    pub http: HttpServiceSchema,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionSchema>,
}

impl ServiceSchema {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_files(mut self, files: bool) -> Self {
        self.files = files;
        self
    }

    pub fn with_action(mut self, action: ActionSchema) -> Self {
        self.actions.insert(action.name().to_string(), action);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn has_file_server(&self) -> bool {
        self.files
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn action(&self, name: &str) -> Option<&ActionSchema> {
        self.actions.get(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub(crate) fn prepare(&mut self, name: &str, version: &str) -> Result<()> {
        self.name = name.to_string();
        self.version = version.to_string();
        for (action_name, action) in self.actions.iter_mut() {
            action.prepare(action_name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ParamType;

    fn record(name: &str, value: impl Into<Value>) -> Value {
        [("name", Value::from(name)), ("value", value.into())]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_normalize_params() {
        let action = ActionSchema::new("list")
            .with_param(ParamSchema::new("page", ParamType::Integer).with_default(1i64))
            .with_param(ParamSchema::new("size", ParamType::Integer));

        let out = action
            .normalize_params(vec![record("size", "20"), record("extra", "x")])
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].field("value"), Some(&Value::Integer(20)));
        assert_eq!(out[1].field("value"), Some(&Value::from("x")));
        assert_eq!(out[2].field("name").and_then(Value::as_str), Some("page"));
        assert_eq!(out[2].field("value"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_service_lookup() {
        let service = ServiceSchema::new("users", "1.0.0")
            .with_files(true)
            .with_action(ActionSchema::new("read"));
        assert!(service.has_file_server());
        assert!(service.has_action("read"));
        assert!(service.action("write").is_none());
        assert_eq!(service.action_names().collect::<Vec<_>>(), vec!["read"]);
    }
}
