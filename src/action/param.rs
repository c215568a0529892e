//! Action parameters.
//!
//! A [`Param`] is `(name, value, type, exists)`. The declared type decides
//! how the value is read back: a param declared `integer` whose value
//! arrived as the string `"42"` yields `42`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};
use crate::payload::Value;

/// Declared parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Null,
    Boolean,
    Integer,
    Float,
    Array,
    Object,
    #[default]
    String,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Null => "null",
            ParamType::Boolean => "boolean",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::String => "string",
        }
    }

    /// Parse a type name; unknown names map to `string`.
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or(ParamType::String)
    }

    /// The type a value carries on its own.
    ///
    /// Binary reads as `string`; extension leaves read as `object`.
    pub fn resolve(value: &Value) -> Self {
        match value {
            Value::Null => ParamType::Null,
            Value::Bool(_) => ParamType::Boolean,
            Value::Integer(_) | Value::UInteger(_) => ParamType::Integer,
            Value::Float(_) => ParamType::Float,
            Value::String(_) | Value::Binary(_) => ParamType::String,
            Value::Array(_) => ParamType::Array,
            Value::Map(_) | Value::Decimal(_) | Value::Date(_) | Value::Timestamp(_) => {
                ParamType::Object
            }
        }
    }
}

impl FromStr for ParamType {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "null" => Ok(ParamType::Null),
            "boolean" => Ok(ParamType::Boolean),
            "integer" => Ok(ParamType::Integer),
            "float" => Ok(ParamType::Float),
            "array" => Ok(ParamType::Array),
            "object" => Ok(ParamType::Object),
            "string" => Ok(ParamType::String),
            other => Err(SdkError::Validation(format!("unknown param type: {other}"))),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable action parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    value: Value,
    param_type: ParamType,
    exists: bool,
}

impl Param {
    /// A param with no value: `""`, typed `string`, not existing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::from(""),
            param_type: ParamType::String,
            exists: false,
        }
    }

    /// A param whose type is resolved from the value.
    pub fn with_value(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            param_type: ParamType::resolve(&value),
            value,
            exists: false,
        }
    }

    /// A param with an explicit type.
    pub fn typed(name: impl Into<String>, value: impl Into<Value>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            param_type,
            exists: false,
        }
    }

    /// Read a `{name, value, type}` record received with a request.
    ///
    /// Returns `None` for records without a name.
    pub fn from_record(record: &Value) -> Option<Self> {
        let name = record.field("name")?.as_str()?;
        let value = record.field("value").cloned().unwrap_or(Value::Null);
        let param_type = match record.field("type").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => ParamType::parse_lenient(t),
            _ => ParamType::resolve(&value),
        };
        Some(Self {
            name: name.to_string(),
            value,
            param_type,
            exists: true,
        })
    }

    /// The `{name, value, type}` record for a transport.
    pub fn to_record(&self) -> Value {
        [
            ("name", Value::from(self.name.as_str())),
            ("value", self.value.clone()),
            ("type", Value::from(self.param_type.as_str())),
        ]
        .into_iter()
        .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw value as received.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn param_type(&self) -> ParamType {
        self.param_type
    }

    /// Whether the param was sent with the request.
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub(crate) fn existing(mut self) -> Self {
        self.exists = true;
        self
    }

    pub fn copy_with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: false,
            ..self.clone()
        }
    }

    pub fn copy_with_value(&self, value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            exists: false,
            ..self.clone()
        }
    }

    pub fn copy_with_type(&self, param_type: ParamType) -> Self {
        Self {
            param_type,
            exists: false,
            ..self.clone()
        }
    }

    /// The value cast to the declared type.
    ///
    /// # Errors
    ///
    /// [`SdkError::TypeMismatch`] when the cast is impossible.
    pub fn typed_value(&self) -> Result<Value> {
        self.cast(self.param_type)
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self.cast(ParamType::Integer)? {
            Value::Integer(i) => Ok(i),
            _ => Err(self.mismatch(ParamType::Integer)),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self.cast(ParamType::Float)? {
            Value::Float(f) => Ok(f),
            _ => Err(self.mismatch(ParamType::Float)),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self.cast(ParamType::Boolean)? {
            Value::Bool(b) => Ok(b),
            _ => Err(self.mismatch(ParamType::Boolean)),
        }
    }

    pub fn as_string(&self) -> Result<String> {
        match self.cast(ParamType::String)? {
            Value::String(s) => Ok(s),
            _ => Err(self.mismatch(ParamType::String)),
        }
    }

    fn mismatch(&self, expected: ParamType) -> SdkError {
        SdkError::TypeMismatch {
            name: self.name.clone(),
            expected: expected.as_str().to_string(),
        }
    }

    /// Cast the value to `target`.
    pub fn cast(&self, target: ParamType) -> Result<Value> {
        let cast = match (target, &self.value) {
            (ParamType::Null, _) => Some(Value::Null),

            (ParamType::Boolean, Value::Bool(b)) => Some(Value::Bool(*b)),
            (ParamType::Boolean, Value::String(s)) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },

            (ParamType::Integer, Value::Integer(_) | Value::UInteger(_)) => {
                Some(self.value.clone())
            }
            (ParamType::Integer, Value::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
                Some(Value::Integer(*f as i64))
            }
            (ParamType::Integer, Value::String(s)) => s.trim().parse().ok().map(Value::Integer),

            (ParamType::Float, Value::Float(f)) => Some(Value::Float(*f)),
            (ParamType::Float, Value::Integer(_) | Value::UInteger(_)) => {
                self.value.as_f64().map(Value::Float)
            }
            (ParamType::Float, Value::Decimal(d)) => d.to_f64().map(Value::Float),
            (ParamType::Float, Value::String(s)) => s.trim().parse().ok().map(Value::Float),

            (ParamType::String, Value::String(s)) => Some(Value::String(s.clone())),
            (ParamType::String, Value::Binary(b)) => {
                String::from_utf8(b.clone()).ok().map(Value::String)
            }
            (
                ParamType::String,
                Value::Bool(_) | Value::Integer(_) | Value::UInteger(_) | Value::Float(_),
            ) => {
                Some(Value::String(self.value.to_json().to_string()))
            }
            (ParamType::String, Value::Decimal(_) | Value::Date(_) | Value::Timestamp(_)) => {
                self.value.to_json().as_str().map(|s| Value::String(s.to_string()))
            }

            (ParamType::Array, Value::Array(items)) => Some(Value::Array(items.clone())),
            (ParamType::Array, Value::String(s)) => parse_json(s).filter(Value::is_array),

            (ParamType::Object, Value::Map(_))
            | (ParamType::Object, Value::Decimal(_))
            | (ParamType::Object, Value::Date(_))
            | (ParamType::Object, Value::Timestamp(_)) => Some(self.value.clone()),
            (ParamType::Object, Value::String(s)) => parse_json(s).filter(Value::is_map),

            _ => None,
        };
        cast.ok_or_else(|| self.mismatch(target))
    }
}

fn parse_json(text: &str) -> Option<Value> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .map(Value::from)
}
