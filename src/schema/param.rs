//! Parameter schemas and param validation.

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::action::{Param, ParamType};
use crate::error::{Result, SdkError};
use crate::payload::Value;

fn default_true() -> bool {
    true
}

fn default_input() -> String {
    "query".to_string()
}

fn lenient_type<'de, D>(deserializer: D) -> std::result::Result<ParamType, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Ok(ParamType::parse_lenient(&name))
}

/// How a param is bound to an HTTP request by the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HttpParamSchema {
    #[serde(default = "default_true")]
    pub gateway: bool,
    #[serde(default = "default_input")]
    pub input: String,
    /// Name of the HTTP field; the param name when absent.
    #[serde(default)]
    pub param: Option<String>,
}

impl Default for HttpParamSchema {
    fn default() -> Self {
        Self {
            gateway: true,
            input: default_input(),
            param: None,
        }
    }
}

/// Rules for one action parameter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParamSchema {
    #[serde(skip)]
    name: String,
    #[serde(rename = "type", deserialize_with = "lenient_type")]
    pub param_type: ParamType,
    pub format: String,
    pub pattern: Option<String>,
    pub allow_empty: bool,
    pub default: Option<Value>,
    pub required: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub minimum_length: Option<usize>,
    pub maximum_length: Option<usize>,
    pub minimum_items: Option<usize>,
    pub maximum_items: Option<usize>,
    pub unique_items: bool,
    #[serde(rename = "enum")]
    pub enumeration: Option<Vec<Value>>,
    pub multiple_of: Option<f64>,
    pub http: HttpParamSchema,
    #[serde(skip)]
    regex: Option<Regex>,
}

impl ParamSchema {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name the schema and compile its pattern.
    pub(crate) fn prepare(&mut self, name: &str) -> Result<()> {
        self.name = name.to_string();
        self.regex = match self.pattern.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(Regex::new(pattern).map_err(|e| {
                SdkError::Validation(format!("Invalid pattern for parameter \"{name}\": {e}"))
            })?),
            _ => None,
        };
        Ok(())
    }

    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Some(pattern.to_string());
        let name = self.name.clone();
        self.prepare(&name)?;
        Ok(self)
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enumeration = Some(values);
        self
    }

    /// Validate and normalise a param record received with a request.
    ///
    /// A missing param takes the default when there is one. The returned
    /// record carries the value cast to the declared type.
    ///
    /// # Errors
    ///
    /// [`SdkError::TypeMismatch`] when the value cannot be cast,
    /// [`SdkError::Validation`] for any other rule.
    pub fn normalize(&self, record: Option<&Value>) -> Result<Option<Value>> {
        let Some(record) = record else {
            if let Some(default) = &self.default {
                return Ok(Some(
                    Param::typed(&self.name, default.clone(), self.param_type).to_record(),
                ));
            }
            if self.required {
                return Err(self.invalid("is required"));
            }
            return Ok(None);
        };

        let param = Param::from_record(record)
            .unwrap_or_else(|| Param::new(&self.name))
            .copy_with_name(&self.name);
        let value = param.cast(self.param_type)?;
        self.check(&value)?;
        Ok(Some(
            Param::typed(&self.name, value, self.param_type).to_record(),
        ))
    }

    fn check(&self, value: &Value) -> Result<()> {
        if !self.allow_empty && is_empty(value) {
            return Err(self.invalid("cannot be empty"));
        }

        if let (Some(regex), Value::String(text)) = (&self.regex, value) {
            if !regex.is_match(text) {
                return Err(self.invalid("does not match the pattern"));
            }
        }

        if let Some(number) = numeric(value) {
            self.check_range(number)?;
        }

        match value {
            Value::String(text) => {
                let len = text.chars().count();
                if self.minimum_length.is_some_and(|min| len < min) {
                    return Err(self.invalid("is too short"));
                }
                if self.maximum_length.is_some_and(|max| len > max) {
                    return Err(self.invalid("is too long"));
                }
            }
            Value::Array(items) => {
                if self.minimum_items.is_some_and(|min| items.len() < min) {
                    return Err(self.invalid("has too few items"));
                }
                if self.maximum_items.is_some_and(|max| items.len() > max) {
                    return Err(self.invalid("has too many items"));
                }
                if self.unique_items
                    && items
                        .iter()
                        .enumerate()
                        .any(|(i, item)| items[..i].contains(item))
                {
                    return Err(self.invalid("has duplicated items"));
                }
            }
            _ => {}
        }

        if let Some(allowed) = &self.enumeration {
            if !allowed.contains(value) {
                return Err(self.invalid("is not one of the allowed values"));
            }
        }
        Ok(())
    }

    fn check_range(&self, number: f64) -> Result<()> {
        if let Some(min) = self.minimum {
            let below = if self.exclusive_minimum {
                number <= min
            } else {
                number < min
            };
            if below {
                return Err(self.invalid(&format!("must be greater than {min}")));
            }
        }
        if let Some(max) = self.maximum {
            let above = if self.exclusive_maximum {
                number >= max
            } else {
                number > max
            };
            if above {
                return Err(self.invalid(&format!("must be less than {max}")));
            }
        }
        if let Some(step) = self.multiple_of.filter(|s| *s > 0.0) {
            if (number / step).fract() != 0.0 {
                return Err(self.invalid(&format!("must be a multiple of {step}")));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> SdkError {
        SdkError::Validation(format!("Parameter \"{}\" {}", self.name, reason))
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(_) | Value::UInteger(_) | Value::Float(_) => value.as_f64(),
        _ => None,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        other => other.is_empty_container(),
    }
}
