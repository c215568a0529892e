//! Component configuration.
//!
//! The host hands over the settings it parsed from the command line. They
//! can be built in code or read from JSON:
//!
//! ```
//! use svc_runtime::component::ComponentConfig;
//!
//! let config = ComponentConfig::from_json(
//!     r#"{"name": "users", "version": "1.0.0", "workers": 2}"#,
//! ).unwrap();
//! assert_eq!(config.workers, 2);
//! assert_eq!(config.drain_timeout_ms, 1500);
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelConfig;
use crate::error::{Result, SdkError};
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::writer::DEFAULT_CHANNEL_CAPACITY;

/// Default number of worker units.
pub const DEFAULT_WORKERS: usize = 5;

/// Default supervisor wake-up period.
pub const DEFAULT_SUPERVISE_INTERVAL_MS: u64 = 100;

/// Default time granted to units when draining.
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 1500;

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_supervise_interval() -> u64 {
    DEFAULT_SUPERVISE_INTERVAL_MS
}

fn default_drain_timeout() -> u64 {
    DEFAULT_DRAIN_TIMEOUT_MS
}

fn default_max_payload_size() -> u32 {
    DEFAULT_MAX_PAYLOAD_SIZE
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// Settings of one component process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Service name.
    pub name: String,
    /// Service version.
    pub version: String,
    /// Version of the platform the component runs in.
    #[serde(default)]
    pub platform_version: String,
    /// Path of the component's entry point.
    #[serde(default)]
    pub source_file: String,
    /// Debug mode: verbose logs and [`Action::log`](crate::action::Action::log) output.
    #[serde(default)]
    pub debug: bool,
    /// Variables defined for the component.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// Resolve short field aliases in commands and alias field names in
    /// replies. See [`FieldMappings`](crate::payload::FieldMappings).
    #[serde(default)]
    pub field_mappings: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_supervise_interval")]
    pub supervise_interval_ms: u64,
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_ms: u64,
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: u32,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl ComponentConfig {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            platform_version: String::new(),
            source_file: String::new(),
            debug: false,
            variables: BTreeMap::new(),
            field_mappings: false,
            workers: DEFAULT_WORKERS,
            supervise_interval_ms: DEFAULT_SUPERVISE_INTERVAL_MS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Parse a JSON configuration document.
    ///
    /// # Errors
    ///
    /// [`SdkError::Json`] when the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_platform_version(mut self, version: impl Into<String>) -> Self {
        self.platform_version = version.into();
        self
    }

    pub fn with_source_file(mut self, path: impl Into<String>) -> Self {
        self.source_file = path.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_field_mappings(mut self, enabled: bool) -> Self {
        self.field_mappings = enabled;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_supervise_interval(mut self, interval: Duration) -> Self {
        self.supervise_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn supervise_interval(&self) -> Duration {
        Duration::from_millis(self.supervise_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Tuning for the channel built by the process.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            channel_capacity: self.channel_capacity,
            max_payload_size: self.max_payload_size,
        }
    }

    /// Check the settings a process cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SdkError::Config("Component name is empty".to_string()));
        }
        if self.workers == 0 {
            return Err(SdkError::Config(
                "At least one worker is required".to_string(),
            ));
        }
        if self.supervise_interval_ms == 0 {
            return Err(SdkError::Config(
                "Supervise interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
