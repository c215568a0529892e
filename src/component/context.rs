//! State shared by every unit of a component process.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ComponentConfig;
use crate::error::{Result, SdkError};
use crate::schema::SchemaRegistry;

pub(crate) type SharedResource = Arc<dyn Any + Send + Sync>;

/// Read-only context handed to every invocation.
///
/// Built once by [`ComponentBuilder::build`](super::ComponentBuilder::build)
/// and shared behind an `Arc`.
pub struct ComponentContext {
    config: ComponentConfig,
    resources: HashMap<String, SharedResource>,
    schemas: Arc<SchemaRegistry>,
}

impl ComponentContext {
    pub fn new(config: ComponentConfig) -> Self {
        Self {
            config,
            resources: HashMap::new(),
            schemas: Arc::new(SchemaRegistry::new()),
        }
    }

    pub(crate) fn with_resources(mut self, resources: HashMap<String, SharedResource>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = Arc::new(schemas);
        self
    }

    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn is_debug(&self) -> bool {
        self.config.debug
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// A resource registered at build time.
    ///
    /// # Errors
    ///
    /// [`SdkError::Config`] when no resource has that name or it has
    /// another type.
    pub fn resource<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let resource = self
            .resources
            .get(name)
            .ok_or_else(|| SdkError::Config(format!("Resource not found: \"{name}\"")))?;
        Arc::clone(resource)
            .downcast::<T>()
            .map_err(|_| SdkError::Config(format!("Resource \"{name}\" has another type")))
    }

    /// Process-wide schema mappings.
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("config", &self.config)
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("schemas", &self.schemas)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_lookup() {
        let mut resources: HashMap<String, SharedResource> = HashMap::new();
        resources.insert("db".to_string(), Arc::new(String::from("postgres")));
        let context =
            ComponentContext::new(ComponentConfig::new("users", "1.0.0")).with_resources(resources);

        assert!(context.has_resource("db"));
        assert_eq!(*context.resource::<String>("db").unwrap(), "postgres");
        assert!(context.resource::<u32>("db").is_err());
        assert!(matches!(
            context.resource::<String>("cache"),
            Err(SdkError::Config(_))
        ));
    }
}
