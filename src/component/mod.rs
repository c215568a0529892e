//! Component definition: actions, resources, schemas and hooks.
//!
//! A [`ComponentBuilder`] collects everything a process needs and checks it
//! once at build time. The resulting [`Component`] is cheap to clone and is
//! shared by every unit.
//!
//! # Example
//!
//! ```
//! use svc_runtime::component::{Component, ComponentConfig};
//!
//! let component = Component::builder(ComponentConfig::new("users", "1.0.0"))
//!     .action("read", |action| async move { Ok(action) })
//!     .resource("greeting", |_config| Some(String::from("hello")))
//!     .build()
//!     .unwrap();
//!
//! assert!(component.actions().contains("read"));
//! assert_eq!(*component.context().resource::<String>("greeting").unwrap(), "hello");
//! ```

mod config;
mod context;
mod registry;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

pub use config::{
    ComponentConfig, DEFAULT_DRAIN_TIMEOUT_MS, DEFAULT_SUPERVISE_INTERVAL_MS, DEFAULT_WORKERS,
};
pub use context::ComponentContext;
pub use registry::{ActionRegistry, FnHandler, Handler, HandlerError, HandlerResult};

use crate::action::Action;
use crate::error::{Result, SdkError};
use crate::payload::ErrorRecord;
use crate::process::ComponentProcess;
use crate::schema::SchemaRegistry;
use context::SharedResource;

/// Hook run when the process starts or stops.
pub type LifecycleHook = Arc<dyn Fn(&ComponentContext) + Send + Sync>;

/// Hook run when an invocation fails.
pub type ErrorHook = Arc<dyn Fn(&ComponentContext, &ErrorRecord) + Send + Sync>;

type ResourceFactory = Box<dyn FnOnce(&ComponentConfig) -> Option<SharedResource> + Send>;

/// Optional lifecycle hooks.
#[derive(Clone, Default)]
pub struct Hooks {
    on_start: Option<LifecycleHook>,
    on_stop: Option<LifecycleHook>,
    on_error: Option<ErrorHook>,
}

impl Hooks {
    pub(crate) fn started(&self, context: &ComponentContext) {
        if let Some(hook) = &self.on_start {
            hook(context);
        }
    }

    pub(crate) fn stopped(&self, context: &ComponentContext) {
        if let Some(hook) = &self.on_stop {
            hook(context);
        }
    }

    pub(crate) fn failed(&self, context: &ComponentContext, error: &ErrorRecord) {
        if let Some(hook) = &self.on_error {
            hook(context, error);
        }
    }
}

/// A fully configured component.
#[derive(Clone)]
pub struct Component {
    context: Arc<ComponentContext>,
    actions: Arc<ActionRegistry>,
    hooks: Hooks,
}

impl Component {
    pub fn builder(config: ComponentConfig) -> ComponentBuilder {
        ComponentBuilder::new(config)
    }

    pub fn context(&self) -> &Arc<ComponentContext> {
        &self.context
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn config(&self) -> &ComponentConfig {
        self.context.config()
    }

    /// Wrap the component in a supervised process.
    pub fn into_process(self) -> ComponentProcess {
        ComponentProcess::new(self)
    }

    /// An [`Action`] bound to this component, for running handlers directly.
    pub fn action(
        &self,
        name: &str,
        params: Vec<crate::payload::Value>,
        transport: crate::payload::TransportPayload,
    ) -> Action {
        Action::new(Arc::clone(&self.context), name, params, transport)
    }
}

/// Builder for a [`Component`].
pub struct ComponentBuilder {
    config: ComponentConfig,
    actions: ActionRegistry,
    resources: Vec<(String, ResourceFactory)>,
    schemas: SchemaRegistry,
    hooks: Hooks,
}

impl ComponentBuilder {
    pub fn new(config: ComponentConfig) -> Self {
        Self {
            config,
            actions: ActionRegistry::new(),
            resources: Vec::new(),
            schemas: SchemaRegistry::new(),
            hooks: Hooks::default(),
        }
    }

    /// Register an action handler.
    pub fn action<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Action) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.actions.register(name, handler);
        self
    }

    /// Register a resource created once at build time.
    ///
    /// A factory returning `None` fails the build.
    pub fn resource<T, F>(mut self, name: &str, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: FnOnce(&ComponentConfig) -> Option<T> + Send + 'static,
    {
        let factory: ResourceFactory =
            Box::new(move |config| factory(config).map(|r| Arc::new(r) as SharedResource));
        self.resources.push((name.to_string(), factory));
        self
    }

    /// Process-wide schema mappings.
    pub fn schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ComponentContext) + Send + Sync + 'static,
    {
        self.hooks.on_start = Some(Arc::new(hook));
        self
    }

    pub fn on_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ComponentContext) + Send + Sync + 'static,
    {
        self.hooks.on_stop = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ComponentContext, &ErrorRecord) + Send + Sync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }

    /// Check the configuration and create the resources.
    ///
    /// # Errors
    ///
    /// [`SdkError::Config`] when no action is registered, the worker count
    /// is zero, or a resource factory returns `None`.
    pub fn build(self) -> Result<Component> {
        self.config.validate()?;
        if self.actions.is_empty() {
            return Err(SdkError::Config("No actions registered".to_string()));
        }

        let mut resources = HashMap::with_capacity(self.resources.len());
        for (name, factory) in self.resources {
            let resource = factory(&self.config).ok_or_else(|| {
                SdkError::Config(format!("Invalid return value for resource: \"{name}\""))
            })?;
            resources.insert(name, resource);
        }

        tracing::debug!(
            "Component {} ({}) built with {} action(s)",
            self.config.name,
            self.config.version,
            self.actions.len()
        );

        let context = ComponentContext::new(self.config)
            .with_resources(resources)
            .with_schemas(self.schemas);
        Ok(Component {
            context: Arc::new(context),
            actions: Arc::new(self.actions),
            hooks: self.hooks,
        })
    }

    /// Build and wrap the component in a process.
    pub fn into_process(self) -> Result<ComponentProcess> {
        Ok(self.build()?.into_process())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> ComponentConfig {
        ComponentConfig::new("users", "1.0.0")
    }

    #[test]
    fn test_build_requires_actions() {
        assert!(matches!(
            Component::builder(config()).build(),
            Err(SdkError::Config(_))
        ));
    }

    #[test]
    fn test_build_requires_workers() {
        let result = Component::builder(config().with_workers(0))
            .action("read", |action| async move { Ok(action) })
            .build();
        assert!(matches!(result, Err(SdkError::Config(_))));
    }

    #[test]
    fn test_resource_factory_none_fails() {
        let result = Component::builder(config())
            .action("read", |action| async move { Ok(action) })
            .resource("db", |_config| None::<String>)
            .build();
        let err = result.err().unwrap();
        assert!(err.to_string().contains("\"db\""));
    }

    #[test]
    fn test_resource_factory_sees_config() {
        let component = Component::builder(config().with_variable("dsn", "mem://"))
            .action("read", |action| async move { Ok(action) })
            .resource("dsn", |config| config.variables.get("dsn").cloned())
            .build()
            .unwrap();
        assert_eq!(*component.context().resource::<String>("dsn").unwrap(), "mem://");
    }

    #[test]
    fn test_hooks_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (start, stop, error) = (calls.clone(), calls.clone(), calls.clone());

        let component = Component::builder(config())
            .action("read", |action| async move { Ok(action) })
            .on_start(move |_| {
                start.fetch_add(1, Ordering::SeqCst);
            })
            .on_stop(move |_| {
                stop.fetch_add(10, Ordering::SeqCst);
            })
            .on_error(move |_, _| {
                error.fetch_add(100, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let context = component.context();
        component.hooks().started(context);
        component.hooks().stopped(context);
        component.hooks().failed(context, &ErrorRecord::new("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 111);
    }
}
