//! Action registry for dispatching requests by action name.
//!
//! # Example
//!
//! ```
//! use svc_runtime::component::ActionRegistry;
//!
//! let mut registry = ActionRegistry::new();
//! registry.register("read", |action| async move { Ok(action) });
//!
//! assert!(registry.contains("read"));
//! assert!(registry.get("write").is_none());
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::action::Action;
use crate::channel::BoxFuture;

/// Error raised by a user handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a user handler: the (possibly mutated) action, or an error.
pub type HandlerResult = std::result::Result<Action, HandlerError>;

/// Trait for action handlers.
pub trait Handler: Send + Sync + 'static {
    /// Run the handler for one invocation.
    fn call(&self, action: Action) -> BoxFuture<'static, HandlerResult>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F, Fut>
where
    F: Fn(Action) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(Action) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Handler for FnHandler<F, Fut>
where
    F: Fn(Action) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, action: Action) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.handler)(action))
    }
}

/// Registry mapping action names to handlers.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    handlers: BTreeMap<String, Arc<dyn Handler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; a later registration under the same name wins.
    pub fn register<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(Action) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_handler(name, FnHandler::new(handler));
    }

    pub fn register_handler<H: Handler>(&mut self, name: &str, handler: H) {
        if self.handlers.insert(name.to_string(), Arc::new(handler)).is_some() {
            tracing::warn!("Handler for action '{}' replaced", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_action() {
        let mut registry = ActionRegistry::new();
        registry.register("read", |action| async move { Ok(action) });
        registry.register("write", |action| async move { Ok(action) });

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("read"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["read", "write"]);
    }

    #[test]
    fn test_handler_not_found() {
        let registry = ActionRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = ActionRegistry::new();
        registry.register("read", |action| async move { Ok(action) });
        registry.register("read", |_action| async move {
            Err::<Action, HandlerError>("replaced".into())
        });
        assert_eq!(registry.len(), 1);
    }
}
