//! Strategies that drive an around-advice chain.

use crate::error::{WeaveError, WeaveResult};
use crate::join_point::Invocation;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use weave_api::Value;

pub const DEFAULT_CONTROLLER: &str = "default";
pub const REVERSED_CONTROLLER: &str = "reversed";

/// Decides which advice runs next when an invocation proceeds.
///
/// A controller may keep per-invocation state; `deep_copy` is called when an
/// invocation is detached so the copy never shares that state.
pub trait Controller: Send + Sync {
    fn name(&self) -> &str;

    fn proceed(&self, invocation: &mut Invocation<'_>) -> WeaveResult<Value>;

    fn deep_copy(&self) -> Arc<dyn Controller>;
}

/// Runs the chain front to back, then the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearController;

impl Controller for LinearController {
    fn name(&self) -> &str {
        DEFAULT_CONTROLLER
    }

    fn proceed(&self, invocation: &mut Invocation<'_>) -> WeaveResult<Value> {
        let position = invocation.cursor();
        invocation.step_to(position)
    }

    fn deep_copy(&self) -> Arc<dyn Controller> {
        Arc::new(*self)
    }
}

/// Runs the chain back to front, then the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReversedController;

impl Controller for ReversedController {
    fn name(&self) -> &str {
        REVERSED_CONTROLLER
    }

    fn proceed(&self, invocation: &mut Invocation<'_>) -> WeaveResult<Value> {
        let len = invocation.chain_len();
        let cursor = invocation.cursor();
        let position = if cursor < len { len - 1 - cursor } else { cursor };
        invocation.step_to(position)
    }

    fn deep_copy(&self) -> Arc<dyn Controller> {
        Arc::new(*self)
    }
}

/// Named controllers available to join points of one system.
pub struct ControllerRegistry {
    controllers: DashMap<String, Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self {
            controllers: DashMap::new(),
        }
    }

    /// `default` and `reversed` pre-registered.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(LinearController));
        registry.register(Arc::new(ReversedController));
        registry
    }

    /// Registers under `controller.name()`, replacing any previous entry.
    pub fn register(&self, controller: Arc<dyn Controller>) {
        let name = controller.name().to_string();
        debug!(controller = %name, "controller registered");
        self.controllers.insert(name, controller);
    }

    pub fn get(&self, name: &str) -> WeaveResult<Arc<dyn Controller>> {
        self.controllers
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| WeaveError::definition(format!("unknown controller '{name}'")))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.controllers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = ControllerRegistry::with_builtins();
        assert_eq!(registry.names(), ["default", "reversed"]);
        assert_eq!(registry.get("reversed").unwrap().name(), "reversed");
        let err = registry.get("random").err().unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("random"));
    }
}
