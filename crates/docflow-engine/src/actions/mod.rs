//! Action handlers and their registry.

pub mod approval;
pub mod metadata;
pub mod stubs;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use docflow_core::config::EngineConfig;
use docflow_core::error::Result;
use docflow_core::event::EventBus;
use docflow_core::traits::{ActionContext, ActionExecutor, ActionOutcome, WorkflowStore};
use docflow_core::types::NodeConfig;

pub use approval::RequireApproval;
pub use metadata::SetMetadata;
pub use stubs::{AutoRoute, SendNotification};

/// Registry of action handlers keyed by component id.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionExecutor>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in actions. Stub actions are only
    /// registered when `config.allow_stub_actions` is set.
    pub fn with_builtins(
        store: Arc<dyn WorkflowStore>,
        events: Arc<EventBus>,
        config: &EngineConfig,
    ) -> Self {
        let mut registry = Self::new();

        registry.register(
            RequireApproval::new(store.clone(), events.clone())
                .with_defaults(config.default_priority, config.default_due_days),
        );
        registry.register(SetMetadata::new(store));

        if config.allow_stub_actions {
            registry.register(AutoRoute::new(events.clone()));
            registry.register(SendNotification::new(events));
        }

        registry
    }

    /// Register a handler, replacing any handler with the same component id.
    /// Stub handlers are accepted; use `with_builtins` to filter them.
    pub fn register(&mut self, handler: impl ActionExecutor) {
        let component = handler.component().to_string();
        debug!(component = %component, stub = handler.is_stub(), "Registering action");
        self.handlers.insert(component, Arc::new(handler));
    }

    pub fn get(&self, component: &str) -> Option<Arc<dyn ActionExecutor>> {
        self.handlers.get(component).cloned()
    }

    /// Registered component ids, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Execute an action. Unknown components fail closed.
    pub async fn execute(
        &self,
        component: &str,
        config: NodeConfig,
        ctx: ActionContext,
    ) -> Result<ActionOutcome> {
        match self.get(component) {
            Some(handler) => handler.execute(config, ctx).await,
            None => {
                warn!(component, instance_id = %ctx.instance_id, "Unknown action component, reporting failure");
                Ok(ActionOutcome::failure())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::context::RunContext;
    use docflow_test_utils::MemoryStore;
    use futures::future::BoxFuture;
    use serde_json::Map;

    struct Echo;

    impl ActionExecutor for Echo {
        fn component(&self) -> &str {
            "echo"
        }

        fn execute(&self, _config: NodeConfig, _ctx: ActionContext) -> BoxFuture<'_, Result<ActionOutcome>> {
            Box::pin(async { Ok(ActionOutcome::success()) })
        }
    }

    fn registry(allow_stubs: bool) -> ActionRegistry {
        let config = EngineConfig {
            allow_stub_actions: allow_stubs,
            ..Default::default()
        };
        ActionRegistry::with_builtins(Arc::new(MemoryStore::new()), Arc::new(EventBus::default()), &config)
    }

    fn ctx() -> ActionContext {
        ActionContext {
            instance_id: "inst-1".into(),
            context: RunContext::new(Map::new()),
        }
    }

    #[test]
    fn test_builtins_with_stubs() {
        assert_eq!(
            registry(true).list(),
            vec!["autoRoute", "requireApproval", "sendNotification", "setMetadata"]
        );
    }

    #[tokio::test]
    async fn test_production_mode_excludes_stubs() {
        let registry = registry(false);
        assert_eq!(registry.list(), vec!["requireApproval", "setMetadata"]);

        let outcome = registry
            .execute("sendNotification", NodeConfig::new(), ctx())
            .await
            .unwrap();
        assert!(!outcome.succeeded);
    }

    #[tokio::test]
    async fn test_unknown_and_custom_components() {
        let mut registry = ActionRegistry::new();
        assert!(!registry.execute("echo", NodeConfig::new(), ctx()).await.unwrap().succeeded);

        registry.register(Echo);
        assert!(registry.execute("echo", NodeConfig::new(), ctx()).await.unwrap().succeeded);
    }
}
