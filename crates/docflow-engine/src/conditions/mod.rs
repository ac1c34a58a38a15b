//! Condition handlers and their registry.

pub mod builtin;
pub mod glob;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use docflow_core::context::RunContext;
use docflow_core::error::Result;
use docflow_core::traits::ConditionEvaluator;
use docflow_core::types::NodeConfig;

pub use builtin::{CompareOp, CustomerIs, DocumentTypeIs, FileSize, LocationIs};

/// Registry of condition handlers keyed by component id.
#[derive(Default)]
pub struct ConditionRegistry {
    handlers: HashMap<String, Arc<dyn ConditionEvaluator>>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in conditions registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(CustomerIs);
        registry.register(DocumentTypeIs);
        registry.register(FileSize);
        registry.register(LocationIs);
        registry
    }

    /// Register a handler, replacing any handler with the same component id.
    pub fn register(&mut self, handler: impl ConditionEvaluator) {
        let component = handler.component().to_string();
        self.handlers.insert(component, Arc::new(handler));
    }

    pub fn get(&self, component: &str) -> Option<Arc<dyn ConditionEvaluator>> {
        self.handlers.get(component).cloned()
    }

    /// Registered component ids, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Evaluate a condition. Unknown components fail closed.
    pub fn evaluate(&self, component: &str, config: &NodeConfig, ctx: &RunContext) -> Result<bool> {
        match self.handlers.get(component) {
            Some(handler) => handler.evaluate(config, ctx),
            None => {
                warn!(component, "Unknown condition component, evaluating to false");
                Ok(false)
            }
        }
    }
}
