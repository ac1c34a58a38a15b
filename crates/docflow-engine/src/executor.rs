use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use docflow_core::config::EngineConfig;
use docflow_core::context::RunContext;
use docflow_core::error::{DocflowError, Result};
use docflow_core::event::{EventBus, WorkflowEvent};
use docflow_core::traits::{ActionContext, WorkflowStore};
use docflow_core::types::{
    AuditAction, AuditLogEntry, Definition, Instance, InstanceUpdate, Node, NodeKind, Workflow,
};

use crate::actions::ActionRegistry;
use crate::conditions::ConditionRegistry;

/// Everything needed to start one run of a workflow.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub workflow_id: String,
    pub definition: Definition,
    /// Trigger component that fired, e.g. `documentUpload`.
    pub trigger: String,
    pub document_id: Option<String>,
    pub user_id: Option<String>,
    pub context: Map<String, Value>,
}

impl ExecutionRequest {
    pub fn new(
        workflow_id: impl Into<String>,
        definition: Definition,
        trigger: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            definition,
            trigger: trigger.into(),
            document_id: None,
            user_id: None,
            context: Map::new(),
        }
    }

    /// Run the stored definition of `workflow`.
    pub fn for_workflow(workflow: &Workflow, trigger: impl Into<String>) -> Self {
        Self::new(workflow.id.clone(), workflow.definition.clone(), trigger)
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }
}

/// State of a single run threaded through the traversal.
struct Run {
    instance_id: String,
    context: RunContext,
}

/// Walks a workflow graph depth-first from its matching triggers.
///
/// Conditions gate their subtree, actions perform side effects, and every
/// evaluated node leaves an audit entry. Per-node failures are recorded and
/// halt only their own branch; failing to create the instance aborts the
/// whole call.
pub struct WorkflowExecutionEngine {
    store: Arc<dyn WorkflowStore>,
    conditions: ConditionRegistry,
    actions: ActionRegistry,
    events: Arc<EventBus>,
    max_depth: usize,
}

impl WorkflowExecutionEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        conditions: ConditionRegistry,
        actions: ActionRegistry,
        events: Arc<EventBus>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            conditions,
            actions,
            events,
            max_depth: config.max_depth,
        }
    }

    /// Engine with the built-in condition and action handlers.
    pub fn with_builtins(
        store: Arc<dyn WorkflowStore>,
        events: Arc<EventBus>,
        config: &EngineConfig,
    ) -> Self {
        let actions = ActionRegistry::with_builtins(store.clone(), events.clone(), config);
        Self::new(store, ConditionRegistry::with_builtins(), actions, events, config)
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn conditions(&self) -> &ConditionRegistry {
        &self.conditions
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Execute one run and return the instance in its terminal state.
    pub async fn execute_workflow(&self, request: ExecutionRequest) -> Result<Instance> {
        let ExecutionRequest {
            workflow_id,
            definition,
            trigger,
            document_id,
            user_id,
            context,
        } = request;

        let context = RunContext::for_run(context, document_id.as_deref(), user_id.as_deref(), &trigger);
        let instance = Instance::start(&workflow_id, document_id.clone(), context.snapshot());
        self.store
            .create_instance(&instance)
            .await
            .map_err(|e| DocflowError::InstanceCreation(e.to_string()))?;

        info!(
            instance_id = %instance.id,
            workflow_id = %workflow_id,
            trigger = %trigger,
            "Workflow started"
        );
        self.events.publish(WorkflowEvent::InstanceStarted {
            instance_id: instance.id.clone(),
            workflow_id: workflow_id.clone(),
            trigger: trigger.clone(),
        });
        self.audit(
            &instance.id,
            AuditAction::WorkflowStarted,
            json!({
                "trigger": trigger,
                "workflowId": workflow_id,
                "documentId": document_id,
                "userId": user_id,
                "context": context.snapshot(),
            }),
        )
        .await;

        let triggers: Vec<String> = definition
            .triggers_for(&trigger)
            .into_iter()
            .map(|n| n.id.clone())
            .collect();

        if triggers.is_empty() {
            let err = DocflowError::NoTriggerFound(trigger);
            warn!(instance_id = %instance.id, error = %err, "Workflow has no matching trigger");
            if let Err(e) = self
                .store
                .update_instance(&instance.id, InstanceUpdate::failed(err.to_string()))
                .await
            {
                error!(instance_id = %instance.id, error = %e, "Failed to mark instance as errored");
            }
            self.events.publish(WorkflowEvent::InstanceFailed {
                instance_id: instance.id.clone(),
                error: err.to_string(),
            });
            return Err(err);
        }

        let mut run = Run {
            instance_id: instance.id.clone(),
            context,
        };
        for trigger_id in &triggers {
            self.execute_node(&definition, trigger_id, 0, &mut run).await;
        }

        let snapshot = run.context.snapshot();
        self.audit(
            &instance.id,
            AuditAction::WorkflowCompleted,
            json!({ "context": snapshot }),
        )
        .await;

        let finished = self
            .store
            .update_instance(&instance.id, InstanceUpdate::completed(snapshot))
            .await?;

        info!(instance_id = %finished.id, "Workflow completed");
        self.events.publish(WorkflowEvent::InstanceCompleted {
            instance_id: finished.id.clone(),
        });
        Ok(finished)
    }

    /// Evaluate one node and, when it yields true, its successors in edge
    /// order. Returns the node's result.
    fn execute_node<'a>(
        &'a self,
        definition: &'a Definition,
        node_id: &'a str,
        depth: usize,
        run: &'a mut Run,
    ) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let Some(node) = definition.node(node_id) else {
                debug!(node_id, "Edge target not in definition, skipping");
                return false;
            };

            if depth > self.max_depth {
                let err = DocflowError::MaxDepthExceeded(self.max_depth);
                warn!(instance_id = %run.instance_id, node_id, depth, "Traversal depth limit reached");
                self.record_node_error(run, node, &err).await;
                return false;
            }

            let result = match self.evaluate(node, run).await {
                Ok(result) => result,
                Err(e) => {
                    self.record_node_error(run, node, &e).await;
                    return false;
                }
            };

            debug!(
                instance_id = %run.instance_id,
                node_id,
                kind = %node.kind,
                component = %node.component,
                result,
                "Node executed"
            );
            self.audit(
                &run.instance_id,
                AuditAction::NodeExecuted,
                json!({
                    "nodeId": node.id,
                    "nodeType": node.kind,
                    "component": node.component,
                    "result": result,
                    "context": run.context.snapshot(),
                }),
            )
            .await;
            self.events.publish(WorkflowEvent::NodeExecuted {
                instance_id: run.instance_id.clone(),
                node_id: node.id.clone(),
                kind: node.kind,
                component: node.component.clone(),
                result,
            });

            if result {
                for edge in definition.outgoing(node_id) {
                    self.execute_node(definition, &edge.target, depth + 1, run).await;
                }
            }
            result
        })
    }

    async fn evaluate(&self, node: &Node, run: &mut Run) -> Result<bool> {
        match node.kind {
            NodeKind::Trigger => Ok(true),
            NodeKind::Condition => self
                .conditions
                .evaluate(&node.component, &node.config, &run.context),
            NodeKind::Action => {
                let ctx = ActionContext {
                    instance_id: run.instance_id.clone(),
                    context: run.context.clone(),
                };
                let outcome = self
                    .actions
                    .execute(&node.component, node.config.clone(), ctx)
                    .await?;
                run.context.extend(outcome.output);
                Ok(outcome.succeeded)
            }
        }
    }

    async fn record_node_error(&self, run: &Run, node: &Node, err: &DocflowError) {
        error!(
            instance_id = %run.instance_id,
            node_id = %node.id,
            component = %node.component,
            error = %err,
            "Node failed"
        );
        self.audit(
            &run.instance_id,
            AuditAction::NodeError,
            json!({ "nodeId": node.id, "error": err.to_string() }),
        )
        .await;
        self.events.publish(WorkflowEvent::NodeFailed {
            instance_id: run.instance_id.clone(),
            node_id: node.id.clone(),
            error: err.to_string(),
        });
    }

    /// Append an audit entry. Failures are logged, never propagated.
    async fn audit(&self, instance_id: &str, action: AuditAction, details: Value) {
        let entry = AuditLogEntry::new(instance_id, action, details);
        if let Err(e) = self.store.append_audit(&entry).await {
            error!(instance_id, action = %action, error = %e, "Failed to write audit entry");
        }
    }
}
