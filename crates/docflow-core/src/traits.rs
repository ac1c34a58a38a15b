use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::context::RunContext;
use crate::error::Result;
use crate::types::*;

/// Condition handler: a pure predicate over node config and run context.
pub trait ConditionEvaluator: Send + Sync + 'static {
    /// Component id this handler is registered under (e.g. `customerIs`).
    fn component(&self) -> &str;

    /// Evaluate the condition. Missing inputs evaluate to `Ok(false)`;
    /// `Err` is reserved for malformed configuration.
    fn evaluate(&self, config: &NodeConfig, ctx: &RunContext) -> Result<bool>;
}

/// Input handed to an action handler.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub instance_id: String,
    pub context: RunContext,
}

/// What an action reports back to the engine.
#[derive(Debug, Clone, Default)]
pub struct ActionOutcome {
    pub succeeded: bool,
    /// Values appended to the run context for downstream nodes.
    pub output: Map<String, Value>,
}

impl ActionOutcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            output: Map::new(),
        }
    }

    pub fn failure() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, key: impl Into<String>, value: Value) -> Self {
        self.output.insert(key.into(), value);
        self
    }
}

/// Action handler: performs a side effect for an action node.
pub trait ActionExecutor: Send + Sync + 'static {
    /// Component id this handler is registered under (e.g. `requireApproval`).
    fn component(&self) -> &str;

    /// Execute the action with its node config.
    fn execute(&self, config: NodeConfig, ctx: ActionContext) -> BoxFuture<'_, Result<ActionOutcome>>;

    /// Whether this handler only records intent instead of performing the
    /// effect. Stub handlers are left out of production registries.
    fn is_stub(&self) -> bool {
        false
    }
}

/// Persistence backend for workflows, runs, audit trail, approvals and
/// document metadata.
pub trait WorkflowStore: Send + Sync + 'static {
    /// Insert or replace a workflow.
    fn save_workflow(&self, workflow: &Workflow) -> BoxFuture<'_, Result<()>>;

    fn get_workflow(&self, id: &str) -> BoxFuture<'_, Result<Option<Workflow>>>;

    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<Workflow>>>;

    /// Persist a new run record.
    fn create_instance(&self, instance: &Instance) -> BoxFuture<'_, Result<()>>;

    /// Apply a status transition. Fails with `InvalidTransition` when the
    /// stored status does not allow it.
    fn update_instance(&self, id: &str, update: InstanceUpdate) -> BoxFuture<'_, Result<Instance>>;

    fn get_instance(&self, id: &str) -> BoxFuture<'_, Result<Option<Instance>>>;

    /// Runs of a workflow, newest first.
    fn list_instances(&self, workflow_id: &str) -> BoxFuture<'_, Result<Vec<Instance>>>;

    /// Append an audit record.
    fn append_audit(&self, entry: &AuditLogEntry) -> BoxFuture<'_, Result<()>>;

    /// Audit trail of a run in append order.
    fn audit_log(&self, instance_id: &str) -> BoxFuture<'_, Result<Vec<AuditLogEntry>>>;

    fn create_approval(&self, request: &ApprovalRequest) -> BoxFuture<'_, Result<()>>;

    fn get_approval(&self, id: &str) -> BoxFuture<'_, Result<Option<ApprovalRequest>>>;

    /// Approval requests, optionally filtered by instance and/or status.
    fn list_approvals(
        &self,
        instance_id: Option<&str>,
        status: Option<ApprovalStatus>,
    ) -> BoxFuture<'_, Result<Vec<ApprovalRequest>>>;

    /// Persist a decided approval request.
    ///
    /// Only a pending row is updated; a request already decided yields
    /// `ApprovalAlreadyDecided`.
    fn update_approval(&self, request: &ApprovalRequest) -> BoxFuture<'_, Result<()>>;

    /// Insert or replace a document.
    fn put_document(&self, document: &Document) -> BoxFuture<'_, Result<()>>;

    fn get_document(&self, id: &str) -> BoxFuture<'_, Result<Option<Document>>>;

    /// Update metadata fields of an existing document.
    fn update_document_metadata(
        &self,
        id: &str,
        metadata: &DocumentMetadata,
    ) -> BoxFuture<'_, Result<Document>>;
}
