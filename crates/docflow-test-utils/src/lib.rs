//! Test doubles and fixtures shared by the docflow crates.
//!
//! [`MemoryStore`] is a `WorkflowStore` that keeps everything in memory and
//! can be told to fail individual operations, which is how the engine's
//! error paths are exercised without a database.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};

use docflow_core::error::{DocflowError, Result};
use docflow_core::traits::WorkflowStore;
use docflow_core::types::*;

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateInstance,
    UpdateInstance,
    AppendAudit,
    CreateApproval,
    UpdateDocumentMetadata,
}

#[derive(Default)]
struct State {
    workflows: HashMap<String, Workflow>,
    instances: Vec<Instance>,
    audit: Vec<AuditLogEntry>,
    approvals: Vec<ApprovalRequest>,
    documents: HashMap<String, Document>,
}

/// In-memory `WorkflowStore` with failure injection.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    failing: Mutex<HashSet<StoreOp>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call of `op` fail with a database error.
    pub fn fail(&self, op: StoreOp) {
        self.failing.lock().unwrap().insert(op);
    }

    /// Stop failing `op`.
    pub fn recover(&self, op: StoreOp) {
        self.failing.lock().unwrap().remove(&op);
    }

    /// Seed a document synchronously.
    pub fn with_document(self, document: Document) -> Self {
        self.state
            .lock()
            .unwrap()
            .documents
            .insert(document.id.clone(), document);
        self
    }

    /// All instances in creation order.
    pub fn instances(&self) -> Vec<Instance> {
        self.state.lock().unwrap().instances.clone()
    }

    /// All approval requests in creation order.
    pub fn approvals(&self) -> Vec<ApprovalRequest> {
        self.state.lock().unwrap().approvals.clone()
    }

    /// Audit entries of one instance in append order.
    pub fn audit_for(&self, instance_id: &str) -> Vec<AuditLogEntry> {
        self.state
            .lock()
            .unwrap()
            .audit
            .iter()
            .filter(|e| e.instance_id == instance_id)
            .cloned()
            .collect()
    }

    pub fn document(&self, id: &str) -> Option<Document> {
        self.state.lock().unwrap().documents.get(id).cloned()
    }

    fn check(&self, op: StoreOp) -> Result<()> {
        if self.failing.lock().unwrap().contains(&op) {
            Err(DocflowError::Database(format!("injected failure: {:?}", op)))
        } else {
            Ok(())
        }
    }
}

impl WorkflowStore for MemoryStore {
    fn save_workflow(&self, workflow: &Workflow) -> BoxFuture<'_, Result<()>> {
        let workflow = workflow.clone();
        Box::pin(async move {
            self.state
                .lock()
                .unwrap()
                .workflows
                .insert(workflow.id.clone(), workflow);
            Ok(())
        })
    }

    fn get_workflow(&self, id: &str) -> BoxFuture<'_, Result<Option<Workflow>>> {
        let id = id.to_string();
        Box::pin(async move { Ok(self.state.lock().unwrap().workflows.get(&id).cloned()) })
    }

    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<Workflow>>> {
        Box::pin(async move {
            let mut all: Vec<_> = self.state.lock().unwrap().workflows.values().cloned().collect();
            all.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(all)
        })
    }

    fn create_instance(&self, instance: &Instance) -> BoxFuture<'_, Result<()>> {
        let instance = instance.clone();
        Box::pin(async move {
            self.check(StoreOp::CreateInstance)?;
            self.state.lock().unwrap().instances.push(instance);
            Ok(())
        })
    }

    fn update_instance(&self, id: &str, update: InstanceUpdate) -> BoxFuture<'_, Result<Instance>> {
        let id = id.to_string();
        Box::pin(async move {
            self.check(StoreOp::UpdateInstance)?;
            let mut state = self.state.lock().unwrap();
            let instance = state
                .instances
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| DocflowError::not_found("instance", &id))?;
            if !instance.status.can_transition_to(update.status) {
                return Err(DocflowError::InvalidTransition {
                    from: instance.status,
                    to: update.status,
                });
            }
            instance.status = update.status;
            if let Some(context) = update.context_data {
                instance.context_data = context;
            }
            instance.error = update.error;
            instance.completed_at = Some(Utc::now());
            Ok(instance.clone())
        })
    }

    fn get_instance(&self, id: &str) -> BoxFuture<'_, Result<Option<Instance>>> {
        let id = id.to_string();
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .unwrap()
                .instances
                .iter()
                .find(|i| i.id == id)
                .cloned())
        })
    }

    fn list_instances(&self, workflow_id: &str) -> BoxFuture<'_, Result<Vec<Instance>>> {
        let workflow_id = workflow_id.to_string();
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .unwrap()
                .instances
                .iter()
                .rev()
                .filter(|i| i.workflow_id == workflow_id)
                .cloned()
                .collect())
        })
    }

    fn append_audit(&self, entry: &AuditLogEntry) -> BoxFuture<'_, Result<()>> {
        let entry = entry.clone();
        Box::pin(async move {
            self.check(StoreOp::AppendAudit)?;
            self.state.lock().unwrap().audit.push(entry);
            Ok(())
        })
    }

    fn audit_log(&self, instance_id: &str) -> BoxFuture<'_, Result<Vec<AuditLogEntry>>> {
        let instance_id = instance_id.to_string();
        Box::pin(async move { Ok(self.audit_for(&instance_id)) })
    }

    fn create_approval(&self, request: &ApprovalRequest) -> BoxFuture<'_, Result<()>> {
        let request = request.clone();
        Box::pin(async move {
            self.check(StoreOp::CreateApproval)?;
            self.state.lock().unwrap().approvals.push(request);
            Ok(())
        })
    }

    fn get_approval(&self, id: &str) -> BoxFuture<'_, Result<Option<ApprovalRequest>>> {
        let id = id.to_string();
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .unwrap()
                .approvals
                .iter()
                .find(|a| a.id == id)
                .cloned())
        })
    }

    fn list_approvals(
        &self,
        instance_id: Option<&str>,
        status: Option<ApprovalStatus>,
    ) -> BoxFuture<'_, Result<Vec<ApprovalRequest>>> {
        let instance_id = instance_id.map(str::to_string);
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .unwrap()
                .approvals
                .iter()
                .filter(|a| instance_id.as_deref().map_or(true, |id| a.instance_id == id))
                .filter(|a| status.map_or(true, |s| a.status == s))
                .cloned()
                .collect())
        })
    }

    fn update_approval(&self, request: &ApprovalRequest) -> BoxFuture<'_, Result<()>> {
        let request = request.clone();
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let slot = state
                .approvals
                .iter_mut()
                .find(|a| a.id == request.id)
                .ok_or_else(|| DocflowError::not_found("approval request", &request.id))?;
            if slot.status != ApprovalStatus::Pending {
                return Err(DocflowError::ApprovalAlreadyDecided(request.id));
            }
            *slot = request;
            Ok(())
        })
    }

    fn put_document(&self, document: &Document) -> BoxFuture<'_, Result<()>> {
        let document = document.clone();
        Box::pin(async move {
            self.state
                .lock()
                .unwrap()
                .documents
                .insert(document.id.clone(), document);
            Ok(())
        })
    }

    fn get_document(&self, id: &str) -> BoxFuture<'_, Result<Option<Document>>> {
        let id = id.to_string();
        Box::pin(async move { Ok(self.document(&id)) })
    }

    fn update_document_metadata(
        &self,
        id: &str,
        metadata: &DocumentMetadata,
    ) -> BoxFuture<'_, Result<Document>> {
        let id = id.to_string();
        let metadata = metadata.clone();
        Box::pin(async move {
            self.check(StoreOp::UpdateDocumentMetadata)?;
            let mut state = self.state.lock().unwrap();
            let doc = state
                .documents
                .get_mut(&id)
                .ok_or_else(|| DocflowError::not_found("document", &id))?;
            metadata.apply_to(doc);
            Ok(doc.clone())
        })
    }
}

/// Convert a JSON object literal into a context map. Non-objects give an
/// empty map.
pub fn context(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// `documentUpload` trigger -> `documentType == contract` -> `requireApproval`.
pub fn contract_approval_definition() -> Definition {
    Definition::new(
        vec![
            Node::trigger("trigger", "documentUpload"),
            Node::condition("is-contract", "documentType").with_config("value", json!("contract")),
            Node::action("approve", "requireApproval")
                .with_config("priority", json!("high"))
                .with_config("level", json!(2)),
        ],
        vec![
            Edge::link("trigger", "is-contract"),
            Edge::link("is-contract", "approve"),
        ],
    )
}

/// Trigger `start` feeding the three-node loop `a -> b -> c -> a`.
pub fn three_node_cycle_definition() -> Definition {
    Definition::new(
        vec![
            Node::trigger("start", "documentUpload"),
            Node::action("a", "sendNotification"),
            Node::action("b", "sendNotification"),
            Node::action("c", "sendNotification"),
        ],
        vec![
            Edge::link("start", "a"),
            Edge::link("a", "b"),
            Edge::link("b", "c"),
            Edge::link("c", "a"),
        ],
    )
}
