//! End-to-end runs against the SQLite store.

use std::sync::Arc;

use serde_json::json;

use docflow_core::config::EngineConfig;
use docflow_core::error::DocflowError;
use docflow_core::event::EventBus;
use docflow_core::traits::WorkflowStore;
use docflow_core::types::*;
use docflow_engine::{ApprovalService, ExecutionRequest, WorkflowCatalog, WorkflowExecutionEngine};
use docflow_store::SqliteStore;
use docflow_test_utils::{context, contract_approval_definition};

fn setup() -> (Arc<dyn WorkflowStore>, Arc<EventBus>, WorkflowExecutionEngine) {
    let store: Arc<dyn WorkflowStore> = Arc::new(SqliteStore::in_memory().expect("open store"));
    let events = Arc::new(EventBus::default());
    let engine = WorkflowExecutionEngine::with_builtins(store.clone(), events.clone(), &EngineConfig::default());
    (store, events, engine)
}

#[tokio::test]
async fn test_contract_upload_to_approval() {
    let (store, events, engine) = setup();
    let catalog = WorkflowCatalog::new(store.clone());
    let (workflow, _) = catalog
        .save(Workflow::new("Contract review", contract_approval_definition()))
        .await
        .expect("save workflow");
    catalog.activate(&workflow.id).await.expect("activate");

    let request = ExecutionRequest::for_workflow(&workflow, "documentUpload")
        .with_document("doc-7")
        .with_user("alice")
        .with_context(context(json!({"documentType": "Contract", "customer": "Acme Corp"})));
    let instance = engine.execute_workflow(request).await.expect("run");

    assert_eq!(instance.status, InstanceStatus::Completed);
    assert!(instance.completed_at.is_some());

    let stored = store.get_instance(&instance.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InstanceStatus::Completed);
    assert_eq!(stored.context_data["customer"], "Acme Corp");

    let log = store.audit_log(&instance.id).await.unwrap();
    let actions: Vec<AuditAction> = log.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::WorkflowStarted,
            AuditAction::NodeExecuted,
            AuditAction::NodeExecuted,
            AuditAction::NodeExecuted,
            AuditAction::WorkflowCompleted,
        ]
    );

    let pending = store
        .list_approvals(Some(&instance.id), Some(ApprovalStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].level, 2);

    let approvals = ApprovalService::new(store.clone(), events);
    let decided = approvals
        .approve(&pending[0].id, Some("looks fine".into()))
        .await
        .unwrap();
    assert_eq!(decided.status, ApprovalStatus::Approved);
    assert!(approvals.pending_for(Some("alice")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_trigger_persists_error_status() {
    let (store, _, engine) = setup();
    let request = ExecutionRequest::new("wf-x", contract_approval_definition(), "scheduledScan");
    let err = engine.execute_workflow(request).await.unwrap_err();
    assert!(matches!(err, DocflowError::NoTriggerFound(_)));

    let runs = store.list_instances("wf-x").await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, InstanceStatus::Error);
    assert!(runs[0].error.as_deref().unwrap().contains("scheduledScan"));

    let log = store.audit_log(&runs[0].id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, AuditAction::WorkflowStarted);
}

#[tokio::test]
async fn test_metadata_action_updates_stored_document() {
    let (store, _, engine) = setup();
    store
        .put_document(&Document::new("doc-9", "invoice-0042.pdf"))
        .await
        .unwrap();

    let definition = Definition::new(
        vec![
            Node::trigger("upload", "documentUpload"),
            Node::condition("big", "fileSize")
                .with_config("operator", json!(">="))
                .with_config("value", json!(1024)),
            Node::action("tag", "setMetadata")
                .with_config("category", json!("Finance"))
                .with_config("tags", json!(["invoice", "large"])),
        ],
        vec![Edge::link("upload", "big"), Edge::link("big", "tag")],
    );
    let request = ExecutionRequest::new("wf-meta", definition, "documentUpload")
        .with_document("doc-9")
        .with_context(context(json!({"fileSize": 4096})));
    engine.execute_workflow(request).await.unwrap();

    let doc = store.get_document("doc-9").await.unwrap().unwrap();
    assert_eq!(doc.category.as_deref(), Some("Finance"));
    assert_eq!(doc.tags, vec!["invoice", "large"]);
}

#[tokio::test]
async fn test_runs_listed_newest_first() {
    let (store, _, engine) = setup();
    let definition = contract_approval_definition();
    let first = engine
        .execute_workflow(ExecutionRequest::new("wf-n", definition.clone(), "documentUpload"))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = engine
        .execute_workflow(ExecutionRequest::new("wf-n", definition, "documentUpload"))
        .await
        .unwrap();

    let ids: Vec<String> = store
        .list_instances("wf-n")
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}
