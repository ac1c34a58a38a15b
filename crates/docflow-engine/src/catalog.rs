use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use docflow_core::error::{DocflowError, Result};
use docflow_core::traits::WorkflowStore;
use docflow_core::types::{Workflow, WorkflowStatus};

use crate::validator::{validate_workflow, ValidationReport};

/// Saves, lists and toggles workflows. Only valid definitions are stored.
pub struct WorkflowCatalog {
    store: Arc<dyn WorkflowStore>,
}

impl WorkflowCatalog {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Validate and store a workflow. Re-saving an existing id bumps its
    /// version and keeps its creation time.
    pub async fn save(&self, mut workflow: Workflow) -> Result<(Workflow, ValidationReport)> {
        let report = validate_workflow(&workflow.definition);
        if !report.is_valid {
            warn!(workflow_id = %workflow.id, errors = report.errors.len(), "Refusing to save invalid workflow");
            return Err(DocflowError::InvalidDefinition(report.errors));
        }
        for warning in &report.warnings {
            warn!(workflow_id = %workflow.id, "{}", warning);
        }

        if let Some(existing) = self.store.get_workflow(&workflow.id).await? {
            workflow.version = existing.version + 1;
            workflow.created_at = existing.created_at;
        }
        workflow.updated_at = Utc::now();

        self.store.save_workflow(&workflow).await?;
        info!(workflow_id = %workflow.id, name = %workflow.name, version = workflow.version, "Workflow saved");
        Ok((workflow, report))
    }

    pub async fn get(&self, id: &str) -> Result<Workflow> {
        self.store
            .get_workflow(id)
            .await?
            .ok_or_else(|| DocflowError::not_found("workflow", id))
    }

    pub async fn list(&self) -> Result<Vec<Workflow>> {
        self.store.list_workflows().await
    }

    pub async fn activate(&self, id: &str) -> Result<Workflow> {
        self.set_status(id, WorkflowStatus::Active).await
    }

    pub async fn deactivate(&self, id: &str) -> Result<Workflow> {
        self.set_status(id, WorkflowStatus::Inactive).await
    }

    async fn set_status(&self, id: &str, status: WorkflowStatus) -> Result<Workflow> {
        let mut workflow = self.get(id).await?;
        workflow.status = status;
        workflow.is_active = status == WorkflowStatus::Active;
        workflow.updated_at = Utc::now();
        self.store.save_workflow(&workflow).await?;
        info!(workflow_id = %workflow.id, status = %status, "Workflow status changed");
        Ok(workflow)
    }
}
