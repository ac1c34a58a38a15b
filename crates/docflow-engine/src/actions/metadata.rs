use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use docflow_core::error::Result;
use docflow_core::traits::{ActionContext, ActionExecutor, ActionOutcome, WorkflowStore};
use docflow_core::types::{DocumentMetadata, NodeConfig};

use crate::node_config::{parse_node_config, string_list};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataConfig {
    #[serde(default)]
    document_id: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    tags: Option<Value>,
}

/// `setMetadata`: persists category, department and tags on the target
/// document. The target is `config.documentId`, else the run's document.
pub struct SetMetadata {
    store: Arc<dyn WorkflowStore>,
}

impl SetMetadata {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }
}

impl ActionExecutor for SetMetadata {
    fn component(&self) -> &str {
        "setMetadata"
    }

    fn execute(&self, config: NodeConfig, ctx: ActionContext) -> BoxFuture<'_, Result<ActionOutcome>> {
        Box::pin(async move {
            let cfg: MetadataConfig = parse_node_config(self.component(), &config)?;
            let Some(document_id) = cfg
                .document_id
                .clone()
                .or_else(|| ctx.context.document_id().map(str::to_string))
            else {
                warn!(instance_id = %ctx.instance_id, "setMetadata without a target document");
                return Ok(ActionOutcome::failure());
            };

            let metadata = DocumentMetadata {
                category: cfg.category,
                department: cfg.department,
                tags: cfg.tags.as_ref().map(string_list),
            };

            match self.store.update_document_metadata(&document_id, &metadata).await {
                Ok(doc) => {
                    info!(
                        instance_id = %ctx.instance_id,
                        document_id = %doc.id,
                        category = ?doc.category,
                        department = ?doc.department,
                        tags = doc.tags.len(),
                        "Document metadata updated"
                    );
                    Ok(ActionOutcome::success().with_output("metadataUpdatedAt", json!(doc.updated_at)))
                }
                Err(e) => {
                    error!(instance_id = %ctx.instance_id, document_id = %document_id, error = %e, "Failed to update document metadata");
                    Ok(ActionOutcome::failure())
                }
            }
        })
    }
}
