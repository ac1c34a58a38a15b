use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use docflow_core::error::{DocflowError, Result};
use docflow_core::event::{EventBus, WorkflowEvent};
use docflow_core::traits::{ActionContext, ActionExecutor, ActionOutcome, WorkflowStore};
use docflow_core::types::{new_id, ApprovalRequest, ApprovalStatus, NodeConfig, Priority};

use crate::node_config::parse_node_config;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalConfig {
    #[serde(default, alias = "approverId")]
    approver: Option<String>,
    #[serde(default)]
    level: Option<u32>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    due_in_days: Option<i64>,
}

/// `requireApproval`: files an approval request for the run's document.
pub struct RequireApproval {
    store: Arc<dyn WorkflowStore>,
    events: Arc<EventBus>,
    default_priority: Priority,
    default_due_days: Option<i64>,
}

impl RequireApproval {
    pub fn new(store: Arc<dyn WorkflowStore>, events: Arc<EventBus>) -> Self {
        Self {
            store,
            events,
            default_priority: Priority::Medium,
            default_due_days: None,
        }
    }

    pub fn with_defaults(mut self, priority: Priority, due_days: Option<i64>) -> Self {
        self.default_priority = priority;
        self.default_due_days = due_days;
        self
    }

    fn build_request(&self, cfg: ApprovalConfig, ctx: &ActionContext) -> Result<Option<ApprovalRequest>> {
        let Some(document_id) = ctx.context.document_id() else {
            warn!(instance_id = %ctx.instance_id, "requireApproval without a document, skipping");
            return Ok(None);
        };
        let Some(approver_id) = cfg
            .approver
            .filter(|a| !a.trim().is_empty())
            .or_else(|| ctx.context.user_id().map(str::to_string))
        else {
            warn!(instance_id = %ctx.instance_id, "requireApproval has no approver and no requesting user");
            return Ok(None);
        };

        let priority = match cfg.priority.as_deref() {
            Some(p) => p
                .parse::<Priority>()
                .map_err(|e| DocflowError::invalid_config(self.component(), e))?,
            None => self.default_priority,
        };

        let now = Utc::now();
        let due_date = match (cfg.due_date.as_deref(), cfg.due_in_days.or(self.default_due_days)) {
            (Some(date), _) => Some(
                parse_due_date(date)
                    .ok_or_else(|| DocflowError::invalid_config(self.component(), format!("bad dueDate: {}", date)))?,
            ),
            (None, Some(days)) => Some(
                Duration::try_days(days)
                    .and_then(|offset| now.checked_add_signed(offset))
                    .ok_or_else(|| {
                        DocflowError::invalid_config(self.component(), format!("dueInDays out of range: {}", days))
                    })?,
            ),
            (None, None) => None,
        };

        Ok(Some(ApprovalRequest {
            id: new_id(),
            instance_id: ctx.instance_id.clone(),
            document_id: document_id.to_string(),
            approver_id,
            level: cfg.level.unwrap_or(1),
            status: ApprovalStatus::Pending,
            priority,
            due_date,
            comments: None,
            decided_at: None,
            created_at: now,
        }))
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_due_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl ActionExecutor for RequireApproval {
    fn component(&self) -> &str {
        "requireApproval"
    }

    fn execute(&self, config: NodeConfig, ctx: ActionContext) -> BoxFuture<'_, Result<ActionOutcome>> {
        Box::pin(async move {
            let cfg: ApprovalConfig = parse_node_config(self.component(), &config)?;
            let Some(request) = self.build_request(cfg, &ctx)? else {
                return Ok(ActionOutcome::failure());
            };

            if let Err(e) = self.store.create_approval(&request).await {
                error!(instance_id = %ctx.instance_id, error = %e, "Failed to create approval request");
                return Ok(ActionOutcome::failure());
            }

            info!(
                instance_id = %ctx.instance_id,
                request_id = %request.id,
                approver = %request.approver_id,
                level = request.level,
                "Approval requested"
            );
            let id = request.id.clone();
            self.events.publish(WorkflowEvent::ApprovalRequested { request });

            Ok(ActionOutcome::success().with_output("approvalRequestId", json!(id)))
        })
    }
}
