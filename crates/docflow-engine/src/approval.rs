use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use docflow_core::error::{DocflowError, Result};
use docflow_core::event::{EventBus, WorkflowEvent};
use docflow_core::traits::WorkflowStore;
use docflow_core::types::{ApprovalRequest, ApprovalStatus};

/// Decides approval requests filed by `requireApproval` nodes.
pub struct ApprovalService {
    store: Arc<dyn WorkflowStore>,
    events: Arc<EventBus>,
}

impl ApprovalService {
    pub fn new(store: Arc<dyn WorkflowStore>, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    pub async fn approve(&self, id: &str, comments: Option<String>) -> Result<ApprovalRequest> {
        self.decide(id, ApprovalStatus::Approved, comments).await
    }

    pub async fn reject(&self, id: &str, comments: Option<String>) -> Result<ApprovalRequest> {
        self.decide(id, ApprovalStatus::Rejected, comments).await
    }

    /// Pending requests, optionally for one approver. Most urgent first,
    /// then oldest first.
    pub async fn pending_for(&self, approver_id: Option<&str>) -> Result<Vec<ApprovalRequest>> {
        let mut pending: Vec<ApprovalRequest> = self
            .store
            .list_approvals(None, Some(ApprovalStatus::Pending))
            .await?
            .into_iter()
            .filter(|r| approver_id.map_or(true, |a| r.approver_id == a))
            .collect();
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(pending)
    }

    /// Resolve an id prefix to the full id of a single request.
    pub async fn find_by_prefix(&self, prefix: &str) -> Result<Option<String>> {
        let matches: Vec<String> = self
            .store
            .list_approvals(None, None)
            .await?
            .into_iter()
            .filter(|r| r.id.starts_with(prefix))
            .map(|r| r.id)
            .collect();
        Ok(match matches.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        })
    }

    async fn decide(
        &self,
        id: &str,
        status: ApprovalStatus,
        comments: Option<String>,
    ) -> Result<ApprovalRequest> {
        let mut request = self
            .store
            .get_approval(id)
            .await?
            .ok_or_else(|| DocflowError::not_found("approval request", id))?;

        if request.status != ApprovalStatus::Pending {
            return Err(DocflowError::ApprovalAlreadyDecided(request.id));
        }

        request.status = status;
        request.decided_at = Some(Utc::now());
        if comments.is_some() {
            request.comments = comments;
        }
        self.store.update_approval(&request).await?;

        info!(
            request_id = %request.id,
            instance_id = %request.instance_id,
            status = %status,
            "Approval decided"
        );
        self.events.publish(WorkflowEvent::ApprovalResolved {
            request_id: request.id.clone(),
            status,
        });
        Ok(request)
    }
}
