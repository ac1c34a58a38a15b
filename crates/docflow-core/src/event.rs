use serde::Serialize;

use crate::types::{ApprovalRequest, ApprovalStatus, NodeKind};

/// Events emitted while workflows run and approvals are decided.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    InstanceStarted {
        instance_id: String,
        workflow_id: String,
        trigger: String,
    },
    NodeExecuted {
        instance_id: String,
        node_id: String,
        kind: NodeKind,
        component: String,
        result: bool,
    },
    NodeFailed {
        instance_id: String,
        node_id: String,
        error: String,
    },
    InstanceCompleted {
        instance_id: String,
    },
    InstanceFailed {
        instance_id: String,
        error: String,
    },
    ApprovalRequested {
        request: ApprovalRequest,
    },
    ApprovalResolved {
        request_id: String,
        status: ApprovalStatus,
    },
    /// Intent recorded by the `sendNotification` action. Nothing is delivered.
    NotificationRequested {
        instance_id: String,
        recipients: Vec<String>,
        template: Option<String>,
        data: serde_json::Value,
    },
    /// Intent recorded by the `autoRoute` action. Nothing is moved.
    RouteRequested {
        instance_id: String,
        document_id: String,
        destination: Option<String>,
    },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: WorkflowEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(WorkflowEvent::InstanceCompleted {
            instance_id: "i-1".into(),
        });

        match rx.recv().await.unwrap() {
            WorkflowEvent::InstanceCompleted { instance_id } => assert_eq!(instance_id, "i-1"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(WorkflowEvent::InstanceFailed {
            instance_id: "i-2".into(),
            error: "boom".into(),
        });
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = WorkflowEvent::RouteRequested {
            instance_id: "i-1".into(),
            document_id: "d-1".into(),
            destination: Some("archive".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "route_requested");
        assert_eq!(json["destination"], "archive");
    }
}
