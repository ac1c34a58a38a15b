//! Actions that only announce their intent on the event bus.
//!
//! Neither handler moves documents or delivers messages; a subscriber is
//! expected to act on the published event. Both report `is_stub()` so a
//! production registry can leave them out.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use docflow_core::error::Result;
use docflow_core::event::{EventBus, WorkflowEvent};
use docflow_core::traits::{ActionContext, ActionExecutor, ActionOutcome};
use docflow_core::types::NodeConfig;

use crate::node_config::{parse_node_config, string_list, value_text};

#[derive(Debug, Default, Deserialize)]
struct RouteConfig {
    #[serde(default)]
    destination: Option<Value>,
}

/// `autoRoute`: requests relocation of the run's document.
pub struct AutoRoute {
    events: Arc<EventBus>,
}

impl AutoRoute {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self { events }
    }
}

impl ActionExecutor for AutoRoute {
    fn component(&self) -> &str {
        "autoRoute"
    }

    fn execute(&self, config: NodeConfig, ctx: ActionContext) -> BoxFuture<'_, Result<ActionOutcome>> {
        Box::pin(async move {
            let cfg: RouteConfig = parse_node_config(self.component(), &config)?;
            let destination = cfg.destination.as_ref().and_then(value_text);
            let Some(document_id) = ctx.context.document_id() else {
                warn!(instance_id = %ctx.instance_id, "autoRoute without a document");
                return Ok(ActionOutcome::failure());
            };

            info!(
                instance_id = %ctx.instance_id,
                document_id,
                destination = destination.as_deref().unwrap_or("<unset>"),
                "Route requested"
            );
            self.events.publish(WorkflowEvent::RouteRequested {
                instance_id: ctx.instance_id.clone(),
                document_id: document_id.to_string(),
                destination,
            });
            Ok(ActionOutcome::success())
        })
    }

    fn is_stub(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Deserialize)]
struct NotificationConfig {
    #[serde(default)]
    recipients: Option<Value>,
    #[serde(default)]
    template: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

/// `sendNotification`: requests delivery of a templated message.
pub struct SendNotification {
    events: Arc<EventBus>,
}

impl SendNotification {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self { events }
    }
}

impl ActionExecutor for SendNotification {
    fn component(&self) -> &str {
        "sendNotification"
    }

    fn execute(&self, config: NodeConfig, ctx: ActionContext) -> BoxFuture<'_, Result<ActionOutcome>> {
        Box::pin(async move {
            let cfg: NotificationConfig = parse_node_config(self.component(), &config)?;
            let recipients = cfg.recipients.as_ref().map(string_list).unwrap_or_default();
            let template = cfg.template.as_ref().and_then(value_text);
            // Anything but an object carries no payload.
            let data = match cfg.data {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };

            info!(
                instance_id = %ctx.instance_id,
                recipients = recipients.len(),
                template = template.as_deref().unwrap_or("<none>"),
                "Notification requested"
            );
            self.events.publish(WorkflowEvent::NotificationRequested {
                instance_id: ctx.instance_id.clone(),
                recipients,
                template,
                data: Value::Object(data),
            });
            Ok(ActionOutcome::success())
        })
    }

    fn is_stub(&self) -> bool {
        true
    }
}
