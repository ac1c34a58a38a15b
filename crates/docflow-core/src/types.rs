use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque per-node configuration as authored in the builder.
pub type NodeConfig = serde_json::Map<String, serde_json::Value>;

/// Generate a fresh record identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Kind of a workflow node. Selects which handler family evaluates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Trigger,
    Condition,
    Action,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Condition => "condition",
            Self::Action => "action",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique within its definition.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Component id, e.g. `documentUpload`, `customerIs`, `requireApproval`.
    pub component: String,
    #[serde(default)]
    pub config: NodeConfig,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, component: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            component: component.into(),
            config: NodeConfig::new(),
        }
    }

    pub fn trigger(id: impl Into<String>, component: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Trigger, component)
    }

    pub fn condition(id: impl Into<String>, component: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Condition, component)
    }

    pub fn action(id: impl Into<String>, component: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Action, component)
    }

    /// Set a config entry.
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// "On success of `source`, proceed to `target`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }

    /// Edge with an id derived from its endpoints.
    pub fn link(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}-{}", source, target),
            source,
            target,
        }
    }
}

/// The complete, serialisable graph for one workflow version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Definition {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Outgoing edges of a node, in declared order.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Trigger nodes bound to the given component, in declared order.
    pub fn triggers_for(&self, component: &str) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Trigger && n.component == component)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Inactive,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown workflow status: {}", other)),
        }
    }
}

/// A named, versioned workflow owning one definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_workflow_status")]
    pub status: WorkflowStatus,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub is_active: bool,
    pub definition: Definition,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_workflow_status() -> WorkflowStatus {
    WorkflowStatus::Draft
}

fn default_version() -> u32 {
    1
}

impl Workflow {
    pub fn new(name: impl Into<String>, definition: Definition) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            description: None,
            status: WorkflowStatus::Draft,
            version: 1,
            is_active: false,
            definition,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lifecycle of a single run. Terminal on either branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Running,
    Completed,
    Error,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Only `running -> completed` and `running -> error` are allowed.
    pub fn can_transition_to(&self, next: InstanceStatus) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Completed) | (Self::Running, Self::Error)
        )
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown instance status: {}", other)),
        }
    }
}

/// One execution run of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub workflow_id: String,
    pub document_id: Option<String>,
    pub status: InstanceStatus,
    pub context_data: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Instance {
    pub fn start(
        workflow_id: impl Into<String>,
        document_id: Option<String>,
        context_data: serde_json::Value,
    ) -> Self {
        Self {
            id: new_id(),
            workflow_id: workflow_id.into(),
            document_id,
            status: InstanceStatus::Running,
            context_data,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }
}

/// Terminal transition applied to an instance by the engine.
#[derive(Debug, Clone)]
pub struct InstanceUpdate {
    pub status: InstanceStatus,
    pub context_data: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl InstanceUpdate {
    pub fn completed(context_data: serde_json::Value) -> Self {
        Self {
            status: InstanceStatus::Completed,
            context_data: Some(context_data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: InstanceStatus::Error,
            context_data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    WorkflowStarted,
    NodeExecuted,
    NodeError,
    WorkflowCompleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowStarted => "workflow_started",
            Self::NodeExecuted => "node_executed",
            Self::NodeError => "node_error",
            Self::WorkflowCompleted => "workflow_completed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "workflow_started" => Ok(Self::WorkflowStarted),
            "node_executed" => Ok(Self::NodeExecuted),
            "node_error" => Ok(Self::NodeError),
            "workflow_completed" => Ok(Self::WorkflowCompleted),
            other => Err(format!("unknown audit action: {}", other)),
        }
    }
}

/// Append-only audit record owned by an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub instance_id: String,
    pub action: AuditAction,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        instance_id: impl Into<String>,
        action: AuditAction,
        details: serde_json::Value,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            action,
            details,
            timestamp: Utc::now(),
        }
    }

    /// Node id recorded in the details, if any.
    pub fn node_id(&self) -> Option<&str> {
        self.details.get("nodeId").and_then(|v| v.as_str())
    }

    /// Boolean result recorded for `node_executed` entries.
    pub fn result(&self) -> Option<bool> {
        self.details.get("result").and_then(|v| v.as_bool())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown approval status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Approval request created by the `requireApproval` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub instance_id: String,
    pub document_id: String,
    pub approver_id: String,
    pub level: u32,
    pub status: ApprovalStatus,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The metadata slice of a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            department: None,
            tags: vec![],
            updated_at: Utc::now(),
        }
    }
}

/// Partial metadata update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl DocumentMetadata {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.department.is_none() && self.tags.is_none()
    }

    pub fn apply_to(&self, doc: &mut Document) {
        if let Some(category) = &self.category {
            doc.category = Some(category.clone());
        }
        if let Some(department) = &self.department {
            doc.department = Some(department.clone());
        }
        if let Some(tags) = &self.tags {
            doc.tags = tags.clone();
        }
        doc.updated_at = Utc::now();
    }
}
