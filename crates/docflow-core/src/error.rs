use thiserror::Error;

use crate::types::InstanceStatus;

#[derive(Debug, Error)]
pub enum DocflowError {
    // Engine errors
    #[error("No trigger found for component: {0}")]
    NoTriggerFound(String),

    #[error("Failed to create workflow instance: {0}")]
    InstanceCreation(String),

    #[error("Invalid config for {component}: {message}")]
    InvalidNodeConfig { component: String, message: String },

    #[error("Maximum traversal depth ({0}) exceeded")]
    MaxDepthExceeded(usize),

    #[error("Invalid instance transition: {from} -> {to}")]
    InvalidTransition {
        from: InstanceStatus,
        to: InstanceStatus,
    },

    // Validation errors
    #[error("Invalid workflow definition: {}", .0.join("; "))]
    InvalidDefinition(Vec<String>),

    // Approval errors
    #[error("Approval request {0} has already been decided")]
    ApprovalAlreadyDecided(String),

    // Lookup errors
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DocflowError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn invalid_config(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidNodeConfig {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocflowError>;
