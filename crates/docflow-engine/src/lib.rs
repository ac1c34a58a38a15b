//! Workflow validation, condition and action handlers, and the execution
//! engine that walks a definition for one trigger.

pub mod actions;
pub mod approval;
pub mod catalog;
pub mod conditions;
pub mod executor;
pub mod node_config;
pub mod validator;

pub use actions::ActionRegistry;
pub use approval::ApprovalService;
pub use catalog::WorkflowCatalog;
pub use conditions::ConditionRegistry;
pub use executor::{ExecutionRequest, WorkflowExecutionEngine};
pub use validator::{validate_workflow, ValidationReport};
