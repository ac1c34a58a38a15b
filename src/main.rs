use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docflow_core::config::AppConfig;
use docflow_core::event::{EventBus, WorkflowEvent};
use docflow_core::traits::WorkflowStore;
use docflow_core::types::{Definition, Document, Workflow};
use docflow_engine::{
    validate_workflow, ApprovalService, ExecutionRequest, WorkflowCatalog, WorkflowExecutionEngine,
};
use docflow_store::SqliteStore;

#[derive(Parser)]
#[command(name = "docflow", version, about = "Document workflow engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "docflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow definition file without saving it
    Validate {
        /// JSON file holding a workflow or a bare definition
        file: PathBuf,
    },
    /// Manage stored workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },
    /// Execute a stored workflow for one trigger
    Run {
        /// Workflow ID
        workflow_id: String,
        /// Trigger component that fired (e.g. documentUpload)
        #[arg(long)]
        trigger: String,
        /// Document the run is about
        #[arg(long)]
        document: Option<String>,
        /// Requesting user
        #[arg(long)]
        user: Option<String>,
        /// Initial context as a JSON object
        #[arg(long)]
        context: Option<String>,
        /// Print workflow events as they are published
        #[arg(long)]
        follow: bool,
    },
    /// List runs of a workflow, newest first
    Instances {
        /// Workflow ID
        workflow_id: String,
    },
    /// Show the audit trail of a run
    Audit {
        /// Instance ID
        instance_id: String,
    },
    /// List pending approval requests
    Approvals {
        /// Only requests assigned to this approver
        #[arg(long)]
        approver: Option<String>,
    },
    /// Approve a pending request (ID or unique prefix)
    Approve {
        id: String,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Reject a pending request (ID or unique prefix)
    Reject {
        id: String,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Manage document metadata records
    Document {
        #[command(subcommand)]
        action: DocumentAction,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Validate and store a workflow from a JSON file
    Save {
        /// JSON file holding a workflow or a bare definition
        file: PathBuf,
        /// Name to use when the file holds a bare definition
        #[arg(long)]
        name: Option<String>,
        /// Store under this ID (re-saving bumps the version)
        #[arg(long)]
        id: Option<String>,
    },
    /// List stored workflows
    List,
    /// Print a stored workflow as JSON
    Show { id: String },
    /// Mark a workflow active
    Activate { id: String },
    /// Mark a workflow inactive
    Deactivate { id: String },
}

#[derive(Subcommand)]
enum DocumentAction {
    /// Create or replace a document record
    Put {
        id: String,
        name: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        department: Option<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Print a document record as JSON
    Show { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "docflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Commands that need no database
    match &cli.command {
        Commands::Validate { file } => return validate_file(file),
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        _ => {}
    }

    let db_path = config.store_path();
    info!(path = %db_path.display(), "Opening store");
    let store: Arc<dyn WorkflowStore> = Arc::new(SqliteStore::open(&db_path)?);
    let event_bus = Arc::new(EventBus::new(1024));

    match cli.command {
        Commands::Workflow { action } => {
            handle_workflow(action, WorkflowCatalog::new(store.clone())).await?;
        }
        Commands::Run {
            workflow_id,
            trigger,
            document,
            user,
            context,
            follow,
        } => {
            let workflow = WorkflowCatalog::new(store.clone()).get(&workflow_id).await?;
            if !workflow.is_active {
                warn!(workflow_id = %workflow.id, status = %workflow.status, "Running a workflow that is not active");
            }

            let mut request = ExecutionRequest::for_workflow(&workflow, trigger)
                .with_context(parse_context(context.as_deref())?);
            if let Some(document) = document {
                request = request.with_document(document);
            }
            if let Some(user) = user {
                request = request.with_user(user);
            }

            let mut rx = event_bus.subscribe();
            let engine =
                WorkflowExecutionEngine::with_builtins(store.clone(), event_bus.clone(), &config.engine);
            let result = engine.execute_workflow(request).await;

            if follow {
                loop {
                    match rx.try_recv() {
                        Ok(event) => print_event(&event),
                        Err(TryRecvError::Lagged(skipped)) => {
                            eprintln!("[{} events dropped]", skipped);
                        }
                        Err(_) => break,
                    }
                }
            }

            let instance = result?;
            println!("{}", serde_json::to_string_pretty(&instance)?);
        }
        Commands::Instances { workflow_id } => {
            let instances = store.list_instances(&workflow_id).await?;
            if instances.is_empty() {
                println!("No runs recorded for {}.", workflow_id);
            }
            for instance in instances {
                println!(
                    "{}  {:<9}  {}  {}",
                    instance.id,
                    instance.status.as_str(),
                    instance.started_at.format("%Y-%m-%d %H:%M:%S"),
                    instance.document_id.as_deref().unwrap_or("-"),
                );
            }
        }
        Commands::Audit { instance_id } => {
            let entries = store.audit_log(&instance_id).await?;
            if entries.is_empty() {
                println!("No audit entries for {}.", instance_id);
            }
            for entry in entries {
                let node = entry.node_id().unwrap_or("-");
                let outcome = match (entry.result(), entry.details.get("error")) {
                    (Some(result), _) => result.to_string(),
                    (None, Some(err)) => err.as_str().unwrap_or_default().to_string(),
                    (None, None) => String::new(),
                };
                println!(
                    "{}  {:<18}  {:<20}  {}",
                    entry.timestamp.format("%H:%M:%S%.3f"),
                    entry.action.as_str(),
                    node,
                    outcome,
                );
            }
        }
        Commands::Approvals { approver } => {
            let service = ApprovalService::new(store.clone(), event_bus.clone());
            let pending = service.pending_for(approver.as_deref()).await?;
            if pending.is_empty() {
                println!("No pending approvals.");
            }
            for req in pending {
                println!(
                    "{}  {:<7}  L{}  {:<12}  doc={}  due={}",
                    req.id,
                    req.priority.as_str(),
                    req.level,
                    req.approver_id,
                    req.document_id,
                    req.due_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
        }
        Commands::Approve { id, comment } => {
            let service = ApprovalService::new(store.clone(), event_bus.clone());
            let id = resolve_approval_id(&service, &id).await?;
            let req = service.approve(&id, comment).await?;
            println!("Approved {}", req.id);
        }
        Commands::Reject { id, comment } => {
            let service = ApprovalService::new(store.clone(), event_bus.clone());
            let id = resolve_approval_id(&service, &id).await?;
            let req = service.reject(&id, comment).await?;
            println!("Rejected {}", req.id);
        }
        Commands::Document { action } => match action {
            DocumentAction::Put {
                id,
                name,
                category,
                department,
                tags,
            } => {
                let mut doc = Document::new(id, name);
                doc.category = category;
                doc.department = department;
                doc.tags = tags;
                store.put_document(&doc).await?;
                println!("Stored document {}", doc.id);
            }
            DocumentAction::Show { id } => {
                let doc = store
                    .get_document(&id)
                    .await?
                    .with_context(|| format!("document not found: {}", id))?;
                println!("{}", serde_json::to_string_pretty(&doc)?);
            }
        },
        Commands::Validate { .. } | Commands::Config | Commands::Completions { .. } => {}
    }

    Ok(())
}

async fn handle_workflow(action: WorkflowAction, catalog: WorkflowCatalog) -> anyhow::Result<()> {
    match action {
        WorkflowAction::Save { file, name, id } => {
            let mut workflow = read_workflow_file(&file, name)?;
            if let Some(id) = id {
                workflow.id = id;
            }
            let (saved, report) = catalog.save(workflow).await?;
            for warning in &report.warnings {
                eprintln!("warning: {}", warning);
            }
            println!("Saved {} ({}) version {}", saved.name, saved.id, saved.version);
        }
        WorkflowAction::List => {
            let workflows = catalog.list().await?;
            if workflows.is_empty() {
                println!("No workflows stored.");
            }
            for wf in workflows {
                println!(
                    "{}  {:<8}  v{:<3}  {}",
                    wf.id,
                    wf.status.as_str(),
                    wf.version,
                    wf.name
                );
            }
        }
        WorkflowAction::Show { id } => {
            let workflow = catalog.get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&workflow)?);
        }
        WorkflowAction::Activate { id } => {
            let wf = catalog.activate(&id).await?;
            println!("{} is now {}", wf.name, wf.status);
        }
        WorkflowAction::Deactivate { id } => {
            let wf = catalog.deactivate(&id).await?;
            println!("{} is now {}", wf.name, wf.status);
        }
    }
    Ok(())
}

fn validate_file(path: &Path) -> anyhow::Result<()> {
    let workflow = read_workflow_file(path, None)?;
    let report = validate_workflow(&workflow.definition);
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_valid {
        anyhow::bail!("{} is not a valid workflow definition", path.display());
    }
    Ok(())
}

/// Read a workflow JSON file. Files holding only `{nodes, edges}` are
/// wrapped in a new workflow named after `name` or the file stem.
fn read_workflow_file(path: &Path, name: Option<String>) -> anyhow::Result<Workflow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    if value.get("definition").is_some() {
        let mut workflow: Workflow = serde_json::from_value(value)?;
        if let Some(name) = name {
            workflow.name = name;
        }
        return Ok(workflow);
    }

    let definition: Definition = serde_json::from_value(value)?;
    let name = name.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workflow".to_string())
    });
    Ok(Workflow::new(name, definition))
}

fn parse_context(raw: Option<&str>) -> anyhow::Result<Map<String, Value>> {
    match raw {
        None => Ok(Map::new()),
        Some(raw) => match serde_json::from_str(raw).context("--context must be JSON")? {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("--context must be a JSON object"),
        },
    }
}

async fn resolve_approval_id(service: &ApprovalService, id: &str) -> anyhow::Result<String> {
    Ok(service
        .find_by_prefix(id)
        .await?
        .unwrap_or_else(|| id.to_string()))
}

fn print_event(event: &WorkflowEvent) {
    match event {
        WorkflowEvent::InstanceStarted { instance_id, trigger, .. } => {
            eprintln!("[start] {} ({})", instance_id, trigger);
        }
        WorkflowEvent::NodeExecuted {
            node_id,
            kind,
            component,
            result,
            ..
        } => {
            eprintln!("[{}] {} {} -> {}", kind, node_id, component, result);
        }
        WorkflowEvent::NodeFailed { node_id, error, .. } => {
            eprintln!("[error] {}: {}", node_id, error);
        }
        WorkflowEvent::InstanceCompleted { instance_id } => {
            eprintln!("[done] {}", instance_id);
        }
        WorkflowEvent::InstanceFailed { instance_id, error } => {
            eprintln!("[failed] {}: {}", instance_id, error);
        }
        WorkflowEvent::ApprovalRequested { request } => {
            eprintln!(
                "[approval] {} -> {} (L{}, {})",
                request.id, request.approver_id, request.level, request.priority
            );
        }
        WorkflowEvent::ApprovalResolved { request_id, status } => {
            eprintln!("[approval] {} {}", request_id, status);
        }
        WorkflowEvent::NotificationRequested {
            recipients,
            template,
            ..
        } => {
            eprintln!(
                "[notify] {} via {}",
                recipients.join(", "),
                template.as_deref().unwrap_or("default template")
            );
        }
        WorkflowEvent::RouteRequested {
            document_id,
            destination,
            ..
        } => {
            eprintln!(
                "[route] {} -> {}",
                document_id,
                destination.as_deref().unwrap_or("unspecified")
            );
        }
    }
}
