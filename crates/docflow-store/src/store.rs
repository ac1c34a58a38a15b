use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use docflow_core::error::{DocflowError, Result};
use docflow_core::traits::WorkflowStore;
use docflow_core::types::*;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS workflows (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL,
        version INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        definition TEXT NOT NULL,
        created_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS workflow_instances (
        id TEXT PRIMARY KEY,
        workflow_id TEXT NOT NULL,
        document_id TEXT,
        status TEXT NOT NULL,
        context_data TEXT NOT NULL,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        error TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_instances_workflow
        ON workflow_instances(workflow_id, started_at DESC);

    CREATE TABLE IF NOT EXISTS workflow_audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        instance_id TEXT NOT NULL,
        action TEXT NOT NULL,
        details TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_audit_instance
        ON workflow_audit_log(instance_id, id);

    CREATE TABLE IF NOT EXISTS approval_requests (
        id TEXT PRIMARY KEY,
        instance_id TEXT NOT NULL,
        document_id TEXT NOT NULL,
        approver_id TEXT NOT NULL,
        level INTEGER NOT NULL,
        status TEXT NOT NULL,
        priority TEXT NOT NULL,
        due_date TEXT,
        comments TEXT,
        decided_at TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_approvals_instance
        ON approval_requests(instance_id);

    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        category TEXT,
        department TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        updated_at TEXT NOT NULL
    );
";

const INSTANCE_COLUMNS: &str =
    "id, workflow_id, document_id, status, context_data, started_at, completed_at, error";

const APPROVAL_COLUMNS: &str = "id, instance_id, document_id, approver_id, level, status, \
     priority, due_date, comments, decided_at, created_at";

/// SQLite-backed workflow store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DocflowError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(db_err)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| DocflowError::Database(e.to_string()))
    }
}

fn db_err(e: rusqlite::Error) -> DocflowError {
    DocflowError::Database(e.to_string())
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_ts(&s))
}

fn parse_json(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or(serde_json::Value::Null)
}

fn parse_enum<T: std::str::FromStr<Err = String>>(s: &str, fallback: T) -> T {
    s.parse().unwrap_or_else(|e: String| {
        warn!(error = %e, "Unrecognised stored value");
        fallback
    })
}

fn row_to_instance(row: &Row<'_>) -> rusqlite::Result<Instance> {
    let status: String = row.get(3)?;
    let context: String = row.get(4)?;
    let started_at: String = row.get(5)?;
    Ok(Instance {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        document_id: row.get(2)?,
        status: parse_enum(&status, InstanceStatus::Error),
        context_data: parse_json(&context),
        started_at: parse_ts(&started_at),
        completed_at: parse_opt_ts(row.get(6)?),
        error: row.get(7)?,
    })
}

fn row_to_approval(row: &Row<'_>) -> rusqlite::Result<ApprovalRequest> {
    let status: String = row.get(5)?;
    let priority: String = row.get(6)?;
    let created_at: String = row.get(10)?;
    Ok(ApprovalRequest {
        id: row.get(0)?,
        instance_id: row.get(1)?,
        document_id: row.get(2)?,
        approver_id: row.get(3)?,
        level: row.get::<_, i64>(4)? as u32,
        status: parse_enum(&status, ApprovalStatus::Pending),
        priority: parse_enum(&priority, Priority::Medium),
        due_date: parse_opt_ts(row.get(7)?),
        comments: row.get(8)?,
        decided_at: parse_opt_ts(row.get(9)?),
        created_at: parse_ts(&created_at),
    })
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let tags: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(Document {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        department: row.get(3)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        updated_at: parse_ts(&updated_at),
    })
}

/// Raw workflow row; the definition is decoded outside the row callback so a
/// corrupt definition surfaces as an error instead of an empty graph.
struct WorkflowRow {
    id: String,
    name: String,
    description: Option<String>,
    status: String,
    version: i64,
    is_active: bool,
    definition: String,
    created_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl WorkflowRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            status: row.get(3)?,
            version: row.get(4)?,
            is_active: row.get(5)?,
            definition: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_workflow(self) -> Result<Workflow> {
        Ok(Workflow {
            definition: serde_json::from_str(&self.definition)?,
            status: parse_enum(&self.status, WorkflowStatus::Draft),
            id: self.id,
            name: self.name,
            description: self.description,
            version: self.version as u32,
            is_active: self.is_active,
            created_by: self.created_by,
            created_at: parse_ts(&self.created_at),
            updated_at: parse_ts(&self.updated_at),
        })
    }
}

const WORKFLOW_COLUMNS: &str = "id, name, description, status, version, is_active, definition, \
     created_by, created_at, updated_at";

impl WorkflowStore for SqliteStore {
    fn save_workflow(&self, workflow: &Workflow) -> BoxFuture<'_, Result<()>> {
        let workflow = workflow.clone();

        Box::pin(async move {
            let definition = serde_json::to_string(&workflow.definition)?;
            let conn = self.lock()?;
            conn.execute(
                "INSERT OR REPLACE INTO workflows
                 (id, name, description, status, version, is_active, definition, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    workflow.id,
                    workflow.name,
                    workflow.description,
                    workflow.status.as_str(),
                    workflow.version as i64,
                    workflow.is_active,
                    definition,
                    workflow.created_by,
                    workflow.created_at.to_rfc3339(),
                    workflow.updated_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    fn get_workflow(&self, id: &str) -> BoxFuture<'_, Result<Option<Workflow>>> {
        let id = id.to_string();

        Box::pin(async move {
            let row = {
                let conn = self.lock()?;
                conn.query_row(
                    &format!("SELECT {} FROM workflows WHERE id = ?1", WORKFLOW_COLUMNS),
                    params![id],
                    WorkflowRow::from_row,
                )
                .optional()
                .map_err(db_err)?
            };
            row.map(WorkflowRow::into_workflow).transpose()
        })
    }

    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<Workflow>>> {
        Box::pin(async move {
            let rows = {
                let conn = self.lock()?;
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM workflows ORDER BY name ASC",
                        WORKFLOW_COLUMNS
                    ))
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map([], WorkflowRow::from_row)
                    .map_err(db_err)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(db_err)?;
                rows
            };
            rows.into_iter().map(WorkflowRow::into_workflow).collect()
        })
    }

    fn create_instance(&self, instance: &Instance) -> BoxFuture<'_, Result<()>> {
        let instance = instance.clone();

        Box::pin(async move {
            let context = serde_json::to_string(&instance.context_data)?;
            let conn = self.lock()?;
            conn.execute(
                &format!(
                    "INSERT INTO workflow_instances ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    INSTANCE_COLUMNS
                ),
                params![
                    instance.id,
                    instance.workflow_id,
                    instance.document_id,
                    instance.status.as_str(),
                    context,
                    instance.started_at.to_rfc3339(),
                    instance.completed_at.map(|t| t.to_rfc3339()),
                    instance.error,
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    fn update_instance(
        &self,
        id: &str,
        update: InstanceUpdate,
    ) -> BoxFuture<'_, Result<Instance>> {
        let id = id.to_string();

        Box::pin(async move {
            let context = update
                .context_data
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            let conn = self.lock()?;
            let current: Option<String> = conn
                .query_row(
                    "SELECT status FROM workflow_instances WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;

            let current = current.ok_or_else(|| DocflowError::not_found("instance", &id))?;
            let current = parse_enum(&current, InstanceStatus::Error);
            if !current.can_transition_to(update.status) {
                return Err(DocflowError::InvalidTransition {
                    from: current,
                    to: update.status,
                });
            }

            conn.execute(
                "UPDATE workflow_instances
                 SET status = ?2,
                     context_data = COALESCE(?3, context_data),
                     error = ?4,
                     completed_at = ?5
                 WHERE id = ?1",
                params![
                    id,
                    update.status.as_str(),
                    context,
                    update.error,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

            conn.query_row(
                &format!(
                    "SELECT {} FROM workflow_instances WHERE id = ?1",
                    INSTANCE_COLUMNS
                ),
                params![id],
                row_to_instance,
            )
            .map_err(db_err)
        })
    }

    fn get_instance(&self, id: &str) -> BoxFuture<'_, Result<Option<Instance>>> {
        let id = id.to_string();

        Box::pin(async move {
            let conn = self.lock()?;
            conn.query_row(
                &format!(
                    "SELECT {} FROM workflow_instances WHERE id = ?1",
                    INSTANCE_COLUMNS
                ),
                params![id],
                row_to_instance,
            )
            .optional()
            .map_err(db_err)
        })
    }

    fn list_instances(&self, workflow_id: &str) -> BoxFuture<'_, Result<Vec<Instance>>> {
        let workflow_id = workflow_id.to_string();

        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM workflow_instances
                     WHERE workflow_id = ?1
                     ORDER BY started_at DESC, rowid DESC",
                    INSTANCE_COLUMNS
                ))
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params![workflow_id], row_to_instance)
                .map_err(db_err)?;

            let mut instances = Vec::new();
            for row in rows {
                instances.push(row.map_err(db_err)?);
            }
            Ok(instances)
        })
    }

    fn append_audit(&self, entry: &AuditLogEntry) -> BoxFuture<'_, Result<()>> {
        let entry = entry.clone();

        Box::pin(async move {
            let details = serde_json::to_string(&entry.details)?;
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO workflow_audit_log (instance_id, action, details, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.instance_id,
                    entry.action.as_str(),
                    details,
                    entry.timestamp.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    fn audit_log(&self, instance_id: &str) -> BoxFuture<'_, Result<Vec<AuditLogEntry>>> {
        let instance_id = instance_id.to_string();

        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare(
                    "SELECT instance_id, action, details, timestamp
                     FROM workflow_audit_log
                     WHERE instance_id = ?1
                     ORDER BY id ASC",
                )
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params![instance_id], |row| {
                    let action: String = row.get(1)?;
                    let details: String = row.get(2)?;
                    let ts: String = row.get(3)?;
                    Ok(AuditLogEntry {
                        instance_id: row.get(0)?,
                        action: parse_enum(&action, AuditAction::NodeError),
                        details: parse_json(&details),
                        timestamp: parse_ts(&ts),
                    })
                })
                .map_err(db_err)?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row.map_err(db_err)?);
            }
            Ok(entries)
        })
    }

    fn create_approval(&self, request: &ApprovalRequest) -> BoxFuture<'_, Result<()>> {
        let request = request.clone();

        Box::pin(async move {
            let conn = self.lock()?;
            conn.execute(
                &format!(
                    "INSERT INTO approval_requests ({})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    APPROVAL_COLUMNS
                ),
                params![
                    request.id,
                    request.instance_id,
                    request.document_id,
                    request.approver_id,
                    request.level as i64,
                    request.status.as_str(),
                    request.priority.as_str(),
                    request.due_date.map(|t| t.to_rfc3339()),
                    request.comments,
                    request.decided_at.map(|t| t.to_rfc3339()),
                    request.created_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    fn get_approval(&self, id: &str) -> BoxFuture<'_, Result<Option<ApprovalRequest>>> {
        let id = id.to_string();

        Box::pin(async move {
            let conn = self.lock()?;
            conn.query_row(
                &format!("SELECT {} FROM approval_requests WHERE id = ?1", APPROVAL_COLUMNS),
                params![id],
                row_to_approval,
            )
            .optional()
            .map_err(db_err)
        })
    }

    fn list_approvals(
        &self,
        instance_id: Option<&str>,
        status: Option<ApprovalStatus>,
    ) -> BoxFuture<'_, Result<Vec<ApprovalRequest>>> {
        let instance_id = instance_id.map(str::to_string);
        let status = status.map(|s| s.as_str().to_string());

        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM approval_requests
                     WHERE (?1 IS NULL OR instance_id = ?1)
                       AND (?2 IS NULL OR status = ?2)
                     ORDER BY created_at ASC, rowid ASC",
                    APPROVAL_COLUMNS
                ))
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params![instance_id, status], row_to_approval)
                .map_err(db_err)?;

            let mut requests = Vec::new();
            for row in rows {
                requests.push(row.map_err(db_err)?);
            }
            Ok(requests)
        })
    }

    fn update_approval(&self, request: &ApprovalRequest) -> BoxFuture<'_, Result<()>> {
        let request = request.clone();

        Box::pin(async move {
            let conn = self.lock()?;
            let updated = conn
                .execute(
                    "UPDATE approval_requests
                     SET status = ?2, comments = ?3, decided_at = ?4
                     WHERE id = ?1 AND status = 'pending'",
                    params![
                        request.id,
                        request.status.as_str(),
                        request.comments,
                        request.decided_at.map(|t| t.to_rfc3339()),
                    ],
                )
                .map_err(db_err)?;
            if updated == 1 {
                return Ok(());
            }

            let exists = conn
                .query_row(
                    "SELECT 1 FROM approval_requests WHERE id = ?1",
                    params![request.id],
                    |_| Ok(()),
                )
                .optional()
                .map_err(db_err)?;
            match exists {
                Some(()) => Err(DocflowError::ApprovalAlreadyDecided(request.id)),
                None => Err(DocflowError::not_found("approval request", &request.id)),
            }
        })
    }

    fn put_document(&self, document: &Document) -> BoxFuture<'_, Result<()>> {
        let document = document.clone();

        Box::pin(async move {
            let tags = serde_json::to_string(&document.tags)?;
            let conn = self.lock()?;
            conn.execute(
                "INSERT OR REPLACE INTO documents (id, name, category, department, tags, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    document.id,
                    document.name,
                    document.category,
                    document.department,
                    tags,
                    document.updated_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    fn get_document(&self, id: &str) -> BoxFuture<'_, Result<Option<Document>>> {
        let id = id.to_string();

        Box::pin(async move {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT id, name, category, department, tags, updated_at
                 FROM documents WHERE id = ?1",
                params![id],
                row_to_document,
            )
            .optional()
            .map_err(db_err)
        })
    }

    fn update_document_metadata(
        &self,
        id: &str,
        metadata: &DocumentMetadata,
    ) -> BoxFuture<'_, Result<Document>> {
        let id = id.to_string();
        let metadata = metadata.clone();

        Box::pin(async move {
            let conn = self.lock()?;
            let mut document = conn
                .query_row(
                    "SELECT id, name, category, department, tags, updated_at
                     FROM documents WHERE id = ?1",
                    params![id],
                    row_to_document,
                )
                .optional()
                .map_err(db_err)?
                .ok_or_else(|| DocflowError::not_found("document", &id))?;

            metadata.apply_to(&mut document);
            let tags = serde_json::to_string(&document.tags)?;

            conn.execute(
                "UPDATE documents
                 SET category = ?2, department = ?3, tags = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    document.id,
                    document.category,
                    document.department,
                    tags,
                    document.updated_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

            Ok(document)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_definition() -> Definition {
        Definition::new(
            vec![
                Node::trigger("t1", "documentUpload"),
                Node::action("a1", "requireApproval"),
            ],
            vec![Edge::link("t1", "a1")],
        )
    }

    fn sample_approval(instance_id: &str) -> ApprovalRequest {
        ApprovalRequest {
            id: new_id(),
            instance_id: instance_id.to_string(),
            document_id: "doc-1".into(),
            approver_id: "user-7".into(),
            level: 1,
            status: ApprovalStatus::Pending,
            priority: Priority::High,
            due_date: None,
            comments: None,
            decided_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_workflow_roundtrip() {
        let store = SqliteStore::in_memory().unwrap();
        let mut wf = Workflow::new("Contract review", sample_definition());
        wf.description = Some("Route contracts to legal".into());

        store.save_workflow(&wf).await.unwrap();
        let loaded = store.get_workflow(&wf.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Contract review");
        assert_eq!(loaded.definition, wf.definition);
        assert_eq!(loaded.status, WorkflowStatus::Draft);

        wf.status = WorkflowStatus::Active;
        wf.version = 2;
        store.save_workflow(&wf).await.unwrap();
        let all = store.list_workflows().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].version, 2);
        assert_eq!(all[0].status, WorkflowStatus::Active);
    }

    #[tokio::test]
    async fn test_instance_transitions_enforced() {
        let store = SqliteStore::in_memory().unwrap();
        let instance = Instance::start("wf-1", Some("doc-1".into()), json!({"a": 1}));
        store.create_instance(&instance).await.unwrap();

        let done = store
            .update_instance(&instance.id, InstanceUpdate::completed(json!({"a": 1, "b": 2})))
            .await
            .unwrap();
        assert_eq!(done.status, InstanceStatus::Completed);
        assert_eq!(done.context_data["b"], 2);
        assert!(done.completed_at.is_some());

        let err = store
            .update_instance(&instance.id, InstanceUpdate::failed("late"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocflowError::InvalidTransition { .. }));

        let missing = store
            .update_instance("nope", InstanceUpdate::failed("x"))
            .await
            .unwrap_err();
        assert!(matches!(missing, DocflowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_context() {
        let store = SqliteStore::in_memory().unwrap();
        let instance = Instance::start("wf-1", None, json!({"customer": "Acme"}));
        store.create_instance(&instance).await.unwrap();

        let failed = store
            .update_instance(&instance.id, InstanceUpdate::failed("no trigger"))
            .await
            .unwrap();
        assert_eq!(failed.status, InstanceStatus::Error);
        assert_eq!(failed.error.as_deref(), Some("no trigger"));
        assert_eq!(failed.context_data["customer"], "Acme");
    }

    #[tokio::test]
    async fn test_audit_log_preserves_order() {
        let store = SqliteStore::in_memory().unwrap();
        for (i, action) in [
            AuditAction::WorkflowStarted,
            AuditAction::NodeExecuted,
            AuditAction::NodeError,
        ]
        .into_iter()
        .enumerate()
        {
            store
                .append_audit(&AuditLogEntry::new("i-1", action, json!({ "seq": i })))
                .await
                .unwrap();
        }
        store
            .append_audit(&AuditLogEntry::new("i-2", AuditAction::WorkflowStarted, json!({})))
            .await
            .unwrap();

        let log = store.audit_log("i-1").await.unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].action, AuditAction::WorkflowStarted);
        assert_eq!(log[2].action, AuditAction::NodeError);
        assert_eq!(log[1].details["seq"], 1);
    }

    #[tokio::test]
    async fn test_approval_filters_and_update() {
        let store = SqliteStore::in_memory().unwrap();
        let first = sample_approval("i-1");
        let second = sample_approval("i-2");
        store.create_approval(&first).await.unwrap();
        store.create_approval(&second).await.unwrap();

        assert_eq!(store.list_approvals(None, None).await.unwrap().len(), 2);
        assert_eq!(store.list_approvals(Some("i-1"), None).await.unwrap().len(), 1);

        let mut decided = first.clone();
        decided.status = ApprovalStatus::Approved;
        decided.comments = Some("looks fine".into());
        decided.decided_at = Some(Utc::now());
        store.update_approval(&decided).await.unwrap();

        let pending = store
            .list_approvals(None, Some(ApprovalStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);

        let loaded = store.get_approval(&first.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ApprovalStatus::Approved);
        assert_eq!(loaded.priority, Priority::High);
        assert_eq!(loaded.comments.as_deref(), Some("looks fine"));
    }

    #[tokio::test]
    async fn test_decided_approval_is_not_overwritten() {
        let store = SqliteStore::in_memory().unwrap();
        let request = sample_approval("i-1");
        store.create_approval(&request).await.unwrap();

        let mut approved = request.clone();
        approved.status = ApprovalStatus::Approved;
        approved.decided_at = Some(Utc::now());
        store.update_approval(&approved).await.unwrap();

        let mut rejected = request.clone();
        rejected.status = ApprovalStatus::Rejected;
        rejected.comments = Some("too late".into());
        rejected.decided_at = Some(Utc::now());
        let err = store.update_approval(&rejected).await.unwrap_err();
        assert!(matches!(err, DocflowError::ApprovalAlreadyDecided(ref id) if *id == request.id));

        let loaded = store.get_approval(&request.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ApprovalStatus::Approved);
        assert!(loaded.comments.is_none());

        let mut ghost = sample_approval("i-1");
        ghost.status = ApprovalStatus::Approved;
        let err = store.update_approval(&ghost).await.unwrap_err();
        assert!(matches!(err, DocflowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_document_metadata_update() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .put_document(&Document::new("doc-1", "Lease.pdf"))
            .await
            .unwrap();

        let meta = DocumentMetadata {
            category: Some("legal".into()),
            tags: Some(vec!["lease".into(), "2026".into()]),
            ..Default::default()
        };
        let updated = store.update_document_metadata("doc-1", &meta).await.unwrap();
        assert_eq!(updated.category.as_deref(), Some("legal"));

        let loaded = store.get_document("doc-1").await.unwrap().unwrap();
        assert_eq!(loaded.tags, vec!["lease", "2026"]);
        assert!(loaded.department.is_none());

        let err = store
            .update_document_metadata("missing", &meta)
            .await
            .unwrap_err();
        assert!(matches!(err, DocflowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("docflow.db");
        let store = SqliteStore::open(&path).unwrap();
        store
            .put_document(&Document::new("doc-1", "a.pdf"))
            .await
            .unwrap();
        assert!(path.exists());
    }
}
