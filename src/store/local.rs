use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::{
    error::{PlanError, Result},
    plan::{coerce, RawPlan},
    store::DocumentStore,
};

/// Plan documents and course statuses in a local SQLite file.
///
/// Statuses live in their own table and are merged into the stored payload
/// on every load, so re-uploading a plan keeps the recorded progress.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PlanError::Other(anyhow::anyhow!("database connection lock poisoned")))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                doc_id TEXT PRIMARY KEY,
                name TEXT,
                faculty TEXT,
                program TEXT,
                payload_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS course_status (
                doc_id TEXT NOT NULL,
                code TEXT NOT NULL,
                passed INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (doc_id, code),
                FOREIGN KEY (doc_id) REFERENCES documents(doc_id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_name ON documents(name)",
            [],
        )?;

        Ok(())
    }

    /// Insert or replace a document. A payload without a name keeps the
    /// name already on record.
    pub fn save_document(&self, plan: &RawPlan) -> Result<String> {
        let doc_id = plan
            .doc_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PlanError::InvalidDocument("DOC_ID missing in uploaded plan".to_string()))?
            .to_string();

        let mut payload = plan.clone();
        payload.doc_id = Some(doc_id.clone());
        payload.name = None;
        let payload_json = serde_json::to_string(&payload)?;

        self.conn()?.execute(
            "INSERT INTO documents (doc_id, name, faculty, program, payload_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(doc_id) DO UPDATE SET
                name = COALESCE(excluded.name, documents.name),
                faculty = excluded.faculty,
                program = excluded.program,
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at",
            params![
                doc_id,
                plan.name,
                plan.faculty.clone().unwrap_or_default(),
                plan.program.clone().unwrap_or_default(),
                payload_json,
                Utc::now().to_rfc3339(),
            ],
        )?;

        info!("Saved document {}", doc_id);
        Ok(doc_id)
    }

    pub fn load_document(&self, doc_id: &str) -> Result<Option<RawPlan>> {
        self.load_where("doc_id = ?1", doc_id)
    }

    pub fn load_document_by_name(&self, name: &str) -> Result<Option<RawPlan>> {
        self.load_where("name = ?1", name)
    }

    fn load_where(&self, clause: &str, value: &str) -> Result<Option<RawPlan>> {
        let row = {
            let conn = self.conn()?;
            let query = format!(
                "SELECT doc_id, name, faculty, program, payload_json FROM documents WHERE {} LIMIT 1",
                clause
            );
            conn.query_row(&query, [value], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .optional()?
        };

        let Some((doc_id, name, faculty, program, payload_json)) = row else {
            return Ok(None);
        };

        let mut plan: RawPlan = serde_json::from_str(&payload_json)?;
        plan.doc_id = Some(doc_id.clone());
        plan.faculty = faculty;
        plan.program = program;
        plan.name = name;

        let statuses = self.course_statuses(&doc_id)?;
        if !statuses.is_empty() {
            for course in plan.courses.iter_mut() {
                let code = coerce::opt_to_string(course.code.as_ref());
                if let Some(&passed) = statuses.get(&code) {
                    course.passed = Some(Value::Bool(passed));
                }
            }
        }

        Ok(Some(plan))
    }

    pub fn course_statuses(&self, doc_id: &str) -> Result<HashMap<String, bool>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT code, passed FROM course_status WHERE doc_id = ?1")?;

        let statuses = stmt
            .query_map([doc_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0)))?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(statuses)
    }

    pub fn set_document_name(&self, doc_id: &str, name: &str) -> Result<()> {
        let updated = self.conn()?.execute(
            "UPDATE documents SET name = ?1, updated_at = ?2 WHERE doc_id = ?3",
            params![name, Utc::now().to_rfc3339(), doc_id],
        )?;

        if updated == 0 {
            return Err(PlanError::NotFound(doc_id.to_string()));
        }
        Ok(())
    }

    pub fn update_course_status(&self, doc_id: &str, code: &str, passed: bool) -> Result<()> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE doc_id = ?1)",
            [doc_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(PlanError::NotFound(doc_id.to_string()));
        }

        conn.execute(
            "INSERT INTO course_status (doc_id, code, passed, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(doc_id, code) DO UPDATE SET
                passed = excluded.passed,
                updated_at = excluded.updated_at",
            params![doc_id, code, passed as i64, Utc::now().to_rfc3339()],
        )?;

        debug!("Stored status {}={} for {}", code, passed, doc_id);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn upload_pdf(&self, file_name: &str, _bytes: Vec<u8>) -> Result<RawPlan> {
        Err(PlanError::Unsupported(format!(
            "cannot extract {} locally; upload it to the document service",
            file_name
        )))
    }

    async fn upload_plan(&self, plan: &RawPlan) -> Result<RawPlan> {
        let doc_id = self.save_document(plan)?;
        self.load_document(&doc_id)?
            .ok_or_else(|| PlanError::NotFound(doc_id))
    }

    async fn fetch(&self, doc_id: &str) -> Result<RawPlan> {
        self.load_document(doc_id)?
            .ok_or_else(|| PlanError::NotFound(doc_id.to_string()))
    }

    async fn fetch_by_name(&self, name: &str) -> Result<RawPlan> {
        self.load_document_by_name(name)?
            .ok_or_else(|| PlanError::NotFound(name.to_string()))
    }

    async fn rename(&self, doc_id: &str, name: &str) -> Result<()> {
        self.set_document_name(doc_id, name)
    }

    async fn set_course_status(&self, doc_id: &str, code: &str, passed: bool) -> Result<()> {
        self.update_course_status(doc_id, code, passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_plan() -> RawPlan {
        serde_json::from_value(json!({
            "DOC_ID": "doc-1",
            "FACULTAD": "INGENIERÍA DE SISTEMAS COMPUTACIONALES",
            "CARRERA": "Licenciatura en Desarrollo de Software",
            "PLAN": [
                {"NUM_ASIG": 1, "COD_ASIG": 8078, "ASIGNATURA": "Programación I", "REQUISITOS": [], "FUNDAMENTAL": true, "AÑO": "1", "SEMESTRE": "I"},
                {"NUM_ASIG": 2, "COD_ASIG": 8079, "ASIGNATURA": "Programación II", "REQUISITOS": ["8078"], "FUNDAMENTAL": true, "AÑO": "1", "SEMESTRE": "II"}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_and_fetch() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let stored = store.upload_plan(&sample_plan()).await.unwrap();
        assert_eq!(stored.doc_id.as_deref(), Some("doc-1"));
        assert_eq!(stored.courses.len(), 2);

        let fetched = store.fetch("doc-1").await.unwrap();
        assert_eq!(fetched.program.as_deref(), Some("Licenciatura en Desarrollo de Software"));
        assert!(matches!(store.fetch("missing").await, Err(PlanError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_statuses_merge_into_payload() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store.upload_plan(&sample_plan()).await.unwrap();

        store.set_course_status("doc-1", "8078", true).await.unwrap();
        store.set_course_status("doc-1", "8078", true).await.unwrap();

        let plan = store.fetch("doc-1").await.unwrap();
        assert_eq!(plan.courses[0].passed, Some(Value::Bool(true)));
        assert_eq!(plan.courses[1].passed, None);
        assert_eq!(store.course_statuses("doc-1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reupload_keeps_name_and_progress() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store.upload_plan(&sample_plan()).await.unwrap();
        store.rename("doc-1", "mi carrera").await.unwrap();
        store.set_course_status("doc-1", "8079", true).await.unwrap();

        store.upload_plan(&sample_plan()).await.unwrap();

        let plan = store.fetch_by_name("mi carrera").await.unwrap();
        assert_eq!(plan.name.as_deref(), Some("mi carrera"));
        assert_eq!(plan.courses[1].passed, Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_unknown_document_rejected() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        assert!(matches!(
            store.rename("nope", "x").await,
            Err(PlanError::NotFound(_))
        ));
        assert!(matches!(
            store.set_course_status("nope", "101", true).await,
            Err(PlanError::NotFound(_))
        ));
        assert!(matches!(
            store.fetch_by_name("x").await,
            Err(PlanError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pdf_upload_unsupported() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        assert!(matches!(
            store.upload_pdf("plan.pdf", vec![0x25, 0x50]).await,
            Err(PlanError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plans.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteDocumentStore::new(path).unwrap();
            store.upload_plan(&sample_plan()).await.unwrap();
            store.set_course_status("doc-1", "8078", true).await.unwrap();
        }

        let store = SqliteDocumentStore::new(path).unwrap();
        let plan = store.fetch("doc-1").await.unwrap();
        assert_eq!(plan.courses[0].passed, Some(Value::Bool(true)));
    }
}
