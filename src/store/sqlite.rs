use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{LeadStore, check_version, initial_stage};
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::models::{
    CaptureFields, DEFAULT_FUNNEL, FormType, Lead, LeadId, NewLead, Stage, StageId,
};
use crate::session::Session;

/// Async-safe handle to the lead database.
///
/// Wraps `LeadDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<LeadDb>>,
}

impl DbHandle {
    pub fn new(db: LeadDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&LeadDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| anyhow::Error::from(PipelineError::LockPoisoned))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. For startup and tests only.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, LeadDb>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::Error::from(PipelineError::LockPoisoned))
    }
}

/// Recover a typed error that crossed the `anyhow` boundary of `LeadDb`.
pub fn into_pipeline_error(err: anyhow::Error) -> PipelineError {
    match err.downcast::<PipelineError>() {
        Ok(typed) => typed,
        Err(other) => PipelineError::Database(other),
    }
}

const LEAD_COLUMNS: &str = "id, stage_id, name, phone, email, budget, source, assigned_sales_rep, \
     assigned_designer, notes, capture, version, created_at, updated_at";

pub struct LeadDb {
    conn: Connection,
}

impl LeadDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        // leads.stage_id has no foreign key; a lead may outlive its stage.
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS stages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    company_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    form_type TEXT NOT NULL DEFAULT 'NONE',
                    position INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS leads (
                    id TEXT PRIMARY KEY,
                    company_id TEXT NOT NULL,
                    stage_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    phone TEXT,
                    email TEXT,
                    budget REAL,
                    source TEXT,
                    assigned_sales_rep TEXT,
                    assigned_designer TEXT,
                    notes TEXT,
                    capture TEXT NOT NULL DEFAULT '{}',
                    version INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_stages_company ON stages(company_id, position);
                CREATE INDEX IF NOT EXISTS idx_leads_company ON leads(company_id);
                CREATE INDEX IF NOT EXISTS idx_leads_stage ON leads(company_id, stage_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Stages ────────────────────────────────────────────────────────

    pub fn create_stage(&self, company_id: &str, name: &str, form_type: FormType) -> Result<Stage> {
        let position: i32 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(position), 0) FROM stages WHERE company_id = ?1",
                params![company_id],
                |row| row.get(0),
            )
            .context("Failed to get max stage position")?;
        self.conn
            .execute(
                "INSERT INTO stages (company_id, name, form_type, position) VALUES (?1, ?2, ?3, ?4)",
                params![company_id, name, form_type.as_str(), position + 1],
            )
            .context("Failed to insert stage")?;
        let id = StageId::from(self.conn.last_insert_rowid());
        self.get_stage(company_id, &id)?
            .context("Stage not found after insert")
    }

    /// Seed the default funnel when the company has no stages yet.
    /// Returns the company's stages either way.
    pub fn seed_default_stages(&self, company_id: &str) -> Result<Vec<Stage>> {
        let existing = self.list_stages(company_id)?;
        if !existing.is_empty() {
            return Ok(existing);
        }
        for (name, form_type) in DEFAULT_FUNNEL {
            self.create_stage(company_id, name, *form_type)?;
        }
        tracing::info!(company_id, "Seeded default pipeline stages");
        self.list_stages(company_id)
    }

    pub fn list_stages(&self, company_id: &str) -> Result<Vec<Stage>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, form_type, position FROM stages
                 WHERE company_id = ?1 ORDER BY position, id",
            )
            .context("Failed to prepare list_stages")?;
        let rows = stmt
            .query_map(params![company_id], StageRow::from_row)
            .context("Failed to query stages")?;
        let mut stages = Vec::new();
        for row in rows {
            stages.push(row.context("Failed to read stage row")?.into_stage()?);
        }
        Ok(stages)
    }

    /// Stages here are keyed by rowid, so a non-integer id never matches.
    pub fn get_stage(&self, company_id: &str, id: &StageId) -> Result<Option<Stage>> {
        let Some(rowid) = id.as_i64() else {
            return Ok(None);
        };
        let row = self
            .conn
            .query_row(
                "SELECT id, name, form_type, position FROM stages WHERE company_id = ?1 AND id = ?2",
                params![company_id, rowid],
                StageRow::from_row,
            )
            .optional()
            .context("Failed to query stage")?;
        row.map(StageRow::into_stage).transpose()
    }

    // ── Leads ─────────────────────────────────────────────────────────

    pub fn create_lead(&self, company_id: &str, new: NewLead) -> Result<Lead> {
        let stages = self.list_stages(company_id)?;
        let stage_id = initial_stage(&stages, new.stage_id.clone())?;
        let stage_rowid = self.require_stage(company_id, &stage_id)?;
        let lead = Lead::from_new(LeadId::generate(), stage_id, new);
        self.conn
            .execute(
                &format!(
                    "INSERT INTO leads (company_id, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    LEAD_COLUMNS
                ),
                params![
                    company_id,
                    lead.lead_id.as_str(),
                    stage_rowid,
                    lead.name,
                    lead.phone,
                    lead.email,
                    lead.budget,
                    lead.source,
                    lead.assigned_sales_rep,
                    lead.assigned_designer,
                    lead.notes,
                    serde_json::to_string(&lead.capture).context("Failed to encode capture fields")?,
                    lead.version,
                    lead.created_at.to_rfc3339(),
                    lead.updated_at.to_rfc3339(),
                ],
            )
            .context("Failed to insert lead")?;
        Ok(lead)
    }

    pub fn list_leads(&self, company_id: &str) -> Result<Vec<Lead>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM leads WHERE company_id = ?1 ORDER BY rowid",
                LEAD_COLUMNS
            ))
            .context("Failed to prepare list_leads")?;
        let rows = stmt
            .query_map(params![company_id], LeadRow::from_row)
            .context("Failed to query leads")?;
        let mut leads = Vec::new();
        for row in rows {
            leads.push(row.context("Failed to read lead row")?.into_lead()?);
        }
        Ok(leads)
    }

    pub fn get_lead(&self, company_id: &str, id: &LeadId) -> Result<Option<Lead>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM leads WHERE company_id = ?1 AND id = ?2",
                    LEAD_COLUMNS
                ),
                params![company_id, id.as_str()],
                LeadRow::from_row,
            )
            .optional()
            .context("Failed to query lead")?;
        row.map(LeadRow::into_lead).transpose()
    }

    fn require_lead(&self, company_id: &str, id: &LeadId) -> Result<Lead> {
        self.get_lead(company_id, id)?
            .ok_or_else(|| PipelineError::LeadNotFound { id: id.clone() }.into())
    }

    /// Rowid of an existing stage of the company.
    fn require_stage(&self, company_id: &str, id: &StageId) -> Result<i64> {
        match (self.get_stage(company_id, id)?, id.as_i64()) {
            (Some(_), Some(rowid)) => Ok(rowid),
            _ => Err(PipelineError::StageNotFound { id: id.clone() }.into()),
        }
    }

    pub fn update_lead(
        &self,
        company_id: &str,
        lead: &Lead,
        expected_version: Option<i64>,
    ) -> Result<Lead> {
        let current = self.require_lead(company_id, &lead.lead_id)?;
        check_version(&lead.lead_id, expected_version, current.version)?;
        let stage_rowid = self.require_stage(company_id, &lead.stage_id)?;

        self.conn
            .execute(
                "UPDATE leads SET stage_id = ?1, name = ?2, phone = ?3, email = ?4, budget = ?5,
                     source = ?6, assigned_sales_rep = ?7, assigned_designer = ?8, notes = ?9,
                     capture = ?10, version = version + 1, updated_at = ?11
                 WHERE company_id = ?12 AND id = ?13",
                params![
                    stage_rowid,
                    lead.name,
                    lead.phone,
                    lead.email,
                    lead.budget,
                    lead.source,
                    lead.assigned_sales_rep,
                    lead.assigned_designer,
                    lead.notes,
                    serde_json::to_string(&lead.capture).context("Failed to encode capture fields")?,
                    Utc::now().to_rfc3339(),
                    company_id,
                    lead.lead_id.as_str(),
                ],
            )
            .context("Failed to update lead")?;
        self.require_lead(company_id, &lead.lead_id)
    }

    pub fn move_lead(
        &self,
        company_id: &str,
        id: &LeadId,
        stage_id: StageId,
        expected_version: Option<i64>,
    ) -> Result<Lead> {
        let current = self.require_lead(company_id, id)?;
        check_version(id, expected_version, current.version)?;
        let stage_rowid = self.require_stage(company_id, &stage_id)?;

        self.conn
            .execute(
                "UPDATE leads SET stage_id = ?1, version = version + 1, updated_at = ?2
                 WHERE company_id = ?3 AND id = ?4",
                params![stage_rowid, Utc::now().to_rfc3339(), company_id, id.as_str()],
            )
            .context("Failed to move lead")?;
        self.require_lead(company_id, id)
    }
}

// ── Row types ─────────────────────────────────────────────────────────

struct StageRow {
    id: i64,
    name: String,
    form_type: String,
    position: i32,
}

impl StageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            form_type: row.get(2)?,
            position: row.get(3)?,
        })
    }

    fn into_stage(self) -> Result<Stage> {
        let form_type = FormType::from_str(&self.form_type)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse stage form type")?;
        Ok(Stage {
            id: StageId::from(self.id),
            name: self.name,
            form_type,
            position: self.position,
        })
    }
}

struct LeadRow {
    id: String,
    stage_id: i64,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    budget: Option<f64>,
    source: Option<String>,
    assigned_sales_rep: Option<String>,
    assigned_designer: Option<String>,
    notes: Option<String>,
    capture: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("Failed to parse timestamp '{}'", raw))
}

impl LeadRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            stage_id: row.get(1)?,
            name: row.get(2)?,
            phone: row.get(3)?,
            email: row.get(4)?,
            budget: row.get(5)?,
            source: row.get(6)?,
            assigned_sales_rep: row.get(7)?,
            assigned_designer: row.get(8)?,
            notes: row.get(9)?,
            capture: row.get(10)?,
            version: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_lead(self) -> Result<Lead> {
        let capture: CaptureFields =
            serde_json::from_str(&self.capture).context("Failed to parse capture fields JSON")?;
        Ok(Lead {
            lead_id: LeadId(self.id),
            stage_id: StageId::from(self.stage_id),
            name: self.name,
            phone: self.phone,
            email: self.email,
            budget: self.budget,
            source: self.source,
            assigned_sales_rep: self.assigned_sales_rep,
            assigned_designer: self.assigned_designer,
            notes: self.notes,
            capture,
            version: self.version,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

// ── LeadStore over SQLite ─────────────────────────────────────────────

/// [`LeadStore`] backed by a local [`LeadDb`].
#[derive(Clone)]
pub struct SqliteStore {
    db: DbHandle,
}

impl SqliteStore {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(DbHandle::new(LeadDb::new(path)?)))
    }

    pub fn handle(&self) -> &DbHandle {
        &self.db
    }
}

#[async_trait]
impl LeadStore for SqliteStore {
    async fn list_stages(&self, session: &Session) -> PipelineResult<Vec<Stage>> {
        let company = session.company_id.clone();
        self.db
            .call(move |db| db.list_stages(&company))
            .await
            .map_err(into_pipeline_error)
    }

    async fn list_leads(&self, session: &Session) -> PipelineResult<Vec<Lead>> {
        let company = session.company_id.clone();
        self.db
            .call(move |db| db.list_leads(&company))
            .await
            .map_err(into_pipeline_error)
    }

    async fn create_lead(&self, session: &Session, new: NewLead) -> PipelineResult<Lead> {
        let company = session.company_id.clone();
        self.db
            .call(move |db| db.create_lead(&company, new))
            .await
            .map_err(into_pipeline_error)
    }

    async fn update_lead(
        &self,
        session: &Session,
        lead: &Lead,
        expected_version: Option<i64>,
    ) -> PipelineResult<Lead> {
        let company = session.company_id.clone();
        let lead = lead.clone();
        self.db
            .call(move |db| db.update_lead(&company, &lead, expected_version))
            .await
            .map_err(into_pipeline_error)
    }

    async fn move_lead(
        &self,
        session: &Session,
        lead_id: &LeadId,
        stage_id: StageId,
        expected_version: Option<i64>,
    ) -> PipelineResult<Lead> {
        let company = session.company_id.clone();
        let lead_id = lead_id.clone();
        self.db
            .call(move |db| db.move_lead(&company, &lead_id, stage_id, expected_version))
            .await
            .map_err(into_pipeline_error)
    }
}
