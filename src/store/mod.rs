//! Lead stores: where stages and leads live.
//!
//! | Store         | Backing                                   |
//! |---------------|-------------------------------------------|
//! | `MemoryStore` | in-process maps, for tests and embedding  |
//! | `SqliteStore` | local SQLite file via `LeadDb`            |
//! | `HttpStore`   | the backend lead API over HTTP            |
//!
//! Every write takes an optional expected version. When it is given and does
//! not match the stored lead, the write fails with
//! [`PipelineError::VersionConflict`] and nothing changes.

pub mod http;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::models::{Lead, LeadId, NewLead, Stage, StageId};
use crate::session::Session;

pub use http::HttpStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Abstraction over the lead backend.
/// Real implementations: `SqliteStore`, `HttpStore`. Test double: `MemoryStore`.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Stages of the session's company, in registry order.
    async fn list_stages(&self, session: &Session) -> PipelineResult<Vec<Stage>>;

    async fn list_leads(&self, session: &Session) -> PipelineResult<Vec<Lead>>;

    async fn create_lead(&self, session: &Session, new: NewLead) -> PipelineResult<Lead>;

    /// Full update: every mutable field of `lead` is written.
    async fn update_lead(
        &self,
        session: &Session,
        lead: &Lead,
        expected_version: Option<i64>,
    ) -> PipelineResult<Lead>;

    /// Stage-only update.
    async fn move_lead(
        &self,
        session: &Session,
        lead_id: &LeadId,
        stage_id: StageId,
        expected_version: Option<i64>,
    ) -> PipelineResult<Lead>;
}

/// Reject a write whose expected version is stale.
pub(crate) fn check_version(
    id: &LeadId,
    expected: Option<i64>,
    actual: i64,
) -> PipelineResult<()> {
    match expected {
        Some(expected) if expected != actual => Err(PipelineError::VersionConflict {
            id: id.clone(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Stage a new lead starts in: the requested one if it exists, else the
/// fallback column.
pub(crate) fn initial_stage(stages: &[Stage], requested: Option<StageId>) -> PipelineResult<StageId> {
    match requested {
        Some(id) => stages
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.id.clone())
            .ok_or(PipelineError::StageNotFound { id }),
        None => crate::pipeline::grouping::fallback_stage_index(stages)
            .map(|i| stages[i].id.clone())
            .ok_or_else(|| PipelineError::Invalid("company has no pipeline stages".into())),
    }
}
