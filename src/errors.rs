//! Typed error hierarchy for leadboard.
//!
//! `PipelineError` covers every failure a lead store or the board controller
//! can surface. The SQLite layer works in `anyhow::Result` internally and is
//! wrapped as `Database` at the store boundary.

use thiserror::Error;

use crate::pipeline::models::{LeadId, StageId};

/// Errors from lead stores and the transition pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Lead {id} not found")]
    LeadNotFound { id: LeadId },

    #[error("Stage {id} not found")]
    StageNotFound { id: StageId },

    #[error("Lead {id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        id: LeadId,
        expected: i64,
        actual: i64,
    },

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Invalid value: {0}")]
    Invalid(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::LeadNotFound { .. } | Self::StageNotFound { .. })
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
