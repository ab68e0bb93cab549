use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{LeadStore, check_version, initial_stage};
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::models::{Lead, LeadId, NewLead, Stage, StageId};
use crate::session::Session;

#[derive(Default)]
struct Tenant {
    stages: Vec<Stage>,
    leads: Vec<Lead>,
}

/// In-memory lead store. Tenants are created on first use.
#[derive(Default)]
pub struct MemoryStore {
    tenants: RwLock<HashMap<String, Tenant>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a company's stage registry.
    pub async fn set_stages(&self, company_id: &str, mut stages: Vec<Stage>) {
        stages.sort_by_key(|s| s.position);
        let mut tenants = self.tenants.write().await;
        tenants.entry(company_id.to_string()).or_default().stages = stages;
    }

    /// Insert a lead record as-is, without any checks. Lets callers load
    /// records that reference stages this store does not know.
    pub async fn insert_raw(&self, company_id: &str, lead: Lead) {
        let mut tenants = self.tenants.write().await;
        tenants
            .entry(company_id.to_string())
            .or_default()
            .leads
            .push(lead);
    }

    /// Current stored copy of a lead.
    pub async fn get_lead(&self, company_id: &str, lead_id: &LeadId) -> Option<Lead> {
        let tenants = self.tenants.read().await;
        tenants
            .get(company_id)?
            .leads
            .iter()
            .find(|l| &l.lead_id == lead_id)
            .cloned()
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn list_stages(&self, session: &Session) -> PipelineResult<Vec<Stage>> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(&session.company_id)
            .map(|t| t.stages.clone())
            .unwrap_or_default())
    }

    async fn list_leads(&self, session: &Session) -> PipelineResult<Vec<Lead>> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(&session.company_id)
            .map(|t| t.leads.clone())
            .unwrap_or_default())
    }

    async fn create_lead(&self, session: &Session, new: NewLead) -> PipelineResult<Lead> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(session.company_id.clone()).or_default();
        let stage_id = initial_stage(&tenant.stages, new.stage_id.clone())?;
        let lead = Lead::from_new(LeadId::generate(), stage_id, new);
        tenant.leads.push(lead.clone());
        Ok(lead)
    }

    async fn update_lead(
        &self,
        session: &Session,
        lead: &Lead,
        expected_version: Option<i64>,
    ) -> PipelineResult<Lead> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants
            .get_mut(&session.company_id)
            .ok_or_else(|| PipelineError::LeadNotFound {
                id: lead.lead_id.clone(),
            })?;
        if !tenant.stages.iter().any(|s| s.id == lead.stage_id) {
            return Err(PipelineError::StageNotFound {
                id: lead.stage_id.clone(),
            });
        }
        let stored = tenant
            .leads
            .iter_mut()
            .find(|l| l.lead_id == lead.lead_id)
            .ok_or_else(|| PipelineError::LeadNotFound {
                id: lead.lead_id.clone(),
            })?;
        check_version(&stored.lead_id, expected_version, stored.version)?;

        let mut updated = lead.clone();
        updated.created_at = stored.created_at;
        updated.version = stored.version + 1;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn move_lead(
        &self,
        session: &Session,
        lead_id: &LeadId,
        stage_id: StageId,
        expected_version: Option<i64>,
    ) -> PipelineResult<Lead> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants
            .get_mut(&session.company_id)
            .ok_or_else(|| PipelineError::LeadNotFound { id: lead_id.clone() })?;
        if !tenant.stages.iter().any(|s| s.id == stage_id) {
            return Err(PipelineError::StageNotFound { id: stage_id });
        }
        let stored = tenant
            .leads
            .iter_mut()
            .find(|l| &l.lead_id == lead_id)
            .ok_or_else(|| PipelineError::LeadNotFound { id: lead_id.clone() })?;
        check_version(lead_id, expected_version, stored.version)?;

        stored.stage_id = stage_id;
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }
}
