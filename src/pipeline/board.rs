//! Board controller: the stateful side of the pipeline view.
//!
//! Holds the last fetched stages and leads plus at most one pending
//! transition. Drag-ends go through the gate; form-less moves commit
//! straight away, the rest wait for [`Board::submit`] or [`Board::cancel`].
//! Local state is only patched with records the store acknowledged.

use std::sync::Arc;

use super::commit::commit;
use super::forms::{CaptureForm, FormErrors, FormInput, FormOptions};
use super::gate::{self, GateDecision, IgnoreReason, PendingTransition};
use super::grouping::{StageGroups, group_leads_by_stage};
use super::models::{CaptureFields, Lead, LeadId, Stage, StageId};
use crate::errors::{PipelineError, PipelineResult};
use crate::notify::{LEAD_UPDATE_FAILED, LEAD_UPDATED, Notifier, Toast};
use crate::session::Session;
use crate::store::LeadStore;

#[derive(Debug)]
pub enum DragOutcome {
    Ignored(IgnoreReason),
    Moved(Lead),
    FormOpened(CaptureForm),
    Failed(PipelineError),
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// Validation failed; the form stays open.
    Invalid(FormErrors),
    Committed(Lead),
    Failed(PipelineError),
    NoPendingForm,
}

pub struct Board {
    store: Arc<dyn LeadStore>,
    notifier: Arc<dyn Notifier>,
    session: Session,
    form_options: FormOptions,
    stages: Vec<Stage>,
    leads: Vec<Lead>,
    pending: Option<PendingTransition>,
}

impl Board {
    pub fn new(store: Arc<dyn LeadStore>, notifier: Arc<dyn Notifier>, session: Session) -> Self {
        Self {
            store,
            notifier,
            session,
            form_options: FormOptions::default(),
            stages: Vec::new(),
            leads: Vec::new(),
            pending: None,
        }
    }

    pub fn with_form_options(mut self, options: FormOptions) -> Self {
        self.form_options = options;
        self
    }

    /// Refetch stages and leads, replacing local state wholesale.
    pub async fn refresh(&mut self) -> PipelineResult<()> {
        let stages = self.store.list_stages(&self.session).await?;
        let leads = self.store.list_leads(&self.session).await?;
        tracing::debug!(
            company = %self.session.company_id,
            stages = stages.len(),
            leads = leads.len(),
            "Board refreshed"
        );
        self.stages = stages;
        self.leads = leads;
        Ok(())
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    pub fn lead(&self, id: &LeadId) -> Option<&Lead> {
        self.leads.iter().find(|l| &l.lead_id == id)
    }

    pub fn pending(&self) -> Option<&PendingTransition> {
        self.pending.as_ref()
    }

    pub fn groups(&self) -> StageGroups {
        group_leads_by_stage(&self.leads, &self.stages)
    }

    /// Handle a lead dropped on a stage column.
    pub async fn drag_end(&mut self, lead_id: &LeadId, target: StageId) -> DragOutcome {
        if let Some(ref pending) = self.pending {
            tracing::debug!(
                lead_id = %lead_id,
                pending = %pending.lead.lead_id,
                "Drop ignored while a capture form is open"
            );
            return DragOutcome::Ignored(IgnoreReason::FormOpen);
        }

        match gate::decide(&self.stages, &self.leads, lead_id, target) {
            GateDecision::Ignore(reason) => DragOutcome::Ignored(reason),
            GateDecision::Commit { lead_id, target } => {
                let Some(lead) = self.lead(&lead_id).cloned() else {
                    return DragOutcome::Ignored(IgnoreReason::UnknownLead);
                };
                match self.persist(&lead, target, CaptureFields::default()).await {
                    Ok(saved) => DragOutcome::Moved(saved),
                    Err(e) => DragOutcome::Failed(e),
                }
            }
            GateDecision::Capture(pending) => {
                match CaptureForm::for_type(pending.form_type, &self.form_options) {
                    Some(form) => {
                        tracing::debug!(
                            lead_id = %pending.lead.lead_id,
                            form = %pending.form_type,
                            "Capture form opened"
                        );
                        self.pending = Some(pending);
                        DragOutcome::FormOpened(form)
                    }
                    None => DragOutcome::Ignored(IgnoreReason::UnknownStage),
                }
            }
        }
    }

    /// The form of the pending transition, if one is open.
    pub fn open_form(&self) -> Option<CaptureForm> {
        let pending = self.pending.as_ref()?;
        CaptureForm::for_type(pending.form_type, &self.form_options)
    }

    /// Validate `input` against the open form and commit the pending move.
    ///
    /// Invalid input keeps the form open. A persistence failure closes it and
    /// leaves the lead where it was.
    pub async fn submit(&mut self, input: &FormInput) -> SubmitOutcome {
        let Some(form) = self.open_form() else {
            return SubmitOutcome::NoPendingForm;
        };
        let extra = match form.validate(input) {
            Ok(extra) => extra,
            Err(errors) => {
                tracing::debug!(errors = %errors, "Capture form rejected");
                return SubmitOutcome::Invalid(errors);
            }
        };
        let Some(pending) = self.pending.take() else {
            return SubmitOutcome::NoPendingForm;
        };

        match self.persist(&pending.lead, pending.target_stage_id, extra).await {
            Ok(saved) => SubmitOutcome::Committed(saved),
            Err(e) => SubmitOutcome::Failed(e),
        }
    }

    /// Discard the pending transition. The lead is not touched.
    pub fn cancel(&mut self) -> Option<PendingTransition> {
        let pending = self.pending.take();
        if let Some(ref p) = pending {
            tracing::debug!(lead_id = %p.lead.lead_id, "Capture form cancelled");
        }
        pending
    }

    async fn persist(
        &mut self,
        lead: &Lead,
        target: StageId,
        extra: CaptureFields,
    ) -> PipelineResult<Lead> {
        match commit(self.store.as_ref(), &self.session, lead, target.clone(), extra).await {
            Ok(saved) => {
                self.patch(saved.clone());
                self.notifier.notify(Toast::success(LEAD_UPDATED));
                Ok(saved)
            }
            Err(e) => {
                tracing::error!(lead_id = %lead.lead_id, target = %target, error = %e, "Failed to update lead");
                self.notifier.notify(Toast::error(LEAD_UPDATE_FAILED));
                if e.is_conflict() {
                    if let Err(refresh_err) = self.refresh().await {
                        tracing::warn!(error = %refresh_err, "Refetch after conflict failed");
                    }
                }
                Err(e)
            }
        }
    }

    fn patch(&mut self, saved: Lead) {
        match self.leads.iter_mut().find(|l| l.lead_id == saved.lead_id) {
            Some(slot) => *slot = saved,
            None => self.leads.push(saved),
        }
    }
}
