//! Transition gate: what a drop of a lead onto a stage column turns into.

use serde::Serialize;

use super::models::{FormType, Lead, LeadId, Stage, StageId};

/// Why a drop did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    SameStage,
    UnknownLead,
    UnknownStage,
    /// Another capture form is still open on the board.
    FormOpen,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SameStage => "same_stage",
            Self::UnknownLead => "unknown_lead",
            Self::UnknownStage => "unknown_stage",
            Self::FormOpen => "form_open",
        }
    }
}

/// A move held open until its capture form is confirmed or cancelled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransition {
    pub lead: Lead,
    pub from_stage_id: StageId,
    pub target_stage_id: StageId,
    pub form_type: FormType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Ignore(IgnoreReason),
    /// Target needs no form: move right away.
    Commit { lead_id: LeadId, target: StageId },
    /// Target needs a form: nothing changes until it is submitted.
    Capture(PendingTransition),
}

/// Decide what dropping `lead_id` onto `target` should do.
///
/// Pure: reads the current snapshot of stages and leads, mutates nothing.
pub fn decide(stages: &[Stage], leads: &[Lead], lead_id: &LeadId, target: StageId) -> GateDecision {
    let Some(lead) = leads.iter().find(|l| &l.lead_id == lead_id) else {
        tracing::warn!(lead_id = %lead_id, target = %target, "Dropped lead not found; ignoring");
        return GateDecision::Ignore(IgnoreReason::UnknownLead);
    };
    if lead.stage_id == target {
        return GateDecision::Ignore(IgnoreReason::SameStage);
    }
    let Some(stage) = stages.iter().find(|s| s.id == target) else {
        tracing::warn!(lead_id = %lead_id, target = %target, "Drop target stage not found; ignoring");
        return GateDecision::Ignore(IgnoreReason::UnknownStage);
    };

    // The registry's own id carries the backend's wire form.
    if stage.form_type.requires_form() {
        GateDecision::Capture(PendingTransition {
            lead: lead.clone(),
            from_stage_id: lead.stage_id.clone(),
            target_stage_id: stage.id.clone(),
            form_type: stage.form_type,
        })
    } else {
        GateDecision::Commit {
            lead_id: lead_id.clone(),
            target: stage.id.clone(),
        }
    }
}
