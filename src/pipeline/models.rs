use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Identifier of a pipeline stage. Stable across renames.
///
/// Opaque: backends hand out integers or strings. An id is written back in
/// the form it arrived in, and compares by its text, so `3` and `"3"` name
/// the same stage.
#[derive(Debug, Clone)]
pub struct StageId {
    key: String,
    numeric: bool,
}

impl StageId {
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Integer form, for stores keyed by rowid.
    pub fn as_i64(&self) -> Option<i64> {
        self.key.parse().ok()
    }
}

impl From<i64> for StageId {
    fn from(id: i64) -> Self {
        Self {
            key: id.to_string(),
            numeric: true,
        }
    }
}

impl From<&str> for StageId {
    fn from(key: &str) -> Self {
        Self::from(key.to_string())
    }
}

impl From<String> for StageId {
    fn from(key: String) -> Self {
        Self {
            key,
            numeric: false,
        }
    }
}

impl PartialEq for StageId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for StageId {}

impl Hash for StageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.key)
    }
}

impl FromStr for StageId {
    type Err = String;

    /// Canonical integers (`7`, not `07`) parse as numeric ids.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Stage id must not be empty".to_string());
        }
        match s.parse::<i64>() {
            Ok(n) if n.to_string() == s => Ok(Self::from(n)),
            _ => Ok(Self::from(s)),
        }
    }
}

impl Serialize for StageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_i64() {
            Some(n) if self.numeric => serializer.serialize_i64(n),
            _ => serializer.serialize_str(&self.key),
        }
    }
}

impl<'de> Deserialize<'de> for StageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Int(i64),
            Text(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Int(n) => Ok(Self::from(n)),
            Wire::Text(s) if s.trim().is_empty() => {
                Err(de::Error::custom("stage id must not be empty"))
            }
            Wire::Text(s) => Ok(Self::from(s)),
        }
    }
}

/// Resolve the two spellings of a stage reference. `stageId` wins when a
/// payload carries both.
fn pick_stage(stage_id: Option<StageId>, pipeline_id: Option<StageId>) -> Option<StageId> {
    stage_id.or(pipeline_id)
}

/// Identifier of a lead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub String);

impl LeadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LeadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Marks a stage whose entry requires a capture form before the move commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormType {
    #[default]
    None,
    Converted,
    Lost,
    Junk,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Converted => "CONVERTED",
            Self::Lost => "LOST",
            Self::Junk => "JUNK",
        }
    }

    pub fn requires_form(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "NONE" => Ok(Self::None),
            "CONVERTED" => Ok(Self::Converted),
            "LOST" => Ok(Self::Lost),
            "JUNK" => Ok(Self::Junk),
            _ => Err(format!("Invalid form type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    #[serde(default)]
    pub form_type: FormType,
    #[serde(default)]
    pub position: i32,
}

impl Stage {
    /// Stage with an integer id, positioned by that id (saturating).
    pub fn new(id: i64, name: &str, form_type: FormType) -> Self {
        Self {
            id: StageId::from(id),
            name: name.to_string(),
            form_type,
            position: i32::try_from(id).unwrap_or(if id < 0 { i32::MIN } else { i32::MAX }),
        }
    }
}

/// The default sales funnel seeded for a new company.
pub const DEFAULT_FUNNEL: &[(&str, FormType)] = &[
    ("New", FormType::None),
    ("Contacted", FormType::None),
    ("Qualified", FormType::None),
    ("Converted", FormType::Converted),
    ("Lost", FormType::Lost),
    ("Junk", FormType::Junk),
];

/// Fields captured by the terminal-stage forms.
///
/// Everything is optional: a lead only carries the fields of the forms it has
/// passed through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_quotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signup_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_proof: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_for_lost: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_for_junk: Option<String>,
}

impl CaptureFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay every field set in `other` onto `self`.
    pub fn merge(&mut self, other: CaptureFields) {
        fn take<T>(dst: &mut Option<T>, src: Option<T>) {
            if src.is_some() {
                *dst = src;
            }
        }
        take(&mut self.final_quotation, other.final_quotation);
        take(&mut self.signup_amount, other.signup_amount);
        take(&mut self.payment_date, other.payment_date);
        take(&mut self.payment_mode, other.payment_mode);
        take(&mut self.pan_number, other.pan_number);
        take(&mut self.project_timeline, other.project_timeline);
        take(&mut self.discount, other.discount);
        take(&mut self.payment_proof, other.payment_proof);
        take(&mut self.booking_form, other.booking_form);
        take(&mut self.reason_for_lost, other.reason_for_lost);
        take(&mut self.reason_for_junk, other.reason_for_junk);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawLead")]
pub struct Lead {
    pub lead_id: LeadId,
    pub stage_id: StageId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_sales_rep: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_designer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub capture: CaptureFields,
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Build a lead from creation input, stamped now.
    pub fn from_new(lead_id: LeadId, stage_id: StageId, new: NewLead) -> Self {
        let now = Utc::now();
        Self {
            lead_id,
            stage_id,
            name: new.name,
            phone: new.phone,
            email: new.email,
            budget: new.budget,
            source: new.source,
            assigned_sales_rep: new.assigned_sales_rep,
            assigned_designer: new.assigned_designer,
            notes: new.notes,
            capture: CaptureFields::default(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lead as it arrives on the wire. Older payloads name the stage
/// `pipelineId`, newer ones `stageId`, some both.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLead {
    lead_id: LeadId,
    #[serde(default)]
    stage_id: Option<StageId>,
    #[serde(default)]
    pipeline_id: Option<StageId>,
    name: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    budget: Option<f64>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    assigned_sales_rep: Option<String>,
    #[serde(default)]
    assigned_designer: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(flatten)]
    capture: CaptureFields,
    #[serde(default)]
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RawLead> for Lead {
    type Error = String;

    fn try_from(raw: RawLead) -> Result<Self, Self::Error> {
        let stage_id = pick_stage(raw.stage_id, raw.pipeline_id)
            .ok_or_else(|| format!("lead {} has neither stageId nor pipelineId", raw.lead_id))?;
        Ok(Self {
            lead_id: raw.lead_id,
            stage_id,
            name: raw.name,
            phone: raw.phone,
            email: raw.email,
            budget: raw.budget,
            source: raw.source,
            assigned_sales_rep: raw.assigned_sales_rep,
            assigned_designer: raw.assigned_designer,
            notes: raw.notes,
            capture: raw.capture,
            version: raw.version,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }
}

/// Input for creating a lead (the Add-Lead form).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawNewLead")]
pub struct NewLead {
    pub name: String,
    /// Defaults to the fallback stage when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<StageId>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub assigned_sales_rep: Option<String>,
    #[serde(default)]
    pub assigned_designer: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNewLead {
    name: String,
    #[serde(default)]
    stage_id: Option<StageId>,
    #[serde(default)]
    pipeline_id: Option<StageId>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    budget: Option<f64>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    assigned_sales_rep: Option<String>,
    #[serde(default)]
    assigned_designer: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

impl From<RawNewLead> for NewLead {
    fn from(raw: RawNewLead) -> Self {
        Self {
            name: raw.name,
            stage_id: pick_stage(raw.stage_id, raw.pipeline_id),
            phone: raw.phone,
            email: raw.email,
            budget: raw.budget,
            source: raw.source,
            assigned_sales_rep: raw.assigned_sales_rep,
            assigned_designer: raw.assigned_designer,
            notes: raw.notes,
        }
    }
}

// API payload types

/// Body of `PUT /api/leads/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    #[serde(flatten)]
    pub lead: Lead,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i64>,
}

/// Body of `POST /api/leads/move`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawMoveLeadRequest")]
pub struct MoveLeadRequest {
    pub lead_id: LeadId,
    pub new_stage_id: StageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMoveLeadRequest {
    lead_id: LeadId,
    #[serde(default)]
    new_stage_id: Option<StageId>,
    #[serde(default)]
    new_pipeline_id: Option<StageId>,
    #[serde(default)]
    expected_version: Option<i64>,
}

impl TryFrom<RawMoveLeadRequest> for MoveLeadRequest {
    type Error = String;

    fn try_from(raw: RawMoveLeadRequest) -> Result<Self, Self::Error> {
        let new_stage_id = pick_stage(raw.new_stage_id, raw.new_pipeline_id)
            .ok_or("missing field `newStageId`")?;
        Ok(Self {
            lead_id: raw.lead_id,
            new_stage_id,
            expected_version: raw.expected_version,
        })
    }
}

/// Error body returned by the backend lead API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
    /// Stored version, set on version conflicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<i64>,
    /// Missing stage, set when a stage id did not resolve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<StageId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_type_round_trips_through_str() {
        for ft in [FormType::None, FormType::Converted, FormType::Lost, FormType::Junk] {
            assert_eq!(FormType::from_str(ft.as_str()).unwrap(), ft);
        }
        assert_eq!(FormType::from_str("lost").unwrap(), FormType::Lost);
        assert!(FormType::from_str("won").is_err());
    }

    #[test]
    fn test_stage_form_type_defaults_to_none() {
        let stage: Stage = serde_json::from_value(serde_json::json!({
            "id": 4,
            "name": "Qualified"
        }))
        .unwrap();
        assert_eq!(stage.form_type, FormType::None);
        assert!(!stage.form_type.requires_form());
    }

    #[test]
    fn test_lead_accepts_legacy_pipeline_id() {
        let lead: Lead = serde_json::from_value(serde_json::json!({
            "leadId": "L1",
            "pipelineId": 3,
            "name": "Asha Rao",
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(lead.stage_id, StageId::from(3));
        assert_eq!(lead.version, 0);

        let out = serde_json::to_value(&lead).unwrap();
        assert_eq!(out["stageId"], 3);
        assert!(out.get("pipelineId").is_none());
    }

    fn lead_json(stage_keys: serde_json::Value) -> serde_json::Value {
        let mut lead = serde_json::json!({
            "leadId": "L1",
            "name": "Asha Rao",
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        });
        for (k, v) in stage_keys.as_object().unwrap() {
            lead[k] = v.clone();
        }
        lead
    }

    #[test]
    fn test_lead_with_both_stage_keys_prefers_stage_id() {
        let lead: Lead =
            serde_json::from_value(lead_json(serde_json::json!({"stageId": 3, "pipelineId": 3})))
                .unwrap();
        assert_eq!(lead.stage_id, StageId::from(3));

        let lead: Lead =
            serde_json::from_value(lead_json(serde_json::json!({"stageId": 4, "pipelineId": 2})))
                .unwrap();
        assert_eq!(lead.stage_id, StageId::from(4));
    }

    #[test]
    fn test_lead_without_stage_is_rejected() {
        let err = serde_json::from_value::<Lead>(lead_json(serde_json::json!({}))).unwrap_err();
        assert!(err.to_string().contains("neither stageId nor pipelineId"), "{}", err);
    }

    #[test]
    fn test_new_lead_and_move_accept_either_stage_key() {
        let new: NewLead = serde_json::from_value(serde_json::json!({
            "name": "Asha",
            "stageId": "PIPE002",
            "pipelineId": "PIPE009"
        }))
        .unwrap();
        assert_eq!(new.stage_id, Some(StageId::from("PIPE002")));
        let new: NewLead =
            serde_json::from_value(serde_json::json!({"name": "Asha", "pipelineId": 5})).unwrap();
        assert_eq!(new.stage_id, Some(StageId::from(5)));

        let req: MoveLeadRequest = serde_json::from_value(serde_json::json!({
            "leadId": "L1",
            "newStageId": 2,
            "newPipelineId": 2
        }))
        .unwrap();
        assert_eq!(req.new_stage_id, StageId::from(2));
        assert!(
            serde_json::from_value::<MoveLeadRequest>(serde_json::json!({"leadId": "L1"})).is_err()
        );
    }

    #[test]
    fn test_text_stage_ids_keep_their_wire_form() {
        let stage: Stage =
            serde_json::from_value(serde_json::json!({"id": "PIPE001", "name": "New"})).unwrap();
        assert_eq!(stage.id.as_str(), "PIPE001");
        assert_eq!(stage.id.as_i64(), None);
        assert_eq!(serde_json::to_value(&stage).unwrap()["id"], "PIPE001");

        // A numeric-looking text id stays text on the way out.
        let quoted: StageId = serde_json::from_value(serde_json::json!("3")).unwrap();
        assert_eq!(serde_json::to_value(&quoted).unwrap(), serde_json::json!("3"));
        assert_eq!(serde_json::to_value(StageId::from(3)).unwrap(), serde_json::json!(3));
        assert_eq!(quoted, StageId::from(3));

        assert!(serde_json::from_value::<StageId>(serde_json::json!("  ")).is_err());
    }

    #[test]
    fn test_stage_id_from_str() {
        assert_eq!(StageId::from_str(" 7 ").unwrap(), StageId::from(7));
        assert_eq!(StageId::from_str("PIPE001").unwrap().as_str(), "PIPE001");
        assert_eq!(StageId::from_str("07").unwrap().as_str(), "07");
        assert!(StageId::from_str("").is_err());
        assert_eq!(format!("{:>4}", StageId::from(2)), "   2");
    }

    #[test]
    fn test_stage_position_saturates() {
        assert_eq!(Stage::new(3, "Qualified", FormType::None).position, 3);
        let far = Stage::new(i64::from(i32::MAX) + 10, "Far", FormType::None);
        assert_eq!(far.position, i32::MAX);
        assert_eq!(far.id.as_i64(), Some(i64::from(i32::MAX) + 10));
        assert_eq!(Stage::new(i64::MIN, "Low", FormType::None).position, i32::MIN);
    }

    #[test]
    fn test_capture_fields_flatten_into_lead_json() {
        let mut lead = Lead::from_new(LeadId::new("L9"), StageId::from(1), NewLead {
            name: "Vikram".into(),
            ..Default::default()
        });
        lead.capture.final_quotation = Some(100000.0);
        let out = serde_json::to_value(&lead).unwrap();
        assert_eq!(out["finalQuotation"], 100000.0);
        assert!(out.get("reasonForLost").is_none());
    }

    #[test]
    fn test_capture_merge_keeps_existing_fields() {
        let mut base = CaptureFields {
            final_quotation: Some(5.0),
            payment_mode: Some("UPI".into()),
            ..Default::default()
        };
        base.merge(CaptureFields {
            final_quotation: Some(7.0),
            reason_for_lost: Some("Budget".into()),
            ..Default::default()
        });
        assert_eq!(base.final_quotation, Some(7.0));
        assert_eq!(base.payment_mode.as_deref(), Some("UPI"));
        assert_eq!(base.reason_for_lost.as_deref(), Some("Budget"));
        assert!(!base.is_empty());
        assert!(CaptureFields::default().is_empty());
    }
}
