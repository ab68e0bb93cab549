//! Commit step: persist a lead's move to a new stage.

use chrono::Utc;

use super::models::{CaptureFields, Lead, StageId};
use crate::errors::PipelineResult;
use crate::session::Session;
use crate::store::LeadStore;

/// Persist `lead` into `new_stage_id`, carrying any captured form fields.
///
/// A bare move goes through `move_lead`; a move with captured fields needs
/// the full record, so it goes through `update_lead`. Either way the lead's
/// current version is sent as the expected version, and the returned lead is
/// the store's acknowledged record.
pub async fn commit(
    store: &dyn LeadStore,
    session: &Session,
    lead: &Lead,
    new_stage_id: StageId,
    extra: CaptureFields,
) -> PipelineResult<Lead> {
    let expected = Some(lead.version);
    let from = lead.stage_id.clone();

    let saved = if extra.is_empty() {
        store
            .move_lead(session, &lead.lead_id, new_stage_id, expected)
            .await?
    } else {
        let mut updated = lead.clone();
        updated.capture.merge(extra);
        updated.stage_id = new_stage_id;
        updated.updated_at = Utc::now();
        store.update_lead(session, &updated, expected).await?
    };

    tracing::info!(
        lead_id = %saved.lead_id,
        from = %from,
        to = %saved.stage_id,
        version = saved.version,
        "Lead moved"
    );
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::models::{FormType, NewLead, Stage};
    use crate::store::MemoryStore;

    async fn setup() -> (MemoryStore, Session, Lead) {
        let store = MemoryStore::new();
        store
            .set_stages(
                "acme",
                vec![
                    Stage::new(1, "New", FormType::None),
                    Stage::new(2, "Contacted", FormType::None),
                    Stage::new(3, "Lost", FormType::Lost),
                ],
            )
            .await;
        let session = Session::new("acme");
        let lead = store
            .create_lead(&session, NewLead {
                name: "Asha".into(),
                notes: Some("call after 5".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        (store, session, lead)
    }

    #[tokio::test]
    async fn test_plain_move_changes_only_stage() {
        let (store, session, lead) = setup().await;
        let saved = commit(&store, &session, &lead, StageId::from(2), CaptureFields::default())
            .await
            .unwrap();
        assert_eq!(saved.stage_id, StageId::from(2));
        assert_eq!(saved.notes.as_deref(), Some("call after 5"));
        assert!(saved.capture.is_empty());
        assert_eq!(saved.version, lead.version + 1);
    }

    #[tokio::test]
    async fn test_captured_fields_are_merged_and_persisted() {
        let (store, session, lead) = setup().await;
        let extra = CaptureFields {
            reason_for_lost: Some("Budget".into()),
            ..Default::default()
        };
        let saved = commit(&store, &session, &lead, StageId::from(3), extra).await.unwrap();
        assert_eq!(saved.stage_id, StageId::from(3));
        assert_eq!(saved.capture.reason_for_lost.as_deref(), Some("Budget"));

        let stored = store.get_lead("acme", &lead.lead_id).await.unwrap();
        assert_eq!(stored, saved);
    }

    #[tokio::test]
    async fn test_stale_snapshot_conflicts() {
        let (store, session, lead) = setup().await;
        commit(&store, &session, &lead, StageId::from(2), CaptureFields::default())
            .await
            .unwrap();

        // Same snapshot again: its version is now behind the store.
        let extra = CaptureFields {
            reason_for_lost: Some("Budget".into()),
            ..Default::default()
        };
        let err = commit(&store, &session, &lead, StageId::from(3), extra)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        let stored = store.get_lead("acme", &lead.lead_id).await.unwrap();
        assert_eq!(stored.stage_id, StageId::from(2));
        assert!(stored.capture.is_empty());
    }
}
