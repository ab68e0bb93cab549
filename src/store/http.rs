use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::LeadStore;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::models::{
    ApiErrorBody, Lead, LeadId, MoveLeadRequest, NewLead, Stage, StageId, UpdateLeadRequest,
};
use crate::session::{COMPANY_HEADER, EMPLOYEE_HEADER, Session};

/// What a failed call was about, so error bodies map back to typed errors.
enum Subject<'a> {
    Collection,
    Lead {
        id: &'a LeadId,
        expected: Option<i64>,
        target: Option<StageId>,
    },
    Stage(StageId),
}

/// [`LeadStore`] backed by the backend lead API.
#[derive(Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> PipelineResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, session: &Session) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .header(COMPANY_HEADER, &session.company_id);
        if let Some(ref employee) = session.employee_id {
            req = req.header(EMPLOYEE_HEADER, employee);
        }
        if let Some(ref token) = session.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn decode<T: DeserializeOwned>(resp: Response, subject: Subject<'_>) -> PipelineResult<T> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }

        let text = resp.text().await.unwrap_or_default();
        let body: Option<ApiErrorBody> = serde_json::from_str(&text).ok();
        let code = body.as_ref().and_then(|b| b.code.as_deref());
        let reported_stage = body.as_ref().and_then(|b| b.stage_id.clone());
        let err = match (status, code, subject) {
            (StatusCode::CONFLICT, _, Subject::Lead { id, expected, .. }) => {
                PipelineError::VersionConflict {
                    id: id.clone(),
                    expected: expected.unwrap_or_default(),
                    actual: body.as_ref().and_then(|b| b.actual).unwrap_or_default(),
                }
            }
            (
                StatusCode::NOT_FOUND,
                Some("stage_not_found"),
                Subject::Stage(id) | Subject::Lead { target: Some(id), .. },
            ) => PipelineError::StageNotFound {
                id: reported_stage.unwrap_or(id),
            },
            (StatusCode::NOT_FOUND, _, Subject::Stage(id)) => PipelineError::StageNotFound { id },
            (StatusCode::NOT_FOUND, _, Subject::Lead { id, .. }) => {
                PipelineError::LeadNotFound { id: id.clone() }
            }
            _ => PipelineError::Backend {
                status: status.as_u16(),
                message: body.as_ref().map(|b| b.error.clone()).unwrap_or(text),
            },
        };
        tracing::debug!(status = status.as_u16(), error = %err, "Backend call failed");
        Err(err)
    }
}

#[async_trait]
impl LeadStore for HttpStore {
    async fn list_stages(&self, session: &Session) -> PipelineResult<Vec<Stage>> {
        let resp = self
            .request(Method::GET, "/api/stages", session)
            .send()
            .await?;
        Self::decode(resp, Subject::Collection).await
    }

    async fn list_leads(&self, session: &Session) -> PipelineResult<Vec<Lead>> {
        let resp = self
            .request(Method::GET, "/api/leads", session)
            .send()
            .await?;
        Self::decode(resp, Subject::Collection).await
    }

    async fn create_lead(&self, session: &Session, new: NewLead) -> PipelineResult<Lead> {
        let requested = new.stage_id.clone();
        let resp = self
            .request(Method::POST, "/api/leads", session)
            .json(&new)
            .send()
            .await?;
        match requested {
            Some(id) => Self::decode(resp, Subject::Stage(id)).await,
            None => Self::decode(resp, Subject::Collection).await,
        }
    }

    async fn update_lead(
        &self,
        session: &Session,
        lead: &Lead,
        expected_version: Option<i64>,
    ) -> PipelineResult<Lead> {
        let body = UpdateLeadRequest {
            lead: lead.clone(),
            expected_version,
        };
        let resp = self
            .request(
                Method::PUT,
                &format!("/api/leads/{}", lead.lead_id),
                session,
            )
            .json(&body)
            .send()
            .await?;
        Self::decode(resp, Subject::Lead {
            id: &lead.lead_id,
            expected: expected_version,
            target: Some(lead.stage_id.clone()),
        })
        .await
    }

    async fn move_lead(
        &self,
        session: &Session,
        lead_id: &LeadId,
        stage_id: StageId,
        expected_version: Option<i64>,
    ) -> PipelineResult<Lead> {
        let body = MoveLeadRequest {
            lead_id: lead_id.clone(),
            new_stage_id: stage_id.clone(),
            expected_version,
        };
        let resp = self
            .request(Method::POST, "/api/leads/move", session)
            .json(&body)
            .send()
            .await?;
        Self::decode(resp, Subject::Lead {
            id: lead_id,
            expected: expected_version,
            target: Some(stage_id),
        })
        .await
    }
}
