use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        FromRequestParts, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::broadcast;

use super::ws::{WsMessage, broadcast_message};
use crate::errors::PipelineError;
use crate::pipeline::grouping::group_leads_by_stage;
use crate::pipeline::models::{ApiErrorBody, LeadId, MoveLeadRequest, NewLead, UpdateLeadRequest};
use crate::session::{COMPANY_HEADER, DEFAULT_COMPANY};
use crate::store::sqlite::{DbHandle, into_pipeline_error};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub ws_tx: broadcast::Sender<String>,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Default, Deserialize)]
pub struct ListLeadsQuery {
    #[serde(default)]
    pub grouped: bool,
}

// ── Tenant extraction ─────────────────────────────────────────────────

/// Company a request acts for, from the `X-Company-Id` header.
pub struct Company(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Company {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let company = parts
            .headers
            .get(COMPANY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_COMPANY);
        Ok(Company(company.to_string()))
    }
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(ApiErrorBody),
    Conflict(ApiErrorBody),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    fn body(error: String, code: &str) -> ApiErrorBody {
        ApiErrorBody {
            error,
            code: Some(code.to_string()),
            actual: None,
            stage_id: None,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::LeadNotFound { .. } => {
                ApiError::NotFound(Self::body(message, "lead_not_found"))
            }
            PipelineError::StageNotFound { id } => ApiError::NotFound(ApiErrorBody {
                stage_id: Some(id),
                ..Self::body(message, "stage_not_found")
            }),
            PipelineError::VersionConflict { actual, .. } => ApiError::Conflict(ApiErrorBody {
                actual: Some(actual),
                ..Self::body(message, "version_conflict")
            }),
            PipelineError::Invalid(msg) => ApiError::BadRequest(msg),
            other => {
                tracing::error!(error = %other, "Request failed");
                ApiError::Internal(message)
            }
        }
    }
}

/// Malformed or mistyped bodies get the same JSON error shape as every
/// other failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(
            status = %rejection.status(),
            error = %rejection.body_text(),
            "Rejected request body"
        );
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        into_pipeline_error(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(body) => (StatusCode::NOT_FOUND, body),
            ApiError::Conflict(body) => (StatusCode::CONFLICT, body),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Self::body(msg, "invalid")),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, Self::body(msg, "internal")),
        };
        (status, Json(body)).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/stages", get(list_stages))
        .route("/api/leads", get(list_leads).post(create_lead))
        .route("/api/leads/move", post(move_lead))
        .route("/api/leads/{id}", get(get_lead).put(update_lead))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_stages(
    State(state): State<SharedState>,
    Company(company): Company,
) -> Result<impl IntoResponse, ApiError> {
    let stages = state.db.call(move |db| db.list_stages(&company)).await?;
    Ok(Json(stages))
}

async fn list_leads(
    State(state): State<SharedState>,
    Company(company): Company,
    query: Result<Query<ListLeadsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let (stages, leads) = state
        .db
        .call(move |db| Ok((db.list_stages(&company)?, db.list_leads(&company)?)))
        .await?;
    if query.grouped {
        Ok(Json(group_leads_by_stage(&leads, &stages)).into_response())
    } else {
        Ok(Json(leads).into_response())
    }
}

async fn create_lead(
    State(state): State<SharedState>,
    Company(company): Company,
    payload: Result<Json<NewLead>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Lead name is required".into()));
    }
    let tenant = company.clone();
    let lead = state.db.call(move |db| db.create_lead(&tenant, req)).await?;
    tracing::info!(company = %company, lead_id = %lead.lead_id, stage = %lead.stage_id, "Lead created");
    broadcast_message(&state.ws_tx, &WsMessage::LeadCreated {
        company_id: company,
        lead: lead.clone(),
    });
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn get_lead(
    State(state): State<SharedState>,
    Company(company): Company,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lead_id = LeadId::new(id);
    let lookup = lead_id.clone();
    let lead = state.db.call(move |db| db.get_lead(&company, &lookup)).await?;
    match lead {
        Some(lead) => Ok(Json(lead)),
        None => Err(PipelineError::LeadNotFound { id: lead_id }.into()),
    }
}

async fn update_lead(
    State(state): State<SharedState>,
    Company(company): Company,
    Path(id): Path<String>,
    payload: Result<Json<UpdateLeadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    if req.lead.lead_id.as_str() != id {
        return Err(ApiError::BadRequest(format!(
            "Lead id in body ({}) does not match path ({})",
            req.lead.lead_id, id
        )));
    }
    let tenant = company.clone();
    let lead = state
        .db
        .call(move |db| db.update_lead(&tenant, &req.lead, req.expected_version))
        .await?;
    tracing::info!(company = %company, lead_id = %lead.lead_id, version = lead.version, "Lead updated");
    broadcast_message(&state.ws_tx, &WsMessage::LeadUpdated {
        company_id: company,
        lead: lead.clone(),
    });
    Ok(Json(lead))
}

async fn move_lead(
    State(state): State<SharedState>,
    Company(company): Company,
    payload: Result<Json<MoveLeadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let tenant = company.clone();
    let (from_stage_id, lead) = state
        .db
        .call(move |db| {
            // Stage before the move, for the WsMessage.
            let from = db.get_lead(&tenant, &req.lead_id)?.map(|l| l.stage_id);
            let lead = db.move_lead(&tenant, &req.lead_id, req.new_stage_id, req.expected_version)?;
            Ok((from.unwrap_or_else(|| lead.stage_id.clone()), lead))
        })
        .await?;
    tracing::info!(
        company = %company,
        lead_id = %lead.lead_id,
        from = %from_stage_id,
        to = %lead.stage_id,
        "Lead moved"
    );
    broadcast_message(&state.ws_tx, &WsMessage::LeadMoved {
        company_id: company,
        lead_id: lead.lead_id.clone(),
        from_stage_id,
        to_stage_id: lead.stage_id.clone(),
        version: lead.version,
    });
    Ok(Json(lead))
}
