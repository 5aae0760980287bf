//! Lead capture and the admin lead views.

use super::{client_info, Pagination};
use crate::middleware::AdminContext;
use crate::models::{CreateLeadRequest, Lead, NewLead};
use crate::services::metrics::record_submission;
use crate::startup::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::utils::validation::ValidatedJson;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LeadFilter {
    pub interest_type: Option<String>,
}

/// POST /api/leads
#[tracing::instrument(skip_all, fields(interest_type = tracing::field::Empty))]
pub async fn create_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<ValidatedJson<CreateLeadRequest>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let ValidatedJson(req) = payload.inspect_err(|_| record_submission("lead", "invalid"))?;
    tracing::Span::current().record("interest_type", req.interest_type.as_str());

    let new_lead = NewLead::from_request(req, client_info(&headers));
    let lead = state
        .db
        .insert_lead(&new_lead)
        .await
        .inspect_err(|_| record_submission("lead", "error"))?;
    record_submission("lead", "ok");

    state.forwarder.spawn_lead(lead.clone());

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "lead": { "id": lead.id, "created_at": lead.created_at }
        })),
    ))
}

/// GET /api/admin/leads
pub async fn list_leads(
    _admin: AdminContext,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
    Query(filter): Query<LeadFilter>,
) -> Result<Json<Value>, AppError> {
    let leads = state
        .db
        .list_leads(filter.interest_type.as_deref(), page.limit, page.offset)
        .await?;

    Ok(Json(json!({ "count": leads.len(), "leads": leads })))
}

/// GET /api/admin/leads/:id
pub async fn get_lead(
    _admin: AdminContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Lead>, AppError> {
    state
        .db
        .get_lead(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Lead not found"))
}
