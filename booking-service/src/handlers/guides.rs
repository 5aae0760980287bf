//! Guide download requests.

use super::Pagination;
use crate::middleware::AdminContext;
use crate::models::{CreateGuideSubmissionRequest, NewGuideSubmission};
use crate::services::metrics::record_submission;
use crate::startup::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::utils::validation::ValidatedJson;

/// POST /api/guide-submissions
#[tracing::instrument(skip_all, fields(guide_type = tracing::field::Empty))]
pub async fn create_guide_submission(
    State(state): State<AppState>,
    payload: Result<ValidatedJson<CreateGuideSubmissionRequest>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let ValidatedJson(req) = payload.inspect_err(|_| record_submission("guide", "invalid"))?;
    tracing::Span::current().record("guide_type", req.guide_type.as_str());

    let download_url = state.composer.site_url(&state.config.site.guide_download_path);
    let new_submission = NewGuideSubmission::from_request(req, download_url.clone());
    let submission = state
        .db
        .insert_guide_submission(&new_submission)
        .await
        .inspect_err(|_| record_submission("guide", "error"))?;
    record_submission("guide", "ok");

    let submission_id = submission.submission_id.clone();
    state.forwarder.spawn_guide(submission);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "submission_id": submission_id,
            "download_url": download_url,
            "message": "Your guide is ready to download. A copy is on its way to your inbox.",
        })),
    ))
}

/// GET /api/admin/guide-submissions
pub async fn list_guide_submissions(
    _admin: AdminContext,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Value>, AppError> {
    let submissions = state
        .db
        .list_guide_submissions(page.limit, page.offset)
        .await?;

    Ok(Json(json!({ "count": submissions.len(), "submissions": submissions })))
}
