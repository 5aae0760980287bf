//! Admin-only maintenance actions.

use crate::middleware::AdminContext;
use crate::services::IntegrationError;
use crate::startup::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use service_core::error::AppError;

/// POST /api/admin/villas/sync
///
/// Runs one TrackHS sync inline and returns the counts.
pub async fn sync_villas(
    _admin: AdminContext,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let report = state
        .trackhs
        .sync_villas(&state.db)
        .await
        .map_err(|e| match e {
            IntegrationError::NotConfigured(name) => {
                AppError::ServiceUnavailable(format!("{} is not configured", name))
            }
            other => AppError::BadGateway(format!("TrackHS sync failed: {}", other)),
        })?;

    Ok(Json(json!({ "success": true, "report": report })))
}
