//! Outbound webhook registration and the delivery log.

use crate::middleware::AdminContext;
use crate::models::{DeliveryFilter, SetupWebhookRequest, WebhookDelivery, WebhookTarget};
use crate::startup::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::utils::validation::ValidatedJson;
use uuid::Uuid;

/// POST /api/webhooks/setup
///
/// Creates a target, or updates the one registered under the same name.
pub async fn setup_webhook(
    _admin: AdminContext,
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SetupWebhookRequest>,
) -> Result<Json<Value>, AppError> {
    let target = state.db.upsert_webhook_target(&req).await?;

    Ok(Json(json!({ "success": true, "webhook": target })))
}

/// GET /api/webhooks
pub async fn list_webhooks(
    _admin: AdminContext,
    State(state): State<AppState>,
) -> Result<Json<Vec<WebhookTarget>>, AppError> {
    Ok(Json(state.db.list_webhook_targets().await?))
}

/// GET /api/admin/webhook-deliveries
pub async fn list_deliveries(
    _admin: AdminContext,
    State(state): State<AppState>,
    Query(filter): Query<DeliveryFilter>,
) -> Result<Json<Value>, AppError> {
    let deliveries = state.db.list_deliveries(&filter).await?;

    Ok(Json(json!({ "count": deliveries.len(), "deliveries": deliveries })))
}

/// POST /api/admin/webhook-retry/:id
pub async fn retry_delivery(
    _admin: AdminContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WebhookDelivery>, AppError> {
    Ok(Json(state.webhooks.retry(id).await?))
}
