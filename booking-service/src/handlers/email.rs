//! On-demand transactional emails.

use crate::middleware::AdminContext;
use crate::services::email::{EmailMessage, ProviderError};
use crate::services::metrics::record_integration_call;
use crate::startup::AppState;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::utils::validation::ValidatedJson;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SendBookingConfirmationRequest {
    #[serde(alias = "bookingId")]
    pub booking_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendLeadNotificationRequest {
    #[serde(alias = "leadId")]
    pub lead_id: Uuid,
}

/// Send a rendered message through the configured provider chain.
///
/// 503 when no provider is enabled, 502 when every provider refused it.
pub(crate) async fn deliver(
    state: &AppState,
    message: Result<EmailMessage, ProviderError>,
) -> Result<Value, AppError> {
    if !state.email.is_enabled() {
        return Err(AppError::ServiceUnavailable(
            "No email provider is configured".to_string(),
        ));
    }

    let message = message.map_err(|e| AppError::EmailError(e.to_string()))?;
    let result = state.email.send(&message).await;
    record_integration_call("email", result.is_ok());

    let response = result.map_err(|e| {
        tracing::error!(to = %message.to, error = %e, "Email delivery failed");
        AppError::BadGateway(format!("Email delivery failed: {}", e))
    })?;

    tracing::info!(to = %message.to, provider = %response.provider, "Email sent");
    Ok(json!({
        "to": message.to,
        "provider": response.provider,
        "provider_id": response.provider_id,
    }))
}

/// POST /api/email/send-booking-confirmation
///
/// Resends the confirmation for a stored booking to the address on file.
pub async fn send_booking_confirmation(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SendBookingConfirmationRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = state
        .db
        .get_booking(req.booking_id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))?;

    let delivery = deliver(&state, state.composer.booking_confirmation(&booking)).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Booking confirmation email sent successfully",
        "confirmation_number": booking.confirmation_number(),
        "delivery": delivery,
    })))
}

/// POST /api/email/send-lead-notification
pub async fn send_lead_notification(
    _admin: AdminContext,
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SendLeadNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    let lead = state
        .db
        .get_lead(req.lead_id)
        .await?
        .ok_or_else(|| AppError::not_found("Lead not found"))?;

    let delivery = deliver(&state, state.composer.admin_lead_notification(&lead)).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Lead notification sent",
        "delivery": delivery,
    })))
}
