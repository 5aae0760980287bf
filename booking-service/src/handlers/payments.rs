//! Stripe payment intents and the Stripe webhook.

use crate::models::{BookingStatus, CreateBookingRequest, NewBooking};
use crate::services::metrics::{record_payment_event, record_submission};
use crate::services::stripe::{CreatePaymentIntent, StripeEvent};
use crate::services::StripeClient;
use crate::startup::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::utils::validation::ValidatedJson;
use tracing::Instrument;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
const DEFAULT_DESCRIPTION: &str = "Cabo Adventure Booking";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    /// Amount in cents.
    pub amount: i64,
    pub description: Option<String>,
    #[serde(alias = "booking")]
    pub booking_data: Option<CreateBookingRequest>,
}

impl Validate for CreatePaymentIntentRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match &self.booking_data {
            Some(booking) => booking.validate(),
            None => Ok(()),
        }
    }
}

/// POST /api/create-payment-intent
///
/// With `bookingData`, a pending booking tied to the new intent is stored
/// too. A booking that fails to insert is logged; the intent still returns.
#[tracing::instrument(skip(state, headers, req), fields(amount = req.amount))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<CreatePaymentIntentRequest>,
) -> Result<Json<Value>, AppError> {
    if !state.stripe.is_configured() {
        return Err(AppError::ServiceUnavailable(
            "Payments are not configured".to_string(),
        ));
    }

    if req.amount < 1 {
        return Err(AppError::bad_request("Valid amount is required"));
    }

    let mut metadata = Vec::new();
    if let Some(booking) = &req.booking_data {
        metadata.push(("booking_type".to_string(), booking.booking_type.to_string()));
        metadata.push(("customer_email".to_string(), booking.email.trim().to_lowercase()));
        if let Some(item) = &booking.item_name {
            metadata.push(("item_name".to_string(), item.clone()));
        }
    }

    let intent = state
        .stripe
        .create_payment_intent(&CreatePaymentIntent {
            amount: req.amount,
            description: req
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            receipt_email: req
                .booking_data
                .as_ref()
                .map(|b| b.email.trim().to_lowercase()),
            metadata,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Stripe payment intent creation failed");
            AppError::BadGateway(format!("Payment provider error: {}", e))
        })?;

    let mut booking_id: Option<Uuid> = None;
    if let Some(booking_req) = req.booking_data {
        let mut new_booking = NewBooking::from_request(booking_req, super::client_info(&headers));
        new_booking.payment_intent_id = Some(intent.id.clone());
        new_booking.total_amount = Decimal::new(req.amount, 2);

        match state.db.insert_booking(&new_booking).await {
            Ok(booking) => {
                record_submission("booking", "ok");
                booking_id = Some(booking.id);
                state.forwarder.spawn_booking(booking);
            }
            Err(e) => {
                record_submission("booking", "error");
                tracing::error!(
                    payment_intent_id = %intent.id,
                    error = %e,
                    "Failed to store booking for payment intent"
                );
            }
        }
    }

    Ok(Json(json!({
        "client_secret": intent.client_secret,
        "booking_id": booking_id,
    })))
}

/// POST /api/stripe-webhook
///
/// Needs the raw body: the signature covers the exact bytes Stripe sent.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            record_payment_event("unknown", "rejected");
            AppError::bad_request("Missing Stripe-Signature header")
        })?;

    if !state.stripe.webhook_secret_configured() {
        tracing::error!("Stripe webhook received but STRIPE_WEBHOOK_SECRET is not set");
        record_payment_event("unknown", "rejected");
        return Err(AppError::bad_request("Webhook signature validation failed"));
    }

    if let Err(e) = state.stripe.verify_webhook_signature(signature, &body) {
        tracing::warn!(error = %e, "Stripe webhook signature rejected");
        record_payment_event("unknown", "rejected");
        return Err(AppError::bad_request(format!(
            "Webhook signature validation failed: {}",
            e
        )));
    }

    let event = StripeClient::parse_event(&body)
        .map_err(|e| AppError::bad_request(format!("Malformed Stripe event: {}", e)))?;
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let span = tracing::info_span!(
        "stripe_event",
        event_id = %event.id,
        event_type = %event.event_type
    );
    process_event(&state, &event, &payload)
        .instrument(span)
        .await?;

    Ok(Json(json!({ "received": true })))
}

/// Dedupe on the event id, apply it, and record the outcome.
async fn process_event(
    state: &AppState,
    event: &StripeEvent,
    payload: &Value,
) -> Result<(), AppError> {
    if !state
        .db
        .record_payment_event(&event.id, &event.event_type, payload)
        .await?
    {
        tracing::info!("Duplicate Stripe event acknowledged");
        record_payment_event(&event.event_type, "duplicate");
        return Ok(());
    }

    match apply_event(state, event).await {
        Ok(outcome) => {
            record_payment_event(&event.event_type, outcome);
            if let Err(e) = state.db.mark_payment_event_processed(&event.id, None).await {
                tracing::warn!(error = %e, "Could not mark Stripe event processed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to apply Stripe event");
            record_payment_event(&event.event_type, "error");
            let message = e.to_string();
            if let Err(e) = state
                .db
                .mark_payment_event_processed(&event.id, Some(&message))
                .await
            {
                tracing::warn!(error = %e, "Could not record Stripe event failure");
            }
        }
    }

    Ok(())
}

/// Move the matching booking and report what happened.
async fn apply_event(state: &AppState, event: &StripeEvent) -> Result<&'static str, AppError> {
    let status = match event.event_type.as_str() {
        "payment_intent.succeeded" => BookingStatus::Confirmed,
        "payment_intent.payment_failed" => BookingStatus::Failed,
        "payment_intent.canceled" => BookingStatus::Cancelled,
        _ => {
            tracing::debug!("Stripe event type not handled");
            return Ok("ignored");
        }
    };

    let Some(payment_intent_id) = event.payment_intent_id() else {
        tracing::warn!("Stripe event carries no payment intent");
        return Ok("ignored");
    };

    let Some(booking) = state
        .db
        .update_booking_status_by_payment_intent(payment_intent_id, status)
        .await?
    else {
        tracing::warn!(
            payment_intent_id = %payment_intent_id,
            "No booking for payment intent"
        );
        return Ok("unmatched");
    };

    match status {
        BookingStatus::Confirmed => {
            tracing::info!(booking_id = %booking.id, "Payment succeeded; booking confirmed");
            state.forwarder.spawn_booking_confirmed(booking);
        }
        BookingStatus::Failed => {
            tracing::warn!(
                booking_id = %booking.id,
                reason = event.failure_message().unwrap_or("unknown"),
                "Payment failed"
            );
        }
        _ => tracing::info!(booking_id = %booking.id, status = %status, "Booking updated"),
    }

    Ok(status.as_str())
}
