//! Admin endpoints that exercise the notification chain with sample data.

use super::email::deliver;
use crate::middleware::AdminContext;
use crate::models::{Booking, BookingStatus, GuideSubmission, Lead, WebhookEvent};
use crate::services::submissions::ForwardReport;
use crate::startup::AppState;
use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::utils::validation::ValidatedJsonOrDefault;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TestNotificationRequest {
    /// Recipient for the test email; defaults to the admin inbox.
    #[validate(email)]
    pub email: Option<String>,
}

fn recipient(state: &AppState, req: TestNotificationRequest) -> String {
    req.email
        .unwrap_or_else(|| state.composer.admin_email().to_string())
}

pub(crate) fn sample_lead(email: &str) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        first_name: "Test".to_string(),
        last_name: Some("Lead".to_string()),
        email: email.to_string(),
        phone: Some("+1-555-123-4567".to_string()),
        interest_type: "villa".to_string(),
        source: "Website - Test".to_string(),
        status: "new".to_string(),
        priority: "normal".to_string(),
        budget: Some("$10,000-$20,000".to_string()),
        timeline: Some("Within 6 months".to_string()),
        message: Some("This is a test lead notification.".to_string()),
        form_name: Some("test-notification".to_string()),
        form_data: json!({ "preferredTimeToContact": "Morning", "numberOfTravelers": 4 }),
        tags: vec!["test".to_string()],
        preferred_contact_method: Some("email".to_string()),
        referrer: None,
        user_agent: None,
        ip_address: None,
        utm_source: None,
        utm_medium: None,
        utm_campaign: None,
        created_at: Utc::now(),
    }
}

pub(crate) fn sample_booking(email: &str) -> Booking {
    let now = Utc::now();
    let start = now.date_naive() + Duration::days(30);
    Booking {
        id: Uuid::new_v4(),
        first_name: "Test".to_string(),
        last_name: "Booking".to_string(),
        email: email.to_string(),
        phone: "+1-555-123-4567".to_string(),
        booking_type: "villa".to_string(),
        listing_id: None,
        item_name: Some("Test Villa".to_string()),
        start_date: start,
        end_date: start + Duration::days(7),
        guests: 4,
        total_amount: Decimal::from(4500),
        currency: "USD".to_string(),
        special_requests: Some("This is a test booking notification.".to_string()),
        status: BookingStatus::Pending.as_str().to_string(),
        payment_intent_id: None,
        payment_method: Some("credit_card".to_string()),
        source: "Website - Test".to_string(),
        form_name: Some("test-notification".to_string()),
        form_data: json!({}),
        tags: vec!["test".to_string()],
        notes: None,
        referrer: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn sample_guide(email: &str, download_link: String) -> GuideSubmission {
    GuideSubmission {
        id: Uuid::new_v4(),
        submission_id: format!("guide-test-{}", Utc::now().timestamp_millis()),
        first_name: "Test".to_string(),
        last_name: Some("Guide".to_string()),
        email: email.to_string(),
        phone: Some("+1-555-123-4567".to_string()),
        guide_type: crate::models::guide::DEFAULT_GUIDE_TYPE.to_string(),
        interest_areas: vec!["Luxury".to_string(), "Beach".to_string()],
        preferred_contact_method: "email".to_string(),
        source: "Website - Test".to_string(),
        form_name: "test-notification".to_string(),
        status: "pending".to_string(),
        tags: vec!["test".to_string()],
        download_link,
        created_at: Utc::now(),
        processed_at: None,
    }
}

async fn test_lead_report(state: &AppState, email: &str) -> ForwardReport {
    let lead = sample_lead(email);
    state
        .forwarder
        .forward_test(
            WebhookEvent::LeadCreated,
            serde_json::to_value(&lead).unwrap_or_default(),
            state.composer.admin_lead_notification(&lead),
        )
        .await
}

async fn test_booking_report(state: &AppState, email: &str) -> ForwardReport {
    let booking = sample_booking(email);
    state
        .forwarder
        .forward_test(
            WebhookEvent::BookingCreated,
            serde_json::to_value(&booking).unwrap_or_default(),
            state.composer.admin_booking_notification(&booking),
        )
        .await
}

async fn test_guide_report(state: &AppState, email: &str) -> ForwardReport {
    let link = state.composer.site_url(&state.config.site.guide_download_path);
    let submission = sample_guide(email, link);
    state
        .forwarder
        .forward_test(
            WebhookEvent::GuideRequested,
            serde_json::to_value(&submission).unwrap_or_default(),
            state.composer.admin_guide_notification(&submission),
        )
        .await
}

/// POST /api/notifications/test-email
pub async fn test_email(
    _admin: AdminContext,
    State(state): State<AppState>,
    ValidatedJsonOrDefault(req): ValidatedJsonOrDefault<TestNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    let to = recipient(&state, req);
    let delivery = deliver(&state, state.composer.test_email(&to, state.email.name())).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Test email sent successfully to {}", to),
        "delivery": delivery,
    })))
}

/// POST /api/notifications/test-lead
pub async fn test_lead(
    _admin: AdminContext,
    State(state): State<AppState>,
    ValidatedJsonOrDefault(req): ValidatedJsonOrDefault<TestNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    let to = recipient(&state, req);
    let report = test_lead_report(&state, &to).await;
    Ok(Json(json!({ "success": true, "report": report })))
}

/// POST /api/notifications/test-booking
pub async fn test_booking(
    _admin: AdminContext,
    State(state): State<AppState>,
    ValidatedJsonOrDefault(req): ValidatedJsonOrDefault<TestNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    let to = recipient(&state, req);
    let report = test_booking_report(&state, &to).await;
    Ok(Json(json!({ "success": true, "report": report })))
}

/// POST /api/notifications/test-guide
pub async fn test_guide(
    _admin: AdminContext,
    State(state): State<AppState>,
    ValidatedJsonOrDefault(req): ValidatedJsonOrDefault<TestNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    let to = recipient(&state, req);
    let report = test_guide_report(&state, &to).await;
    Ok(Json(json!({ "success": true, "report": report })))
}

/// POST /api/notifications/test-all
///
/// A failing test email is reported in the body instead of failing the call.
pub async fn test_all(
    _admin: AdminContext,
    State(state): State<AppState>,
    ValidatedJsonOrDefault(req): ValidatedJsonOrDefault<TestNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    let to = recipient(&state, req);

    let email = match deliver(&state, state.composer.test_email(&to, state.email.name())).await {
        Ok(delivery) => json!({ "sent": true, "delivery": delivery }),
        Err(e) => json!({ "sent": false, "error": e.to_string() }),
    };

    let (lead, booking, guide) = tokio::join!(
        test_lead_report(&state, &to),
        test_booking_report(&state, &to),
        test_guide_report(&state, &to),
    );

    Ok(Json(json!({
        "success": true,
        "message": "All test notifications sent",
        "results": {
            "email": email,
            "lead": lead,
            "booking": booking,
            "guide": guide,
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_booking_is_a_valid_week_long_villa_stay() {
        let booking = sample_booking("ops@example.com");
        assert_eq!(booking.parsed_type(), Some(crate::models::BookingType::Villa));
        assert_eq!((booking.end_date - booking.start_date).num_days(), 7);
        assert_eq!(booking.parsed_status(), Some(BookingStatus::Pending));
        assert!(booking.start_date > Utc::now().date_naive());
    }

    #[test]
    fn sample_records_carry_the_requested_address() {
        assert_eq!(sample_lead("a@example.com").email, "a@example.com");
        let guide = sample_guide("b@example.com", "https://cabo.is/g.pdf".to_string());
        assert_eq!(guide.email, "b@example.com");
        assert_eq!(guide.download_link, "https://cabo.is/g.pdf");
    }

    #[test]
    fn test_request_rejects_malformed_address() {
        let req = TestNotificationRequest {
            email: Some("nope".to_string()),
        };
        assert!(req.validate().is_err());
        assert!(TestNotificationRequest::default().validate().is_ok());
    }
}
