//! Outbound webhook targets, events and delivery records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "lead.created")]
    LeadCreated,
    #[serde(rename = "booking.created")]
    BookingCreated,
    #[serde(rename = "booking.confirmed")]
    BookingConfirmed,
    #[serde(rename = "guide.requested")]
    GuideRequested,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 4] = [
        Self::LeadCreated,
        Self::BookingCreated,
        Self::BookingConfirmed,
        Self::GuideRequested,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadCreated => "lead.created",
            Self::BookingCreated => "booking.created",
            Self::BookingConfirmed => "booking.confirmed",
            Self::GuideRequested => "guide.requested",
        }
    }

    /// Coarse kind expected by Make.com scenarios (`lead`, `booking`, `guide`).
    pub fn webhook_type(&self) -> &'static str {
        match self {
            Self::LeadCreated => "lead",
            Self::BookingCreated | Self::BookingConfirmed => "booking",
            Self::GuideRequested => "guide",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == value)
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub service_type: String,
    /// Never echoed back to admins.
    #[serde(skip_serializing)]
    pub auth_header: Option<String>,
    pub is_active: bool,
    pub events: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookTarget {
    pub fn subscribes_to(&self, event: WebhookEvent) -> bool {
        self.is_active && self.events.iter().any(|e| e == event.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Option<Uuid>,
    pub target_url: String,
    pub event: String,
    pub payload: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub attempts: i32,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one delivery attempt, ready to be logged.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub webhook_id: Option<Uuid>,
    pub target_url: String,
    pub event: WebhookEvent,
    pub payload: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub success: bool,
}

fn default_service_type() -> String {
    "make".to_string()
}

fn default_events() -> Vec<String> {
    WebhookEvent::ALL
        .iter()
        .map(|e| e.as_str().to_string())
        .collect()
}

fn default_active() -> bool {
    true
}

fn validate_events(events: &[String]) -> Result<(), ValidationError> {
    if events.is_empty() {
        return Err(ValidationError::new("no_events"));
    }
    if let Some(unknown) = events.iter().find(|e| WebhookEvent::parse(e).is_none()) {
        let mut err = ValidationError::new("unknown_event");
        err.message = Some(format!("Unknown event: {}", unknown).into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetupWebhookRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(url)]
    pub url: String,
    #[serde(default = "default_service_type")]
    #[validate(length(min = 1, max = 50))]
    pub service_type: String,
    pub auth_header: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "default_events")]
    #[validate(custom(function = "validate_events"))]
    pub events: Vec<String>,
}

fn default_limit() -> i64 {
    100
}

/// Query filters for the delivery log.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryFilter {
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub event_type: Option<String>,
    pub webhook_id: Option<Uuid>,
    pub success: Option<bool>,
}

impl Default for DeliveryFilter {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            event_type: None,
            webhook_id: None,
            success: None,
        }
    }
}
