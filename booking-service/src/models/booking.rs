//! Bookings for villas, adventures and transportation.

use super::{
    clean, deserialize_string_or_number, deserialize_tags, deserialize_trimmed, normalize_form_data,
    ClientInfo,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingType {
    #[default]
    Villa,
    Adventure,
    Transportation,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Villa => "villa",
            Self::Adventure => "adventure",
            Self::Transportation => "transportation",
        }
    }

    /// Display label used in email subjects.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Villa => "Villa",
            Self::Adventure => "Adventure",
            Self::Transportation => "Transportation",
        }
    }

    /// Villas are priced per night and need at least one.
    pub fn requires_overnight(&self) -> bool {
        matches!(self, Self::Villa)
    }
}

impl std::fmt::Display for BookingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment status. Transitions out of `Pending` are driven by Stripe events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub booking_type: String,
    pub listing_id: Option<String>,
    pub item_name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub guests: i32,
    pub total_amount: Decimal,
    pub currency: String,
    pub special_requests: Option<String>,
    pub status: String,
    pub payment_intent_id: Option<String>,
    pub payment_method: Option<String>,
    pub source: String,
    pub form_name: Option<String>,
    pub form_data: serde_json::Value,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub referrer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn parsed_type(&self) -> Option<BookingType> {
        match self.booking_type.as_str() {
            "villa" => Some(BookingType::Villa),
            "adventure" => Some(BookingType::Adventure),
            "transportation" => Some(BookingType::Transportation),
            _ => None,
        }
    }

    pub fn parsed_status(&self) -> Option<BookingStatus> {
        BookingStatus::parse(&self.status)
    }

    /// Short human-facing reference, e.g. `CABO-1A2B3C4D`.
    pub fn confirmation_number(&self) -> String {
        let simple = self.id.simple().to_string();
        format!("CABO-{}", simple[..8].to_uppercase())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_booking_request", skip_on_field_errors = false))]
pub struct CreateBookingRequest {
    #[serde(default)]
    pub booking_type: BookingType,
    #[serde(default, alias = "villaId", deserialize_with = "deserialize_string_or_number")]
    pub listing_id: Option<String>,
    #[serde(alias = "adventureName", alias = "villaName")]
    #[validate(length(max = 255))]
    pub item_name: Option<String>,
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 2, max = 100, message = "First name must be at least 2 characters"))]
    pub first_name: String,
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 2, max = 100, message = "Last name must be at least 2 characters"))]
    pub last_name: String,
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 10, max = 50, message = "Phone number must be at least 10 digits"))]
    pub phone: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 1, max = 100, message = "At least one guest is required"))]
    pub guests: i32,
    pub total_amount: Decimal,
    #[validate(length(max = 2000))]
    pub special_requests: Option<String>,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(max = 100))]
    pub form_name: Option<String>,
    #[serde(default)]
    pub form_data: serde_json::Value,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

/// Cross-field checks: date ordering, nights for villas, non-negative total.
fn validate_booking_request(req: &CreateBookingRequest) -> Result<(), ValidationError> {
    check_date_range(req.booking_type, req.start_date, req.end_date)?;

    if req.total_amount.is_sign_negative() {
        let mut err = ValidationError::new("negative_amount");
        err.message = Some("Total amount cannot be negative".into());
        return Err(err);
    }

    Ok(())
}

/// Rejects an end date before the start date, and same-day villa stays.
pub fn check_date_range(
    booking_type: BookingType,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), ValidationError> {
    if end < start {
        let mut err = ValidationError::new("end_before_start");
        err.message = Some("End date must not be before start date".into());
        return Err(err);
    }

    if booking_type.requires_overnight() && end == start {
        let mut err = ValidationError::new("zero_nights");
        err.message = Some("Villa stays must be at least one night".into());
        return Err(err);
    }

    Ok(())
}

/// Validated, normalized booking ready for insertion.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub booking_type: BookingType,
    pub listing_id: Option<String>,
    pub item_name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub guests: i32,
    pub total_amount: Decimal,
    pub currency: String,
    pub special_requests: Option<String>,
    pub status: BookingStatus,
    pub payment_intent_id: Option<String>,
    pub payment_method: Option<String>,
    pub source: String,
    pub form_name: Option<String>,
    pub form_data: serde_json::Value,
    pub tags: Vec<String>,
    pub referrer: Option<String>,
}

impl NewBooking {
    pub fn from_request(req: CreateBookingRequest, client: ClientInfo) -> Self {
        let form_name = clean(req.form_name)
            .or_else(|| Some(format!("{}_booking", req.booking_type.as_str())));

        Self {
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            phone: req.phone.trim().to_string(),
            booking_type: req.booking_type,
            listing_id: req.listing_id,
            item_name: clean(req.item_name),
            start_date: req.start_date,
            end_date: req.end_date,
            guests: req.guests,
            total_amount: req.total_amount.round_dp(2),
            currency: "USD".to_string(),
            special_requests: clean(req.special_requests),
            status: BookingStatus::Pending,
            payment_intent_id: None,
            payment_method: clean(req.payment_method),
            source: "website".to_string(),
            form_name,
            form_data: normalize_form_data(req.form_data),
            tags: req.tags,
            referrer: client.referrer,
        }
    }

    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}
