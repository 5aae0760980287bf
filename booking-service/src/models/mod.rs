//! Domain models and request payloads.

pub mod booking;
pub mod guide;
pub mod lead;
pub mod listing;
pub mod webhook;

pub use booking::{Booking, BookingStatus, BookingType, CreateBookingRequest, NewBooking};
pub use guide::{CreateGuideSubmissionRequest, GuideSubmission, NewGuideSubmission};
pub use lead::{CreateLeadRequest, Lead, NewLead};
pub use listing::{CreateListingRequest, Listing, ListingType, SyncedVilla};
pub use webhook::{
    DeliveryFilter, NewDelivery, SetupWebhookRequest, WebhookDelivery, WebhookEvent, WebhookTarget,
};

use serde::{Deserialize, Deserializer, Serialize};

/// How a visitor prefers to be contacted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactMethod {
    #[default]
    Email,
    Phone,
    Both,
}

impl ContactMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Both => "both",
        }
    }
}

/// Accepts tags as a JSON array or a comma-separated string.
pub(crate) fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Csv(String),
    }

    let tags = match Option::<Tags>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Tags::List(list)) => list,
        Some(Tags::Csv(csv)) => csv.split(',').map(str::to_string).collect(),
    };

    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// Strips surrounding whitespace so length rules see the stored value.
pub(crate) fn deserialize_trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

/// Accepts an identifier sent either as a JSON string or number.
pub(crate) fn deserialize_string_or_number<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Id>::deserialize(deserializer)? {
        Some(Id::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Id::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Missing or `null` form metadata is stored as an empty object.
pub(crate) fn normalize_form_data(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Null => serde_json::json!({}),
        other => other,
    }
}

/// Trim an optional free-text field, dropping it when blank.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Request metadata captured alongside a submission.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}
