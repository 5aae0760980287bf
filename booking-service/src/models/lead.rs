//! Leads: contact requests from the interest, partner and concierge forms.

use super::{clean, deserialize_tags, deserialize_trimmed, normalize_form_data, ClientInfo, ContactMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Stored lead. Leads are append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub interest_type: String,
    pub source: String,
    pub status: String,
    pub priority: String,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub message: Option<String>,
    pub form_name: Option<String>,
    pub form_data: serde_json::Value,
    pub tags: Vec<String>,
    pub preferred_contact_method: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

fn default_interest_type() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 7, max = 50, message = "Phone number looks too short"))]
    pub phone: Option<String>,
    #[serde(default = "default_interest_type", deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 1, max = 50, message = "Interest type is required"))]
    pub interest_type: String,
    #[validate(length(max = 100))]
    pub source: Option<String>,
    #[validate(length(max = 100))]
    pub budget: Option<String>,
    #[validate(length(max = 100))]
    pub timeline: Option<String>,
    #[validate(length(max = 5000))]
    pub message: Option<String>,
    #[validate(length(max = 100))]
    pub form_name: Option<String>,
    #[serde(default)]
    pub form_data: serde_json::Value,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    pub preferred_contact_method: Option<ContactMethod>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

/// Validated, normalized lead ready for insertion.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub interest_type: String,
    pub source: String,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub message: Option<String>,
    pub form_name: Option<String>,
    pub form_data: serde_json::Value,
    pub tags: Vec<String>,
    pub preferred_contact_method: Option<ContactMethod>,
    pub client: ClientInfo,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

impl NewLead {
    pub fn from_request(req: CreateLeadRequest, client: ClientInfo) -> Self {
        Self {
            first_name: req.first_name.trim().to_string(),
            last_name: clean(req.last_name),
            email: req.email.trim().to_lowercase(),
            phone: clean(req.phone),
            interest_type: req.interest_type.trim().to_lowercase(),
            source: clean(req.source).unwrap_or_else(|| "website".to_string()),
            budget: clean(req.budget),
            timeline: clean(req.timeline),
            message: clean(req.message),
            form_name: clean(req.form_name),
            form_data: normalize_form_data(req.form_data),
            tags: req.tags,
            preferred_contact_method: req.preferred_contact_method,
            client,
            utm_source: clean(req.utm_source),
            utm_medium: clean(req.utm_medium),
            utm_campaign: clean(req.utm_campaign),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> CreateLeadRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn valid_lead_passes() {
        let req = request(serde_json::json!({
            "firstName": "Ana",
            "email": "ana@example.com",
            "interestType": "villa",
            "tags": "vip,family"
        }));
        assert!(req.validate().is_ok());
        assert_eq!(req.tags, vec!["vip", "family"]);
    }

    #[test]
    fn malformed_email_is_rejected() {
        for email in ["not-an-email", "missing@", "@nouser.com", "two@@example.com", ""] {
            let req = request(serde_json::json!({ "firstName": "Ana", "email": email }));
            let errors = req.validate().unwrap_err();
            assert!(
                errors.field_errors().contains_key("email"),
                "{email} should be rejected"
            );
        }
    }

    #[test]
    fn short_phone_is_rejected_but_absent_phone_is_fine() {
        let req = request(serde_json::json!({
            "firstName": "Ana", "email": "ana@example.com", "phone": "123"
        }));
        assert!(req.validate().is_err());

        let req = request(serde_json::json!({ "firstName": "Ana", "email": "ana@example.com" }));
        assert!(req.validate().is_ok());
        assert_eq!(req.interest_type, "general");
    }

    #[test]
    fn normalization_lowercases_email_and_defaults_source() {
        let req = request(serde_json::json!({
            "firstName": " Ana ",
            "lastName": "  ",
            "email": "Ana@Example.COM",
            "interestType": "Villa"
        }));
        let lead = NewLead::from_request(req, ClientInfo::default());
        assert_eq!(lead.first_name, "Ana");
        assert_eq!(lead.last_name, None);
        assert_eq!(lead.email, "ana@example.com");
        assert_eq!(lead.interest_type, "villa");
        assert_eq!(lead.source, "website");
        assert_eq!(lead.form_data, serde_json::json!({}));
    }

    #[test]
    fn whitespace_only_name_and_interest_are_rejected() {
        let req = request(serde_json::json!({
            "firstName": "   ",
            "email": " ana@example.com ",
            "interestType": "  \t "
        }));
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("first_name"));
        assert!(fields.contains_key("interest_type"));
        assert!(!fields.contains_key("email"));
    }

    #[test]
    fn unknown_contact_method_fails_to_parse() {
        let parsed: Result<CreateLeadRequest, _> = serde_json::from_value(serde_json::json!({
            "firstName": "Ana",
            "email": "ana@example.com",
            "preferredContactMethod": "carrier-pigeon"
        }));
        assert!(parsed.is_err());
    }
}
