//! Guide download requests.

use super::{clean, deserialize_tags, deserialize_trimmed, ContactMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_GUIDE_TYPE: &str = "Ultimate Cabo Guide 2025";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GuideSubmission {
    pub id: Uuid,
    pub submission_id: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub guide_type: String,
    pub interest_areas: Vec<String>,
    pub preferred_contact_method: String,
    pub source: String,
    pub form_name: String,
    pub status: String,
    pub tags: Vec<String>,
    pub download_link: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

fn default_guide_type() -> String {
    DEFAULT_GUIDE_TYPE.to_string()
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuideSubmissionRequest {
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[serde(default = "default_guide_type", deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 1, max = 255, message = "Guide type is required"))]
    pub guide_type: String,
    #[serde(default)]
    pub interest_areas: Vec<String>,
    #[serde(default)]
    pub preferred_contact_method: ContactMethod,
    #[validate(length(max = 100))]
    pub source: Option<String>,
    #[validate(length(max = 100))]
    pub form_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub submission_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewGuideSubmission {
    pub submission_id: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub guide_type: String,
    pub interest_areas: Vec<String>,
    pub preferred_contact_method: ContactMethod,
    pub source: String,
    pub form_name: String,
    pub tags: Vec<String>,
    pub download_link: String,
}

impl NewGuideSubmission {
    pub fn from_request(req: CreateGuideSubmissionRequest, download_link: String) -> Self {
        Self {
            submission_id: clean(req.submission_id).unwrap_or_else(generate_submission_id),
            first_name: req.first_name.trim().to_string(),
            last_name: clean(req.last_name),
            email: req.email.trim().to_lowercase(),
            phone: clean(req.phone),
            guide_type: req.guide_type.trim().to_string(),
            interest_areas: req
                .interest_areas
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            preferred_contact_method: req.preferred_contact_method,
            source: clean(req.source).unwrap_or_else(|| "website".to_string()),
            form_name: clean(req.form_name).unwrap_or_else(|| "guide-download".to_string()),
            tags: req.tags,
            download_link,
        }
    }
}

/// `guide-<unix millis>-<9 hex chars>`.
fn generate_submission_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("guide-{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_guide_type_and_contact_method() {
        let req: CreateGuideSubmissionRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Lee",
            "email": "lee@example.com"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.guide_type, DEFAULT_GUIDE_TYPE);
        assert_eq!(req.preferred_contact_method, ContactMethod::Email);

        let submission = NewGuideSubmission::from_request(req, "/guides/x.pdf".into());
        assert!(submission.submission_id.starts_with("guide-"));
        assert_eq!(submission.form_name, "guide-download");
        assert_eq!(submission.source, "website");
    }

    #[test]
    fn empty_first_name_and_bad_email_are_rejected() {
        let req: CreateGuideSubmissionRequest = serde_json::from_value(serde_json::json!({
            "firstName": "",
            "email": "lee.example.com"
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("first_name"));
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn whitespace_only_first_name_and_guide_type_are_rejected() {
        let req: CreateGuideSubmissionRequest = serde_json::from_value(serde_json::json!({
            "firstName": "  ",
            "email": "lee@example.com",
            "guideType": "   "
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("first_name"));
        assert!(errors.field_errors().contains_key("guide_type"));
    }

    #[test]
    fn client_supplied_submission_id_is_kept() {
        let req: CreateGuideSubmissionRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Lee",
            "email": "lee@example.com",
            "submissionId": "guide-abc",
            "interestAreas": ["fishing", " ", "golf"]
        }))
        .unwrap();
        let submission = NewGuideSubmission::from_request(req, "/g.pdf".into());
        assert_eq!(submission.submission_id, "guide-abc");
        assert_eq!(submission.interest_areas, vec!["fishing", "golf"]);
    }
}
