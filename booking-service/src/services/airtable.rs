//! Airtable secondary store.
//!
//! Every persisted submission is mirrored into one of three tables so the
//! sales team can work from a spreadsheet view.

use super::{api_error, IntegrationError};
use crate::config::AirtableConfig;
use crate::models::{Booking, GuideSubmission, Lead};
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Url;
use rust_decimal::prelude::ToPrimitive;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use service_core::observability::TracedClientExt;
use std::time::Duration;

pub const LEADS_TABLE: &str = "Leads";
pub const BOOKINGS_TABLE: &str = "Bookings";
pub const GUIDE_SUBMISSIONS_TABLE: &str = "Guide Submissions";

#[derive(Clone)]
pub struct AirtableClient {
    client: reqwest::Client,
    config: AirtableConfig,
    initial_backoff: Duration,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: String,
}

impl AirtableClient {
    pub fn new(config: AirtableConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            initial_backoff: Duration::from_millis(500),
        }
    }

    /// Shorten the first retry delay; later delays grow from it.
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn table_url(&self, table: &str) -> Result<Url, IntegrationError> {
        let mut url = Url::parse(&self.config.api_base_url)
            .map_err(|e| IntegrationError::Decode(format!("Invalid Airtable URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| IntegrationError::Decode("Airtable URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(&self.config.base_id)
            .push(table);
        Ok(url)
    }

    /// Create one record and return its Airtable id.
    pub async fn create_record(
        &self,
        table: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, IntegrationError> {
        if !self.is_configured() {
            return Err(IntegrationError::NotConfigured("Airtable"));
        }

        let url = self.table_url(table)?;
        let response = self
            .client
            .traced_post(url.as_str())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&json!({ "fields": fields, "typecast": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let record: CreatedRecord = response
            .json()
            .await
            .map_err(|e| IntegrationError::Decode(e.to_string()))?;

        tracing::debug!(table = table, record_id = %record.id, "Airtable record created");
        Ok(record.id)
    }

    /// [`create_record`](Self::create_record) with exponential backoff.
    ///
    /// Only transient failures are retried, at most `max_retries` attempts in
    /// total.
    pub async fn create_record_with_retry(
        &self,
        table: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, IntegrationError> {
        let max_attempts = self.config.max_retries.max(1);
        let policy = ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        let mut attempt = 0u32;
        retry(policy, || {
            attempt += 1;
            let current = attempt;
            async move {
                self.create_record(table, fields).await.map_err(|e| {
                    if e.is_transient() && current < max_attempts {
                        tracing::warn!(
                            table = table,
                            attempt = current,
                            error = %e,
                            "Airtable write failed, retrying"
                        );
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }
}

fn insert_opt(fields: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        fields.insert(key.to_string(), Value::String(v.to_string()));
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn lead_fields(lead: &Lead) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("First Name".into(), json!(lead.first_name));
    insert_opt(&mut fields, "Last Name", lead.last_name.as_deref());
    fields.insert("Email".into(), json!(lead.email));
    insert_opt(&mut fields, "Phone", lead.phone.as_deref());
    fields.insert("Interest Type".into(), json!(lead.interest_type));
    fields.insert("Source Page".into(), json!(lead.source));
    fields.insert("Status".into(), json!("New"));
    fields.insert("Form Data".into(), json!(lead.form_data.to_string()));
    insert_opt(&mut fields, "Notes", lead.message.as_deref());
    insert_opt(&mut fields, "Budget", lead.budget.as_deref());
    insert_opt(&mut fields, "Timeline", lead.timeline.as_deref());
    if !lead.tags.is_empty() {
        fields.insert("Tags".into(), json!(lead.tags.join(", ")));
    }
    fields.insert("Created At".into(), json!(lead.created_at.to_rfc3339()));
    fields.insert("Lead ID".into(), json!(lead.id.to_string()));
    fields
}

pub fn booking_fields(booking: &Booking) -> Map<String, Value> {
    let booking_type = booking
        .parsed_type()
        .map(|t| t.label().to_string())
        .unwrap_or_else(|| capitalize(&booking.booking_type));

    let mut fields = Map::new();
    fields.insert("First Name".into(), json!(booking.first_name));
    fields.insert("Last Name".into(), json!(booking.last_name));
    fields.insert("Email".into(), json!(booking.email));
    fields.insert("Phone".into(), json!(booking.phone));
    fields.insert("Booking Type".into(), json!(booking_type));
    insert_opt(&mut fields, "Item", booking.item_name.as_deref());
    fields.insert("Start Date".into(), json!(booking.start_date.to_string()));
    fields.insert("End Date".into(), json!(booking.end_date.to_string()));
    fields.insert("Guests".into(), json!(booking.guests));
    fields.insert("Status".into(), json!(capitalize(&booking.status)));
    fields.insert(
        "Total Amount".into(),
        json!(booking.total_amount.to_f64().unwrap_or_default()),
    );
    insert_opt(
        &mut fields,
        "Special Requests",
        booking.special_requests.as_deref(),
    );
    fields.insert("Form Data".into(), json!(booking.form_data.to_string()));
    fields.insert("Created At".into(), json!(booking.created_at.to_rfc3339()));
    fields.insert("Booking ID".into(), json!(booking.id.to_string()));
    fields
}

pub fn guide_fields(submission: &GuideSubmission) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("First Name".into(), json!(submission.first_name));
    insert_opt(&mut fields, "Last Name", submission.last_name.as_deref());
    fields.insert("Email".into(), json!(submission.email));
    insert_opt(&mut fields, "Phone", submission.phone.as_deref());
    fields.insert("Guide Type".into(), json!(submission.guide_type));
    fields.insert("Source".into(), json!(submission.source));
    fields.insert("Form Name".into(), json!(submission.form_name));
    fields.insert("Submission ID".into(), json!(submission.submission_id));
    fields.insert("Status".into(), json!("Sent"));
    fields.insert(
        "Created At".into(),
        json!(submission.created_at.to_rfc3339()),
    );
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use secrecy::Secret;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> AirtableConfig {
        AirtableConfig {
            api_key: Secret::new("pat_test".to_string()),
            base_id: "appBASE".to_string(),
            api_base_url: base_url.to_string(),
            max_retries: 3,
        }
    }

    fn client(server: &MockServer) -> AirtableClient {
        AirtableClient::new(config(&server.uri())).with_initial_backoff(Duration::from_millis(5))
    }

    fn sample_booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            first_name: "Maria".into(),
            last_name: "Lopez".into(),
            email: "maria@example.com".into(),
            phone: "+526245550101".into(),
            booking_type: "adventure".into(),
            listing_id: None,
            item_name: Some("Whale Watching".into()),
            start_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            guests: 2,
            total_amount: Decimal::new(25050, 2),
            currency: "USD".into(),
            special_requests: None,
            status: "pending".into(),
            payment_intent_id: None,
            payment_method: None,
            source: "website".into(),
            form_name: Some("adventure_booking".into()),
            form_data: json!({}),
            tags: vec![],
            notes: None,
            referrer: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn booking_fields_use_display_labels() {
        let fields = booking_fields(&sample_booking());
        assert_eq!(fields["Booking Type"], json!("Adventure"));
        assert_eq!(fields["Status"], json!("Pending"));
        assert_eq!(fields["Total Amount"], json!(250.5));
        assert_eq!(fields["Start Date"], json!("2025-02-01"));
        assert!(!fields.contains_key("Special Requests"));
    }

    #[tokio::test]
    async fn posts_to_table_path_with_spaces_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/appBASE/Guide%20Submissions"))
            .and(header("authorization", "Bearer pat_test"))
            .and(body_partial_json(json!({"typecast": true, "fields": {"Email": "a@b.co"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "rec123"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut fields = Map::new();
        fields.insert("Email".into(), json!("a@b.co"));
        let id = client(&server)
            .create_record(GUIDE_SUBMISSIONS_TABLE, &fields)
            .await
            .unwrap();
        assert_eq!(id, "rec123");
    }

    #[tokio::test]
    async fn retries_server_errors_up_to_the_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/appBASE/Leads"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server)
            .create_record_with_retry(LEADS_TABLE, &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrationError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/appBASE/Leads"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "error": {"type": "UNKNOWN_FIELD_NAME", "message": "Unknown field name: \"Foo\""}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .create_record_with_retry(LEADS_TABLE, &Map::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown field name"));
    }
}
