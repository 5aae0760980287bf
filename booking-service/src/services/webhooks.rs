//! Outbound webhook fan-out (Make.com and registered targets).
//!
//! Each event goes to the configured Make URL and to every active target
//! subscribed to it. Every attempt is written to `webhook_deliveries`, and a
//! failed delivery never fails the caller.

use super::truncate;
use crate::config::WebhookConfig;
use crate::models::{NewDelivery, WebhookDelivery, WebhookEvent, WebhookTarget};
use crate::services::metrics::record_integration_call;
use crate::services::Database;
use futures::future::join_all;
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::observability::TracedClientExt;
use service_core::utils::signature::sign_timestamped;
use std::time::Duration;
use uuid::Uuid;

pub const SIGNATURE_HEADER: &str = "X-Cabo-Signature";
pub const EVENT_HEADER: &str = "X-Cabo-Event";
const MAX_RESPONSE_BODY: usize = 2000;

/// Wrap an event's data in the envelope Make.com scenarios route on.
///
/// Object fields stay at the top level next to `event_type`, `webhook_type`
/// and `tracking_id`.
pub fn build_payload(event: WebhookEvent, data: &Value) -> Value {
    let mut payload = match data {
        Value::Object(map) => Value::Object(map.clone()),
        other => json!({ "data": other }),
    };

    let tracking_id = payload
        .get("tracking_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    payload["event_type"] = json!(event.as_str());
    payload["webhook_type"] = json!(event.webhook_type());
    payload["tracking_id"] = json!(tracking_id);
    payload["sent_at"] = json!(chrono::Utc::now().to_rfc3339());
    payload
}

/// Result of a single POST.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub status: Option<i32>,
    pub body: Option<String>,
    pub success: bool,
}

/// Signs and posts webhook payloads.
#[derive(Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
    signing_secret: Option<Secret<String>>,
}

impl WebhookSender {
    pub fn new(config: &WebhookConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            signing_secret: config.signing_secret.clone(),
        }
    }

    /// `t=..,v1=..` over the exact bytes sent, when a secret is configured.
    pub fn signature_for(&self, body: &[u8], timestamp: i64) -> Option<String> {
        let secret = self.signing_secret.as_ref()?;
        match sign_timestamped(secret.expose_secret(), timestamp, body) {
            Ok(signature) => Some(signature),
            Err(e) => {
                tracing::warn!(error = %e, "Webhook signing failed; sending unsigned");
                None
            }
        }
    }

    pub async fn send(
        &self,
        url: &str,
        event: &str,
        auth_header: Option<&str>,
        payload: &Value,
    ) -> Attempt {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                return Attempt {
                    status: None,
                    body: Some(format!("Failed to encode payload: {}", e)),
                    success: false,
                }
            }
        };

        let mut request = self
            .client
            .traced_post(url)
            .header("content-type", "application/json")
            .header(EVENT_HEADER, event);

        if let Some(signature) = self.signature_for(&body, chrono::Utc::now().timestamp()) {
            request = request.header(SIGNATURE_HEADER, &signature);
        }

        if let Some(auth) = auth_header {
            request = request.header("authorization", auth);
        }

        match request.body(body).send().await {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                Attempt {
                    status: Some(i32::from(status.as_u16())),
                    body: Some(truncate(&text, MAX_RESPONSE_BODY)),
                    success: status.is_success(),
                }
            }
            Err(e) => Attempt {
                status: None,
                body: Some(e.to_string()),
                success: false,
            },
        }
    }
}

/// Counts for one fan-out.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DispatchSummary {
    pub tracking_id: String,
    pub attempted: usize,
    pub delivered: usize,
}

struct Destination {
    webhook_id: Option<Uuid>,
    url: String,
    auth_header: Option<String>,
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    db: Database,
    sender: WebhookSender,
    make_url: Option<String>,
}

impl WebhookDispatcher {
    pub fn new(db: Database, config: &WebhookConfig) -> Self {
        Self {
            db,
            sender: WebhookSender::new(config),
            make_url: config.make_url.clone(),
        }
    }

    fn destinations(&self, targets: Vec<WebhookTarget>) -> Vec<Destination> {
        let mut destinations: Vec<Destination> = self
            .make_url
            .iter()
            .map(|url| Destination {
                webhook_id: None,
                url: url.clone(),
                auth_header: None,
            })
            .collect();

        for target in targets {
            if destinations.iter().any(|d| d.url == target.url) {
                continue;
            }
            destinations.push(Destination {
                webhook_id: Some(target.id),
                url: target.url,
                auth_header: target.auth_header,
            });
        }

        destinations
    }

    /// Deliver `data` for `event` to every destination concurrently.
    pub async fn dispatch(&self, event: WebhookEvent, data: &Value) -> DispatchSummary {
        let payload = build_payload(event, data);
        let tracking_id = payload["tracking_id"].as_str().unwrap_or_default().to_string();

        let targets = match self.db.active_webhook_targets(event).await {
            Ok(targets) => targets,
            Err(e) => {
                tracing::warn!(event = %event, error = %e, "Could not load webhook targets");
                Vec::new()
            }
        };

        let destinations = self.destinations(targets);
        if destinations.is_empty() {
            tracing::debug!(event = %event, "No webhook destinations");
            return DispatchSummary {
                tracking_id,
                ..Default::default()
            };
        }

        let attempts = join_all(destinations.iter().map(|d| {
            self.sender
                .send(&d.url, event.as_str(), d.auth_header.as_deref(), &payload)
        }))
        .await;

        let mut delivered = 0;
        for (destination, attempt) in destinations.iter().zip(attempts) {
            record_integration_call("webhook", attempt.success);
            if attempt.success {
                delivered += 1;
            } else {
                tracing::warn!(
                    event = %event,
                    url = %destination.url,
                    status = ?attempt.status,
                    "Webhook delivery failed"
                );
            }

            let delivery = NewDelivery {
                webhook_id: destination.webhook_id,
                target_url: destination.url.clone(),
                event,
                payload: payload.clone(),
                response_status: attempt.status,
                response_body: attempt.body,
                success: attempt.success,
            };
            if let Err(e) = self.db.insert_delivery(&delivery).await {
                tracing::warn!(event = %event, error = %e, "Could not record webhook delivery");
            }
        }

        tracing::info!(
            event = %event,
            tracking_id = %tracking_id,
            attempted = destinations.len(),
            delivered = delivered,
            "Webhook fan-out finished"
        );

        DispatchSummary {
            tracking_id,
            attempted: destinations.len(),
            delivered,
        }
    }

    /// Re-send a logged delivery with its original payload.
    pub async fn retry(&self, delivery_id: Uuid) -> Result<WebhookDelivery, AppError> {
        let delivery = self
            .db
            .get_delivery(delivery_id)
            .await?
            .ok_or_else(|| AppError::not_found("Webhook delivery not found"))?;

        let auth_header = match delivery.webhook_id {
            Some(id) => self
                .db
                .get_webhook_target(id)
                .await?
                .and_then(|t| t.auth_header),
            None => None,
        };

        let attempt = self
            .sender
            .send(
                &delivery.target_url,
                &delivery.event,
                auth_header.as_deref(),
                &delivery.payload,
            )
            .await;
        record_integration_call("webhook", attempt.success);

        tracing::info!(
            delivery_id = %delivery_id,
            success = attempt.success,
            status = ?attempt.status,
            "Webhook delivery retried"
        );

        self.db
            .record_delivery_retry(
                delivery_id,
                attempt.status,
                attempt.body.as_deref(),
                attempt.success,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::utils::signature::verify_timestamped;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn payload_keeps_fields_flat_and_tags_event() {
        let payload = build_payload(
            WebhookEvent::LeadCreated,
            &json!({"email": "ana@example.com", "tracking_id": "abc"}),
        );
        assert_eq!(payload["email"], "ana@example.com");
        assert_eq!(payload["event_type"], "lead.created");
        assert_eq!(payload["webhook_type"], "lead");
        assert_eq!(payload["tracking_id"], "abc");

        let wrapped = build_payload(WebhookEvent::BookingConfirmed, &json!([1, 2]));
        assert_eq!(wrapped["data"], json!([1, 2]));
        assert_eq!(wrapped["webhook_type"], "booking");
        assert!(wrapped["tracking_id"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn signed_delivery_verifies_against_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header_exists("x-cabo-signature"))
            .and(header("x-cabo-event", "guide.requested"))
            .and(header("authorization", "Bearer target-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Accepted"))
            .expect(1)
            .mount(&server)
            .await;

        let sender = WebhookSender::new(&WebhookConfig {
            signing_secret: Some(Secret::new("whsec_out".to_string())),
            ..WebhookConfig::default()
        });
        let payload = json!({"email": "lee@example.com"});
        let attempt = sender
            .send(
                &format!("{}/hook", server.uri()),
                "guide.requested",
                Some("Bearer target-token"),
                &payload,
            )
            .await;

        assert!(attempt.success);
        assert_eq!(attempt.status, Some(200));
        assert_eq!(attempt.body.as_deref(), Some("Accepted"));


        let now = chrono::Utc::now().timestamp();
        let body = serde_json::to_vec(&payload).unwrap();
        let signature = sender.signature_for(&body, now).unwrap();
        assert!(verify_timestamped("whsec_out", &signature, &body, 300, now).is_ok());
        assert!(WebhookSender::new(&WebhookConfig::default())
            .signature_for(&body, now)
            .is_none());
    }

    #[tokio::test]
    async fn failed_delivery_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("scenario error"))
            .mount(&server)
            .await;

        let sender = WebhookSender::new(&WebhookConfig::default());
        let attempt = sender
            .send(&server.uri(), "lead.created", None, &json!({}))
            .await;
        assert!(!attempt.success);
        assert_eq!(attempt.status, Some(500));

        let unreachable = sender
            .send("http://127.0.0.1:9/hook", "lead.created", None, &json!({}))
            .await;
        assert!(!unreachable.success);
        assert_eq!(unreachable.status, None);
    }
}
