use super::{EmailMessage, EmailProvider, ProviderError, ProviderResponse};
use crate::config::{SendGridConfig, SiteConfig};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;
use service_core::observability::TracedClientExt;

/// SendGrid v3 `mail/send`.
pub struct SendGridProvider {
    client: reqwest::Client,
    config: SendGridConfig,
    from_email: String,
    from_name: String,
}

impl SendGridProvider {
    pub fn new(config: SendGridConfig, site: &SiteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            from_email: site.from_email.clone(),
            from_name: site.from_name.clone(),
        }
    }

    fn payload(&self, email: &EmailMessage) -> serde_json::Value {
        let mut payload = json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": self.from_email, "name": self.from_name },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.body_text },
                { "type": "text/html", "value": email.body_html },
            ],
        });
        if let Some(reply_to) = &email.reply_to {
            payload["reply_to"] = json!({ "email": reply_to });
        }
        payload
    }
}

#[async_trait]
impl EmailProvider for SendGridProvider {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.is_enabled() {
            return Err(ProviderError::NotEnabled("SendGrid API key not set".into()));
        }

        let url = format!("{}/mail/send", self.config.api_base_url.trim_end_matches('/'));
        let response = self
            .client
            .traced_post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&self.payload(email))
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let message_id = response
                .headers()
                .get("x-message-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            tracing::info!(to = %email.to, subject = %email.subject, "Email sent via SendGrid");
            return Ok(ProviderResponse::new("sendgrid", message_id));
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/errors/0/message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);

        Err(match status.as_u16() {
            401 | 403 => ProviderError::Authentication(detail),
            429 => ProviderError::RateLimited(detail),
            _ => ProviderError::SendFailed(format!("SendGrid returned {}: {}", status, detail)),
        })
    }
}
