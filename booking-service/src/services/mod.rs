pub mod active_campaign;
pub mod airtable;
pub mod database;
pub mod email;
pub mod metrics;
pub mod stripe;
pub mod submissions;
pub mod trackhs;
pub mod webhooks;

pub use active_campaign::ActiveCampaignClient;
pub use airtable::AirtableClient;
pub use database::Database;
pub use email::{EmailComposer, EmailMessage, EmailProvider};
pub use metrics::{get_metrics, init_metrics};
pub use stripe::StripeClient;
pub use submissions::Forwarder;
pub use trackhs::TrackHsClient;
pub use webhooks::WebhookDispatcher;

use thiserror::Error;

/// Failure talking to a third-party API.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl IntegrationError {
    /// Worth retrying: transport failures, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            IntegrationError::Http(_) => true,
            IntegrationError::Api { status, .. } => *status == 429 || *status >= 500,
            IntegrationError::NotConfigured(_) | IntegrationError::Decode(_) => false,
        }
    }
}

/// Read a non-2xx response into an [`IntegrationError::Api`].
pub(crate) async fn api_error(response: reqwest::Response) -> IntegrationError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.pointer("/message"))
                .or_else(|| v.pointer("/errors/0/message"))
                .or_else(|| v.pointer("/errors/0/title"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate(&body, 300));

    IntegrationError::Api { status, message }
}

/// Cut `text` to at most `max` characters.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_throttling_and_server_errors_are_transient() {
        let api = |status| IntegrationError::Api {
            status,
            message: String::new(),
        };
        assert!(api(429).is_transient());
        assert!(api(503).is_transient());
        assert!(!api(422).is_transient());
        assert!(!IntegrationError::NotConfigured("stripe").is_transient());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
