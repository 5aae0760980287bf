//! Stripe client.
//!
//! Creates PaymentIntents over Stripe's form-encoded REST API and verifies
//! signed webhook deliveries.

use super::{api_error, IntegrationError};
use crate::config::StripeConfig;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use service_core::utils::signature::{verify_timestamped, SignatureError};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    config: StripeConfig,
}

/// Parameters for a new PaymentIntent.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntent {
    /// Amount in cents.
    pub amount: i64,
    pub description: String,
    pub receipt_email: Option<String>,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A webhook event envelope. Only the fields the service acts on are typed.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// The PaymentIntent id when the event's object is a PaymentIntent.
    pub fn payment_intent_id(&self) -> Option<&str> {
        let object = &self.data.object;
        if object.get("object").and_then(|o| o.as_str()) != Some("payment_intent") {
            return None;
        }
        object.get("id").and_then(|id| id.as_str())
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.data
            .object
            .pointer("/last_payment_error/message")
            .and_then(|m| m.as_str())
    }
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    /// Create a PaymentIntent with automatic payment methods enabled.
    pub async fn create_payment_intent(
        &self,
        request: &CreatePaymentIntent,
    ) -> Result<PaymentIntent, IntegrationError> {
        if !self.is_configured() {
            return Err(IntegrationError::NotConfigured("Stripe"));
        }

        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), request.amount.to_string()),
            ("currency".into(), self.config.currency.clone()),
            ("description".into(), request.description.clone()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        if let Some(email) = &request.receipt_email {
            form.push(("receipt_email".into(), email.clone()));
        }
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let url = format!("{}/payment_intents", self.config.api_base_url);
        let response = self
            .client
            .traced_post(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .header("Idempotency-Key", &Uuid::new_v4().to_string())
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let intent: PaymentIntent = response
            .json()
            .await
            .map_err(|e| IntegrationError::Decode(e.to_string()))?;

        tracing::info!(
            payment_intent_id = %intent.id,
            amount = intent.amount,
            currency = %intent.currency,
            "Stripe payment intent created"
        );

        Ok(intent)
    }

    /// Check a `Stripe-Signature` header against the raw request body.
    pub fn verify_webhook_signature(
        &self,
        signature_header: &str,
        payload: &[u8],
    ) -> Result<(), SignatureError> {
        verify_timestamped(
            self.config.webhook_secret.expose_secret(),
            signature_header,
            payload,
            self.config.webhook_tolerance_secs,
            chrono::Utc::now().timestamp(),
        )
    }

    pub fn webhook_secret_configured(&self) -> bool {
        !self.config.webhook_secret.expose_secret().is_empty()
    }

    pub fn parse_event(payload: &[u8]) -> Result<StripeEvent, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
