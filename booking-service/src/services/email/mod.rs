//! Transactional email: providers, fallback chain and message composition.

pub mod sendgrid;
pub mod smtp;
pub mod templates;

use crate::config::{BookingConfig, SiteConfig};
use crate::models::{Booking, GuideSubmission, Lead};
use askama::Template;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use sendgrid::SendGridProvider;
pub use smtp::SmtpProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Template error: {0}")]
    Template(String),
}

impl From<askama::Error> for ProviderError {
    fn from(e: askama::Error) -> Self {
        ProviderError::Template(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider: String,
    pub provider_id: Option<String>,
}

impl ProviderResponse {
    pub fn new(provider: &str, provider_id: Option<String>) -> Self {
        Self {
            provider: provider.to_string(),
            provider_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_enabled(&self) -> bool;
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError>;
}

/// Tries each enabled provider in order until one accepts the message.
pub struct FallbackEmailProvider {
    providers: Vec<Arc<dyn EmailProvider>>,
}

impl FallbackEmailProvider {
    pub fn new(providers: Vec<Arc<dyn EmailProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl EmailProvider for FallbackEmailProvider {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn is_enabled(&self) -> bool {
        self.providers.iter().any(|p| p.is_enabled())
    }

    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        let mut last_error = None;

        for provider in self.providers.iter().filter(|p| p.is_enabled()) {
            match provider.send(email).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        to = %email.to,
                        error = %e,
                        "Email provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProviderError::NotEnabled("No email provider configured".into())))
    }
}

/// Records messages instead of sending them.
pub struct MockEmailProvider {
    enabled: bool,
    send_count: AtomicU64,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockEmailProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "Mock email provider is not enabled".to_string(),
            ));
        }

        let count = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }

        tracing::info!(to = %email.to, subject = %email.subject, "[MOCK] Email would be sent");

        Ok(ProviderResponse::new("mock", Some(format!("mock-email-{}", count))))
    }
}

/// SendGrid first, SMTP second. Providers without credentials are left out.
pub fn build_email_provider(config: &BookingConfig) -> Arc<dyn EmailProvider> {
    let mut providers: Vec<Arc<dyn EmailProvider>> = Vec::new();

    if config.sendgrid.is_configured() {
        providers.push(Arc::new(SendGridProvider::new(
            config.sendgrid.clone(),
            &config.site,
        )));
    }

    if config.smtp.enabled {
        match SmtpProvider::new(config.smtp.clone(), &config.site) {
            Ok(provider) => providers.push(Arc::new(provider)),
            Err(e) => tracing::warn!(error = %e, "SMTP provider disabled"),
        }
    }

    if providers.is_empty() {
        tracing::warn!("No email provider configured; emails will be skipped");
    }

    Arc::new(FallbackEmailProvider::new(providers))
}

/// Renders every outbound email from site settings and domain rows.
#[derive(Debug, Clone)]
pub struct EmailComposer {
    site: SiteConfig,
    admin_email: String,
}

impl EmailComposer {
    pub fn new(site: SiteConfig, admin_email: String) -> Self {
        Self { site, admin_email }
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    /// Absolute URL for a site-relative path.
    pub fn site_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.site.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn booking_confirmation(&self, booking: &Booking) -> Result<EmailMessage, ProviderError> {
        let label = booking
            .parsed_type()
            .map(|t| t.label())
            .unwrap_or("Cabo");
        let confirmation_number = booking.confirmation_number();
        let item_name = booking
            .item_name
            .clone()
            .unwrap_or_else(|| format!("{} booking", label));

        let template = templates::BookingConfirmation {
            first_name: &booking.first_name,
            booking_label: label,
            item_name: &item_name,
            confirmation_number: &confirmation_number,
            start_date: booking.start_date.format("%B %-d, %Y").to_string(),
            end_date: booking.end_date.format("%B %-d, %Y").to_string(),
            multi_day: booking.end_date > booking.start_date,
            guests: booking.guests,
            total_amount: format!("{:.2}", booking.total_amount),
            currency: &booking.currency,
            status: &booking.status,
            special_requests: booking.special_requests.as_deref().unwrap_or(""),
            site_url: &self.site.base_url,
        };

        let body_text = format!(
            "Hi {},\n\nThank you for booking {} with us.\n\nConfirmation number: {}\nDates: {} to {}\nGuests: {}\nTotal: {:.2} {}\n\nWe will be in touch shortly with everything you need.\n\n{}",
            booking.first_name,
            item_name,
            confirmation_number,
            booking.start_date,
            booking.end_date,
            booking.guests,
            booking.total_amount,
            booking.currency,
            self.site.base_url,
        );

        Ok(EmailMessage {
            to: booking.email.clone(),
            subject: format!("Your {} Booking Confirmation ({})", label, confirmation_number),
            body_text,
            body_html: template.render()?,
            reply_to: Some(self.admin_email.clone()),
        })
    }

    pub fn lead_confirmation(&self, lead: &Lead) -> Result<EmailMessage, ProviderError> {
        let template = templates::LeadConfirmation {
            first_name: &lead.first_name,
            interest: interest_label(&lead.interest_type),
            site_url: &self.site.base_url,
        };

        Ok(EmailMessage {
            to: lead.email.clone(),
            subject: "Thank You for Your Interest in Cabo San Lucas".to_string(),
            body_text: format!(
                "Hi {},\n\nThanks for reaching out about {}. A member of our team will contact you within 24 hours.\n\n{}",
                lead.first_name,
                interest_label(&lead.interest_type),
                self.site.base_url
            ),
            body_html: template.render()?,
            reply_to: Some(self.admin_email.clone()),
        })
    }

    pub fn guide_ready(&self, submission: &GuideSubmission) -> Result<EmailMessage, ProviderError> {
        let download_url = self.site_url(&submission.download_link);
        let template = templates::GuideReady {
            first_name: &submission.first_name,
            guide_type: &submission.guide_type,
            download_url: &download_url,
            site_url: &self.site.base_url,
        };

        Ok(EmailMessage {
            to: submission.email.clone(),
            subject: "Your Cabo San Lucas Guide is Ready!".to_string(),
            body_text: format!(
                "Hi {},\n\nYour copy of {} is ready: {}\n\nEnjoy planning your trip!",
                submission.first_name, submission.guide_type, download_url
            ),
            body_html: template.render()?,
            reply_to: None,
        })
    }

    pub fn admin_lead_notification(&self, lead: &Lead) -> Result<EmailMessage, ProviderError> {
        let mut rows = vec![
            ("Name", lead.full_name()),
            ("Email", lead.email.clone()),
            ("Interest", lead.interest_type.clone()),
            ("Source", lead.source.clone()),
        ];
        push_opt(&mut rows, "Phone", lead.phone.as_deref());
        push_opt(&mut rows, "Budget", lead.budget.as_deref());
        push_opt(&mut rows, "Timeline", lead.timeline.as_deref());
        push_opt(&mut rows, "Message", lead.message.as_deref());
        push_opt(&mut rows, "Form", lead.form_name.as_deref());
        if !lead.tags.is_empty() {
            rows.push(("Tags", lead.tags.join(", ")));
        }
        rows.push(("Lead ID", lead.id.to_string()));

        self.admin_message(
            &format!("New {} lead: {}", lead.interest_type, lead.full_name()),
            "New lead received",
            rows,
            Some(lead.email.clone()),
        )
    }

    pub fn admin_booking_notification(
        &self,
        booking: &Booking,
    ) -> Result<EmailMessage, ProviderError> {
        let mut rows = vec![
            ("Name", booking.full_name()),
            ("Email", booking.email.clone()),
            ("Phone", booking.phone.clone()),
            ("Type", booking.booking_type.clone()),
            ("Dates", format!("{} to {}", booking.start_date, booking.end_date)),
            ("Guests", booking.guests.to_string()),
            (
                "Total",
                format!("{:.2} {}", booking.total_amount, booking.currency),
            ),
            ("Status", booking.status.clone()),
        ];
        push_opt(&mut rows, "Item", booking.item_name.as_deref());
        push_opt(&mut rows, "Special requests", booking.special_requests.as_deref());
        rows.push(("Confirmation", booking.confirmation_number()));

        self.admin_message(
            &format!(
                "New {} booking: {}",
                booking.booking_type,
                booking.full_name()
            ),
            "New booking received",
            rows,
            Some(booking.email.clone()),
        )
    }

    pub fn admin_guide_notification(
        &self,
        submission: &GuideSubmission,
    ) -> Result<EmailMessage, ProviderError> {
        let mut rows = vec![
            ("Name", submission.first_name.clone()),
            ("Email", submission.email.clone()),
            ("Guide", submission.guide_type.clone()),
            ("Source", submission.source.clone()),
        ];
        push_opt(&mut rows, "Last name", submission.last_name.as_deref());
        push_opt(&mut rows, "Phone", submission.phone.as_deref());
        if !submission.interest_areas.is_empty() {
            rows.push(("Interests", submission.interest_areas.join(", ")));
        }
        rows.push(("Submission ID", submission.submission_id.clone()));

        self.admin_message(
            &format!("Guide requested: {}", submission.email),
            "New guide download",
            rows,
            Some(submission.email.clone()),
        )
    }

    pub fn test_email(&self, to: &str, provider: &str) -> Result<EmailMessage, ProviderError> {
        let sent_at = chrono::Utc::now().to_rfc3339();
        let template = templates::TestEmail {
            provider,
            sent_at: &sent_at,
            site_url: &self.site.base_url,
        };

        Ok(EmailMessage {
            to: to.to_string(),
            subject: "[Cabo Admin] Test email".to_string(),
            body_text: format!("Email delivery via {} is working. Sent at {}.", provider, sent_at),
            body_html: template.render()?,
            reply_to: None,
        })
    }

    fn admin_message(
        &self,
        subject: &str,
        heading: &str,
        rows: Vec<(&str, String)>,
        reply_to: Option<String>,
    ) -> Result<EmailMessage, ProviderError> {
        let body_text = rows
            .iter()
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join("\n");

        let template = templates::AdminNotification {
            heading,
            rows: &rows,
            site_url: &self.site.base_url,
        };

        Ok(EmailMessage {
            to: self.admin_email.clone(),
            subject: format!("[Cabo Admin] {}", subject),
            body_text,
            body_html: template.render()?,
            reply_to,
        })
    }
}

fn push_opt(rows: &mut Vec<(&'static str, String)>, label: &'static str, value: Option<&str>) {
    if let Some(v) = value {
        rows.push((label, v.to_string()));
    }
}

fn interest_label(interest: &str) -> &'static str {
    match interest {
        "villa" => "our luxury villas",
        "resort" | "hotel" => "Cabo's resorts",
        "adventure" => "Cabo adventures",
        "concierge" => "our concierge services",
        "partner" => "partnering with us",
        _ => "Cabo San Lucas",
    }
}
