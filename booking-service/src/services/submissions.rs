//! Best-effort forwarding of persisted submissions.
//!
//! Handlers store the row first and then hand it to [`Forwarder`], which
//! mirrors it to Airtable, tags the contact in ActiveCampaign, sends the
//! visitor and admin emails and fans the event out to webhooks. Each step is
//! independent: a failure is logged and counted, and the remaining steps
//! still run.

use super::active_campaign::{self, Contact};
use super::airtable::{self, BOOKINGS_TABLE, GUIDE_SUBMISSIONS_TABLE, LEADS_TABLE};
use super::email::{EmailComposer, EmailMessage, EmailProvider, ProviderError};
use super::metrics::record_integration_call;
use super::{ActiveCampaignClient, AirtableClient, Database, WebhookDispatcher};
use crate::models::{Booking, GuideSubmission, Lead, WebhookEvent};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum StepStatus {
    Ok,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: &'static str,
    #[serde(flatten)]
    pub status: StepStatus,
}

/// What happened to each forwarding step for one submission.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ForwardReport {
    pub steps: Vec<StepOutcome>,
}

impl ForwardReport {
    fn push(&mut self, step: &'static str, status: StepStatus) {
        self.steps.push(StepOutcome { step, status });
    }

    pub fn status_of(&self, step: &str) -> Option<&StepStatus> {
        self.steps
            .iter()
            .find(|s| s.step == step)
            .map(|s| &s.status)
    }

    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed(_)))
            .count()
    }
}

#[derive(Clone)]
pub struct Forwarder {
    db: Database,
    airtable: AirtableClient,
    active_campaign: ActiveCampaignClient,
    email: Arc<dyn EmailProvider>,
    composer: EmailComposer,
    webhooks: WebhookDispatcher,
}

impl Forwarder {
    pub fn new(
        db: Database,
        airtable: AirtableClient,
        active_campaign: ActiveCampaignClient,
        email: Arc<dyn EmailProvider>,
        composer: EmailComposer,
        webhooks: WebhookDispatcher,
    ) -> Self {
        Self {
            db,
            airtable,
            active_campaign,
            email,
            composer,
            webhooks,
        }
    }

    pub fn spawn_lead(&self, lead: Lead) -> JoinHandle<ForwardReport> {
        let this = self.clone();
        let span = tracing::info_span!("forward_lead", lead_id = %lead.id);
        tokio::spawn(async move { this.forward_lead(&lead).await }.instrument(span))
    }

    pub fn spawn_booking(&self, booking: Booking) -> JoinHandle<ForwardReport> {
        let this = self.clone();
        let span = tracing::info_span!("forward_booking", booking_id = %booking.id);
        tokio::spawn(async move { this.forward_booking(&booking).await }.instrument(span))
    }

    pub fn spawn_booking_confirmed(&self, booking: Booking) -> JoinHandle<ForwardReport> {
        let this = self.clone();
        let span = tracing::info_span!("forward_booking_confirmed", booking_id = %booking.id);
        tokio::spawn(
            async move { this.forward_booking_confirmed(&booking).await }.instrument(span),
        )
    }

    pub fn spawn_guide(&self, submission: GuideSubmission) -> JoinHandle<ForwardReport> {
        let this = self.clone();
        let span = tracing::info_span!(
            "forward_guide",
            submission_id = %submission.submission_id
        );
        tokio::spawn(async move { this.forward_guide(&submission).await }.instrument(span))
    }

    pub async fn forward_lead(&self, lead: &Lead) -> ForwardReport {
        let mut report = ForwardReport::default();

        let status = self
            .airtable_step(LEADS_TABLE, airtable::lead_fields(lead))
            .await;
        report.push("airtable", status);

        let mut tags = vec![active_campaign::TAG_LEAD];
        tags.extend(active_campaign::interest_tag(&lead.interest_type));
        let contact = Contact {
            email: &lead.email,
            first_name: &lead.first_name,
            last_name: lead.last_name.as_deref(),
            phone: lead.phone.as_deref(),
        };
        report.push("active_campaign", self.crm_step(&contact, &tags).await);

        report.push(
            "visitor_email",
            self.email_step(self.composer.lead_confirmation(lead)).await,
        );
        report.push(
            "admin_email",
            self.email_step(self.composer.admin_lead_notification(lead))
                .await,
        );

        report.push(
            "webhooks",
            self.webhook_step(WebhookEvent::LeadCreated, to_json(lead)).await,
        );

        log_report("lead", &report);
        report
    }

    pub async fn forward_booking(&self, booking: &Booking) -> ForwardReport {
        let mut report = ForwardReport::default();

        let status = self
            .airtable_step(BOOKINGS_TABLE, airtable::booking_fields(booking))
            .await;
        report.push("airtable", status);

        let mut tags = vec![active_campaign::TAG_BOOKING];
        tags.extend(active_campaign::interest_tag(&booking.booking_type));
        let contact = Contact {
            email: &booking.email,
            first_name: &booking.first_name,
            last_name: Some(booking.last_name.as_str()),
            phone: Some(booking.phone.as_str()),
        };
        report.push("active_campaign", self.crm_step(&contact, &tags).await);

        report.push(
            "visitor_email",
            self.email_step(self.composer.booking_confirmation(booking))
                .await,
        );
        report.push(
            "admin_email",
            self.email_step(self.composer.admin_booking_notification(booking))
                .await,
        );

        report.push(
            "webhooks",
            self.webhook_step(WebhookEvent::BookingCreated, to_json(booking))
                .await,
        );

        log_report("booking", &report);
        report
    }

    /// Payment succeeded: resend the confirmation with the new status.
    pub async fn forward_booking_confirmed(&self, booking: &Booking) -> ForwardReport {
        let mut report = ForwardReport::default();

        report.push(
            "visitor_email",
            self.email_step(self.composer.booking_confirmation(booking))
                .await,
        );
        report.push(
            "webhooks",
            self.webhook_step(WebhookEvent::BookingConfirmed, to_json(booking))
                .await,
        );

        log_report("booking_confirmed", &report);
        report
    }

    pub async fn forward_guide(&self, submission: &GuideSubmission) -> ForwardReport {
        let mut report = ForwardReport::default();

        let status = self
            .airtable_step(GUIDE_SUBMISSIONS_TABLE, airtable::guide_fields(submission))
            .await;
        report.push("airtable", status);

        let contact = Contact {
            email: &submission.email,
            first_name: &submission.first_name,
            last_name: submission.last_name.as_deref(),
            phone: submission.phone.as_deref(),
        };
        report.push(
            "active_campaign",
            self.crm_step(&contact, &[active_campaign::TAG_GUIDE]).await,
        );

        report.push(
            "visitor_email",
            self.email_step(self.composer.guide_ready(submission)).await,
        );
        report.push(
            "admin_email",
            self.email_step(self.composer.admin_guide_notification(submission))
                .await,
        );

        report.push(
            "webhooks",
            self.webhook_step(WebhookEvent::GuideRequested, to_json(submission))
                .await,
        );

        if let Err(e) = self.db.mark_guide_processed(submission.id).await {
            tracing::warn!(error = %e, "Could not mark guide submission processed");
        }

        log_report("guide", &report);
        report
    }

    /// Admin email and webhook fan-out for a synthetic record.
    ///
    /// Nothing is stored, synced to Airtable or tagged in the CRM. Webhook
    /// payloads carry `"test": true`.
    pub async fn forward_test(
        &self,
        event: WebhookEvent,
        mut data: serde_json::Value,
        admin_message: Result<EmailMessage, ProviderError>,
    ) -> ForwardReport {
        let mut report = ForwardReport::default();

        report.push("admin_email", self.email_step(admin_message).await);

        if let Some(object) = data.as_object_mut() {
            object.insert("test".to_string(), serde_json::Value::Bool(true));
        }
        report.push("webhooks", self.webhook_step(event, data).await);

        log_report("test", &report);
        report
    }

    async fn airtable_step(
        &self,
        table: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> StepStatus {
        if !self.airtable.is_configured() {
            return StepStatus::Skipped;
        }

        let result = self.airtable.create_record_with_retry(table, &fields).await;
        record_integration_call("airtable", result.is_ok());
        match result {
            Ok(record_id) => {
                tracing::info!(table = table, record_id = %record_id, "Synced to Airtable");
                StepStatus::Ok
            }
            Err(e) => {
                tracing::error!(table = table, error = %e, "Airtable sync failed");
                StepStatus::Failed(e.to_string())
            }
        }
    }

    async fn crm_step(&self, contact: &Contact<'_>, tags: &[&str]) -> StepStatus {
        if !self.active_campaign.is_configured() {
            return StepStatus::Skipped;
        }

        let result = self.active_campaign.sync_and_tag(contact, tags).await;
        record_integration_call("active_campaign", result.is_ok());
        match result {
            Ok((contact_id, applied)) => {
                tracing::info!(
                    contact_id = %contact_id,
                    tags_applied = applied,
                    "Synced contact to ActiveCampaign"
                );
                StepStatus::Ok
            }
            Err(e) => {
                tracing::error!(error = %e, "ActiveCampaign sync failed");
                StepStatus::Failed(e.to_string())
            }
        }
    }

    async fn email_step(&self, message: Result<EmailMessage, ProviderError>) -> StepStatus {
        if !self.email.is_enabled() {
            return StepStatus::Skipped;
        }

        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "Could not render email");
                return StepStatus::Failed(e.to_string());
            }
        };

        let result = self.email.send(&message).await;
        record_integration_call("email", result.is_ok());
        match result {
            Ok(response) => {
                tracing::info!(
                    to = %message.to,
                    provider = %response.provider,
                    "Email sent"
                );
                StepStatus::Ok
            }
            Err(e) => {
                tracing::error!(to = %message.to, error = %e, "Email failed");
                StepStatus::Failed(e.to_string())
            }
        }
    }

    async fn webhook_step(&self, event: WebhookEvent, data: serde_json::Value) -> StepStatus {
        let summary = self.webhooks.dispatch(event, &data).await;
        if summary.attempted == 0 {
            StepStatus::Skipped
        } else if summary.delivered == summary.attempted {
            StepStatus::Ok
        } else {
            StepStatus::Failed(format!(
                "{} of {} deliveries failed",
                summary.attempted - summary.delivered,
                summary.attempted
            ))
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not serialize webhook data");
        serde_json::Value::Null
    })
}

fn log_report(kind: &str, report: &ForwardReport) {
    let failures = report.failures();
    if failures > 0 {
        tracing::warn!(kind = kind, failures = failures, "Forwarding finished with failures");
    } else {
        tracing::info!(kind = kind, "Forwarding finished");
    }
}
