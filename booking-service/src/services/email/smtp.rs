use super::{EmailMessage, EmailProvider, ProviderError, ProviderResponse};
use crate::config::{SiteConfig, SmtpConfig};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;

pub struct SmtpProvider {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig, site: &SiteConfig) -> Result<Self, ProviderError> {
        let from: Mailbox = format!("{} <{}>", site.from_name, site.from_email)
            .parse()
            .map_err(|e| ProviderError::Configuration(format!("Invalid from address: {}", e)))?;

        if !config.enabled {
            return Ok(Self {
                transport: None,
                from,
            });
        }

        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create SMTP relay: {}", e))
            })?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport: Some(transport),
            from,
        })
    }

    fn build_message(&self, email: &EmailMessage) -> Result<Message, ProviderError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| ProviderError::InvalidRecipient(format!("{}: {}", email.to, e)))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject);

        if let Some(reply_to) = &email.reply_to {
            let mailbox: Mailbox = reply_to.parse().map_err(|e| {
                ProviderError::Configuration(format!("Invalid reply-to address: {}", e))
            })?;
            builder = builder.reply_to(mailbox);
        }

        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.body_text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.body_html.clone()),
                    ),
            )
            .map_err(|e| ProviderError::SendFailed(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| ProviderError::NotEnabled("SMTP email provider is not enabled".into()))?;

        let message = self.build_message(email)?;
        let response = transport
            .send(message)
            .await
            .map_err(|e| ProviderError::SendFailed(format!("Failed to send email: {}", e)))?;

        let provider_id = response.message().next().map(|s| s.to_string());

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent via SMTP");

        Ok(ProviderResponse::new("smtp", provider_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled() -> SmtpProvider {
        SmtpProvider::new(SmtpConfig::default(), &SiteConfig::default()).unwrap()
    }

    #[test]
    fn disabled_provider_builds_without_transport() {
        assert!(!disabled().is_enabled());
    }

    #[test]
    fn invalid_recipient_is_reported() {
        let err = disabled()
            .build_message(&EmailMessage {
                to: "not an address".into(),
                subject: "s".into(),
                body_text: "t".into(),
                body_html: "<p>h</p>".into(),
                reply_to: None,
            })
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRecipient(_)));
    }
}
