use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub database: DatabaseConfig,
    pub admin: AdminConfig,
    pub site: SiteConfig,
    pub stripe: StripeConfig,
    pub airtable: AirtableConfig,
    pub active_campaign: ActiveCampaignConfig,
    pub sendgrid: SendGridConfig,
    pub smtp: SmtpConfig,
    pub webhooks: WebhookConfig,
    pub trackhs: TrackHsConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Bearer token for `/api/admin/*`. Admin routes answer 503 while unset.
    pub api_token: Option<Secret<String>>,
    /// Inbox for new-lead and new-booking alerts.
    pub notification_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub base_url: String,
    pub from_email: String,
    pub from_name: String,
    /// Static PDF handed out after a guide request.
    pub guide_download_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    pub currency: String,
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirtableConfig {
    pub api_key: Secret<String>,
    pub base_id: String,
    pub api_base_url: String,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveCampaignConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendGridConfig {
    pub api_key: Secret<String>,
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Make.com scenario URL that receives every event.
    pub make_url: Option<String>,
    /// When set, deliveries carry an `X-Cabo-Signature: t=..,v1=..` header.
    pub signing_secret: Option<Secret<String>>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackHsConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
    pub sync_interval_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub submissions_per_minute: u32,
}

impl StripeConfig {
    pub fn is_configured(&self) -> bool {
        !self.secret_key.expose_secret().is_empty()
    }
}

impl AirtableConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.expose_secret().is_empty() && !self.base_id.is_empty()
    }
}

impl ActiveCampaignConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.expose_secret().is_empty()
    }
}

impl SendGridConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }
}

impl TrackHsConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty()
            && !self.api_key.expose_secret().is_empty()
            && !self.api_secret.expose_secret().is_empty()
    }
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: Secret::new(String::new()),
            webhook_secret: Secret::new(String::new()),
            api_base_url: "https://api.stripe.com/v1".to_string(),
            currency: "usd".to_string(),
            webhook_tolerance_secs: 300,
        }
    }
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            base_id: String::new(),
            api_base_url: "https://api.airtable.com/v0".to_string(),
            max_retries: 3,
        }
    }
}

impl Default for ActiveCampaignConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: Secret::new(String::new()),
        }
    }
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            api_base_url: "https://api.sendgrid.com/v3".to_string(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            user: String::new(),
            password: Secret::new(String::new()),
            enabled: false,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            make_url: None,
            signing_secret: None,
            timeout_secs: 10,
        }
    }
}

impl Default for TrackHsConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: Secret::new(String::new()),
            api_secret: Secret::new(String::new()),
            sync_interval_minutes: 60,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cabo.is".to_string(),
            from_email: "no-reply@cabo.is".to_string(),
            from_name: "Cabo San Lucas".to_string(),
            guide_download_path: "/guides/ultimate-cabo-guide-2025.pdf".to_string(),
        }
    }
}

impl BookingConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";
        let site_defaults = SiteConfig::default();
        let stripe_defaults = StripeConfig::default();
        let airtable_defaults = AirtableConfig::default();

        Ok(BookingConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("booking-service"), false)?,
            database: DatabaseConfig {
                url: Secret::new(get_env("DATABASE_URL", None, is_prod)?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 1),
            },
            admin: AdminConfig {
                api_token: optional_env("ADMIN_API_TOKEN").map(Secret::new),
                notification_email: get_env(
                    "ADMIN_EMAIL",
                    Some("jeff@instacabo.com"),
                    false,
                )?,
            },
            site: SiteConfig {
                base_url: get_env("SITE_URL", Some(&site_defaults.base_url), false)?,
                from_email: get_env("EMAIL_FROM", Some(&site_defaults.from_email), false)?,
                from_name: get_env("EMAIL_FROM_NAME", Some(&site_defaults.from_name), false)?,
                guide_download_path: get_env(
                    "GUIDE_DOWNLOAD_PATH",
                    Some(&site_defaults.guide_download_path),
                    false,
                )?,
            },
            stripe: StripeConfig {
                secret_key: secret_env("STRIPE_SECRET_KEY"),
                webhook_secret: secret_env("STRIPE_WEBHOOK_SECRET"),
                api_base_url: get_env(
                    "STRIPE_API_BASE_URL",
                    Some(&stripe_defaults.api_base_url),
                    false,
                )?,
                currency: get_env("STRIPE_CURRENCY", Some(&stripe_defaults.currency), false)?,
                webhook_tolerance_secs: parse_env(
                    "STRIPE_WEBHOOK_TOLERANCE_SECS",
                    stripe_defaults.webhook_tolerance_secs,
                ),
            },
            airtable: AirtableConfig {
                api_key: secret_env("AIRTABLE_API_KEY"),
                base_id: optional_env("AIRTABLE_BASE_ID").unwrap_or_default(),
                api_base_url: get_env(
                    "AIRTABLE_API_BASE_URL",
                    Some(&airtable_defaults.api_base_url),
                    false,
                )?,
                max_retries: parse_env("AIRTABLE_MAX_RETRIES", airtable_defaults.max_retries),
            },
            active_campaign: ActiveCampaignConfig {
                api_url: optional_env("ACTIVECAMPAIGN_API_URL").unwrap_or_default(),
                api_key: secret_env("ACTIVECAMPAIGN_API_KEY"),
            },
            sendgrid: SendGridConfig {
                api_key: secret_env("SENDGRID_API_KEY"),
                api_base_url: get_env(
                    "SENDGRID_API_BASE_URL",
                    Some("https://api.sendgrid.com/v3"),
                    false,
                )?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), false)?,
                port: parse_env("SMTP_PORT", 587),
                user: optional_env("SMTP_USER").unwrap_or_default(),
                password: secret_env("SMTP_PASSWORD"),
                enabled: parse_env("SMTP_ENABLED", false),
            },
            webhooks: WebhookConfig {
                make_url: optional_env("MAKE_WEBHOOK_URL"),
                signing_secret: optional_env("WEBHOOK_SIGNING_SECRET").map(Secret::new),
                timeout_secs: parse_env("WEBHOOK_TIMEOUT_SECS", 10),
            },
            trackhs: TrackHsConfig {
                api_url: optional_env("TRACKHS_API_URL").unwrap_or_default(),
                api_key: secret_env("TRACKHS_API_KEY"),
                api_secret: secret_env("TRACKHS_API_SECRET"),
                sync_interval_minutes: parse_env("TRACKHS_SYNC_INTERVAL_MINUTES", 60),
            },
            rate_limit: RateLimitConfig {
                submissions_per_minute: parse_env("SUBMISSIONS_PER_MINUTE", 20),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Unset and empty are treated alike.
fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn secret_env(key: &str) -> Secret<String> {
    Secret::new(optional_env(key).unwrap_or_default())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrations_default_to_unconfigured() {
        assert!(!StripeConfig::default().is_configured());
        assert!(!AirtableConfig::default().is_configured());
        assert!(!ActiveCampaignConfig::default().is_configured());
        assert!(!SendGridConfig::default().is_configured());
        assert!(!TrackHsConfig::default().is_configured());
    }

    #[test]
    fn airtable_needs_both_key_and_base() {
        let config = AirtableConfig {
            api_key: Secret::new("key".to_string()),
            ..AirtableConfig::default()
        };
        assert!(!config.is_configured());

        let config = AirtableConfig {
            base_id: "appXYZ".to_string(),
            ..config
        };
        assert!(config.is_configured());
    }

    #[test]
    fn get_env_falls_back_outside_prod() {
        let value = get_env("BOOKING_TEST_SURELY_UNSET", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
        assert!(get_env("BOOKING_TEST_SURELY_UNSET", Some("fallback"), true).is_err());
    }
}
