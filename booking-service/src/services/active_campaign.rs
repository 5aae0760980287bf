//! ActiveCampaign CRM: contact sync and tagging over the v3 REST API.

use super::{api_error, IntegrationError};
use crate::config::ActiveCampaignConfig;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use service_core::observability::TracedClientExt;

pub const TAG_LEAD: &str = "Website Lead";
pub const TAG_BOOKING: &str = "Website Booking";
pub const TAG_GUIDE: &str = "Guide Download";
pub const TAG_RESORT_INTEREST: &str = "Resort Interest";
pub const TAG_VILLA_INTEREST: &str = "Villa Interest";
pub const TAG_ADVENTURE_INTEREST: &str = "Adventure Interest";

/// Interest-specific tag for a lead's `interest_type` or a booking type.
pub fn interest_tag(interest: &str) -> Option<&'static str> {
    match interest {
        "resort" | "hotel" => Some(TAG_RESORT_INTEREST),
        "villa" => Some(TAG_VILLA_INTEREST),
        "adventure" => Some(TAG_ADVENTURE_INTEREST),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Contact<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: Option<&'a str>,
    pub phone: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ContactEnvelope {
    contact: IdOnly,
}

#[derive(Debug, Deserialize)]
struct TagEnvelope {
    tag: IdOnly,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<TagRow>,
}

#[derive(Debug, Deserialize)]
struct TagRow {
    id: String,
    tag: String,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
}

/// ActiveCampaign returns ids as strings, but some endpoints send numbers.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected id: {}", other))),
    }
}

#[derive(Clone)]
pub struct ActiveCampaignClient {
    client: reqwest::Client,
    config: ActiveCampaignConfig,
}

impl ActiveCampaignClient {
    pub fn new(config: ActiveCampaignConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/3/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn ensure_configured(&self) -> Result<(), IntegrationError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(IntegrationError::NotConfigured("ActiveCampaign"))
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, IntegrationError> {
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| IntegrationError::Decode(e.to_string()))
    }

    /// Create or update a contact by email. Returns the contact id.
    pub async fn sync_contact(&self, contact: &Contact<'_>) -> Result<String, IntegrationError> {
        self.ensure_configured()?;

        let response = self
            .client
            .traced_post(&self.url("contact/sync"))
            .header("Api-Token", self.config.api_key.expose_secret())
            .json(&json!({
                "contact": {
                    "email": contact.email,
                    "firstName": contact.first_name,
                    "lastName": contact.last_name.unwrap_or_default(),
                    "phone": contact.phone.unwrap_or_default(),
                }
            }))
            .send()
            .await?;

        let envelope: ContactEnvelope = Self::decode(response).await?;
        Ok(envelope.contact.id)
    }

    /// Look a tag up by exact name, creating it when missing.
    pub async fn find_or_create_tag(&self, name: &str) -> Result<String, IntegrationError> {
        self.ensure_configured()?;

        let response = self
            .client
            .traced_get(&self.url("tags"))
            .header("Api-Token", self.config.api_key.expose_secret())
            .query(&[("search", name)])
            .send()
            .await?;

        let list: TagList = Self::decode(response).await?;
        if let Some(existing) = list.tags.into_iter().find(|t| t.tag == name) {
            return Ok(existing.id);
        }

        let response = self
            .client
            .traced_post(&self.url("tags"))
            .header("Api-Token", self.config.api_key.expose_secret())
            .json(&json!({
                "tag": { "tag": name, "tagType": "contact", "description": "" }
            }))
            .send()
            .await?;

        let created: TagEnvelope = Self::decode(response).await?;
        tracing::info!(tag = name, tag_id = %created.tag.id, "ActiveCampaign tag created");
        Ok(created.tag.id)
    }

    pub async fn add_tag(&self, contact_id: &str, tag_id: &str) -> Result<(), IntegrationError> {
        self.ensure_configured()?;

        let response = self
            .client
            .traced_post(&self.url("contactTags"))
            .header("Api-Token", self.config.api_key.expose_secret())
            .json(&json!({ "contactTag": { "contact": contact_id, "tag": tag_id } }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }

    /// Sync the contact, then apply each tag.
    ///
    /// A failing tag is logged and skipped. Returns the contact id and the
    /// number of tags applied.
    pub async fn sync_and_tag(
        &self,
        contact: &Contact<'_>,
        tags: &[&str],
    ) -> Result<(String, usize), IntegrationError> {
        let contact_id = self.sync_contact(contact).await?;

        let mut applied = 0;
        for tag in tags {
            let result = match self.find_or_create_tag(tag).await {
                Ok(tag_id) => self.add_tag(&contact_id, &tag_id).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => applied += 1,
                Err(e) => tracing::warn!(
                    contact_id = %contact_id,
                    tag = tag,
                    error = %e,
                    "Failed to tag ActiveCampaign contact"
                ),
            }
        }

        Ok((contact_id, applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ActiveCampaignClient {
        ActiveCampaignClient::new(ActiveCampaignConfig {
            api_url: server.uri(),
            api_key: Secret::new("ac-key".to_string()),
        })
    }

    #[test]
    fn interest_tags() {
        assert_eq!(interest_tag("villa"), Some(TAG_VILLA_INTEREST));
        assert_eq!(interest_tag("resort"), Some(TAG_RESORT_INTEREST));
        assert_eq!(interest_tag("general"), None);
    }

    #[tokio::test]
    async fn syncs_contact_and_reuses_existing_tag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/3/contact/sync"))
            .and(header("api-token", "ac-key"))
            .and(body_partial_json(json!({"contact": {"email": "ana@example.com"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"contact": {"id": "77"}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/3/tags"))
            .and(query_param("search", TAG_LEAD))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tags": [{"id": "3", "tag": "Website Lead Old"}, {"id": "4", "tag": "Website Lead"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/3/contactTags"))
            .and(body_partial_json(json!({"contactTag": {"contact": "77", "tag": "4"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"contactTag": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let contact = Contact {
            email: "ana@example.com",
            first_name: "Ana",
            last_name: None,
            phone: None,
        };
        let (id, applied) = client(&server)
            .sync_and_tag(&contact, &[TAG_LEAD])
            .await
            .unwrap();
        assert_eq!(id, "77");
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn creates_missing_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tags": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/3/tags"))
            .and(body_partial_json(json!({"tag": {"tag": "Guide Download"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"tag": {"id": 12}})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server).find_or_create_tag(TAG_GUIDE).await.unwrap();
        assert_eq!(id, "12");
    }

    #[tokio::test]
    async fn unconfigured_client_is_rejected() {
        let client = ActiveCampaignClient::new(ActiveCampaignConfig::default());
        let err = client.find_or_create_tag(TAG_LEAD).await.unwrap_err();
        assert!(matches!(err, IntegrationError::NotConfigured(_)));
    }
}
