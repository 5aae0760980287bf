//! TrackHS property feed: pulls villas and upserts them into `listings`.

use super::{api_error, Database, IntegrationError};
use crate::config::TrackHsConfig;
use crate::models::SyncedVilla;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::time::Duration;
use tokio::task::JoinHandle;

const PAGE_SIZE: u32 = 100;
/// Guards against a feed that never returns an empty page.
const MAX_PAGES: u32 = 50;
const DEFAULT_DESCRIPTION: &str = "Luxury villa in Cabo San Lucas";
const DEFAULT_LOCATION: &str = "Cabo San Lucas";

#[derive(Debug, Deserialize)]
struct PropertiesPage {
    #[serde(default)]
    properties: Vec<TrackHsProperty>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackHsProperty {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub max_occupancy: Option<i32>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<TrackHsImage>,
    pub rates: Option<TrackHsRates>,
    pub location: Option<TrackHsLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackHsImage {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackHsRates {
    pub default_nightly: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackHsLocation {
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

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

impl From<TrackHsProperty> for SyncedVilla {
    fn from(p: TrackHsProperty) -> Self {
        let image_urls: Vec<String> = p.images.into_iter().map(|i| i.url).collect();
        let location = p.location;

        SyncedVilla {
            track_hs_id: p.id,
            title: p.name,
            description: p
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            bedrooms: p.bedrooms,
            bathrooms: p.bathrooms,
            max_guests: p.max_occupancy,
            amenities: p.amenities,
            image_url: image_urls.first().cloned(),
            image_urls,
            price_per_night: p
                .rates
                .and_then(|r| r.default_nightly)
                .unwrap_or_else(|| Decimal::from(1000)),
            location: location
                .as_ref()
                .and_then(|l| l.city.clone())
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            address: location.as_ref().and_then(|l| l.address.clone()),
            latitude: location.as_ref().and_then(|l| l.latitude),
            longitude: location.as_ref().and_then(|l| l.longitude),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub upserted: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct TrackHsClient {
    client: reqwest::Client,
    config: TrackHsConfig,
}

impl TrackHsClient {
    pub fn new(config: TrackHsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.config.sync_interval_minutes.max(1) * 60)
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<TrackHsProperty>, IntegrationError> {
        let url = format!("{}/properties", self.config.api_url.trim_end_matches('/'));
        let response = self
            .client
            .traced_get(&url)
            .header("X-API-KEY", self.config.api_key.expose_secret())
            .header("X-API-SECRET", self.config.api_secret.expose_secret())
            .query(&[
                ("page", page.to_string()),
                ("limit", PAGE_SIZE.to_string()),
                ("type", "villa".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let page: PropertiesPage = response
            .json()
            .await
            .map_err(|e| IntegrationError::Decode(e.to_string()))?;
        Ok(page.properties)
    }

    /// Page through the feed until an empty page comes back.
    ///
    /// A failing page after the first ends the walk with what was collected.
    pub async fn fetch_villas(&self) -> Result<Vec<TrackHsProperty>, IntegrationError> {
        if !self.is_configured() {
            return Err(IntegrationError::NotConfigured("TrackHS"));
        }

        let mut villas = Vec::new();
        for page in 1..=MAX_PAGES {
            match self.fetch_page(page).await {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => {
                    tracing::debug!(page = page, count = batch.len(), "Fetched TrackHS page");
                    villas.extend(batch);
                }
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!(page = page, error = %e, "TrackHS page failed; stopping");
                    break;
                }
            }
        }

        Ok(villas)
    }

    pub async fn sync_villas(&self, db: &Database) -> Result<SyncReport, IntegrationError> {
        let properties = self.fetch_villas().await?;
        let mut report = SyncReport {
            fetched: properties.len(),
            ..Default::default()
        };

        for property in properties {
            let id = property.id.clone();
            match db.upsert_synced_villa(&SyncedVilla::from(property)).await {
                Ok(_) => report.upserted += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(track_hs_id = %id, error = %e, "Failed to upsert villa");
                }
            }
        }

        tracing::info!(
            fetched = report.fetched,
            upserted = report.upserted,
            failed = report.failed,
            "TrackHS villa sync finished"
        );
        Ok(report)
    }

    /// Sync now, then on every interval tick.
    pub fn spawn_sync_worker(self, db: Database) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.sync_interval());
            loop {
                ticker.tick().await;
                if let Err(e) = self.sync_villas(&db).await {
                    tracing::error!(error = %e, "TrackHS villa sync failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TrackHsClient {
        TrackHsClient::new(TrackHsConfig {
            api_url: server.uri(),
            api_key: Secret::new("key".to_string()),
            api_secret: Secret::new("secret".to_string()),
            sync_interval_minutes: 60,
        })
    }

    #[test]
    fn sparse_property_gets_defaults() {
        let property: TrackHsProperty = serde_json::from_value(json!({
            "id": 981,
            "name": "Casa Pacifica",
            "images": [{"url": "https://img/1.jpg", "caption": "pool"}, {"url": "https://img/2.jpg"}]
        }))
        .unwrap();
        let villa = SyncedVilla::from(property);

        assert_eq!(villa.track_hs_id, "981");
        assert_eq!(villa.description, DEFAULT_DESCRIPTION);
        assert_eq!(villa.location, DEFAULT_LOCATION);
        assert_eq!(villa.price_per_night, Decimal::from(1000));
        assert_eq!(villa.image_url.as_deref(), Some("https://img/1.jpg"));
        assert_eq!(villa.image_urls.len(), 2);
    }

    #[tokio::test]
    async fn pages_until_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/properties"))
            .and(header("x-api-key", "key"))
            .and(query_param("type", "villa"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": [{"id": "a", "name": "A"}, {"id": "b", "name": "B"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/properties"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"properties": []})))
            .expect(1)
            .mount(&server)
            .await;

        let villas = client(&server).fetch_villas().await.unwrap();
        assert_eq!(villas.len(), 2);
    }

    #[tokio::test]
    async fn first_page_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/properties"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "bad key"})))
            .mount(&server)
            .await;

        let err = client(&server).fetch_villas().await.unwrap_err();
        assert!(err.to_string().contains("bad key"));
    }
}
