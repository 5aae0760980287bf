//! Catalogue listings: villas, resorts, hotels, adventures, restaurants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Resort,
    Hotel,
    Villa,
    Adventure,
    Restaurant,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resort => "resort",
            Self::Hotel => "hotel",
            Self::Villa => "villa",
            Self::Adventure => "adventure",
            Self::Restaurant => "restaurant",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub listing_type: String,
    pub image_url: Option<String>,
    pub image_urls: Vec<String>,
    pub price: Option<Decimal>,
    pub location: String,
    pub booking_type: String,
    pub amenities: Vec<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub max_guests: Option<i32>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub track_hs_id: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn default_location() -> String {
    "Cabo San Lucas".to_string()
}

fn default_booking_mode() -> String {
    "form".to_string()
}

fn validate_booking_mode(mode: &str) -> Result<(), ValidationError> {
    match mode {
        "direct" | "form" => Ok(()),
        _ => Err(ValidationError::new("booking_type")),
    }
}

fn validate_non_negative(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(custom(function = "validate_non_negative"))]
    pub price: Option<Decimal>,
    #[serde(default = "default_location")]
    #[validate(length(min = 1, max = 255))]
    pub location: String,
    #[serde(default = "default_booking_mode")]
    #[validate(custom(function = "validate_booking_mode"))]
    pub booking_type: String,
    #[serde(default)]
    pub amenities: Vec<String>,
}

/// A villa as pulled from the property-management feed.
#[derive(Debug, Clone)]
pub struct SyncedVilla {
    pub track_hs_id: String,
    pub title: String,
    pub description: String,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub max_guests: Option<i32>,
    pub amenities: Vec<String>,
    pub image_url: Option<String>,
    pub image_urls: Vec<String>,
    pub price_per_night: Decimal,
    pub location: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Lowercase, ASCII alphanumerics separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
