//! Read-only catalogue of villas, resorts, hotels, adventures and restaurants.

use crate::middleware::AdminContext;
use crate::models::{CreateListingRequest, Listing, ListingType};
use crate::startup::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use service_core::utils::validation::ValidatedJson;

#[derive(Debug, Deserialize)]
pub struct ListingFilter {
    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
}

/// GET /api/listings?type=
pub async fn list_listings(
    State(state): State<AppState>,
    Query(filter): Query<ListingFilter>,
) -> Result<Json<Vec<Listing>>, AppError> {
    Ok(Json(state.db.list_listings(filter.listing_type).await?))
}

/// GET /api/listings/:id
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing>, AppError> {
    state
        .db
        .get_listing(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Listing not found"))
}

/// GET /api/villas
pub async fn list_villas(State(state): State<AppState>) -> Result<Json<Vec<Listing>>, AppError> {
    Ok(Json(state.db.list_listings(Some(ListingType::Villa)).await?))
}

/// GET /api/villas/:track_hs_id
pub async fn get_villa(
    State(state): State<AppState>,
    Path(track_hs_id): Path<String>,
) -> Result<Json<Listing>, AppError> {
    state
        .db
        .get_villa_by_track_hs_id(&track_hs_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Villa not found"))
}

/// GET /api/resorts/:slug
pub async fn get_resort(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Listing>, AppError> {
    state
        .db
        .get_listing_by_slug(&slug, ListingType::Resort)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Resort not found"))
}

/// POST /api/listings
#[tracing::instrument(skip(state, req), fields(title = %req.title))]
pub async fn create_listing(
    _admin: AdminContext,
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateListingRequest>,
) -> Result<(StatusCode, Json<Listing>), AppError> {
    let listing = state.db.create_listing(&req).await?;
    tracing::info!(listing_id = %listing.id, slug = %listing.slug, "Listing created");
    Ok((StatusCode::CREATED, Json(listing)))
}
