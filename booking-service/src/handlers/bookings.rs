//! Booking submissions for villas, adventures and transportation.

use super::{client_info, Pagination};
use crate::middleware::AdminContext;
use crate::models::{BookingStatus, CreateBookingRequest, NewBooking};
use crate::services::metrics::record_submission;
use crate::startup::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::utils::validation::ValidatedJson;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct BookingFilter {
    pub status: Option<String>,
}

/// POST /api/bookings
///
/// The row is always stored as `pending`; only Stripe events move it on.
#[tracing::instrument(skip_all, fields(booking_type = tracing::field::Empty))]
pub async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<ValidatedJson<CreateBookingRequest>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let ValidatedJson(req) = payload.inspect_err(|_| record_submission("booking", "invalid"))?;
    tracing::Span::current().record("booking_type", req.booking_type.as_str());

    let new_booking = NewBooking::from_request(req, client_info(&headers));
    let booking = state
        .db
        .insert_booking(&new_booking)
        .await
        .inspect_err(|_| record_submission("booking", "error"))?;
    record_submission("booking", "ok");

    state.forwarder.spawn_booking(booking.clone());

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "booking": {
                "id": booking.id,
                "booking_date": booking.created_at,
                "start_date": booking.start_date,
                "end_date": booking.end_date,
                "status": booking.status,
            }
        })),
    ))
}

/// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking = state
        .db
        .get_booking(id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))?;

    Ok(Json(json!({ "booking": booking })))
}

/// GET /api/admin/bookings
pub async fn list_bookings(
    _admin: AdminContext,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Value>, AppError> {
    let status = match filter.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::bad_request(format!("Unknown booking status: {}", raw)))?,
        ),
    };

    let bookings = state
        .db
        .list_bookings(status, page.limit, page.offset)
        .await?;

    Ok(Json(json!({ "count": bookings.len(), "bookings": bookings })))
}
