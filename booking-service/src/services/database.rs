//! Postgres access for booking-service.

use crate::models::{
    Booking, BookingStatus, CreateListingRequest, DeliveryFilter, GuideSubmission, Lead, Listing,
    ListingType, NewBooking, NewDelivery, NewGuideSubmission, NewLead, SetupWebhookRequest,
    SyncedVilla, WebhookDelivery, WebhookEvent, WebhookTarget,
};
use crate::models::listing::slugify;
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Upper bound on admin list endpoints.
pub const MAX_PAGE_SIZE: i64 = 500;

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_PAGE_SIZE)
}

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(database_url), fields(service = "booking-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| db_error("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Pool that connects on first use; for tests and tooling that may
    /// never touch the database.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(2))
            .connect_lazy(database_url)
            .map_err(|e| db_error("Invalid database URL", e))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Leads
    // -------------------------------------------------------------------------

    #[instrument(skip(self, lead), fields(interest_type = %lead.interest_type))]
    pub async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_lead"])
            .start_timer();

        let row = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (
                id, first_name, last_name, email, phone, interest_type, source, budget,
                timeline, message, form_name, form_data, tags, preferred_contact_method,
                referrer, user_agent, ip_address, utm_source, utm_medium, utm_campaign
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&lead.first_name)
        .bind(&lead.last_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.interest_type)
        .bind(&lead.source)
        .bind(&lead.budget)
        .bind(&lead.timeline)
        .bind(&lead.message)
        .bind(&lead.form_name)
        .bind(&lead.form_data)
        .bind(&lead.tags)
        .bind(lead.preferred_contact_method.map(|m| m.as_str()))
        .bind(&lead.client.referrer)
        .bind(&lead.client.user_agent)
        .bind(&lead.client.ip_address)
        .bind(&lead.utm_source)
        .bind(&lead.utm_medium)
        .bind(&lead.utm_campaign)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert lead", e))?;

        timer.observe_duration();
        info!(lead_id = %row.id, "Lead stored");

        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get lead", e))
    }

    #[instrument(skip(self))]
    pub async fn list_leads(
        &self,
        interest_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Lead>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_leads"])
            .start_timer();

        let rows = sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM leads
            WHERE ($1::varchar IS NULL OR interest_type = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(interest_type)
        .bind(clamp_limit(limit))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list leads", e))?;

        timer.observe_duration();
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Bookings
    // -------------------------------------------------------------------------

    #[instrument(skip(self, booking), fields(booking_type = %booking.booking_type))]
    pub async fn insert_booking(&self, booking: &NewBooking) -> Result<Booking, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_booking"])
            .start_timer();

        let row = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, first_name, last_name, email, phone, booking_type, listing_id, item_name,
                start_date, end_date, guests, total_amount, currency, special_requests, status,
                payment_intent_id, payment_method, source, form_name, form_data, tags, referrer
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&booking.first_name)
        .bind(&booking.last_name)
        .bind(&booking.email)
        .bind(&booking.phone)
        .bind(booking.booking_type.as_str())
        .bind(&booking.listing_id)
        .bind(&booking.item_name)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.guests)
        .bind(booking.total_amount)
        .bind(&booking.currency)
        .bind(&booking.special_requests)
        .bind(booking.status.as_str())
        .bind(&booking.payment_intent_id)
        .bind(&booking.payment_method)
        .bind(&booking.source)
        .bind(&booking.form_name)
        .bind(&booking.form_data)
        .bind(&booking.tags)
        .bind(&booking.referrer)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Booking for this payment already exists"))
            }
            _ => db_error("Failed to insert booking", e),
        })?;

        timer.observe_duration();
        info!(booking_id = %row.id, status = %row.status, "Booking stored");

        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get booking", e))
    }

    #[instrument(skip(self))]
    pub async fn list_bookings(
        &self,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_bookings"])
            .start_timer();

        let rows = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(clamp_limit(limit))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list bookings", e))?;

        timer.observe_duration();
        Ok(rows)
    }

    /// Move the booking tied to a payment intent to `status`.
    ///
    /// Returns `None` when no booking references the intent. A booking that
    /// is already `confirmed` is never downgraded to `failed`.
    #[instrument(skip(self))]
    pub async fn update_booking_status_by_payment_intent(
        &self,
        payment_intent_id: &str,
        status: BookingStatus,
    ) -> Result<Option<Booking>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_booking_status"])
            .start_timer();

        let row = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2, updated_at = NOW()
            WHERE payment_intent_id = $1
              AND NOT (status = 'confirmed' AND $2 = 'failed')
            RETURNING *
            "#,
        )
        .bind(payment_intent_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update booking status", e))?;

        timer.observe_duration();

        if let Some(ref booking) = row {
            info!(booking_id = %booking.id, status = %booking.status, "Booking status updated");
        }

        Ok(row)
    }

    // -------------------------------------------------------------------------
    // Guide submissions
    // -------------------------------------------------------------------------

    #[instrument(skip(self, submission), fields(guide_type = %submission.guide_type))]
    pub async fn insert_guide_submission(
        &self,
        submission: &NewGuideSubmission,
    ) -> Result<GuideSubmission, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_guide_submission"])
            .start_timer();

        let row = sqlx::query_as::<_, GuideSubmission>(
            r#"
            INSERT INTO guide_submissions (
                id, submission_id, first_name, last_name, email, phone, guide_type,
                interest_areas, preferred_contact_method, source, form_name, tags, download_link
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&submission.submission_id)
        .bind(&submission.first_name)
        .bind(&submission.last_name)
        .bind(&submission.email)
        .bind(&submission.phone)
        .bind(&submission.guide_type)
        .bind(&submission.interest_areas)
        .bind(submission.preferred_contact_method.as_str())
        .bind(&submission.source)
        .bind(&submission.form_name)
        .bind(&submission.tags)
        .bind(&submission.download_link)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Submission '{}' already exists",
                    submission.submission_id
                ))
            }
            _ => db_error("Failed to insert guide submission", e),
        })?;

        timer.observe_duration();
        info!(submission_id = %row.submission_id, "Guide submission stored");

        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn mark_guide_processed(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE guide_submissions SET processed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to mark guide submission processed", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_guide_submissions(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GuideSubmission>, AppError> {
        sqlx::query_as::<_, GuideSubmission>(
            "SELECT * FROM guide_submissions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(clamp_limit(limit))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list guide submissions", e))
    }

    // -------------------------------------------------------------------------
    // Listings
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn list_listings(
        &self,
        listing_type: Option<ListingType>,
    ) -> Result<Vec<Listing>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_listings"])
            .start_timer();

        let rows = sqlx::query_as::<_, Listing>(
            r#"
            SELECT * FROM listings
            WHERE ($1::varchar IS NULL OR listing_type = $1)
            ORDER BY title
            "#,
        )
        .bind(listing_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list listings", e))?;

        timer.observe_duration();
        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>, AppError> {
        sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get listing", e))
    }

    #[instrument(skip(self))]
    pub async fn get_listing_by_slug(
        &self,
        slug: &str,
        listing_type: ListingType,
    ) -> Result<Option<Listing>, AppError> {
        sqlx::query_as::<_, Listing>(
            "SELECT * FROM listings WHERE slug = $1 AND listing_type = $2 LIMIT 1",
        )
        .bind(slug)
        .bind(listing_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get listing by slug", e))
    }

    #[instrument(skip(self))]
    pub async fn get_villa_by_track_hs_id(
        &self,
        track_hs_id: &str,
    ) -> Result<Option<Listing>, AppError> {
        sqlx::query_as::<_, Listing>(
            "SELECT * FROM listings WHERE track_hs_id = $1 AND listing_type = 'villa'",
        )
        .bind(track_hs_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get villa", e))
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_listing(&self, input: &CreateListingRequest) -> Result<Listing, AppError> {
        let row = sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO listings (
                id, title, slug, description, listing_type, image_url, price, location,
                booking_type, amenities
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.title.trim())
        .bind(slugify(&input.title))
        .bind(&input.description)
        .bind(input.listing_type.as_str())
        .bind(&input.image_url)
        .bind(input.price)
        .bind(&input.location)
        .bind(&input.booking_type)
        .bind(&input.amenities)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create listing", e))?;

        info!(listing_id = %row.id, slug = %row.slug, "Listing created");
        Ok(row)
    }

    /// Insert or refresh a villa keyed by its property-management id.
    #[instrument(skip(self, villa), fields(track_hs_id = %villa.track_hs_id))]
    pub async fn upsert_synced_villa(&self, villa: &SyncedVilla) -> Result<Listing, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_villa"])
            .start_timer();

        let row = sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO listings (
                id, title, slug, description, listing_type, image_url, image_urls, price,
                location, booking_type, amenities, bedrooms, bathrooms, max_guests, address,
                latitude, longitude, track_hs_id, last_synced_at
            )
            VALUES ($1, $2, $3, $4, 'villa', $5, $6, $7, $8, 'form', $9, $10, $11, $12, $13, $14, $15, $16, NOW())
            ON CONFLICT (track_hs_id) DO UPDATE SET
                title = EXCLUDED.title,
                slug = EXCLUDED.slug,
                description = EXCLUDED.description,
                image_url = EXCLUDED.image_url,
                image_urls = EXCLUDED.image_urls,
                price = EXCLUDED.price,
                location = EXCLUDED.location,
                amenities = EXCLUDED.amenities,
                bedrooms = EXCLUDED.bedrooms,
                bathrooms = EXCLUDED.bathrooms,
                max_guests = EXCLUDED.max_guests,
                address = EXCLUDED.address,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                last_synced_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&villa.title)
        .bind(slugify(&villa.title))
        .bind(&villa.description)
        .bind(&villa.image_url)
        .bind(&villa.image_urls)
        .bind(villa.price_per_night)
        .bind(&villa.location)
        .bind(&villa.amenities)
        .bind(villa.bedrooms)
        .bind(villa.bathrooms)
        .bind(villa.max_guests)
        .bind(&villa.address)
        .bind(villa.latitude)
        .bind(villa.longitude)
        .bind(&villa.track_hs_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to upsert villa", e))?;

        timer.observe_duration();
        Ok(row)
    }

    // -------------------------------------------------------------------------
    // Webhook targets and deliveries
    // -------------------------------------------------------------------------

    /// Create a target, or replace the one with the same name.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn upsert_webhook_target(
        &self,
        input: &SetupWebhookRequest,
    ) -> Result<WebhookTarget, AppError> {
        let row = sqlx::query_as::<_, WebhookTarget>(
            r#"
            INSERT INTO webhook_targets (id, name, url, service_type, auth_header, is_active, events)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name) DO UPDATE SET
                url = EXCLUDED.url,
                service_type = EXCLUDED.service_type,
                auth_header = EXCLUDED.auth_header,
                is_active = EXCLUDED.is_active,
                events = EXCLUDED.events,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.url)
        .bind(&input.service_type)
        .bind(&input.auth_header)
        .bind(input.is_active)
        .bind(&input.events)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save webhook target", e))?;

        info!(webhook_id = %row.id, url = %row.url, "Webhook target saved");
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn list_webhook_targets(&self) -> Result<Vec<WebhookTarget>, AppError> {
        sqlx::query_as::<_, WebhookTarget>("SELECT * FROM webhook_targets ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list webhook targets", e))
    }

    #[instrument(skip(self))]
    pub async fn get_webhook_target(&self, id: Uuid) -> Result<Option<WebhookTarget>, AppError> {
        sqlx::query_as::<_, WebhookTarget>("SELECT * FROM webhook_targets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get webhook target", e))
    }

    #[instrument(skip(self))]
    pub async fn active_webhook_targets(
        &self,
        event: WebhookEvent,
    ) -> Result<Vec<WebhookTarget>, AppError> {
        sqlx::query_as::<_, WebhookTarget>(
            "SELECT * FROM webhook_targets WHERE is_active AND $1 = ANY(events) ORDER BY name",
        )
        .bind(event.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list active webhook targets", e))
    }

    #[instrument(skip(self, delivery), fields(event = %delivery.event, success = delivery.success))]
    pub async fn insert_delivery(
        &self,
        delivery: &NewDelivery,
    ) -> Result<WebhookDelivery, AppError> {
        sqlx::query_as::<_, WebhookDelivery>(
            r#"
            INSERT INTO webhook_deliveries (
                id, webhook_id, target_url, event, payload, response_status, response_body, success
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(delivery.webhook_id)
        .bind(&delivery.target_url)
        .bind(delivery.event.as_str())
        .bind(&delivery.payload)
        .bind(delivery.response_status)
        .bind(&delivery.response_body)
        .bind(delivery.success)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record webhook delivery", e))
    }

    #[instrument(skip(self))]
    pub async fn list_deliveries(
        &self,
        filter: &DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, AppError> {
        sqlx::query_as::<_, WebhookDelivery>(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE ($1::varchar IS NULL OR event = $1)
              AND ($2::uuid IS NULL OR webhook_id = $2)
              AND ($3::boolean IS NULL OR success = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(&filter.event_type)
        .bind(filter.webhook_id)
        .bind(filter.success)
        .bind(clamp_limit(filter.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list webhook deliveries", e))
    }

    #[instrument(skip(self))]
    pub async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, AppError> {
        sqlx::query_as::<_, WebhookDelivery>("SELECT * FROM webhook_deliveries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get webhook delivery", e))
    }

    /// Record the outcome of a manual retry on an existing delivery row.
    #[instrument(skip(self, response_body))]
    pub async fn record_delivery_retry(
        &self,
        id: Uuid,
        response_status: Option<i32>,
        response_body: Option<&str>,
        success: bool,
    ) -> Result<WebhookDelivery, AppError> {
        sqlx::query_as::<_, WebhookDelivery>(
            r#"
            UPDATE webhook_deliveries
            SET attempts = attempts + 1,
                response_status = $2,
                response_body = $3,
                success = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(response_status)
        .bind(response_body)
        .bind(success)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }

    // -------------------------------------------------------------------------
    // Stripe event log
    // -------------------------------------------------------------------------

    /// Remember a Stripe event id. Returns `false` if it was already seen.
    #[instrument(skip(self, payload))]
    pub async fn record_payment_event(
        &self,
        stripe_event_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_events (stripe_event_id, event_type, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (stripe_event_id) DO NOTHING
            "#,
        )
        .bind(stripe_event_id)
        .bind(event_type)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record payment event", e))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    pub async fn mark_payment_event_processed(
        &self,
        stripe_event_id: &str,
        error: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE payment_events
            SET processed = $2, processing_error = $3
            WHERE stripe_event_id = $1
            "#,
        )
        .bind(stripe_event_id)
        .bind(error.is_none())
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark payment event", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_limits_are_clamped_to_page_bounds() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(-5), 1);
        assert_eq!(clamp_limit(100), 100);
        assert_eq!(clamp_limit(10_000), MAX_PAGE_SIZE);
    }
}
