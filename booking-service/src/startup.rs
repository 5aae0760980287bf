//! Application startup and lifecycle management.
//!
//! Wires the database, the integration clients and the `/api/*` router, and
//! owns the HTTP listener.

use crate::config::BookingConfig;
use crate::handlers::{
    admin, bookings, email, guides, health, leads, listings, not_found, notifications, payments,
    webhooks,
};
use crate::services::email::build_email_provider;
use crate::services::{
    ActiveCampaignClient, AirtableClient, Database, EmailComposer, EmailProvider, Forwarder,
    StripeClient, TrackHsClient, WebhookDispatcher,
};
use axum::body::Body;
use axum::http::{header, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    bot_detection::bot_detection_middleware,
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{make_request_span, request_id_middleware, REQUEST_ID_HEADER},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: BookingConfig,
    pub stripe: StripeClient,
    pub email: Arc<dyn EmailProvider>,
    pub composer: EmailComposer,
    pub webhooks: WebhookDispatcher,
    pub forwarder: Forwarder,
    pub trackhs: TrackHsClient,
    pub submission_limiter: IpRateLimiter,
}

impl AppState {
    /// Build every client from `config` around an existing pool.
    pub fn new(config: BookingConfig, db: Database) -> Self {
        let email = build_email_provider(&config);
        Self::with_email_provider(config, db, email)
    }

    pub fn with_email_provider(
        config: BookingConfig,
        db: Database,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        log_integration_status(&config);

        let composer = EmailComposer::new(
            config.site.clone(),
            config.admin.notification_email.clone(),
        );
        let webhooks = WebhookDispatcher::new(db.clone(), &config.webhooks);
        let forwarder = Forwarder::new(
            db.clone(),
            AirtableClient::new(config.airtable.clone()),
            ActiveCampaignClient::new(config.active_campaign.clone()),
            email.clone(),
            composer.clone(),
            webhooks.clone(),
        );

        Self {
            stripe: StripeClient::new(config.stripe.clone()),
            trackhs: TrackHsClient::new(config.trackhs.clone()),
            submission_limiter: create_ip_rate_limiter(
                config.rate_limit.submissions_per_minute,
                60,
            ),
            db,
            config,
            email,
            composer,
            webhooks,
            forwarder,
        }
    }
}

fn log_integration_status(config: &BookingConfig) {
    let integrations = [
        ("Stripe", config.stripe.is_configured()),
        ("Airtable", config.airtable.is_configured()),
        ("ActiveCampaign", config.active_campaign.is_configured()),
        ("SendGrid", config.sendgrid.is_configured()),
        ("SMTP", config.smtp.enabled),
        ("TrackHS", config.trackhs.is_configured()),
    ];

    for (name, configured) in integrations {
        if configured {
            tracing::info!(integration = name, "Integration enabled");
        } else {
            tracing::warn!(integration = name, "Integration not configured - disabled");
        }
    }

    if config.admin.api_token.is_none() {
        tracing::warn!("ADMIN_API_TOKEN not set - admin routes will answer 503");
    }
    if config.webhooks.make_url.is_none() {
        tracing::info!("MAKE_WEBHOOK_URL not set - only registered webhook targets receive events");
    }
}

/// The full `/api/*` router with middleware applied.
pub fn build_router(state: AppState) -> Router {
    // Public form posts: rate limited per IP and screened for bots
    let submission_routes = Router::new()
        .route("/api/leads", post(leads::create_lead))
        .route("/api/bookings", post(bookings::create_booking))
        .route(
            "/api/guide-submissions",
            post(guides::create_guide_submission),
        )
        .route(
            "/api/create-payment-intent",
            post(payments::create_payment_intent),
        )
        .route(
            "/api/email/send-booking-confirmation",
            post(email::send_booking_confirmation),
        )
        .layer(from_fn(bot_detection_middleware))
        .layer(from_fn_with_state(
            state.submission_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let admin_routes = Router::new()
        .route("/api/admin/leads", get(leads::list_leads))
        .route("/api/admin/leads/:id", get(leads::get_lead))
        .route("/api/admin/bookings", get(bookings::list_bookings))
        .route(
            "/api/admin/guide-submissions",
            get(guides::list_guide_submissions),
        )
        .route(
            "/api/email/send-lead-notification",
            post(email::send_lead_notification),
        )
        .route("/api/notifications/test-email", post(notifications::test_email))
        .route("/api/notifications/test-lead", post(notifications::test_lead))
        .route(
            "/api/notifications/test-booking",
            post(notifications::test_booking),
        )
        .route("/api/notifications/test-guide", post(notifications::test_guide))
        .route("/api/notifications/test-all", post(notifications::test_all))
        .route("/api/webhooks/setup", post(webhooks::setup_webhook))
        .route("/api/webhooks", get(webhooks::list_webhooks))
        .route(
            "/api/admin/webhook-deliveries",
            get(webhooks::list_deliveries),
        )
        .route(
            "/api/admin/webhook-retry/:id",
            post(webhooks::retry_delivery),
        )
        .route("/api/admin/villas/sync", post(admin::sync_villas));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .route(
            "/api/listings",
            get(listings::list_listings).post(listings::create_listing),
        )
        .route("/api/listings/:id", get(listings::get_listing))
        .route("/api/villas", get(listings::list_villas))
        .route("/api/villas/:track_hs_id", get(listings::get_villa))
        .route("/api/resorts/:slug", get(listings::get_resort))
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/stripe-webhook", post(payments::stripe_webhook))
        .merge(submission_routes)
        .merge(admin_routes)
        .fallback(not_found)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static(REQUEST_ID_HEADER),
                ]),
        )
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connect, migrate and bind.
    pub async fn build(config: BookingConfig) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            e
        })?;

        db.run_migrations().await?;

        Self::build_with_state(AppState::new(config, db)).await
    }

    /// Bind a listener for prepared state (port 0 picks a free port).
    pub async fn build_with_state(state: AppState) -> Result<Self, AppError> {
        let http_addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Booking service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Serve until the listener fails. Starts the TrackHS sync worker when
    /// TrackHS credentials are present.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        if self.state.trackhs.is_configured() {
            let interval = self.state.trackhs.sync_interval();
            tracing::info!(interval_secs = interval.as_secs(), "Starting TrackHS sync worker");
            self.state
                .trackhs
                .clone()
                .spawn_sync_worker(self.state.db.clone());
        }

        let router = build_router(self.state);
        axum::serve(
            self.http_listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}
