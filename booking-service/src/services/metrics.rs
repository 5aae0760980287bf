//! Prometheus metrics for booking-service.
//!
//! HTTP request metrics come from the `metrics` recorder fed by
//! `service_core::middleware::metrics`; domain counters live in the default
//! `prometheus` registry. `/metrics` renders both.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Submissions persisted, by kind (lead, booking, guide) and outcome.
pub static SUBMISSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "booking_submissions_total",
        "Form submissions by kind and status",
        &["kind", "status"]
    )
    .expect("Failed to register submissions_total")
});

/// Calls to third-party APIs, by provider and outcome.
pub static INTEGRATION_CALLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "booking_integration_calls_total",
        "Outbound integration calls by provider and status",
        &["provider", "status"]
    )
    .expect("Failed to register integration_calls_total")
});

/// Stripe webhook events, by event type and handling result.
pub static PAYMENT_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "booking_payment_events_total",
        "Stripe webhook events by type and result",
        &["event_type", "result"]
    )
    .expect("Failed to register payment_events_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "booking_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Install the HTTP metrics recorder and force domain metric registration.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_none() {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = METRICS_HANDLE.set(handle);
            }
            Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
        }
    }

    Lazy::force(&SUBMISSIONS_TOTAL);
    Lazy::force(&INTEGRATION_CALLS_TOTAL);
    Lazy::force(&PAYMENT_EVENTS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let mut buffer = Vec::new();
    if TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .is_ok()
    {
        output.push_str(&String::from_utf8_lossy(&buffer));
    }

    output
}

pub fn record_submission(kind: &str, status: &str) {
    SUBMISSIONS_TOTAL.with_label_values(&[kind, status]).inc();
}

pub fn record_integration_call(provider: &str, success: bool) {
    let status = if success { "ok" } else { "error" };
    INTEGRATION_CALLS_TOTAL
        .with_label_values(&[provider, status])
        .inc();
}

pub fn record_payment_event(event_type: &str, result: &str) {
    PAYMENT_EVENTS_TOTAL
        .with_label_values(&[event_type, result])
        .inc();
}
