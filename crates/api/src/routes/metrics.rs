//! Prometheus scrape endpoint.
//!
//! Exposes the booking counters (`bookings_total`,
//! `bookings_payment_failed_total`, `reminders_sent_total`) and the
//! booking duration histogram alongside the default process metrics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — renders the recorder state in Prometheus text format.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
