//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is not gated so Prometheus can scrape it. Metric labels
//! carry API names and outcome kinds only, never token content.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus-formatted metrics for scraping:
/// ```text
/// # TYPE auth_decisions_total counter
/// auth_decisions_total{api="registration",outcome="authorized"} 42
/// ```
#[tracing::instrument(skip_all, name = "auth.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
