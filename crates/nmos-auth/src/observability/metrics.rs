//! Metrics definitions for the auth gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `api`: the API names gates are registered for
//! - `outcome`: `authorized` or an `AuthError` kind
//! - `mode`: 2 values (jwk, cert)
//! - `status`: 2 values (success, error)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder.
///
/// # Errors
///
/// Returns an error if bucket configuration is rejected or a recorder is
/// already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Key fetch buckets - remote call bounded by the client timeout
        .set_buckets_for_metric(
            Matcher::Full("auth_key_fetch_duration_seconds".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set key fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record the outcome of a gated request.
///
/// Metric: `auth_decisions_total`
/// Labels: `api`, `outcome`
pub fn record_auth_decision(api: &str, outcome: &str) {
    counter!("auth_decisions_total",
        "api" => api.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a key material fetch from the authorization server.
///
/// Metric: `auth_key_fetch_total`, `auth_key_fetch_duration_seconds`
/// Labels: `mode`, `status`
pub fn record_key_fetch(mode: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    histogram!("auth_key_fetch_duration_seconds",
        "mode" => mode.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("auth_key_fetch_total",
        "mode" => mode.to_string(),
        "status" => status
    )
    .increment(1);
}
