//! Observability for the auth gate.
//!
//! Metrics are recorded through the `metrics` facade and exposed by the
//! Prometheus exporter installed in `routes::init_metrics_recorder`.

pub mod metrics;
