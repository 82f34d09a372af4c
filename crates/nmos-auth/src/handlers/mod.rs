//! HTTP request handlers for the auth gate service.

pub mod health;
pub mod metrics;
pub mod nmos_api;

pub use health::health_check;
pub use metrics::metrics_handler;
