//! HTTP routes for the auth gate service.
//!
//! Defines the Axum router and application state.

use crate::auth::catalog::ClaimsPolicyCatalog;
use crate::auth::resolver::{HttpClient, KeyResolver};
use crate::auth::validator::ClaimsValidator;
use crate::config::Config;
use crate::discovery::ServiceDiscovery;
use crate::handlers::{self, nmos_api};
use crate::middleware::{AuthContext, AuthGate};
use axum::{
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Base path of the IS-04 registration API.
pub const REGISTRATION_API_BASE: &str = "/x-nmos/registration/v1.3";

/// Base path of the IS-04 query API.
pub const QUERY_API_BASE: &str = "/x-nmos/query/v1.3";

/// Base path of the IS-05 connection API.
pub const CONNECTION_API_BASE: &str = "/x-nmos/connection/v1.1";

/// Application state shared across route construction.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Collaborators shared by every gate.
    pub auth: Arc<AuthContext>,
}

/// Wire the gate collaborators from configuration.
pub fn build_auth_context(
    config: &Config,
    discovery: Arc<dyn ServiceDiscovery>,
    http: Arc<dyn HttpClient>,
) -> Arc<AuthContext> {
    let catalog = ClaimsPolicyCatalog::nmos(config.issuer.as_deref(), config.audience.as_deref());
    Arc::new(AuthContext {
        resolver: KeyResolver::new(discovery, http, config.auth_service_name.clone()),
        validator: ClaimsValidator::new(Arc::new(catalog)),
        key_mode: config.key_mode,
        leeway: Duration::from_secs(config.jwt_clock_skew_seconds),
    })
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/x-nmos/registration/v1.3/...` - gated for the `registration` API
/// - `/x-nmos/query/v1.3/...` - gated for the `query` API
/// - `/x-nmos/connection/v1.1/...` - gated for the `connection` API
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let gate = |api_name: &str| {
        AuthGate::new(
            state.config.auth_enabled,
            api_name,
            None,
            state.auth.clone(),
        )
    };

    // Public routes (no authorization required)
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Gated routes, one gate per API
    let registration_routes = gate("registration").protect(
        Router::new()
            .route(
                &format!("{}/", REGISTRATION_API_BASE),
                get(nmos_api::registration_root),
            )
            .route(
                &format!("{}/resource", REGISTRATION_API_BASE),
                post(nmos_api::register_resource),
            ),
    );

    let query_routes = gate("query").protect(
        Router::new().route(&format!("{}/", QUERY_API_BASE), get(nmos_api::query_root)),
    );

    let connection_routes = gate("connection").protect(
        Router::new()
            .route(
                &format!("{}/", CONNECTION_API_BASE),
                get(nmos_api::connection_root),
            )
            .route(
                &format!("{}/single/receivers/:id/staged", CONNECTION_API_BASE),
                patch(nmos_api::stage_receiver),
            ),
    );

    // Merge routes and apply global middleware layers
    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    public_routes
        .merge(metrics_routes)
        .merge(registration_routes)
        .merge(query_routes)
        .merge(connection_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
