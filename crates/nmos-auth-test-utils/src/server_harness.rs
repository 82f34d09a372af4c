//! Key server harness and router helpers for integration tests
//!
//! `MockKeyServer` stands in for the NMOS authorization server's key
//! endpoints. `test_router` builds the real application router pointed at
//! a given authorization server href.

use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use nmos_auth::auth::resolver::{HttpClient, ReqwestHttpClient, CERTS_PATH, JWKS_PATH};
use nmos_auth::config::Config;
use nmos_auth::discovery::StaticDiscovery;
use nmos_auth::routes::{build_auth_context, build_routes, AppState};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock authorization server serving the JWKS and certificate endpoints.
///
/// # Example
/// ```rust,ignore
/// let server = MockKeyServer::start().await;
/// server.serve_jwks(test_jwks()).await;
/// let router = test_router(&server.href(), true, HashMap::new());
/// ```
pub struct MockKeyServer {
    server: MockServer,
}

impl MockKeyServer {
    /// Start a server on a random local port with nothing mounted.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base href to register with discovery.
    pub fn href(&self) -> String {
        self.server.uri()
    }

    /// Serve `body` as JSON from the JWKS endpoint.
    pub async fn serve_jwks(&self, body: Value) {
        self.respond_on(JWKS_PATH, ResponseTemplate::new(200).set_body_json(body))
            .await;
    }

    /// Serve `body` as JSON from the certificates endpoint.
    pub async fn serve_certs(&self, body: Value) {
        self.respond_on(CERTS_PATH, ResponseTemplate::new(200).set_body_json(body))
            .await;
    }

    /// Mount an arbitrary response for GETs on `relative_path`.
    pub async fn respond_on(&self, relative_path: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/{}", relative_path)))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Drop every mounted response and the request log.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Number of requests the server has received.
    pub async fn received_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

/// Build the application router with gates pointed at `auth_href`.
///
/// `extra_vars` are layered over the defaults before the configuration is
/// parsed, e.g. `AUTH_KEY_MODE` or `AUTH_AUDIENCE`.
pub fn test_router(auth_href: &str, auth_enabled: bool, extra_vars: HashMap<String, String>) -> Router {
    let http = ReqwestHttpClient::new(Duration::from_secs(5)).expect("HTTP client should build");
    test_router_with_client(auth_href, auth_enabled, extra_vars, Arc::new(http))
}

/// Like `test_router`, with an injected HTTP client.
pub fn test_router_with_client(
    auth_href: &str,
    auth_enabled: bool,
    extra_vars: HashMap<String, String>,
    http: Arc<dyn HttpClient>,
) -> Router {
    let mut vars = HashMap::from([
        ("AUTH_SERVER_URL".to_string(), auth_href.to_string()),
        ("AUTH_ENABLED".to_string(), auth_enabled.to_string()),
    ]);
    vars.extend(extra_vars);

    let config = Config::from_vars(&vars).expect("test config should load");
    let discovery = StaticDiscovery::new()
        .with_service(&config.auth_service_name, auth_href)
        .expect("test href should parse");
    let auth = build_auth_context(&config, Arc::new(discovery), http);

    // A handle without a global recorder; tests never scrape it
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    build_routes(Arc::new(AppState { config, auth }), metrics_handle)
}
