//! Authorization gate integration tests.
//!
//! Drives the real router through `oneshot` with the authorization server
//! mocked by wiremock.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use nmos_auth::auth::claims::{ClaimRule, ClaimsPolicy};
use nmos_auth::auth::resolver::ReqwestHttpClient;
use nmos_auth::config::Config;
use nmos_auth::discovery::StaticDiscovery;
use nmos_auth::middleware::{AuthGate, ClaimsExt};
use nmos_auth::routes::build_auth_context;
use nmos_auth_test_utils::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::ResponseTemplate;

const REGISTRATION_ROOT: &str = "/x-nmos/registration/v1.3/";
const REGISTRATION_RESOURCE: &str = "/x-nmos/registration/v1.3/resource";
const QUERY_ROOT: &str = "/x-nmos/query/v1.3/";
const CONNECTION_ROOT: &str = "/x-nmos/connection/v1.1/";
const CONNECTION_STAGED: &str =
    "/x-nmos/connection/v1.1/single/receivers/3b8be755-08ff-452b-b217-c9151eb21193/staged";

async fn jwks_server() -> MockKeyServer {
    let server = MockKeyServer::start().await;
    server.serve_jwks(test_jwks()).await;
    server
}

fn request(method: Method, uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method.clone()).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }
    if method == Method::GET {
        builder.body(Body::empty()).unwrap()
    } else {
        builder
            .header("Content-Type", "application/json")
            .body(Body::from(json!({"type": "node"}).to_string()))
            .unwrap()
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, token: &str) -> StatusCode {
    let auth = bearer(token);
    app.clone()
        .oneshot(request(method, uri, Some(&auth)))
        .await
        .unwrap()
        .status()
}

// ============================================================================
// Claims matrix
// ============================================================================

#[tokio::test]
async fn test_claims_matrix_with_write_grant() -> Result<()> {
    let server = jwks_server().await;
    let app = test_router(&server.href(), true, HashMap::new());
    let token = TestTokenBuilder::new()
        .with_api(&["registration", "connection"], "write")
        .with_audience("node-1")
        .sign();

    assert_eq!(send(&app, Method::GET, QUERY_ROOT, &token).await, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, Method::GET, REGISTRATION_ROOT, &token).await, StatusCode::OK);
    assert_eq!(send(&app, Method::GET, CONNECTION_ROOT, &token).await, StatusCode::OK);
    assert_eq!(send(&app, Method::PATCH, CONNECTION_STAGED, &token).await, StatusCode::OK);
    assert_eq!(
        send(&app, Method::POST, REGISTRATION_RESOURCE, &token).await,
        StatusCode::CREATED
    );

    Ok(())
}

#[tokio::test]
async fn test_claims_matrix_with_read_grant() -> Result<()> {
    let server = jwks_server().await;
    let app = test_router(&server.href(), true, HashMap::new());
    let token = TestTokenBuilder::new()
        .with_api(&["registration", "connection"], "read")
        .with_audience("node-1")
        .sign();

    assert_eq!(send(&app, Method::GET, CONNECTION_ROOT, &token).await, StatusCode::OK);
    assert_eq!(
        send(&app, Method::PATCH, CONNECTION_STAGED, &token).await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        send(&app, Method::POST, REGISTRATION_RESOURCE, &token).await,
        StatusCode::FORBIDDEN
    );

    Ok(())
}

#[tokio::test]
async fn test_forbidden_response_names_claim() -> Result<()> {
    let server = jwks_server().await;
    let app = test_router(&server.href(), true, HashMap::new());
    let token = TestTokenBuilder::new()
        .with_api(&["registration"], "read")
        .sign();

    let response = app
        .oneshot(request(Method::GET, QUERY_ROOT, Some(&bearer(&token))))
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_CLAIM");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("x-nmos-api"));

    Ok(())
}

#[tokio::test]
async fn test_connection_api_requires_audience() -> Result<()> {
    let server = jwks_server().await;
    let app = test_router(&server.href(), true, HashMap::new());
    let token = TestTokenBuilder::new()
        .with_api(&["connection"], "write")
        .sign();

    assert_eq!(
        send(&app, Method::GET, CONNECTION_ROOT, &token).await,
        StatusCode::FORBIDDEN
    );

    Ok(())
}

#[tokio::test]
async fn test_configured_issuer_is_enforced() -> Result<()> {
    let server = jwks_server().await;
    let vars = HashMap::from([(
        "AUTH_ISSUER".to_string(),
        "https://auth.example.com".to_string(),
    )]);
    let app = test_router(&server.href(), true, vars);

    let good = TestTokenBuilder::new()
        .with_api(&["registration"], "read")
        .sign();
    let bad = TestTokenBuilder::new()
        .with_issuer("https://rogue.example.com")
        .with_api(&["registration"], "read")
        .sign();

    assert_eq!(send(&app, Method::GET, REGISTRATION_ROOT, &good).await, StatusCode::OK);
    assert_eq!(
        send(&app, Method::GET, REGISTRATION_ROOT, &bad).await,
        StatusCode::FORBIDDEN
    );

    Ok(())
}

// ============================================================================
// Authorization header handling
// ============================================================================

#[tokio::test]
async fn test_missing_header_is_unauthorized() -> Result<()> {
    let server = jwks_server().await;
    let app = test_router(&server.href(), true, HashMap::new());

    let response = app
        .oneshot(request(Method::GET, REGISTRATION_ROOT, None))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("WWW-Authenticate").is_some());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "MISSING_AUTHORIZATION");
    assert_eq!(server.received_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_empty_and_null_headers_are_missing_authorization() -> Result<()> {
    let server = jwks_server().await;
    let app = test_router(&server.href(), true, HashMap::new());

    for header in ["", "null", "Bearer null", "Bearer "] {
        let response = app
            .clone()
            .oneshot(request(Method::GET, REGISTRATION_ROOT, Some(header)))
            .await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{:?}", header);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "MISSING_AUTHORIZATION", "{:?}", header);
    }

    Ok(())
}

#[tokio::test]
async fn test_wrong_scheme_is_unsupported_token_type() -> Result<()> {
    let server = jwks_server().await;
    let app = test_router(&server.href(), true, HashMap::new());
    let token = TestTokenBuilder::new()
        .with_api(&["registration"], "read")
        .sign();

    let response = app
        .oneshot(request(
            Method::GET,
            REGISTRATION_ROOT,
            Some(&format!("barer {}", token)),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNSUPPORTED_TOKEN_TYPE");

    Ok(())
}

// ============================================================================
// Token verification
// ============================================================================

#[tokio::test]
async fn test_expired_token_is_invalid() -> Result<()> {
    let server = jwks_server().await;
    let app = test_router(&server.href(), true, HashMap::new());
    let token = TestTokenBuilder::new()
        .with_api(&["registration"], "read")
        .expires_in(-3600)
        .sign();

    let response = app
        .oneshot(request(Method::GET, REGISTRATION_ROOT, Some(&bearer(&token))))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let www_auth = response.headers().get("WWW-Authenticate").unwrap().to_str()?;
    assert!(www_auth.contains("invalid_token"));

    Ok(())
}

#[tokio::test]
async fn test_token_signed_with_superseded_key_is_rejected() -> Result<()> {
    let server = jwks_server().await;
    let app = test_router(&server.href(), true, HashMap::new());
    let claims = TestTokenBuilder::new()
        .with_api(&["registration"], "read")
        .build();
    let token = sign_rsa(&claims, TEST_PREVIOUS_RSA_PRIVATE_KEY_PEM);

    assert_eq!(
        send(&app, Method::GET, REGISTRATION_ROOT, &token).await,
        StatusCode::UNAUTHORIZED
    );

    Ok(())
}

#[tokio::test]
async fn test_keys_are_fetched_on_every_request() -> Result<()> {
    let server = jwks_server().await;
    let app = test_router(&server.href(), true, HashMap::new());
    let token = TestTokenBuilder::new()
        .with_api(&["registration"], "read")
        .sign();

    send(&app, Method::GET, REGISTRATION_ROOT, &token).await;
    send(&app, Method::GET, REGISTRATION_ROOT, &token).await;

    assert_eq!(server.received_count().await, 2);

    Ok(())
}

#[tokio::test]
async fn test_certificate_mode() -> Result<()> {
    let server = MockKeyServer::start().await;
    server.serve_certs(test_cert_map()).await;
    let vars = HashMap::from([("AUTH_KEY_MODE".to_string(), "cert".to_string())]);
    let app = test_router(&server.href(), true, vars);
    let token = TestTokenBuilder::new()
        .with_api(&["query"], "read")
        .sign();

    assert_eq!(send(&app, Method::GET, QUERY_ROOT, &token).await, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_single_ec_key() -> Result<()> {
    let server = MockKeyServer::start().await;
    server.serve_jwks(test_ec_jwk()).await;
    let app = test_router(&server.href(), true, HashMap::new());
    let token = TestTokenBuilder::new()
        .with_api(&["query"], "read")
        .sign_ec();

    assert_eq!(send(&app, Method::GET, QUERY_ROOT, &token).await, StatusCode::OK);

    Ok(())
}

// ============================================================================
// Key server failures
// ============================================================================

#[tokio::test]
async fn test_key_server_error_status_is_bad_gateway() -> Result<()> {
    let server = MockKeyServer::start().await;
    server
        .respond_on("x-nmos/auth/v1.0/jwks", ResponseTemplate::new(400))
        .await;
    let app = test_router(&server.href(), true, HashMap::new());
    let token = TestTokenBuilder::new().sign();

    let response = app
        .oneshot(request(Method::GET, REGISTRATION_ROOT, Some(&bearer(&token))))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "KEY_SERVER_ERROR");

    Ok(())
}

#[tokio::test]
async fn test_key_server_text_response_is_bad_gateway() -> Result<()> {
    let server = MockKeyServer::start().await;
    server
        .respond_on(
            "x-nmos/auth/v1.0/jwks",
            ResponseTemplate::new(200).set_body_raw(test_jwks().to_string(), "text/plain"),
        )
        .await;
    let app = test_router(&server.href(), true, HashMap::new());
    let token = TestTokenBuilder::new().sign();

    assert_eq!(
        send(&app, Method::GET, REGISTRATION_ROOT, &token).await,
        StatusCode::BAD_GATEWAY
    );

    Ok(())
}

#[tokio::test]
async fn test_unreachable_key_server_is_bad_gateway() -> Result<()> {
    let http = Arc::new(RecordingHttpClient::unreachable());
    let app = test_router_with_client("http://auth.invalid", true, HashMap::new(), http.clone());
    let token = TestTokenBuilder::new().sign();

    assert_eq!(
        send(&app, Method::GET, REGISTRATION_ROOT, &token).await,
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(http.call_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_undiscoverable_auth_server_is_service_unavailable() -> Result<()> {
    let vars = HashMap::from([("AUTH_SERVER_URL".to_string(), "http://auth.local".to_string())]);
    let config = Config::from_vars(&vars)?;
    let http = Arc::new(RecordingHttpClient::json(200, test_jwks()));
    let context = build_auth_context(&config, Arc::new(StaticDiscovery::new()), http.clone());
    let app = AuthGate::new(true, "registration", None, context)
        .protect(Router::new().route("/", get(|| async { "OK" })));
    let token = TestTokenBuilder::new().sign();

    assert_eq!(send(&app, Method::GET, "/", &token).await, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(http.call_count(), 0);

    Ok(())
}

// ============================================================================
// Gate composition
// ============================================================================

#[tokio::test]
async fn test_disabled_gate_makes_no_calls() -> Result<()> {
    let http = Arc::new(RecordingHttpClient::json(200, test_jwks()));
    let app = test_router_with_client("http://auth.local", false, HashMap::new(), http.clone());

    for (method, uri) in [
        (Method::GET, REGISTRATION_ROOT),
        (Method::POST, REGISTRATION_RESOURCE),
        (Method::GET, QUERY_ROOT),
        (Method::PATCH, CONNECTION_STAGED),
    ] {
        let response = app.clone().oneshot(request(method, uri, None)).await?;
        assert!(response.status().is_success(), "{}", uri);
    }

    assert_eq!(http.call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_public_routes_are_not_gated() -> Result<()> {
    let http = Arc::new(RecordingHttpClient::json(200, test_jwks()));
    let app = test_router_with_client("http://auth.local", true, HashMap::new(), http.clone());

    let response = app
        .oneshot(request(Method::GET, "/health", None))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(http.call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_claims_reach_handler() -> Result<()> {
    let http = Arc::new(RecordingHttpClient::json(200, test_jwks()));
    let vars = HashMap::from([("AUTH_SERVER_URL".to_string(), "http://auth.local".to_string())]);
    let config = Config::from_vars(&vars)?;
    let discovery = StaticDiscovery::new().with_service("auth", "http://auth.local")?;
    let context = build_auth_context(&config, Arc::new(discovery), http.clone());

    let app = AuthGate::new(true, "node", None, context).protect(Router::new().route(
        "/",
        get(|req: Request<Body>| async move {
            req.claims()
                .and_then(|claims| claims.subject())
                .unwrap_or("none")
                .to_string()
        }),
    ));

    let token = TestTokenBuilder::new()
        .for_client("node-7")
        .with_api(&["node"], "read")
        .sign();
    let response = app
        .oneshot(request(Method::GET, "/", Some(&bearer(&token))))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await?.to_bytes();
    assert_eq!(&bytes[..], b"node-7");
    assert_eq!(
        http.requested_urls()[0].as_str(),
        "http://auth.local/x-nmos/auth/v1.0/jwks"
    );

    Ok(())
}

#[tokio::test]
async fn test_claims_override_replaces_catalog_base() -> Result<()> {
    let server = jwks_server().await;
    let vars = HashMap::from([("AUTH_SERVER_URL".to_string(), server.href())]);
    let config = Config::from_vars(&vars)?;
    let discovery = StaticDiscovery::new().with_service("auth", &server.href())?;
    let http = ReqwestHttpClient::new(Duration::from_secs(5))?;
    let context = build_auth_context(&config, Arc::new(discovery), Arc::new(http));

    let override_policy = ClaimsPolicy::new().with_rule("jti", ClaimRule::required());
    let app = AuthGate::new(true, "registration", Some(override_policy), context)
        .protect(Router::new().route("/", get(|| async { "OK" })));

    let without_jti = TestTokenBuilder::new()
        .with_api(&["registration"], "read")
        .sign();
    let with_jti = TestTokenBuilder::new()
        .with_api(&["registration"], "read")
        .with_claim("jti", json!("7c1d1c3f"))
        .sign();

    assert_eq!(send(&app, Method::GET, "/", &without_jti).await, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, Method::GET, "/", &with_jti).await, StatusCode::OK);

    Ok(())
}
