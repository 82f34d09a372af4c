//! Key resolver: discovers the authorization server and fetches its signing
//! key material.
//!
//! There is no cache. Every validation performs a fresh lookup and fetch,
//! so a key rotated on the server is picked up by the next request.

use crate::auth::extract::{extract_public_key, KeyInput, PublicKey};
use crate::auth::keys::{select_certificate, select_most_recent, KeyMaterial, KeyMode};
use crate::discovery::ServiceDiscovery;
use crate::errors::AuthError;
use crate::observability::metrics::record_key_fetch;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;
use url::Url;

/// Path of the JWKS endpoint, relative to the authorization server href.
pub const JWKS_PATH: &str = "x-nmos/auth/v1.0/jwks";

/// Path of the certificates endpoint, relative to the authorization server href.
pub const CERTS_PATH: &str = "x-nmos/auth/v1.0/certs";

/// Default timeout for key endpoint requests.
pub const DEFAULT_KEY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Minimal HTTP GET seam used to reach the key endpoints.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET and read the whole body.
    ///
    /// Non-2xx responses are returned as `Ok`; only transport failures are
    /// errors.
    async fn get(&self, url: &Url) -> Result<HttpResponse, AuthError>;
}

/// `HttpClient` backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Build a client with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Transport` if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &Url) -> Result<HttpResponse, AuthError> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            tracing::error!(target: "auth.keys", error = %e, "Failed to reach key endpoint");
            AuthError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Whether a Content-Type header value denotes JSON.
///
/// Accepts `application/json` and any `+json` structured syntax suffix,
/// ignoring parameters and case.
pub fn is_json_content_type(value: &str) -> bool {
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.contains('/') && essence.ends_with("+json"))
}

/// Key endpoint URL for `mode` under the authorization server `href`.
///
/// # Errors
///
/// Returns `AuthError::MalformedResponse` if the href cannot serve as a base.
pub fn endpoint_url(href: &Url, mode: KeyMode) -> Result<Url, AuthError> {
    let mut base = href.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let path = match mode {
        KeyMode::Jwk => JWKS_PATH,
        KeyMode::Cert => CERTS_PATH,
    };
    base.join(path)
        .map_err(|e| AuthError::MalformedResponse(format!("invalid key endpoint href: {}", e)))
}

/// Fetches key material from the discovered authorization server.
#[derive(Clone)]
pub struct KeyResolver {
    discovery: Arc<dyn ServiceDiscovery>,
    http: Arc<dyn HttpClient>,
    service_name: String,
}

impl KeyResolver {
    pub fn new(
        discovery: Arc<dyn ServiceDiscovery>,
        http: Arc<dyn HttpClient>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            discovery,
            http,
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Fetch and parse the key material served for `mode`.
    ///
    /// # Errors
    ///
    /// - `AuthError::Discovery` if the authorization server cannot be located
    /// - `AuthError::Transport` if the endpoint is unreachable
    /// - `AuthError::HttpError` for a non-2xx status
    /// - `AuthError::MalformedResponse` for a non-JSON content type or body
    #[instrument(skip(self), fields(mode = mode.as_str()))]
    pub async fn fetch_key_material(&self, mode: KeyMode) -> Result<KeyMaterial, AuthError> {
        let start = Instant::now();
        let result = self.fetch(mode).await;
        record_key_fetch(mode.as_str(), result.is_ok(), start.elapsed());
        result
    }

    async fn fetch(&self, mode: KeyMode) -> Result<KeyMaterial, AuthError> {
        let href = self
            .discovery
            .lookup_service_href(&self.service_name)
            .await?;
        let url = endpoint_url(&href, mode)?;

        tracing::debug!(target: "auth.keys", url = %url, "Fetching key material");

        let response = self.http.get(&url).await?;

        if !(200..300).contains(&response.status) {
            tracing::warn!(
                target: "auth.keys",
                url = %url,
                status = response.status,
                "Key endpoint returned error"
            );
            return Err(AuthError::HttpError {
                status: response.status,
            });
        }

        let content_type = response.content_type.as_deref().unwrap_or_default();
        if !is_json_content_type(content_type) {
            tracing::warn!(
                target: "auth.keys",
                url = %url,
                content_type = %content_type,
                "Key endpoint returned non-JSON content"
            );
            return Err(AuthError::MalformedResponse(format!(
                "unexpected content type '{}'",
                content_type
            )));
        }

        let body: serde_json::Value = serde_json::from_slice(&response.body).map_err(|e| {
            tracing::warn!(target: "auth.keys", error = %e, "Key endpoint body is not JSON");
            AuthError::MalformedResponse(format!("invalid JSON body: {}", e))
        })?;

        let material = KeyMaterial::from_json(mode, body)?;
        tracing::debug!(target: "auth.keys", shape = material.shape(), "Key material fetched");
        Ok(material)
    }

    /// Fetch key material and reduce it to the single key to verify with.
    ///
    /// A key set yields its most recent key; a certificate map yields the
    /// `default` slot, or the first slot by name.
    ///
    /// # Errors
    ///
    /// Everything `fetch_key_material` returns, plus
    /// `AuthError::KeyExtractionFailure` for an empty set or map or an
    /// unusable key.
    pub async fn resolve_public_key(&self, mode: KeyMode) -> Result<PublicKey, AuthError> {
        let material = self.fetch_key_material(mode).await?;
        match &material {
            KeyMaterial::SingleKey(jwk) => extract_public_key(KeyInput::Description(jwk)),
            KeyMaterial::KeySet(keys) => {
                let jwk = select_most_recent(keys).ok_or_else(|| {
                    AuthError::KeyExtractionFailure("key set is empty".to_string())
                })?;
                tracing::debug!(target: "auth.keys", kid = ?jwk.kid, "Selected most recent key");
                extract_public_key(KeyInput::Description(jwk))
            }
            KeyMaterial::CertificateMap(certs) => {
                let pem = select_certificate(certs).ok_or_else(|| {
                    AuthError::KeyExtractionFailure("certificate map is empty".to_string())
                })?;
                extract_public_key(KeyInput::Certificate(pem))
            }
        }
    }
}
