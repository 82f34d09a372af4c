//! Collaborator fakes.

use nmos_auth::auth::resolver::{HttpClient, HttpResponse};
use nmos_auth::AuthError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

/// HTTP client that records every request and answers with a canned response.
///
/// # Example
/// ```rust,ignore
/// let http = Arc::new(RecordingHttpClient::json(200, test_jwks()));
/// // ... run a request through the gate ...
/// assert_eq!(http.call_count(), 1);
/// ```
pub struct RecordingHttpClient {
    response: Result<HttpResponse, String>,
    call_count: AtomicUsize,
    requested: Mutex<Vec<Url>>,
}

impl RecordingHttpClient {
    /// Answer every request with `body` as `application/json`.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::responding(HttpResponse {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
        })
    }

    /// Answer every request with `response`.
    pub fn responding(response: HttpResponse) -> Self {
        Self {
            response: Ok(response),
            call_count: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request with a transport error.
    pub fn unreachable() -> Self {
        Self {
            response: Err("connection refused".to_string()),
            call_count: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Number of requests made so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// URLs requested so far, in order.
    pub fn requested_urls(&self) -> Vec<Url> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl HttpClient for RecordingHttpClient {
    async fn get(&self, url: &Url) -> Result<HttpResponse, AuthError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(url.clone());
        self.response.clone().map_err(AuthError::Transport)
    }
}
