//! Auth gate error types.
//!
//! Every rejection the gate can produce is a distinct `AuthError` variant so
//! callers can tell "no credentials" from "wrong credentials" from "the key
//! server misbehaved". The `IntoResponse` impl maps each kind to a status
//! code. Messages returned to clients are generic; upstream details are
//! logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::discovery::DiscoveryError;

/// Auth gate error type.
///
/// Maps to HTTP status codes:
/// - MissingAuthorization, UnsupportedTokenType, InvalidToken: 401 Unauthorized
/// - InvalidClaim: 403 Forbidden
/// - HttpError, MalformedResponse, KeyExtractionFailure, Transport: 502 Bad Gateway
/// - Discovery: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization: {0}")]
    MissingAuthorization(String),

    #[error("Unsupported token type: {0}")]
    UnsupportedTokenType(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid claim: {claim}")]
    InvalidClaim { claim: String },

    #[error("Key endpoint returned HTTP {status}")]
    HttpError { status: u16 },

    #[error("Malformed key endpoint response: {0}")]
    MalformedResponse(String),

    #[error("Cannot extract public key: {0}")]
    KeyExtractionFailure(String),

    #[error("Key endpoint unreachable: {0}")]
    Transport(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl AuthError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingAuthorization(_)
            | AuthError::UnsupportedTokenType(_)
            | AuthError::InvalidToken(_) => 401,
            AuthError::InvalidClaim { .. } => 403,
            AuthError::HttpError { .. }
            | AuthError::MalformedResponse(_)
            | AuthError::KeyExtractionFailure(_)
            | AuthError::Transport(_) => 502,
            AuthError::Discovery(_) => 503,
        }
    }

    /// Short, bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization(_) => "missing_authorization",
            AuthError::UnsupportedTokenType(_) => "unsupported_token_type",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::InvalidClaim { .. } => "invalid_claim",
            AuthError::HttpError { .. } => "http_error",
            AuthError::MalformedResponse(_) => "malformed_response",
            AuthError::KeyExtractionFailure(_) => "key_extraction_failure",
            AuthError::Transport(_) => "transport",
            AuthError::Discovery(_) => "discovery",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingAuthorization(reason) => (
                StatusCode::UNAUTHORIZED,
                "MISSING_AUTHORIZATION",
                reason.clone(),
            ),
            AuthError::UnsupportedTokenType(reason) => (
                StatusCode::UNAUTHORIZED,
                "UNSUPPORTED_TOKEN_TYPE",
                reason.clone(),
            ),
            AuthError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            AuthError::InvalidClaim { claim } => (
                StatusCode::FORBIDDEN,
                "INVALID_CLAIM",
                format!("Token claim '{}' does not permit this request", claim),
            ),
            AuthError::HttpError { .. }
            | AuthError::MalformedResponse(_)
            | AuthError::KeyExtractionFailure(_)
            | AuthError::Transport(_) => {
                // Log actual reason server-side
                tracing::warn!(target: "auth.errors", error = %self, "Key material unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    "KEY_SERVER_ERROR",
                    "Unable to obtain token signing keys".to_string(),
                )
            }
            AuthError::Discovery(err) => {
                tracing::warn!(target: "auth.errors", error = %err, "Authorization server not discovered");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Authorization server temporarily unavailable".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            let challenge = match &self {
                AuthError::InvalidToken(_) => "Bearer realm=\"nmos\", error=\"invalid_token\"",
                _ => "Bearer realm=\"nmos\"",
            };
            if let Ok(header_value) = challenge.parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
