//! JWT utilities shared by the auth gate crates.
//!
//! This module provides the pieces of token handling that happen before
//! any key material is involved:
//! - Size limits for DoS prevention
//! - Clock skew constants for expiry leeway
//! - Unverified header inspection (`alg`, `kid`)
//! - base64url decoding of JWK fields
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Header inspection does NOT verify anything; the token must still be
//!   verified against a trusted key
//! - Error messages are intentionally generic
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{peek_header, MAX_JWT_SIZE_BYTES};
//!
//! let header = peek_header(token)?;
//! tracing::debug!(alg = %header.alg, "Token header inspected");
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any base64 decoding or
/// cryptographic operations.
///
/// - Typical NMOS access tokens are 600-1200 bytes (RS256 signature, claims)
/// - 8KB allows for long `x-nmos-*` claims while bounding work per request
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
///
/// Applied as leeway when checking `exp` and `nbf`.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Guards against configuration that would accept long-expired tokens.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a token before verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,
}

// =============================================================================
// Header Types
// =============================================================================

/// The unverified parts of a JWT header the gate cares about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm named by the token (e.g. `RS256`).
    pub alg: String,

    /// Key ID, if the issuer set one.
    #[serde(default)]
    pub kid: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Inspect a JWT header without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - The returned header is untrusted input and must only be used to pick
///   verification parameters that are then enforced by the verifier
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON or no `alg`
pub fn peek_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let header_part = parts.next().ok_or(JwtValidationError::MalformedToken)?;
    if parts.count() != 2 {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    }

    let header_bytes = decode_b64url(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice::<TokenHeader>(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })
}

/// Decode a base64url (no padding) field such as a JWK `n`, `e`, `x` or `y`.
///
/// Trailing `=` padding is tolerated since some issuers emit it.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the content is not valid base64url.
pub fn decode_b64url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value.trim_end_matches('='))
}

/// Encode bytes as base64url without padding.
#[must_use]
pub fn encode_b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        format!("{}.payload.signature", encode_b64url(header.as_bytes()))
    }

    #[test]
    fn test_peek_header_reads_alg_and_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"x-nmos-1"}"#);

        let header = peek_header(&token).unwrap();

        assert_eq!(header.alg, "RS256");
        assert_eq!(header.kid.as_deref(), Some("x-nmos-1"));
    }

    #[test]
    fn test_peek_header_kid_is_optional() {
        let token = token_with_header(r#"{"alg":"ES256"}"#);

        let header = peek_header(&token).unwrap();

        assert_eq!(header.alg, "ES256");
        assert!(header.kid.is_none());
    }

    #[test]
    fn test_peek_header_rejects_wrong_part_count() {
        assert_eq!(
            peek_header("only.two"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            peek_header("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(peek_header(""), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_peek_header_rejects_bad_base64_and_json() {
        assert_eq!(
            peek_header("!!!.payload.signature"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            peek_header(&token_with_header("not json")),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_peek_header_requires_alg() {
        let token = token_with_header(r#"{"typ":"JWT"}"#);
        assert_eq!(peek_header(&token), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_peek_header_rejects_oversized_token() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(peek_header(&token), Err(JwtValidationError::TokenTooLarge));
    }

    #[test]
    fn test_decode_b64url_tolerates_padding() {
        assert_eq!(decode_b64url("AQAB").unwrap(), vec![0x01, 0x00, 0x01]);
        assert_eq!(decode_b64url("AQ==").unwrap(), vec![0x01]);
        assert!(decode_b64url("***").is_err());
    }

    #[test]
    fn test_clock_skew_bounds() {
        assert!(DEFAULT_CLOCK_SKEW <= MAX_CLOCK_SKEW);
        assert_eq!(MAX_CLOCK_SKEW.as_secs(), 600);
    }
}
