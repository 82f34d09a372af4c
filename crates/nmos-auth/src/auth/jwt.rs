//! Token verification against a resolved public key.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The header algorithm must belong to the key's family; `none` and
//!   HMAC algorithms never verify against a public key
//! - Expiry and not-before are validated with clock skew tolerance
//! - Audience and issuer are left to the claims policy

use crate::auth::claims::{Claims, ClaimsPolicy};
use crate::auth::extract::PublicKey;
use crate::errors::AuthError;
use common::jwt::peek_header;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Registered claims holding a NumericDate.
const TIME_CLAIMS: [&str; 3] = ["exp", "nbf", "iat"];

fn invalid_token() -> AuthError {
    AuthError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
}

/// Verify a token's signature and time claims, then evaluate `policy`.
///
/// # Errors
///
/// - `AuthError::InvalidToken` for malformed or oversized tokens, an
///   algorithm the key cannot verify, a bad signature, an expired token or
///   a time claim that is not a non-negative integer
/// - `AuthError::InvalidClaim` when the verified claims fail the policy
/// - `AuthError::KeyExtractionFailure` if the key cannot be loaded
pub fn verify_token(
    token: &str,
    key: &PublicKey,
    policy: &ClaimsPolicy,
    leeway: Duration,
) -> Result<Claims, AuthError> {
    // Size and structure check before handing to jsonwebtoken
    let header = peek_header(token).map_err(|e| {
        tracing::debug!(target: "auth.jwt", error = ?e, "Token header rejected");
        invalid_token()
    })?;

    let alg = Algorithm::from_str(&header.alg).map_err(|_| {
        tracing::debug!(target: "auth.jwt", alg = %header.alg, "Unknown token algorithm");
        invalid_token()
    })?;

    if !key.accepts(alg) {
        tracing::warn!(target: "auth.jwt", alg = ?alg, "Token algorithm does not match signing key");
        return Err(invalid_token());
    }

    let decoding_key = key.decoding_key()?;

    let mut validation = Validation::new(alg);
    validation.leeway = leeway.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    // Time claims the policy requires must also parse, or they are never checked
    validation.required_spec_claims = ["exp", "nbf"]
        .into_iter()
        .filter(|claim| policy.rule(claim).is_some_and(|rule| rule.required))
        .map(str::to_string)
        .collect::<HashSet<_>>();

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "auth.jwt", error = %e, "Token verification failed");
        invalid_token()
    })?;

    check_numeric_dates(&token_data.claims)?;

    policy.evaluate(&token_data.claims)?;

    tracing::debug!(target: "auth.jwt", kid = ?header.kid, "Token verified");
    Ok(token_data.claims)
}

/// Reject time claims that are present but not a non-negative integer.
fn check_numeric_dates(claims: &Claims) -> Result<(), AuthError> {
    for claim in TIME_CLAIMS {
        if let Some(value) = claims.get(claim) {
            if value.as_u64().is_none() {
                tracing::debug!(target: "auth.jwt", claim = claim, "Time claim is not a NumericDate");
                return Err(invalid_token());
            }
        }
    }
    Ok(())
}
