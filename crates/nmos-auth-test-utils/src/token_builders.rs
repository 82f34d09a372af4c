//! Builder patterns for test tokens
//!
//! Provides fluent APIs for creating NMOS claims and signing them with the
//! fixture keys.

use crate::fixtures::{TEST_EC_PRIVATE_KEY_PEM, TEST_KID, TEST_RSA_PRIVATE_KEY_PEM};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .with_api(&["registration", "connection"], "write")
///     .with_audience("node-1")
///     .sign();
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults: issuer, subject, issued
    /// now and expiring in an hour. No `x-nmos-api` grant.
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!("https://auth.example.com"));
        claims.insert("sub".to_string(), json!("test-client"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        Self { claims }
    }

    /// Set the issuer
    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set the subject (client ID)
    pub fn for_client(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the audience
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Grant `access` ("read" or "write") on the named APIs
    pub fn with_api(self, names: &[&str], access: &str) -> Self {
        self.with_claim("x-nmos-api", json!({ "name": names, "access": access }))
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(self, seconds: i64) -> Self {
        self.with_claim("exp", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign with the current RSA fixture key (RS512, kid `TEST_KID`)
    pub fn sign(self) -> String {
        sign_rsa(&self.build(), TEST_RSA_PRIVATE_KEY_PEM)
    }

    /// Sign with the P-256 fixture key (ES256)
    pub fn sign_ec(self) -> String {
        let key = EncodingKey::from_ec_pem(TEST_EC_PRIVATE_KEY_PEM.as_bytes())
            .expect("EC fixture key should load");
        sign_with(&self.build(), Algorithm::ES256, &key)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sign `claims` with an RSA PKCS#8 PEM key using RS512.
pub fn sign_rsa(claims: &Value, private_key_pem: &str) -> String {
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .expect("RSA fixture key should load");
    sign_with(claims, Algorithm::RS512, &key)
}

/// Sign `claims` with any algorithm and key, tagging the header with `TEST_KID`.
pub fn sign_with(claims: &Value, alg: Algorithm, key: &EncodingKey) -> String {
    let mut header = Header::new(alg);
    header.typ = Some("JWT".to_string());
    header.kid = Some(TEST_KID.to_string());
    encode(&header, claims, key).expect("Failed to sign token")
}
