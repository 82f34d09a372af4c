//! Key material returned by the authorization server.
//!
//! The same discovery endpoint may answer with a single JWK, a JWK set or
//! (on the certificates endpoint) a map of named PEM certificates. The shape
//! is decided once, here, when the body is parsed; consumers match on
//! `KeyMaterial` exhaustively.

use crate::errors::AuthError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the certificate slot the authorization server fills by default.
pub const DEFAULT_CERT_SLOT: &str = "default";

/// Which discovery endpoint to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyMode {
    /// JWK / JWKS endpoint.
    Jwk,
    /// PEM certificate endpoint.
    Cert,
}

impl KeyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMode::Jwk => "jwk",
            KeyMode::Cert => "cert",
        }
    }
}

impl std::str::FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jwk" | "jwks" => Ok(KeyMode::Jwk),
            "cert" | "certs" => Ok(KeyMode::Cert),
            other => Err(format!("unknown key mode '{}'", other)),
        }
    }
}

/// A JSON Web Key as served by the authorization server.
///
/// All fields are optional at parse time; whether they describe a usable
/// key is decided by the key extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescription {
    /// Key type ("RSA" or "EC").
    #[serde(default)]
    pub kty: String,

    /// Key ID. NMOS authorization servers embed the key's creation time here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// EC curve name ("P-256", "P-384").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC point x coordinate (base64url).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC point y coordinate (base64url).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Certificate chain (standard base64 DER, leaf first).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,

    /// Intended algorithm (e.g. "RS512").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Key use (should be "sig").
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

impl KeyDescription {
    /// Freshness marker used to rank keys in a set.
    ///
    /// Read from the timestamp embedded in `kid` (e.g. `x-nmos-2019-05-14T10:30:00`),
    /// accepting RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD` or a bare integer
    /// sequence number. Keys without a recognisable marker return `None` and
    /// rank below every key that has one.
    pub fn freshness(&self) -> Option<i64> {
        let kid = self.kid.as_deref()?;
        kid.char_indices()
            .filter(|(_, c)| c.is_ascii_digit())
            .find_map(|(i, _)| kid.get(i..).and_then(parse_marker))
    }
}

fn parse_marker(candidate: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(candidate) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(candidate, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(candidate, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
    }
    if candidate.bytes().all(|b| b.is_ascii_digit()) {
        return candidate.parse().ok();
    }
    None
}

/// Raw key material, tagged by the shape the server returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    SingleKey(KeyDescription),
    KeySet(Vec<KeyDescription>),
    CertificateMap(BTreeMap<String, String>),
}

impl KeyMaterial {
    /// Parse a discovery response body for the given mode.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedResponse` if the body does not have one of
    /// the shapes the mode allows.
    pub fn from_json(mode: KeyMode, body: serde_json::Value) -> Result<Self, AuthError> {
        let serde_json::Value::Object(mut object) = body else {
            return Err(AuthError::MalformedResponse(
                "key endpoint body is not a JSON object".to_string(),
            ));
        };

        match mode {
            KeyMode::Jwk => {
                if let Some(serde_json::Value::Array(keys)) = object.remove("keys") {
                    let keys = keys
                        .into_iter()
                        .map(serde_json::from_value::<KeyDescription>)
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| AuthError::MalformedResponse(format!("invalid JWKS: {}", e)))?;
                    return Ok(KeyMaterial::KeySet(keys));
                }
                serde_json::from_value(serde_json::Value::Object(object))
                    .map(KeyMaterial::SingleKey)
                    .map_err(|e| AuthError::MalformedResponse(format!("invalid JWK: {}", e)))
            }
            KeyMode::Cert => {
                let mut certs = BTreeMap::new();
                for (slot, value) in object {
                    match value {
                        serde_json::Value::String(pem) => {
                            certs.insert(slot, pem);
                        }
                        _ => {
                            return Err(AuthError::MalformedResponse(format!(
                                "certificate slot '{}' is not a string",
                                slot
                            )))
                        }
                    }
                }
                Ok(KeyMaterial::CertificateMap(certs))
            }
        }
    }

    /// Short label for logs.
    pub fn shape(&self) -> &'static str {
        match self {
            KeyMaterial::SingleKey(_) => "single_key",
            KeyMaterial::KeySet(_) => "key_set",
            KeyMaterial::CertificateMap(_) => "certificate_map",
        }
    }
}

/// Pick the most recent key in a set.
///
/// The key with the greatest freshness marker wins; on a tie the earliest
/// entry in the set's order is kept. Returns `None` only for an empty set.
pub fn select_most_recent(keys: &[KeyDescription]) -> Option<&KeyDescription> {
    keys.iter()
        .fold(None, |best: Option<&KeyDescription>, key| match best {
            Some(current) if key.freshness() <= current.freshness() => Some(current),
            _ => Some(key),
        })
}

/// Pick the certificate to verify with: the `default` slot, else the first
/// slot in name order.
pub fn select_certificate(certs: &BTreeMap<String, String>) -> Option<&str> {
    certs
        .get(DEFAULT_CERT_SLOT)
        .or_else(|| certs.values().next())
        .map(String::as_str)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(kid: &str) -> KeyDescription {
        KeyDescription {
            kty: "RSA".to_string(),
            kid: Some(kid.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_description_deserialization() {
        let json = json!({
            "kty": "RSA",
            "kid": "x-nmos-2019-05-14T10:30:00",
            "n": "sXch",
            "e": "AQAB",
            "alg": "RS512",
            "use": "sig"
        });

        let jwk: KeyDescription = serde_json::from_value(json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.n.as_deref(), Some("sXch"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert_eq!(jwk.alg.as_deref(), Some("RS512"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        assert!(jwk.x5c.is_none());
    }

    #[test]
    fn test_freshness_formats() {
        assert_eq!(key("x-nmos-2019-05-14T00:00:00").freshness(), Some(1_557_792_000));
        assert_eq!(key("x-nmos-2019-05-14").freshness(), Some(1_557_792_000));
        assert_eq!(
            key("x-nmos-2019-05-14T00:00:00Z").freshness(),
            Some(1_557_792_000)
        );
        assert_eq!(key("key-42").freshness(), Some(42));
        assert_eq!(key("no-marker").freshness(), None);
        assert_eq!(KeyDescription::default().freshness(), None);
    }

    #[test]
    fn test_select_most_recent_picks_latest() {
        let keys = vec![
            key("x-nmos-2019-05-14T10:30:00"),
            key("x-nmos-2019-05-21T10:30:00"),
            key("x-nmos-2019-05-07T10:30:00"),
        ];

        let selected = select_most_recent(&keys).unwrap();

        assert_eq!(selected.kid.as_deref(), Some("x-nmos-2019-05-21T10:30:00"));
    }

    #[test]
    fn test_select_most_recent_is_idempotent() {
        let keys = vec![key("x-nmos-2020-01-02"), key("x-nmos-2020-01-01")];

        let first = select_most_recent(&keys).unwrap();
        let second = select_most_recent(&keys).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, &keys[0]);
    }

    #[test]
    fn test_select_most_recent_ties_keep_first() {
        let mut a = key("x-nmos-2020-01-01");
        a.n = Some("first".to_string());
        let mut b = key("x-nmos-2020-01-01");
        b.n = Some("second".to_string());
        let keys = vec![a, b];

        let selected = select_most_recent(&keys).unwrap();

        assert_eq!(selected.n.as_deref(), Some("first"));
    }

    #[test]
    fn test_select_most_recent_unmarked_keys_rank_lowest() {
        let keys = vec![key("unmarked"), key("x-nmos-2000-01-01")];
        assert_eq!(
            select_most_recent(&keys).unwrap().kid.as_deref(),
            Some("x-nmos-2000-01-01")
        );

        let unmarked = vec![key("alpha"), key("beta")];
        assert_eq!(
            select_most_recent(&unmarked).unwrap().kid.as_deref(),
            Some("alpha")
        );
    }

    #[test]
    fn test_select_most_recent_empty() {
        assert!(select_most_recent(&[]).is_none());
    }

    #[test]
    fn test_from_json_single_key() {
        let material = KeyMaterial::from_json(
            KeyMode::Jwk,
            json!({"kty": "RSA", "n": "sXch", "e": "AQAB"}),
        )
        .unwrap();

        assert!(matches!(material, KeyMaterial::SingleKey(k) if k.kty == "RSA"));
    }

    #[test]
    fn test_from_json_key_set() {
        let material = KeyMaterial::from_json(
            KeyMode::Jwk,
            json!({"keys": [{"kty": "RSA", "kid": "a"}, {"kty": "RSA", "kid": "b"}]}),
        )
        .unwrap();

        match material {
            KeyMaterial::KeySet(keys) => {
                assert_eq!(keys.len(), 2);
                assert_eq!(keys[1].kid.as_deref(), Some("b"));
            }
            other => panic!("expected key set, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_keys_field_that_is_not_a_sequence_is_single_key() {
        let material =
            KeyMaterial::from_json(KeyMode::Jwk, json!({"kty": "RSA", "keys": "nope"})).unwrap();

        assert_eq!(material.shape(), "single_key");
    }

    #[test]
    fn test_from_json_certificate_map() {
        let material = KeyMaterial::from_json(
            KeyMode::Cert,
            json!({"default": "-----BEGIN CERTIFICATE-----", "backup": "pem"}),
        )
        .unwrap();

        match material {
            KeyMaterial::CertificateMap(certs) => {
                assert_eq!(select_certificate(&certs), Some("-----BEGIN CERTIFICATE-----"));
            }
            other => panic!("expected certificate map, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let result = KeyMaterial::from_json(KeyMode::Jwk, json!(["not", "an", "object"]));
        assert!(matches!(result, Err(AuthError::MalformedResponse(_))));

        let result = KeyMaterial::from_json(KeyMode::Cert, json!({"default": 42}));
        assert!(matches!(result, Err(AuthError::MalformedResponse(_))));
    }

    #[test]
    fn test_select_certificate_falls_back_to_first_slot() {
        let certs = BTreeMap::from([
            ("zeta".to_string(), "z".to_string()),
            ("alpha".to_string(), "a".to_string()),
        ]);
        assert_eq!(select_certificate(&certs), Some("a"));
        assert_eq!(select_certificate(&BTreeMap::new()), None);
    }

    #[test]
    fn test_key_mode_from_str() {
        assert_eq!("jwk".parse::<KeyMode>(), Ok(KeyMode::Jwk));
        assert_eq!("certs".parse::<KeyMode>(), Ok(KeyMode::Cert));
        assert!("pem".parse::<KeyMode>().is_err());
    }
}
