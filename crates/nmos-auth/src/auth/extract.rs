//! Normalization of key material into a verifiable public key.
//!
//! Three encodings are accepted: JWK fields (RSA `n`/`e` or EC `crv`/`x`/`y`),
//! a JWK carrying only an `x5c` chain, and a PEM X.509 certificate. All of
//! them end up as the same `PublicKey` value, so a JWK and the certificate
//! wrapping the same key compare equal.

use crate::auth::keys::KeyDescription;
use crate::errors::AuthError;
use base64::{engine::general_purpose::STANDARD, Engine};
use common::jwt::{decode_b64url, encode_b64url};
use jsonwebtoken::{Algorithm, DecodingKey};
use x509_parser::prelude::{FromDer, X509Certificate};
use x509_parser::public_key::PublicKey as SpkiKey;
use x509_parser::x509::SubjectPublicKeyInfo;

/// Supported elliptic curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
}

impl EcCurve {
    fn from_jwk_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(EcCurve::P256),
            "P-384" => Some(EcCurve::P384),
            _ => None,
        }
    }

    /// Length in bytes of one point coordinate.
    fn coordinate_len(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
        }
    }
}

/// Canonical public key.
///
/// Built fresh for each validation and dropped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// Big-endian modulus and exponent without leading zero bytes.
    Rsa { modulus: Vec<u8>, exponent: Vec<u8> },
    /// Affine point coordinates.
    Ec { curve: EcCurve, x: Vec<u8>, y: Vec<u8> },
}

impl PublicKey {
    fn rsa(modulus: &[u8], exponent: &[u8]) -> Result<Self, AuthError> {
        let modulus = strip_leading_zeros(modulus);
        let exponent = strip_leading_zeros(exponent);
        if modulus.is_empty() || exponent.is_empty() {
            return Err(AuthError::KeyExtractionFailure(
                "RSA key has an empty modulus or exponent".to_string(),
            ));
        }
        Ok(PublicKey::Rsa {
            modulus: modulus.to_vec(),
            exponent: exponent.to_vec(),
        })
    }

    fn ec(curve: EcCurve, x: Vec<u8>, y: Vec<u8>) -> Result<Self, AuthError> {
        let len = curve.coordinate_len();
        if x.len() != len || y.len() != len {
            return Err(AuthError::KeyExtractionFailure(format!(
                "EC coordinates must be {} bytes for {:?}",
                len, curve
            )));
        }
        Ok(PublicKey::Ec { curve, x, y })
    }

    /// Whether a token signed with `alg` can be verified by this key.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        match self {
            PublicKey::Rsa { .. } => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            PublicKey::Ec {
                curve: EcCurve::P256,
                ..
            } => alg == Algorithm::ES256,
            PublicKey::Ec {
                curve: EcCurve::P384,
                ..
            } => alg == Algorithm::ES384,
        }
    }

    /// Build the decoding key consumed by `jsonwebtoken`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyExtractionFailure` if the key cannot be loaded.
    pub fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        let result = match self {
            PublicKey::Rsa { modulus, exponent } => {
                DecodingKey::from_rsa_components(&encode_b64url(modulus), &encode_b64url(exponent))
            }
            PublicKey::Ec { x, y, .. } => {
                DecodingKey::from_ec_components(&encode_b64url(x), &encode_b64url(y))
            }
        };
        result.map_err(|e| AuthError::KeyExtractionFailure(e.to_string()))
    }
}

/// The shapes of input the extractor accepts.
#[derive(Debug, Clone, Copy)]
pub enum KeyInput<'a> {
    /// A parsed JWK.
    Description(&'a KeyDescription),
    /// A PEM-encoded X.509 certificate.
    Certificate(&'a str),
    /// Untyped JSON: a JWK object or a PEM string.
    Raw(&'a serde_json::Value),
}

/// Convert key material into a canonical public key.
///
/// # Errors
///
/// Returns `AuthError::KeyExtractionFailure` when the input is not a
/// supported key encoding.
pub fn extract_public_key(input: KeyInput<'_>) -> Result<PublicKey, AuthError> {
    match input {
        KeyInput::Description(jwk) => from_description(jwk),
        KeyInput::Certificate(pem) => from_certificate_pem(pem),
        KeyInput::Raw(serde_json::Value::String(pem)) => from_certificate_pem(pem),
        KeyInput::Raw(value @ serde_json::Value::Object(_)) => {
            let jwk: KeyDescription = serde_json::from_value(value.clone())
                .map_err(|e| AuthError::KeyExtractionFailure(e.to_string()))?;
            from_description(&jwk)
        }
        KeyInput::Raw(_) => Err(AuthError::KeyExtractionFailure(
            "unsupported key encoding".to_string(),
        )),
    }
}

fn from_description(jwk: &KeyDescription) -> Result<PublicKey, AuthError> {
    if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
        let modulus = decode_field("n", n)?;
        let exponent = decode_field("e", e)?;
        return PublicKey::rsa(&modulus, &exponent);
    }

    if let (Some(crv), Some(x), Some(y)) = (&jwk.crv, &jwk.x, &jwk.y) {
        let curve = EcCurve::from_jwk_name(crv).ok_or_else(|| {
            AuthError::KeyExtractionFailure(format!("unsupported curve '{}'", crv))
        })?;
        return PublicKey::ec(curve, decode_field("x", x)?, decode_field("y", y)?);
    }

    if let Some(leaf) = jwk.x5c.as_ref().and_then(|chain| chain.first()) {
        let der = STANDARD
            .decode(leaf)
            .map_err(|e| AuthError::KeyExtractionFailure(format!("invalid x5c entry: {}", e)))?;
        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| AuthError::KeyExtractionFailure(format!("invalid x5c certificate: {}", e)))?;
        return from_spki(cert.public_key());
    }

    Err(AuthError::KeyExtractionFailure(
        "key description has no supported key fields".to_string(),
    ))
}

fn from_certificate_pem(pem: &str) -> Result<PublicKey, AuthError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem.trim().as_bytes())
        .map_err(|e| AuthError::KeyExtractionFailure(format!("not a PEM document: {}", e)))?;
    if pem.label != "CERTIFICATE" {
        return Err(AuthError::KeyExtractionFailure(format!(
            "expected a certificate, got '{}'",
            pem.label
        )));
    }
    let cert = pem
        .parse_x509()
        .map_err(|e| AuthError::KeyExtractionFailure(format!("invalid certificate: {}", e)))?;
    from_spki(cert.public_key())
}

fn from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Result<PublicKey, AuthError> {
    match spki.parsed() {
        Ok(SpkiKey::RSA(rsa)) => PublicKey::rsa(rsa.modulus, rsa.exponent),
        Ok(SpkiKey::EC(point)) => from_uncompressed_point(point.data()),
        Ok(_) => Err(AuthError::KeyExtractionFailure(
            "certificate key type is not RSA or EC".to_string(),
        )),
        Err(e) => Err(AuthError::KeyExtractionFailure(format!(
            "invalid subject public key: {}",
            e
        ))),
    }
}

/// SEC1 uncompressed point: `0x04 || x || y`.
fn from_uncompressed_point(data: &[u8]) -> Result<PublicKey, AuthError> {
    let Some((&0x04, coordinates)) = data.split_first() else {
        return Err(AuthError::KeyExtractionFailure(
            "EC point is not uncompressed".to_string(),
        ));
    };
    let curve = match coordinates.len() {
        64 => EcCurve::P256,
        96 => EcCurve::P384,
        other => {
            return Err(AuthError::KeyExtractionFailure(format!(
                "unsupported EC point length {}",
                other
            )))
        }
    };
    let (x, y) = coordinates.split_at(curve.coordinate_len());
    PublicKey::ec(curve, x.to_vec(), y.to_vec())
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, AuthError> {
    decode_b64url(value).map_err(|e| {
        AuthError::KeyExtractionFailure(format!("JWK field '{}' is not base64url: {}", name, e))
    })
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes.get(start..).unwrap_or_default()
}
