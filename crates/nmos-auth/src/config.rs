//! Auth gate configuration.
//!
//! Configuration is loaded from environment variables. `from_vars` takes
//! an explicit map so tests never touch the process environment.

use crate::auth::keys::KeyMode;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default discovery name of the authorization server.
pub const DEFAULT_AUTH_SERVICE_NAME: &str = "auth";

/// Default key endpoint request timeout in seconds.
pub const DEFAULT_KEY_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the key endpoint request timeout in seconds.
pub const MAX_KEY_FETCH_TIMEOUT_SECONDS: u64 = 120;

/// Auth gate configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Whether gates are active (default: true).
    pub auth_enabled: bool,

    /// Name the authorization server is discovered under (default: "auth").
    pub auth_service_name: String,

    /// Base href of the authorization server. Required when auth is enabled.
    pub auth_server_url: Option<String>,

    /// Key endpoint to use (default: jwk).
    pub key_mode: KeyMode,

    /// Expected `iss` claim, if any.
    pub issuer: Option<String>,

    /// Expected `aud` entry, if any.
    pub audience: Option<String>,

    /// JWT clock skew tolerance in seconds for `exp`/`nbf` validation.
    pub jwt_clock_skew_seconds: u64,

    /// Key endpoint request timeout in seconds.
    pub key_fetch_timeout_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid boolean for {name}: '{value}'")]
    InvalidBool { name: String, value: String },

    #[error("Invalid auth server URL: {0}")]
    InvalidServerUrl(String),

    #[error("Invalid key mode: {0}")]
    InvalidKeyMode(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid key fetch timeout configuration: {0}")]
    InvalidKeyFetchTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let auth_enabled = match vars.get("AUTH_ENABLED") {
            Some(value) => parse_bool("AUTH_ENABLED", value)?,
            None => true,
        };

        let auth_service_name = vars
            .get("AUTH_SERVICE_NAME")
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_AUTH_SERVICE_NAME.to_string());

        let auth_server_url = vars.get("AUTH_SERVER_URL").filter(|u| !u.is_empty()).cloned();
        if let Some(href) = &auth_server_url {
            let parsed = url::Url::parse(href).map_err(|e| {
                ConfigError::InvalidServerUrl(format!(
                    "AUTH_SERVER_URL must be an absolute URL, got '{}': {}",
                    href, e
                ))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidServerUrl(format!(
                    "AUTH_SERVER_URL must use http or https, got '{}'",
                    href
                )));
            }
        } else if auth_enabled {
            return Err(ConfigError::MissingEnvVar("AUTH_SERVER_URL".to_string()));
        }

        let key_mode = match vars.get("AUTH_KEY_MODE") {
            Some(value) => value.parse().map_err(ConfigError::InvalidKeyMode)?,
            None => KeyMode::Jwk,
        };

        let issuer = vars.get("AUTH_ISSUER").filter(|v| !v.is_empty()).cloned();
        let audience = vars.get("AUTH_AUDIENCE").filter(|v| !v.is_empty()).cloned();

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            let value = value.unsigned_abs();
            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        // Parse key fetch timeout with validation
        let key_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("KEY_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidKeyFetchTimeout(format!(
                        "KEY_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 || value > MAX_KEY_FETCH_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidKeyFetchTimeout(format!(
                        "KEY_FETCH_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                        MAX_KEY_FETCH_TIMEOUT_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_KEY_FETCH_TIMEOUT_SECONDS
            };

        Ok(Config {
            bind_address,
            auth_enabled,
            auth_service_name,
            auth_server_url,
            key_mode,
            issuer,
            audience,
            jwt_clock_skew_seconds,
            key_fetch_timeout_seconds,
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
