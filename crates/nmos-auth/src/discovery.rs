//! Service discovery seam for locating the authorization server.
//!
//! The gate never hard-codes where the authorization server lives; it asks a
//! `ServiceDiscovery` implementation for the base href of a named service.
//! Production deployments plug in their registry lookup (mDNS/DNS-SD, a
//! registry query, ...). `StaticDiscovery` covers fixed deployments and tests.

use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// Errors raised by a discovery lookup. The gate propagates these unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("No service registered under '{0}'")]
    NotFound(String),

    #[error("Service '{name}' advertised an invalid href: {reason}")]
    InvalidHref { name: String, reason: String },

    #[error("Service discovery failed: {0}")]
    Unavailable(String),
}

/// Resolves a service name to the base URL of that service.
#[async_trait::async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Look up the base href of `service_name`.
    async fn lookup_service_href(&self, service_name: &str) -> Result<Url, DiscoveryError>;
}

/// Discovery backed by a fixed name -> href table.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    services: HashMap<String, Url>,
}

impl StaticDiscovery {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `href` under `name`.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::InvalidHref` if `href` is not an absolute URL.
    pub fn with_service(mut self, name: &str, href: &str) -> Result<Self, DiscoveryError> {
        let url = Url::parse(href).map_err(|e| DiscoveryError::InvalidHref {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.services.insert(name.to_string(), url);
        Ok(self)
    }
}

#[async_trait::async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn lookup_service_href(&self, service_name: &str) -> Result<Url, DiscoveryError> {
        self.services
            .get(service_name)
            .cloned()
            .ok_or_else(|| DiscoveryError::NotFound(service_name.to_string()))
    }
}
