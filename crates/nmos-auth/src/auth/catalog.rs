//! Static catalog of base claim policies, keyed by API name.
//!
//! The catalog is built once at startup from configuration and shared
//! read-only. It only holds the standard claims; the per-request
//! `x-nmos-api` rule is injected by the claims validator.

use crate::auth::claims::{ClaimRule, ClaimsPolicy, ExpectedValue};
use std::collections::BTreeMap;

/// Families of NMOS APIs sharing the same base claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyClass {
    /// IS-04 registration, query and node APIs.
    Registration,
    /// IS-05 connection, IS-07 events and IS-08 channel mapping APIs.
    Connection,
}

impl PolicyClass {
    /// API names served by this class.
    pub fn api_names(self) -> &'static [&'static str] {
        match self {
            PolicyClass::Registration => &["registration", "query", "node"],
            PolicyClass::Connection => &["connection", "events", "channelmapping"],
        }
    }
}

/// Immutable API name -> base policy table.
#[derive(Debug, Clone)]
pub struct ClaimsPolicyCatalog {
    entries: BTreeMap<String, ClaimsPolicy>,
    fallback: ClaimsPolicy,
}

impl ClaimsPolicyCatalog {
    /// Build the NMOS catalog.
    ///
    /// `issuer` and `audience`, when configured, become expected values for
    /// `iss` and `aud`.
    pub fn nmos(issuer: Option<&str>, audience: Option<&str>) -> Self {
        let registration = Self::base_policy(PolicyClass::Registration, issuer, audience);
        let connection = Self::base_policy(PolicyClass::Connection, issuer, audience);

        let mut entries = BTreeMap::new();
        for api in PolicyClass::Registration.api_names() {
            entries.insert((*api).to_string(), registration.clone());
        }
        for api in PolicyClass::Connection.api_names() {
            entries.insert((*api).to_string(), connection.clone());
        }

        Self {
            entries,
            fallback: registration,
        }
    }

    /// Standard claims for a policy class.
    pub fn base_policy(
        class: PolicyClass,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> ClaimsPolicy {
        let iss = match issuer {
            Some(iss) => ClaimRule::required().expecting(ExpectedValue::Exact(iss.into())),
            None => ClaimRule::required(),
        };

        let policy = ClaimsPolicy::new()
            .with_rule("iss", iss)
            .with_rule("sub", ClaimRule::required())
            .with_rule("exp", ClaimRule::required())
            .with_rule("iat", ClaimRule::optional())
            .with_rule("nbf", ClaimRule::optional());

        match (class, audience) {
            (PolicyClass::Connection, Some(aud)) => policy.with_rule(
                "aud",
                ClaimRule::required().expecting(ExpectedValue::Exact(aud.into())),
            ),
            (PolicyClass::Connection, None) => policy.with_rule("aud", ClaimRule::required()),
            (PolicyClass::Registration, Some(aud)) => policy.with_rule(
                "aud",
                ClaimRule::optional().expecting(ExpectedValue::Exact(aud.into())),
            ),
            (PolicyClass::Registration, None) => policy,
        }
    }

    /// Base policy for `api_name`; unknown names get the registration-class base.
    pub fn base_for(&self, api_name: &str) -> &ClaimsPolicy {
        self.entries.get(api_name).unwrap_or(&self.fallback)
    }

    pub fn contains(&self, api_name: &str) -> bool {
        self.entries.contains_key(api_name)
    }

    pub fn api_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_covers_nmos_apis() {
        let catalog = ClaimsPolicyCatalog::nmos(None, None);

        let names: Vec<&str> = catalog.api_names().collect();
        assert_eq!(
            names,
            vec!["channelmapping", "connection", "events", "node", "query", "registration"]
        );
    }

    #[test]
    fn test_connection_class_requires_audience() {
        let catalog = ClaimsPolicyCatalog::nmos(None, None);

        assert!(catalog.base_for("connection").rule("aud").unwrap().required);
        assert!(catalog.base_for("registration").rule("aud").is_none());
    }

    #[test]
    fn test_configured_issuer_and_audience_are_expected() {
        let catalog = ClaimsPolicyCatalog::nmos(Some("https://auth.example"), Some("node-1"));

        let iss = catalog.base_for("query").rule("iss").unwrap();
        assert_eq!(
            iss.expected,
            Some(ExpectedValue::Exact(json!("https://auth.example")))
        );

        let aud = catalog.base_for("registration").rule("aud").unwrap();
        assert!(!aud.required);
        assert_eq!(aud.expected, Some(ExpectedValue::Exact(json!("node-1"))));
    }

    #[test]
    fn test_unknown_api_falls_back_to_registration_class() {
        let catalog = ClaimsPolicyCatalog::nmos(None, None);

        assert!(!catalog.contains("system"));
        assert_eq!(catalog.base_for("system"), catalog.base_for("registration"));
    }

    #[test]
    fn test_base_policy_standard_claims() {
        let policy = ClaimsPolicyCatalog::base_policy(PolicyClass::Registration, None, None);

        for claim in ["iss", "sub", "exp"] {
            assert!(policy.rule(claim).unwrap().required, "{} required", claim);
        }
        for claim in ["iat", "nbf"] {
            assert!(!policy.rule(claim).unwrap().required, "{} optional", claim);
        }
    }
}
