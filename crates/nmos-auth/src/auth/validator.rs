//! Claims validator: turns an API name and request method into the policy a
//! token must satisfy.

use crate::auth::catalog::ClaimsPolicyCatalog;
use crate::auth::claims::{AccessLevel, ApiAccess, ClaimRule, ClaimsPolicy, ExpectedValue, NMOS_API_CLAIM};
use axum::http::Method;
use std::sync::Arc;

/// Access level a request method needs. Safe methods read, everything else writes.
pub fn required_access(method: &Method) -> AccessLevel {
    if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
        AccessLevel::Read
    } else {
        AccessLevel::Write
    }
}

/// Merge the `x-nmos-api` rule for this request into `base`.
///
/// Always returns a new policy; `base` is left untouched.
pub fn build_policy(api_name: &str, method: &Method, base: &ClaimsPolicy) -> ClaimsPolicy {
    let required = ApiAccess::new([api_name], required_access(method));
    base.clone().with_rule(
        NMOS_API_CLAIM,
        ClaimRule::required().expecting(ExpectedValue::Api(required)),
    )
}

/// Builds per-request policies from the shared catalog.
#[derive(Debug, Clone)]
pub struct ClaimsValidator {
    catalog: Arc<ClaimsPolicyCatalog>,
}

impl ClaimsValidator {
    pub fn new(catalog: Arc<ClaimsPolicyCatalog>) -> Self {
        Self { catalog }
    }

    /// Policy for a request to `api_name` with `method`.
    ///
    /// `claims_override`, when given, replaces the catalog's base claims.
    pub fn policy_for(
        &self,
        api_name: &str,
        method: &Method,
        claims_override: Option<&ClaimsPolicy>,
    ) -> ClaimsPolicy {
        let base = claims_override.unwrap_or_else(|| self.catalog.base_for(api_name));
        let policy = build_policy(api_name, method, base);
        tracing::debug!(
            target: "auth.claims",
            api = %api_name,
            method = %method,
            access = %required_access(method),
            "Claims policy built"
        );
        policy
    }

    pub fn catalog(&self) -> &ClaimsPolicyCatalog {
        &self.catalog
    }
}
