//! JWT claims and the policies evaluated against them.
//!
//! A `ClaimsPolicy` maps claim names to rules. Policies are plain values:
//! once built they are never mutated, and every request gets its own copy
//! from the claims validator.

use crate::errors::AuthError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Claim carrying the NMOS API access grant.
pub const NMOS_API_CLAIM: &str = "x-nmos-api";

/// Coarse access level granted to a token. `Write` implies `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
}

impl AccessLevel {
    /// Whether a token granted `self` meets a `required` level.
    pub fn satisfies(self, required: AccessLevel) -> bool {
        self >= required
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `x-nmos-api` claim: which APIs, at what level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAccess {
    /// API names covered by the grant. Accepts a single string or a list.
    #[serde(alias = "apiNames", deserialize_with = "one_or_many")]
    pub name: BTreeSet<String>,

    /// Level granted for every listed API.
    pub access: AccessLevel,
}

impl ApiAccess {
    pub fn new<I, S>(names: I, access: AccessLevel) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: names.into_iter().map(Into::into).collect(),
            access,
        }
    }

    /// Whether this grant covers everything `required` asks for.
    pub fn covers(&self, required: &ApiAccess) -> bool {
        self.access.satisfies(required.access) && required.name.is_subset(&self.name)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(BTreeSet<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => BTreeSet::from([name]),
        OneOrMany::Many(names) => names,
    })
}

/// What a claim's value must look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedValue {
    /// Equal to this value; for array claims (e.g. `aud`), contains it.
    Exact(serde_json::Value),
    /// Any of these values.
    OneOf(Vec<serde_json::Value>),
    /// An `x-nmos-api` grant covering this requirement.
    Api(ApiAccess),
}

impl ExpectedValue {
    fn matches(&self, actual: &serde_json::Value) -> bool {
        match self {
            ExpectedValue::Exact(expected) => match actual {
                serde_json::Value::Array(items) => items.contains(expected),
                other => other == expected,
            },
            ExpectedValue::OneOf(options) => match actual {
                serde_json::Value::Array(items) => items.iter().any(|i| options.contains(i)),
                other => options.contains(other),
            },
            ExpectedValue::Api(required) => {
                serde_json::from_value::<ApiAccess>(actual.clone())
                    .map(|granted| granted.covers(required))
                    .unwrap_or(false)
            }
        }
    }
}

/// Rule for a single claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRule {
    pub required: bool,
    pub expected: Option<ExpectedValue>,
}

impl ClaimRule {
    /// Claim must be present, any value.
    pub fn required() -> Self {
        Self {
            required: true,
            expected: None,
        }
    }

    /// Claim may be absent; no constraint on its value.
    pub fn optional() -> Self {
        Self {
            required: false,
            expected: None,
        }
    }

    /// Attach an expected value.
    pub fn expecting(mut self, expected: ExpectedValue) -> Self {
        self.expected = Some(expected);
        self
    }
}

/// Claim name -> rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimsPolicy {
    rules: BTreeMap<String, ClaimRule>,
}

impl ClaimsPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a policy with `rule` set for `claim`, replacing any previous rule.
    pub fn with_rule(mut self, claim: &str, rule: ClaimRule) -> Self {
        self.rules.insert(claim.to_string(), rule);
        self
    }

    pub fn rule(&self, claim: &str) -> Option<&ClaimRule> {
        self.rules.get(claim)
    }

    pub fn rules(&self) -> impl Iterator<Item = (&str, &ClaimRule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    /// Check decoded claims against every rule.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidClaim` naming the first claim (in name
    /// order) that is missing or does not match.
    pub fn evaluate(&self, claims: &Claims) -> Result<(), AuthError> {
        for (name, rule) in &self.rules {
            match claims.get(name) {
                None | Some(serde_json::Value::Null) => {
                    if rule.required {
                        tracing::debug!(target: "auth.claims", claim = %name, "Required claim missing");
                        return Err(AuthError::InvalidClaim {
                            claim: name.clone(),
                        });
                    }
                }
                Some(value) => {
                    if let Some(expected) = &rule.expected {
                        if !expected.matches(value) {
                            tracing::debug!(target: "auth.claims", claim = %name, "Claim value rejected");
                            return Err(AuthError::InvalidClaim {
                                claim: name.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Claims of a verified token.
///
/// Kept as the raw claim map so any policy can be evaluated against it.
/// The `sub` claim is redacted in Debug output.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(serde_json::Map<String, serde_json::Value>);

impl Claims {
    pub fn get(&self, claim: &str) -> Option<&serde_json::Value> {
        self.0.get(claim)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(serde_json::Value::as_str)
    }

    /// The parsed `x-nmos-api` grant, if present and well formed.
    pub fn nmos_api(&self) -> Option<ApiAccess> {
        self.get(NMOS_API_CLAIM)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Claims {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.0 {
            if name == "sub" {
                map.entry(name, &"[REDACTED]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: serde_json::Value) -> Claims {
        serde_json::from_value(value).unwrap()
    }

    fn api_rule(name: &str, access: AccessLevel) -> ClaimRule {
        ClaimRule::required().expecting(ExpectedValue::Api(ApiAccess::new([name], access)))
    }

    #[test]
    fn test_access_level_ordering() {
        assert!(AccessLevel::Write.satisfies(AccessLevel::Read));
        assert!(AccessLevel::Write.satisfies(AccessLevel::Write));
        assert!(AccessLevel::Read.satisfies(AccessLevel::Read));
        assert!(!AccessLevel::Read.satisfies(AccessLevel::Write));
    }

    #[test]
    fn test_api_access_accepts_single_name_and_alias() {
        let single: ApiAccess =
            serde_json::from_value(json!({"name": "registration", "access": "read"})).unwrap();
        assert_eq!(single, ApiAccess::new(["registration"], AccessLevel::Read));

        let aliased: ApiAccess = serde_json::from_value(
            json!({"apiNames": ["registration", "connection"], "access": "write"}),
        )
        .unwrap();
        assert!(aliased.name.contains("connection"));
        assert_eq!(aliased.access, AccessLevel::Write);
    }

    #[test]
    fn test_api_access_rejects_unknown_level() {
        let result = serde_json::from_value::<ApiAccess>(json!({"name": "query", "access": "admin"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_evaluate_required_claim_missing() {
        let policy = ClaimsPolicy::new().with_rule("iss", ClaimRule::required());

        let result = policy.evaluate(&claims(json!({"sub": "node"})));

        assert!(matches!(result, Err(AuthError::InvalidClaim { claim }) if claim == "iss"));
    }

    #[test]
    fn test_evaluate_null_counts_as_missing() {
        let policy = ClaimsPolicy::new().with_rule("iss", ClaimRule::required());
        assert!(policy.evaluate(&claims(json!({"iss": null}))).is_err());

        let policy = ClaimsPolicy::new().with_rule("nbf", ClaimRule::optional());
        assert!(policy.evaluate(&claims(json!({"nbf": null}))).is_ok());
    }

    #[test]
    fn test_evaluate_exact_value_and_audience_list() {
        let policy = ClaimsPolicy::new().with_rule(
            "aud",
            ClaimRule::required().expecting(ExpectedValue::Exact(json!("nmos-node"))),
        );

        assert!(policy.evaluate(&claims(json!({"aud": "nmos-node"}))).is_ok());
        assert!(policy
            .evaluate(&claims(json!({"aud": ["other", "nmos-node"]})))
            .is_ok());
        assert!(policy.evaluate(&claims(json!({"aud": "other"}))).is_err());
    }

    #[test]
    fn test_evaluate_one_of() {
        let policy = ClaimsPolicy::new().with_rule(
            "iss",
            ClaimRule::optional().expecting(ExpectedValue::OneOf(vec![json!("a"), json!("b")])),
        );

        assert!(policy.evaluate(&claims(json!({"iss": "b"}))).is_ok());
        assert!(policy.evaluate(&claims(json!({"iss": "c"}))).is_err());
        assert!(policy.evaluate(&claims(json!({}))).is_ok());
    }

    #[test]
    fn test_evaluate_api_claim_matrix() {
        let token = claims(json!({
            "x-nmos-api": {"name": ["registration", "connection"], "access": "write"}
        }));

        let check = |api: &str, access| {
            ClaimsPolicy::new()
                .with_rule(NMOS_API_CLAIM, api_rule(api, access))
                .evaluate(&token)
        };

        assert!(check("query", AccessLevel::Read).is_err());
        assert!(check("registration", AccessLevel::Read).is_ok());
        assert!(check("connection", AccessLevel::Read).is_ok());
        assert!(check("connection", AccessLevel::Write).is_ok());
        assert!(check("registration", AccessLevel::Write).is_ok());
    }

    #[test]
    fn test_evaluate_read_grant_rejects_write() {
        let token = claims(json!({
            "x-nmos-api": {"name": ["registration", "connection"], "access": "read"}
        }));
        let policy =
            ClaimsPolicy::new().with_rule(NMOS_API_CLAIM, api_rule("connection", AccessLevel::Write));

        let result = policy.evaluate(&token);

        assert!(matches!(result, Err(AuthError::InvalidClaim { claim }) if claim == NMOS_API_CLAIM));
    }

    #[test]
    fn test_evaluate_malformed_api_claim() {
        let token = claims(json!({"x-nmos-api": "registration"}));
        let policy = ClaimsPolicy::new()
            .with_rule(NMOS_API_CLAIM, api_rule("registration", AccessLevel::Read));

        assert!(policy.evaluate(&token).is_err());
    }

    #[test]
    fn test_with_rule_returns_new_value() {
        let base = ClaimsPolicy::new().with_rule("iss", ClaimRule::required());
        let extended = base.clone().with_rule("aud", ClaimRule::required());

        assert!(base.rule("aud").is_none());
        assert!(extended.rule("aud").is_some());
    }

    #[test]
    fn test_claims_debug_redacts_sub() {
        let token = claims(json!({"sub": "secret-client-id", "iss": "auth"}));

        let debug_str = format!("{:?}", token);

        assert!(!debug_str.contains("secret-client-id"));
        assert!(debug_str.contains("[REDACTED]"));
        assert_eq!(token.subject(), Some("secret-client-id"));
    }

    #[test]
    fn test_claims_nmos_api_accessor() {
        let token = claims(json!({"x-nmos-api": {"name": "query", "access": "read"}}));
        assert_eq!(
            token.nmos_api(),
            Some(ApiAccess::new(["query"], AccessLevel::Read))
        );
        assert!(Claims::default().nmos_api().is_none());
    }
}
