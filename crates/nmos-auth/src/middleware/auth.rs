//! Authorization gate for NMOS API routes.
//!
//! An `AuthGate` is built per API at route registration time and wraps the
//! API's router with the `require_auth` middleware. A request passes when
//! its bearer token verifies against the authorization server's current
//! signing key and its claims satisfy the API's policy for the request
//! method. The decoded claims are then inserted into request extensions.

use crate::auth::claims::{Claims, ClaimsPolicy};
use crate::auth::jwt::verify_token;
use crate::auth::keys::KeyMode;
use crate::auth::resolver::KeyResolver;
use crate::auth::validator::ClaimsValidator;
use crate::errors::AuthError;
use crate::observability::metrics::record_auth_decision;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Scheme word accepted in the Authorization header. Matched case-sensitively.
pub const BEARER_SCHEME: &str = "Bearer";

/// Collaborators shared by every gate of a service.
#[derive(Clone)]
pub struct AuthContext {
    /// Discovery plus key fetch.
    pub resolver: KeyResolver,

    /// Per-request claims policy construction.
    pub validator: ClaimsValidator,

    /// Which key endpoint to use.
    pub key_mode: KeyMode,

    /// Clock skew tolerance for `exp`/`nbf`.
    pub leeway: Duration,
}

/// Gate protecting the routes of one API.
#[derive(Clone)]
pub struct AuthGate {
    condition: bool,
    api_name: String,
    claims_override: Option<ClaimsPolicy>,
    context: Arc<AuthContext>,
}

impl AuthGate {
    /// Create a gate for `api_name`.
    ///
    /// When `condition` is false the gate is inert: `protect` hands the
    /// router back untouched. `claims_override` replaces the catalog's base
    /// claims for this API.
    pub fn new(
        condition: bool,
        api_name: impl Into<String>,
        claims_override: Option<ClaimsPolicy>,
        context: Arc<AuthContext>,
    ) -> Self {
        Self {
            condition,
            api_name: api_name.into(),
            claims_override,
            context,
        }
    }

    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    pub fn is_active(&self) -> bool {
        self.condition
    }

    /// Wrap every route currently on `router` with this gate.
    ///
    /// `router` must already have its routes registered.
    pub fn protect<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        if !self.condition {
            tracing::debug!(target: "auth.gate", api = %self.api_name, "Authorization disabled for API");
            return router;
        }
        router.route_layer(middleware::from_fn_with_state(Arc::new(self), require_auth))
    }

    /// Authorize a request from its headers and method.
    ///
    /// # Errors
    ///
    /// Returns the first failure in order: header extraction, key
    /// resolution, key extraction, token verification, claims evaluation.
    pub async fn authorize(&self, headers: &HeaderMap, method: &Method) -> Result<Claims, AuthError> {
        let header = match headers.get(AUTHORIZATION) {
            None => None,
            Some(value) => Some(value.to_str().map_err(|_| {
                AuthError::MissingAuthorization(
                    "Authorization header is not valid text".to_string(),
                )
            })?),
        };
        let token = extract_bearer_token(header)?;

        let key = self
            .context
            .resolver
            .resolve_public_key(self.context.key_mode)
            .await?;

        let policy =
            self.context
                .validator
                .policy_for(&self.api_name, method, self.claims_override.as_ref());

        verify_token(token, &key, &policy, self.context.leeway)
    }
}

/// Pull the token out of an Authorization header value.
///
/// # Errors
///
/// - `AuthError::MissingAuthorization` if the header is absent, empty or
///   `null`, or carries an empty or `null` token
/// - `AuthError::UnsupportedTokenType` if the scheme is not exactly `Bearer`
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = match header {
        None => {
            return Err(AuthError::MissingAuthorization(
                "Missing Authorization header".to_string(),
            ))
        }
        Some(value) if value.is_empty() || value == "null" => {
            return Err(AuthError::MissingAuthorization(
                "Empty Authorization header".to_string(),
            ))
        }
        Some(value) => value,
    };

    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));

    if token.is_empty() || token == "null" {
        return Err(AuthError::MissingAuthorization(
            "Missing bearer token".to_string(),
        ));
    }

    if scheme != BEARER_SCHEME {
        return Err(AuthError::UnsupportedTokenType(
            "Authorization scheme must be Bearer".to_string(),
        ));
    }

    Ok(token)
}

/// Authorization middleware installed by `AuthGate::protect`.
///
/// # Response
///
/// - Continues to the wrapped handler with `Claims` in request extensions
///   when the request is authorized; the handler's response is returned
///   unchanged
/// - Otherwise returns the `AuthError` response (401, 403, 502 or 503)
#[instrument(skip_all, name = "auth.gate")]
pub async fn require_auth(
    State(gate): State<Arc<AuthGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let decision = gate.authorize(req.headers(), req.method()).await;
    match decision {
        Ok(claims) => {
            tracing::debug!(target: "auth.gate", api = %gate.api_name, "Request authorized");
            record_auth_decision(&gate.api_name, "authorized");
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(e) => {
            tracing::info!(
                target: "auth.gate",
                api = %gate.api_name,
                method = %req.method(),
                reason = e.kind(),
                "Request rejected"
            );
            record_auth_decision(&gate.api_name, e.kind());
            Err(e)
        }
    }
}

/// Extension trait for extracting claims from request.
///
/// Provides a convenient method for handlers to get the authorized claims.
pub trait ClaimsExt {
    /// Get the authorized claims from request extensions.
    ///
    /// Returns `None` if no active gate wrapped this request.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}
