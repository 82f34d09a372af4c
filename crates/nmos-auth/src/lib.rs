//! NMOS authorization gate library.
//!
//! Protects NMOS HTTP APIs with OAuth2 bearer tokens: each request's JWT is
//! verified against signing keys fetched from the discovered authorization
//! server and its claims are checked against a per-API, per-method policy.
//!
//! # Architecture
//!
//! ```text
//! middleware::AuthGate -> auth::resolver -> auth::extract
//!                      -> auth::validator -> auth::jwt
//! ```
//!
//! # Modules
//!
//! - `auth` - Key resolution, key extraction, claims policies, verification
//! - `config` - Service configuration from environment
//! - `discovery` - Service discovery seam for the authorization server
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - The authorization gate
//! - `observability` - Metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;

pub use errors::AuthError;
pub use middleware::{AuthContext, AuthGate};
