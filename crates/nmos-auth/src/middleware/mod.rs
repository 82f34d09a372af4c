//! Middleware for NMOS API routes.
//!
//! # Components
//!
//! - `auth` - Authorization gate for protected APIs

pub mod auth;

pub use auth::{extract_bearer_token, require_auth, AuthContext, AuthGate, ClaimsExt};
