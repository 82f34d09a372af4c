//! # NMOS Auth Test Utilities
//!
//! Shared test utilities for the NMOS auth gate.
//!
//! This crate provides:
//! - Deterministic key fixtures (fixed RSA/EC keys and certificates)
//! - Token builders and signing helpers (TestTokenBuilder)
//! - Key server harness (MockKeyServer backed by wiremock)
//! - Collaborator fakes (RecordingHttpClient)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nmos_auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let server = MockKeyServer::start().await;
//!     server.serve_jwks(test_jwks()).await;
//!
//!     let token = TestTokenBuilder::new()
//!         .with_api(&["registration"], "write")
//!         .sign();
//! }
//! ```

pub mod fixtures;
pub mod mocks;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use fixtures::*;
pub use mocks::*;
pub use server_harness::*;
pub use token_builders::*;
