//! Token validation for NMOS API requests.
//!
//! # Components
//!
//! - `keys` - key material shapes returned by the authorization server
//! - `resolver` - discovery plus fetch of key material, no caching
//! - `extract` - normalization of JWKs and certificates into a public key
//! - `claims` - claims and the policies evaluated against them
//! - `catalog` - base policies per API name
//! - `validator` - per-request policy construction
//! - `jwt` - signature and time-claim verification

pub mod catalog;
pub mod claims;
pub mod extract;
pub mod jwt;
pub mod keys;
pub mod resolver;
pub mod validator;

pub use catalog::{ClaimsPolicyCatalog, PolicyClass};
pub use claims::{AccessLevel, ApiAccess, ClaimRule, Claims, ClaimsPolicy, ExpectedValue};
pub use extract::{extract_public_key, KeyInput, PublicKey};
pub use jwt::verify_token;
pub use keys::{select_most_recent, KeyDescription, KeyMaterial, KeyMode};
pub use resolver::{HttpClient, HttpResponse, KeyResolver, ReqwestHttpClient};
pub use validator::{build_policy, required_access, ClaimsValidator};
