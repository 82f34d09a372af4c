//! Common utilities shared across the NMOS auth gate crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (size limits, clock skew, header inspection)
pub mod jwt;
