//! Common utilities and types shared across the issuer-keys crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for compact JWT decoding (header, payload, signature)
pub mod jwt;
