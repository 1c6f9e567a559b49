//! # JWKS Test Utilities
//!
//! Shared test utilities for the key resolver and the authentication layer.
//!
//! This crate provides:
//! - Deterministic signing keys (`TestKeypair` for EdDSA, `RsaTestKey` for RS256)
//! - JWT claim builders and signers (`TestTokenBuilder`)
//! - A mock OpenID issuer serving discovery and key set documents (`MockIssuer`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jwks_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::new(1, "k1");
//!     let issuer = MockIssuer::start().await;
//!     issuer.mount_discovery().await;
//!     issuer.mount_jwks(&[keypair.jwk()]).await;
//!
//!     let token = TestTokenBuilder::new()
//!         .issuer(&issuer.issuer())
//!         .sign_eddsa(&keypair);
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_issuer;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_issuer::*;
pub use token_builders::*;
