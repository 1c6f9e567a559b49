//! Bearer token authentication for axum services.
//!
//! Verifies compact JWTs against a [`KeySource`]: a single shared secret, a
//! single public key, or an issuer-scoped [`key_resolver::KeyResolver`] that
//! discovers and caches each issuer's published keys.
//!
//! # Usage
//!
//! ```rust,ignore
//! use jwt_auth::{middleware::AuthState, JwtValidator, KeySource, VerifyOptions};
//!
//! let resolver = KeyResolver::build(&ResolverConfig::from_env()?).await?;
//! let validator = JwtValidator::new(
//!     KeySource::resolver(Arc::new(resolver)),
//!     VerifyOptions::default(),
//! );
//! let auth_state = Arc::new(AuthState { jwt_validator: Arc::new(validator) });
//! let app = routes::build_routes(auth_state);
//! ```

pub mod claims;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod validator;

pub use claims::Claims;
pub use errors::AuthError;
pub use validator::{JwtValidator, KeySource, VerifyOptions};
