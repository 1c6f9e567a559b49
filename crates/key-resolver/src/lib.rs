//! Issuer-scoped key resolution for JWT verification.
//!
//! Given a decoded token, [`KeyResolver`] returns the key its signature must be
//! checked against. Keys come from one of two places:
//!
//! - a static table of per-issuer shared secrets or public keys, which always
//!   wins and never touches the network;
//! - the issuer's published key set, located through its OpenID discovery
//!   document (`<issuer>/.well-known/openid-configuration`) or a configured
//!   override, and cached per `(issuer, kid, alg)` until the TTL elapses.
//!
//! # Architecture
//!
//! ```text
//! resolver.rs -> store.rs (cache) -> discovery.rs -> key_set.rs -> fetch.rs
//!             \-> secrets.rs (static table)
//! ```
//!
//! # Modules
//!
//! - `config` - Resolver configuration, programmatic or from environment
//! - `errors` - Resolution and start-up error types
//! - `fetch` - Bounded JSON fetching over HTTP, with an in-memory mock
//! - `discovery` - Issuer metadata document lookup
//! - `key_set` - Published key parsing and import
//! - `secrets` - Verification keys and the static secret table
//! - `store` - Endpoint and key caches with lazy expiry
//! - `resolver` - The resolution entry point

pub mod config;
pub mod discovery;
pub mod errors;
pub mod fetch;
pub mod key_set;
pub mod observability;
pub mod resolver;
pub mod secrets;
pub mod store;

pub use config::{ConfigError, ResolverConfig};
pub use errors::{DiscoveryError, ResolveError, ResolveErrorKind, StartupError};
pub use fetch::{FetchError, HttpFetcher, JsonFetcher};
pub use resolver::{KeyResolver, ResolveKey};
pub use secrets::{KeyOrigin, StaticKey, VerificationKey};
pub use store::KeyRef;

/// URL type used for issuer endpoints.
pub use reqwest::Url;
