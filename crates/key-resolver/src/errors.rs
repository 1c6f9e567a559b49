//! Key resolution error types.
//!
//! Every network-facing error keeps its underlying cause for diagnostics, and
//! [`ResolveError::kind`] collapses them into a small fixed set so callers can
//! branch without inspecting transport detail. None of these messages are meant
//! for HTTP clients: the authentication layer answers every failure with the
//! same 401 body and only logs the detail.

use crate::config::ConfigError;
use crate::fetch::FetchError;
use std::time::Duration;
use thiserror::Error;

/// Failure to translate an issuer into its key-set endpoint.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The discovery document could not be retrieved or decoded.
    #[error("fetch failed url={url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The document does not assert the issuer it was fetched for.
    #[error("ambiguous issuer {expected} !== {}", .actual.as_deref().unwrap_or("undefined"))]
    IssuerMismatch {
        expected: String,
        actual: Option<String>,
    },

    /// The document has no `jwks_uri`.
    #[error("unknown jwks_uri: {issuer}")]
    MissingKeysUri { issuer: String },

    /// The document's `jwks_uri` is not an absolute http(s) URL.
    #[error("invalid jwks_uri for {issuer}: {uri}")]
    InvalidKeysUri { issuer: String, uri: String },
}

/// Per-request key resolution failure.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The token's issuer is not in the trusted set (or is missing).
    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    /// Endpoint discovery failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The key-set endpoint could not be reached in time.
    #[error("fetch failed url={url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The key-set endpoint answered without a usable key list.
    #[error("no keys found: issuer={issuer} url={url}")]
    NoKeysFound { issuer: String, url: String },
}

/// Normalized failure kinds exposed at the resolver boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveErrorKind {
    UnknownIssuer,
    Discovery,
    FetchFailed,
    NoKeysFound,
}

impl ResolveErrorKind {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ResolveErrorKind::UnknownIssuer => "unknown_issuer",
            ResolveErrorKind::Discovery => "discovery",
            ResolveErrorKind::FetchFailed => "fetch_failed",
            ResolveErrorKind::NoKeysFound => "no_keys_found",
        }
    }
}

impl ResolveError {
    /// Collapse this error into its [`ResolveErrorKind`].
    pub fn kind(&self) -> ResolveErrorKind {
        match self {
            ResolveError::UnknownIssuer(_) => ResolveErrorKind::UnknownIssuer,
            ResolveError::Discovery(_) => ResolveErrorKind::Discovery,
            ResolveError::FetchFailed { .. } => ResolveErrorKind::FetchFailed,
            ResolveError::NoKeysFound { .. } => ResolveErrorKind::NoKeysFound,
        }
    }
}

/// Failure while building a resolver.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An issuer could not be resolved during pre-warm.
    #[error("prewarm failed for {issuer}: {source}")]
    Prewarm {
        issuer: String,
        #[source]
        source: ResolveError,
    },

    /// Pre-warm did not finish within the configured aggregate deadline.
    #[error("prewarm did not complete within {0:?}")]
    PrewarmDeadline(Duration),
}
