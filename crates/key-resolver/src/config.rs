//! Resolver configuration.
//!
//! Built programmatically with the `with_*` methods or loaded from environment
//! variables. Shared secrets are redacted in Debug output.

use crate::fetch::parse_http_url;
use crate::secrets::StaticKey;
use common::secret::{SecretSlice, SecretString};
use jsonwebtoken::jwk::Jwk;
use reqwest::Url;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default TTL for keys fetched from an issuer's key set (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(300_000);

/// Upper bound accepted for the cache TTL (7 days).
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default timeout for each discovery or key-set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Upper bound accepted for the fetch timeout.
pub const MAX_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("need issuers array")]
    MissingIssuers,

    #[error("Issuer must not be blank")]
    BlankIssuer,

    #[error("Invalid URL for issuer {issuer}: {uri}")]
    InvalidJwksUri { issuer: String, uri: String },

    #[error("Static configuration for untrusted issuer: {0}")]
    UntrustedIssuer(String),

    #[error("Invalid static key for issuer {issuer}: {reason}")]
    InvalidStaticKey { issuer: String, reason: String },

    #[error("Invalid cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Invalid prewarm configuration: {0}")]
    InvalidPrewarm(String),

    #[error("Invalid entry in {var}: expected 'issuer=value'")]
    InvalidEntry { var: String },
}

/// Key resolver configuration.
#[derive(Clone)]
pub struct ResolverConfig {
    /// Trusted issuers. Tokens from any other issuer are rejected.
    pub issuers: Vec<String>,

    /// Key-set URL overrides; these issuers skip discovery.
    pub jwks_uris: HashMap<String, String>,

    /// Static secrets and public keys; these issuers skip all network resolution.
    pub static_keys: HashMap<String, StaticKey>,

    /// How long fetched keys stay cached.
    pub cache_ttl: Duration,

    /// Timeout for each discovery or key-set fetch.
    pub fetch_timeout: Duration,

    /// Resolve every issuer before the resolver is handed out.
    pub prewarm: bool,

    /// Aggregate bound on pre-warm. Without one, pre-warm is bounded only by
    /// the per-fetch timeouts.
    pub prewarm_deadline: Option<Duration>,
}

/// Custom Debug implementation that redacts shared secrets.
impl fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let static_keys: HashMap<&str, &str> = self
            .static_keys
            .iter()
            .map(|(issuer, key)| {
                let kind = match key {
                    StaticKey::Secret(_) | StaticKey::SecretBytes(_) => "[REDACTED]",
                    StaticKey::PublicJwk(_) => "public jwk",
                };
                (issuer.as_str(), kind)
            })
            .collect();

        f.debug_struct("ResolverConfig")
            .field("issuers", &self.issuers)
            .field("jwks_uris", &self.jwks_uris)
            .field("static_keys", &static_keys)
            .field("cache_ttl", &self.cache_ttl)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("prewarm", &self.prewarm)
            .field("prewarm_deadline", &self.prewarm_deadline)
            .finish()
    }
}

impl ResolverConfig {
    /// Configuration trusting `issuers`, with defaults for everything else.
    pub fn new<I, S>(issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deduped: Vec<String> = Vec::new();
        for issuer in issuers {
            let issuer = issuer.into();
            if !deduped.contains(&issuer) {
                deduped.push(issuer);
            }
        }

        Self {
            issuers: deduped,
            jwks_uris: HashMap::new(),
            static_keys: HashMap::new(),
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            prewarm: true,
            prewarm_deadline: None,
        }
    }

    /// Serve `issuer`'s keys from `uri` instead of discovering it.
    pub fn with_jwks_uri(mut self, issuer: impl Into<String>, uri: impl Into<String>) -> Self {
        self.jwks_uris.insert(issuer.into(), uri.into());
        self
    }

    /// Verify `issuer`'s tokens with a shared secret.
    pub fn with_secret(mut self, issuer: impl Into<String>, secret: SecretString) -> Self {
        self.static_keys
            .insert(issuer.into(), StaticKey::Secret(secret));
        self
    }

    /// Verify `issuer`'s tokens with a shared secret given as raw bytes.
    pub fn with_secret_bytes(mut self, issuer: impl Into<String>, secret: SecretSlice<u8>) -> Self {
        self.static_keys
            .insert(issuer.into(), StaticKey::SecretBytes(secret));
        self
    }

    /// Verify `issuer`'s tokens with a fixed public key.
    pub fn with_public_jwk(mut self, issuer: impl Into<String>, jwk: Jwk) -> Self {
        self.static_keys
            .insert(issuer.into(), StaticKey::PublicJwk(Box::new(jwk)));
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_prewarm(mut self, prewarm: bool) -> Self {
        self.prewarm = prewarm;
        self
    }

    pub fn with_prewarm_deadline(mut self, deadline: Duration) -> Self {
        self.prewarm_deadline = Some(deadline);
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let issuers_raw = vars
            .get("JWT_ISSUERS")
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_ISSUERS".to_string()))?;

        let issuers: Vec<&str> = issuers_raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let mut config = Self::new(issuers);

        if let Some(raw) = vars.get("JWT_JWKS_URIS") {
            for (issuer, uri) in parse_pairs("JWT_JWKS_URIS", raw)? {
                config = config.with_jwks_uri(issuer, uri);
            }
        }

        if let Some(raw) = vars.get("JWT_ISSUER_SECRETS") {
            for (issuer, secret) in parse_pairs("JWT_ISSUER_SECRETS", raw)? {
                config = config.with_secret(issuer, SecretString::from(secret));
            }
        }

        if let Some(value_str) = vars.get("JWKS_CACHE_TTL_MS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidCacheTtl(format!(
                    "JWKS_CACHE_TTL_MS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidCacheTtl(
                    "JWKS_CACHE_TTL_MS must be greater than 0".to_string(),
                ));
            }

            config.cache_ttl = Duration::from_millis(value);
        }

        if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_MS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidFetchTimeout(format!(
                    "JWKS_FETCH_TIMEOUT_MS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            config.fetch_timeout = Duration::from_millis(value);
        }

        if let Some(value_str) = vars.get("JWKS_PREWARM") {
            config.prewarm = match value_str.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidPrewarm(format!(
                        "JWKS_PREWARM must be true or false, got '{}'",
                        value_str
                    )))
                }
            };
        }

        if let Some(value_str) = vars.get("JWKS_PREWARM_DEADLINE_MS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidPrewarm(format!(
                    "JWKS_PREWARM_DEADLINE_MS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidPrewarm(
                    "JWKS_PREWARM_DEADLINE_MS must be greater than 0".to_string(),
                ));
            }

            config.prewarm_deadline = Some(Duration::from_millis(value));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration and parse the key-set URL overrides.
    ///
    /// # Errors
    ///
    /// Fails on an empty or blank issuer list, a non-http(s) key-set URL,
    /// static configuration for an untrusted issuer, or out-of-range durations.
    pub fn validate(&self) -> Result<HashMap<String, Url>, ConfigError> {
        if self.issuers.is_empty() {
            return Err(ConfigError::MissingIssuers);
        }

        if self.issuers.iter().any(|issuer| issuer.trim().is_empty()) {
            return Err(ConfigError::BlankIssuer);
        }

        if self.cache_ttl.is_zero() || self.cache_ttl > MAX_CACHE_TTL {
            return Err(ConfigError::InvalidCacheTtl(format!(
                "cache TTL must be between 1ms and {}s, got {:?}",
                MAX_CACHE_TTL.as_secs(),
                self.cache_ttl
            )));
        }

        if self.fetch_timeout.is_zero() || self.fetch_timeout > MAX_FETCH_TIMEOUT {
            return Err(ConfigError::InvalidFetchTimeout(format!(
                "fetch timeout must be between 1ms and {}s, got {:?}",
                MAX_FETCH_TIMEOUT.as_secs(),
                self.fetch_timeout
            )));
        }

        if let Some(issuer) = self
            .static_keys
            .keys()
            .chain(self.jwks_uris.keys())
            .find(|issuer| !self.is_trusted(issuer))
        {
            return Err(ConfigError::UntrustedIssuer(issuer.clone()));
        }

        self.jwks_uris
            .iter()
            .map(|(issuer, uri)| {
                parse_http_url(uri)
                    .map(|url| (issuer.clone(), url))
                    .map_err(|_| ConfigError::InvalidJwksUri {
                        issuer: issuer.clone(),
                        uri: uri.clone(),
                    })
            })
            .collect()
    }

    pub fn is_trusted(&self, issuer: &str) -> bool {
        self.issuers.iter().any(|trusted| trusted == issuer)
    }
}

/// Split `a=1,b=2` into pairs. Values may contain '='; keys may not.
fn parse_pairs<'a>(var: &str, raw: &'a str) -> Result<Vec<(&'a str, &'a str)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.trim(), value.trim()))
                .filter(|(key, value)| !key.is_empty() && !value.is_empty())
                .ok_or_else(|| ConfigError::InvalidEntry {
                    var: var.to_string(),
                })
        })
        .collect()
}
