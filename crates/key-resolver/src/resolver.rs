//! Key resolution entry point.
//!
//! [`KeyResolver::resolve`] walks, per call:
//!
//! 1. issuer trust check
//! 2. static secret table
//! 3. key cache
//! 4. endpoint discovery, if the issuer's key-set URL is not yet known
//! 5. key set fetch and cache population
//! 6. key cache again
//!
//! A fetched key set without the requested `(kid, alg)` pairing resolves to
//! `Ok(None)`, not an error.
//!
//! # Concurrency
//!
//! Concurrent cache misses for the same issuer each run their own discovery and
//! key set fetch. The duplicate work is bounded by the fetch timeout and the
//! writes are idempotent upserts, so no per-issuer lock is taken. Pre-warming
//! at start-up removes the race for the common case.

use crate::config::{ConfigError, ResolverConfig};
use crate::discovery::MetadataResolver;
use crate::errors::{ResolveError, StartupError};
use crate::fetch::{HttpFetcher, JsonFetcher};
use crate::key_set::KeySetFetcher;
use crate::observability::metrics::{self, CacheLookup};
use crate::secrets::{SecretTable, VerificationKey};
use crate::store::{IssuerKeyStore, KeyRef};
use async_trait::async_trait;
use common::jwt::DecodedToken;
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Resolves the verification key for a decoded token.
#[async_trait]
pub trait ResolveKey: Send + Sync {
    async fn resolve(&self, token: &DecodedToken)
        -> Result<Option<VerificationKey>, ResolveError>;
}

/// Issuer-scoped key resolver with caching.
pub struct KeyResolver {
    issuers: Vec<String>,
    store: IssuerKeyStore,
    metadata: MetadataResolver,
    key_sets: KeySetFetcher,
    cache_ttl: Duration,
    prewarm: bool,
    prewarm_deadline: Option<Duration>,
}

impl KeyResolver {
    /// Create a resolver fetching over HTTP. Nothing is fetched yet.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(config: &ResolverConfig) -> Result<Self, ConfigError> {
        Self::with_fetcher(config, Arc::new(HttpFetcher::new(config.fetch_timeout)))
    }

    /// Create a resolver fetching through `fetcher`. Nothing is fetched yet.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn with_fetcher(
        config: &ResolverConfig,
        fetcher: Arc<dyn JsonFetcher>,
    ) -> Result<Self, ConfigError> {
        let endpoints = config.validate()?;
        let secrets = SecretTable::from_static(&config.static_keys)?;

        Ok(Self {
            issuers: config.issuers.clone(),
            store: IssuerKeyStore::new(secrets, endpoints),
            metadata: MetadataResolver::new(Arc::clone(&fetcher), config.fetch_timeout),
            key_sets: KeySetFetcher::new(fetcher, config.fetch_timeout),
            cache_ttl: config.cache_ttl,
            prewarm: config.prewarm,
            prewarm_deadline: config.prewarm_deadline,
        })
    }

    /// Create a resolver over HTTP and, if configured, pre-warm it.
    ///
    /// # Errors
    ///
    /// Returns `StartupError` on invalid configuration or a failed pre-warm.
    pub async fn build(config: &ResolverConfig) -> Result<Self, StartupError> {
        Self::build_with_fetcher(config, Arc::new(HttpFetcher::new(config.fetch_timeout))).await
    }

    /// Create a resolver fetching through `fetcher` and, if configured,
    /// pre-warm it.
    ///
    /// # Errors
    ///
    /// Returns `StartupError` on invalid configuration or a failed pre-warm.
    pub async fn build_with_fetcher(
        config: &ResolverConfig,
        fetcher: Arc<dyn JsonFetcher>,
    ) -> Result<Self, StartupError> {
        let resolver = Self::with_fetcher(config, fetcher)?;
        if resolver.prewarm {
            resolver.prewarm().await?;
        }
        Ok(resolver)
    }

    /// Resolve the endpoint and key set of every issuer without a static key.
    ///
    /// Issuers are resolved concurrently. Each fetch is bounded by the fetch
    /// timeout; the whole pass is additionally bounded by the pre-warm deadline
    /// when one is configured.
    ///
    /// # Errors
    ///
    /// Returns `StartupError::Prewarm` for the first issuer that fails and
    /// `StartupError::PrewarmDeadline` if the deadline passes first.
    #[instrument(skip(self))]
    pub async fn prewarm(&self) -> Result<(), StartupError> {
        let dynamic: Vec<&str> = self
            .issuers
            .iter()
            .map(String::as_str)
            .filter(|issuer| !self.store.has_secret(issuer))
            .collect();

        let all = try_join_all(dynamic.iter().map(|issuer| async move {
            self.refresh_issuer(issuer)
                .await
                .map_err(|source| StartupError::Prewarm {
                    issuer: (*issuer).to_string(),
                    source,
                })
        }));

        let result = match self.prewarm_deadline {
            Some(deadline) => tokio::time::timeout(deadline, all)
                .await
                .map_err(|_| StartupError::PrewarmDeadline(deadline))?,
            None => all.await,
        };

        match result {
            Ok(counts) => {
                tracing::info!(
                    target: "keyres.resolver",
                    issuers = dynamic.len(),
                    keys = counts.iter().sum::<usize>(),
                    "Key resolver pre-warmed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(target: "keyres.resolver", error = %e, "Key resolver pre-warm failed");
                Err(e)
            }
        }
    }

    /// Resolve the key for `issuer`, `kid` and `alg`.
    ///
    /// # Errors
    ///
    /// - `UnknownIssuer` if `issuer` is not trusted
    /// - `Discovery` if the issuer's key-set endpoint cannot be discovered
    /// - `FetchFailed` / `NoKeysFound` if its key set cannot be fetched
    #[instrument(skip(self), fields(issuer = %issuer))]
    pub async fn resolve_key(
        &self,
        issuer: &str,
        kid: Option<&str>,
        alg: Option<&str>,
    ) -> Result<Option<VerificationKey>, ResolveError> {
        if !self.is_trusted(issuer) {
            tracing::debug!(target: "keyres.resolver", issuer = %issuer, "Rejected untrusted issuer");
            return Err(ResolveError::UnknownIssuer(issuer.to_string()));
        }

        if let Some(secret) = self.store.lookup_secret(issuer) {
            metrics::record_cache_lookup(CacheLookup::Static);
            return Ok(Some(secret));
        }

        // Keys are only ever cached under both values.
        let (Some(kid), Some(alg)) = (kid, alg) else {
            tracing::debug!(target: "keyres.resolver", issuer = %issuer, "Token header lacks kid or alg");
            return Ok(None);
        };

        let key_ref = KeyRef::new(issuer, kid, alg);
        if let Some(key) = self.store.lookup_key(&key_ref).await {
            return Ok(Some(key));
        }

        self.refresh_issuer(issuer).await?;

        let key = self.store.lookup_refreshed_key(&key_ref).await;
        if key.is_none() {
            tracing::debug!(target: "keyres.resolver", issuer = %issuer, kid = %kid, alg = %alg, "No key published for kid and alg");
        }
        Ok(key)
    }

    /// Fetch `issuer`'s key set now, discovering its endpoint first if needed.
    /// Returns the number of keys cached.
    ///
    /// # Errors
    ///
    /// Same as [`KeyResolver::resolve_key`].
    pub async fn refresh_issuer(&self, issuer: &str) -> Result<usize, ResolveError> {
        if !self.is_trusted(issuer) {
            return Err(ResolveError::UnknownIssuer(issuer.to_string()));
        }

        let endpoint = match self.store.lookup_endpoint(issuer).await {
            Some(endpoint) => endpoint,
            None => {
                let endpoint = self.metadata.resolve_endpoint(issuer).await?;
                self.store.store_endpoint(issuer, endpoint.clone()).await;
                endpoint
            }
        };

        let published = self.key_sets.fetch_key_set(issuer, &endpoint).await?;
        let stored = self
            .store
            .store_key_set(issuer, &published, self.cache_ttl)
            .await;

        tracing::info!(
            target: "keyres.resolver",
            issuer = %issuer,
            url = %endpoint,
            published = published.len(),
            stored,
            "Key set refreshed"
        );

        Ok(stored)
    }

    pub fn is_trusted(&self, issuer: &str) -> bool {
        self.issuers.iter().any(|trusted| trusted == issuer)
    }

    pub fn issuers(&self) -> &[String] {
        &self.issuers
    }

    pub fn store(&self) -> &IssuerKeyStore {
        &self.store
    }
}

#[async_trait]
impl ResolveKey for KeyResolver {
    async fn resolve(
        &self,
        token: &DecodedToken,
    ) -> Result<Option<VerificationKey>, ResolveError> {
        let Some(issuer) = token.issuer() else {
            return Err(ResolveError::UnknownIssuer("<none>".to_string()));
        };

        self.resolve_key(issuer, token.key_id(), token.algorithm())
            .await
    }
}
