//! Issuer key store.
//!
//! Holds the static secret table, the issuer to key-set endpoint cache, and
//! fetched keys keyed by `(issuer, kid, alg)`. Every cached key carries its own
//! expiry; expired keys are evicted when looked up, never by a timer.
//!
//! Each map sits behind its own `RwLock`. Locks are never held across a network
//! call, and every mutation is a single-key upsert or delete.

use crate::config::MAX_CACHE_TTL;
use crate::key_set::PublishedKey;
use crate::observability::metrics::{self, CacheLookup};
use crate::secrets::{SecretTable, VerificationKey};
use reqwest::Url;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Identity of a published key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRef {
    pub issuer: String,
    pub kid: String,
    pub alg: String,
}

impl KeyRef {
    pub fn new(issuer: impl Into<String>, kid: impl Into<String>, alg: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            kid: kid.into(),
            alg: alg.into(),
        }
    }
}

/// A fetched key with its expiry.
#[derive(Debug, Clone)]
struct CachedKey {
    key: VerificationKey,
    expires_at: Instant,
}

/// Cache state for every trusted issuer.
#[derive(Debug)]
pub struct IssuerKeyStore {
    secrets: SecretTable,
    endpoints: RwLock<HashMap<String, Url>>,
    keys: RwLock<HashMap<KeyRef, CachedKey>>,
}

impl IssuerKeyStore {
    /// Create a store with the static secret table and any configured
    /// key-set endpoints.
    pub fn new(secrets: SecretTable, endpoints: HashMap<String, Url>) -> Self {
        Self {
            secrets,
            endpoints: RwLock::new(endpoints),
            keys: RwLock::new(HashMap::new()),
        }
    }

    pub fn lookup_secret(&self, issuer: &str) -> Option<VerificationKey> {
        self.secrets.get(issuer)
    }

    pub fn has_secret(&self, issuer: &str) -> bool {
        self.secrets.contains(issuer)
    }

    /// Look up an unexpired key. An expired entry is evicted.
    pub async fn lookup_key(&self, key_ref: &KeyRef) -> Option<VerificationKey> {
        let (key, outcome) = self.find_key(key_ref).await;
        metrics::record_cache_lookup(outcome);
        key
    }

    /// Look up a key right after a refresh stored it. Not counted as a cache
    /// lookup; the lookup that led to the refresh already was.
    pub async fn lookup_refreshed_key(&self, key_ref: &KeyRef) -> Option<VerificationKey> {
        self.find_key(key_ref).await.0
    }

    async fn find_key(&self, key_ref: &KeyRef) -> (Option<VerificationKey>, CacheLookup) {
        let now = Instant::now();

        {
            let keys = self.keys.read().await;
            match keys.get(key_ref) {
                Some(cached) if cached.expires_at > now => {
                    tracing::debug!(target: "keyres.store", kid = %key_ref.kid, alg = %key_ref.alg, "Key cache hit");
                    return (Some(cached.key.clone()), CacheLookup::Hit);
                }
                Some(_) => {}
                None => return (None, CacheLookup::Miss),
            }
        }

        // Expired. Another caller may have refreshed it since the read lock
        // was released, so re-check before evicting.
        let mut keys = self.keys.write().await;
        match keys.get(key_ref) {
            Some(cached) if cached.expires_at > now => (Some(cached.key.clone()), CacheLookup::Hit),
            Some(_) => {
                keys.remove(key_ref);
                tracing::debug!(target: "keyres.store", kid = %key_ref.kid, alg = %key_ref.alg, "Evicted expired key");
                (None, CacheLookup::Expired)
            }
            None => (None, CacheLookup::Miss),
        }
    }

    /// Import and cache a fetched key set. Returns the number of keys stored.
    ///
    /// Keys that fail to import are skipped with a warning.
    pub async fn store_key_set(&self, issuer: &str, keys: &[PublishedKey], ttl: Duration) -> usize {
        let mut imported = Vec::with_capacity(keys.len());
        let mut skipped = 0;

        for published in keys {
            if !published.is_signing_key() {
                tracing::debug!(target: "keyres.store", issuer = %issuer, kid = ?published.kid(), "Ignoring non-signing key");
                continue;
            }

            match published.key_ref(issuer).and_then(|key_ref| {
                published.import().map(|key| (key_ref, key))
            }) {
                Ok(entry) => imported.push(entry),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        target: "keyres.store",
                        issuer = %issuer,
                        kid = ?published.kid(),
                        alg = ?published.alg(),
                        error = %e,
                        "Skipping key that failed to import"
                    );
                }
            }
        }

        metrics::record_keys_skipped(skipped);

        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + MAX_CACHE_TTL);
        let stored = imported.len();

        let mut cache = self.keys.write().await;
        for (key_ref, key) in imported {
            cache.insert(key_ref, CachedKey { key, expires_at });
        }

        stored
    }

    pub async fn lookup_endpoint(&self, issuer: &str) -> Option<Url> {
        self.endpoints.read().await.get(issuer).cloned()
    }

    pub async fn store_endpoint(&self, issuer: &str, url: Url) {
        self.endpoints.write().await.insert(issuer.to_string(), url);
    }

    /// Number of cached keys, expired ones included.
    pub async fn cached_key_count(&self) -> usize {
        self.keys.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const ISSUER: &str = "https://issuer.example";

    fn published(kid: &str) -> PublishedKey {
        PublishedKey::from_value(json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo",
            "kid": kid,
            "alg": "EdDSA"
        }))
    }

    fn malformed(kid: &str) -> PublishedKey {
        PublishedKey::from_value(json!({"kty": "RSA", "e": "AQAB", "kid": kid, "alg": "RS256"}))
    }

    fn empty_store() -> IssuerKeyStore {
        IssuerKeyStore::new(SecretTable::default(), HashMap::new())
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let store = empty_store();

        let stored = store
            .store_key_set(ISSUER, &[published("k1")], Duration::from_secs(300))
            .await;
        assert_eq!(stored, 1);

        assert!(store.lookup_key(&KeyRef::new(ISSUER, "k1", "EdDSA")).await.is_some());
        // Same kid under another alg or issuer is a different key.
        assert!(store.lookup_key(&KeyRef::new(ISSUER, "k1", "RS256")).await.is_none());
        assert!(store
            .lookup_key(&KeyRef::new("https://other.example", "k1", "EdDSA"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_malformed_key_skipped() {
        let store = empty_store();

        let stored = store
            .store_key_set(
                ISSUER,
                &[malformed("bad"), published("good")],
                Duration::from_secs(300),
            )
            .await;

        assert_eq!(stored, 1);
        assert_eq!(store.cached_key_count().await, 1);
        assert!(store.lookup_key(&KeyRef::new(ISSUER, "good", "EdDSA")).await.is_some());
        assert!(store.lookup_key(&KeyRef::new(ISSUER, "bad", "RS256")).await.is_none());
    }

    #[tokio::test]
    async fn test_non_signing_key_ignored() {
        let store = empty_store();
        let mut material: Value = json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo",
            "kid": "enc-key",
            "alg": "EdDSA"
        });
        material["use"] = json!("enc");

        let stored = store
            .store_key_set(
                ISSUER,
                &[PublishedKey::from_value(material)],
                Duration::from_secs(300),
            )
            .await;

        assert_eq!(stored, 0);
        assert_eq!(store.cached_key_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_key_is_evicted() {
        let store = empty_store();
        let key_ref = KeyRef::new(ISSUER, "k1", "EdDSA");

        store
            .store_key_set(ISSUER, &[published("k1")], Duration::from_secs(60))
            .await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.lookup_key(&key_ref).await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.lookup_key(&key_ref).await.is_none());
        assert_eq!(store.cached_key_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_refreshes_expiry() {
        let store = empty_store();
        let key_ref = KeyRef::new(ISSUER, "k1", "EdDSA");

        store
            .store_key_set(ISSUER, &[published("k1")], Duration::from_secs(60))
            .await;
        tokio::time::advance(Duration::from_secs(45)).await;
        store
            .store_key_set(ISSUER, &[published("k1")], Duration::from_secs(60))
            .await;
        tokio::time::advance(Duration::from_secs(45)).await;

        assert!(store.lookup_key(&key_ref).await.is_some());
    }

    #[tokio::test]
    async fn test_unbounded_ttl_does_not_overflow() {
        let store = empty_store();

        let stored = store
            .store_key_set(ISSUER, &[published("k1")], Duration::MAX)
            .await;

        assert_eq!(stored, 1);
        assert!(store.lookup_key(&KeyRef::new(ISSUER, "k1", "EdDSA")).await.is_some());
    }

    #[tokio::test]
    async fn test_endpoints() {
        let preset = Url::parse("https://issuer.example/certs").unwrap();
        let store = IssuerKeyStore::new(
            SecretTable::default(),
            HashMap::from([(ISSUER.to_string(), preset.clone())]),
        );

        assert_eq!(store.lookup_endpoint(ISSUER).await, Some(preset));
        assert_eq!(store.lookup_endpoint("https://other.example").await, None);

        let discovered = Url::parse("https://other.example/jwks").unwrap();
        store
            .store_endpoint("https://other.example", discovered.clone())
            .await;
        assert_eq!(
            store.lookup_endpoint("https://other.example").await,
            Some(discovered)
        );
    }

    #[tokio::test]
    async fn test_lookup_secret() {
        use crate::secrets::StaticKey;
        use common::secret::SecretString;

        let table = SecretTable::from_static(&HashMap::from([(
            ISSUER.to_string(),
            StaticKey::Secret(SecretString::from("shhhhh")),
        )]))
        .unwrap();
        let store = IssuerKeyStore::new(table, HashMap::new());

        assert!(store.has_secret(ISSUER));
        assert!(store.lookup_secret(ISSUER).is_some());
        assert!(store.lookup_secret("https://other.example").is_none());
    }
}
