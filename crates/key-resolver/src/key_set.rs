//! Key set fetching and per-key import.
//!
//! A key set document is `{"keys": [...]}`. Each entry is imported on its own;
//! one bad entry never spoils the rest of the set.

use crate::errors::ResolveError;
use crate::fetch::{fetch_bounded, FetchKind, JsonFetcher};
use crate::secrets::{KeyOrigin, VerificationKey};
use crate::store::KeyRef;
use jsonwebtoken::jwk::Jwk;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Why a published key was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyImportError {
    #[error("key has no kid")]
    MissingKid,

    #[error("key has no alg")]
    MissingAlg,

    #[error("symmetric keys are not accepted from a key set")]
    SymmetricKey,

    #[error("invalid JWK: {0}")]
    InvalidJwk(String),
}

/// One entry of a published key set, not yet imported.
#[derive(Debug, Clone)]
pub struct PublishedKey {
    kid: Option<String>,
    alg: Option<String>,
    key_use: Option<String>,
    material: Value,
}

impl PublishedKey {
    /// Pick the identifying fields out of a raw key set entry.
    pub fn from_value(material: Value) -> Self {
        let field = |name: &str| {
            material
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            kid: field("kid"),
            alg: field("alg"),
            key_use: field("use"),
            material,
        }
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn alg(&self) -> Option<&str> {
        self.alg.as_deref()
    }

    /// Whether this entry is published for signature verification. Entries
    /// without `use` are assumed to be.
    pub fn is_signing_key(&self) -> bool {
        self.key_use.as_deref().map_or(true, |u| u == "sig")
    }

    /// The cache identity this key is published under.
    pub fn key_ref(&self, issuer: &str) -> Result<KeyRef, KeyImportError> {
        let kid = self.kid.as_deref().ok_or(KeyImportError::MissingKid)?;
        let alg = self.alg.as_deref().ok_or(KeyImportError::MissingAlg)?;
        Ok(KeyRef::new(issuer, kid, alg))
    }

    /// Import the key material. Callers filter on [`Self::is_signing_key`]
    /// first.
    pub fn import(&self) -> Result<VerificationKey, KeyImportError> {
        if self.material.get("kty").and_then(Value::as_str) == Some("oct") {
            return Err(KeyImportError::SymmetricKey);
        }

        let jwk: Jwk = serde_json::from_value(self.material.clone())
            .map_err(|e| KeyImportError::InvalidJwk(e.to_string()))?;

        VerificationKey::from_jwk(&jwk, KeyOrigin::KeySet)
            .map_err(|e| KeyImportError::InvalidJwk(e.to_string()))
    }
}

/// Fetches and parses key set documents.
pub struct KeySetFetcher {
    fetcher: Arc<dyn JsonFetcher>,
    timeout: Duration,
}

impl KeySetFetcher {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Fetch the key set at `url` for `issuer`.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::FetchFailed` if the endpoint cannot be reached in
    /// time and `ResolveError::NoKeysFound` if it answers with anything but a
    /// JSON document carrying a `keys` array.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_key_set(
        &self,
        issuer: &str,
        url: &Url,
    ) -> Result<Vec<PublishedKey>, ResolveError> {
        let no_keys = || ResolveError::NoKeysFound {
            issuer: issuer.to_string(),
            url: url.to_string(),
        };

        let body = fetch_bounded(self.fetcher.as_ref(), url, self.timeout, FetchKind::KeySet)
            .await
            .map_err(|e| {
                if e.is_transport() {
                    ResolveError::FetchFailed {
                        url: url.to_string(),
                        source: e,
                    }
                } else {
                    no_keys()
                }
            })?;

        let Some(Value::Array(entries)) = body.get("keys") else {
            tracing::warn!(target: "keyres.key_set", issuer = %issuer, url = %url, "Key set has no keys array");
            return Err(no_keys());
        };

        Ok(entries
            .iter()
            .cloned()
            .map(PublishedKey::from_value)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockFetcher;
    use crate::fetch::FetchError;
    use serde_json::json;

    const CERTS: &str = "https://issuer.example/certs";
    const ISSUER: &str = "https://issuer.example";

    fn ed25519_key(kid: &str) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo",
            "kid": kid,
            "alg": "EdDSA",
            "use": "sig"
        })
    }

    fn key_set_fetcher(mock: MockFetcher) -> KeySetFetcher {
        KeySetFetcher::new(Arc::new(mock), Duration::from_secs(15))
    }

    #[test]
    fn test_published_key_fields() {
        let key = PublishedKey::from_value(ed25519_key("k1"));

        assert_eq!(key.kid(), Some("k1"));
        assert_eq!(key.alg(), Some("EdDSA"));
        assert!(key.is_signing_key());
        assert_eq!(
            key.key_ref(ISSUER).unwrap(),
            KeyRef::new(ISSUER, "k1", "EdDSA")
        );
    }

    #[test]
    fn test_import_valid_key() {
        let key = PublishedKey::from_value(ed25519_key("k1"));
        let imported = key.import().unwrap();
        assert_eq!(imported.origin(), KeyOrigin::KeySet);
    }

    #[test]
    fn test_key_ref_requires_kid_and_alg() {
        let mut material = ed25519_key("k1");
        material.as_object_mut().unwrap().remove("alg");
        let key = PublishedKey::from_value(material);
        assert_eq!(key.key_ref(ISSUER), Err(KeyImportError::MissingAlg));

        let mut material = ed25519_key("k1");
        material.as_object_mut().unwrap().remove("kid");
        let key = PublishedKey::from_value(material);
        assert_eq!(key.key_ref(ISSUER), Err(KeyImportError::MissingKid));
    }

    #[test]
    fn test_key_use_marks_signing_keys() {
        let mut material = ed25519_key("k1");
        material["use"] = json!("enc");
        assert!(!PublishedKey::from_value(material).is_signing_key());

        let mut material = ed25519_key("k1");
        material.as_object_mut().unwrap().remove("use");
        assert!(PublishedKey::from_value(material).is_signing_key());
    }

    #[test]
    fn test_symmetric_key_not_imported() {
        let key = PublishedKey::from_value(json!({
            "kty": "oct",
            "k": "c2hoaGho",
            "kid": "hmac",
            "alg": "HS256"
        }));
        assert_eq!(key.import().unwrap_err(), KeyImportError::SymmetricKey);
    }

    #[test]
    fn test_malformed_keys_not_imported() {
        // RSA key without modulus.
        let key = PublishedKey::from_value(json!({
            "kty": "RSA",
            "e": "AQAB",
            "kid": "k2",
            "alg": "RS256"
        }));
        assert!(matches!(key.import(), Err(KeyImportError::InvalidJwk(_))));

        // Unknown algorithm.
        let mut material = ed25519_key("k3");
        material["alg"] = json!("XS999");
        let key = PublishedKey::from_value(material);
        assert!(matches!(key.import(), Err(KeyImportError::InvalidJwk(_))));

        // Not a JWK at all.
        let key = PublishedKey::from_value(json!("just a string"));
        assert_eq!(key.kid(), None);
        assert!(matches!(key.import(), Err(KeyImportError::InvalidJwk(_))));
    }

    #[tokio::test]
    async fn test_fetch_key_set_success() {
        let mock = MockFetcher::new().with_json(
            CERTS,
            json!({"keys": [ed25519_key("k1"), ed25519_key("k2")]}),
        );
        let fetcher = key_set_fetcher(mock);
        let url = Url::parse(CERTS).unwrap();

        let keys = fetcher.fetch_key_set(ISSUER, &url).await.unwrap();

        let kids: Vec<_> = keys.iter().filter_map(PublishedKey::kid).collect();
        assert_eq!(kids, vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn test_fetch_key_set_empty_list() {
        let mock = MockFetcher::new().with_json(CERTS, json!({"keys": []}));
        let fetcher = key_set_fetcher(mock);
        let url = Url::parse(CERTS).unwrap();

        assert!(fetcher.fetch_key_set(ISSUER, &url).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_key_set_without_keys_array() {
        for body in [json!({}), json!({"keys": {}}), json!([1, 2]), json!(null)] {
            let mock = MockFetcher::new().with_json(CERTS, body);
            let fetcher = key_set_fetcher(mock);
            let url = Url::parse(CERTS).unwrap();

            let err = fetcher.fetch_key_set(ISSUER, &url).await.unwrap_err();
            assert!(matches!(err, ResolveError::NoKeysFound { .. }), "got {err:?}");
        }
    }

    #[tokio::test]
    async fn test_fetch_key_set_error_status_is_no_keys() {
        let mock = MockFetcher::new().with_error(CERTS, FetchError::Status(500));
        let fetcher = key_set_fetcher(mock);
        let url = Url::parse(CERTS).unwrap();

        let err = fetcher.fetch_key_set(ISSUER, &url).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "no keys found: issuer=https://issuer.example url=https://issuer.example/certs"
        );
    }

    #[tokio::test]
    async fn test_fetch_key_set_transport_error_is_fetch_failed() {
        let mock = MockFetcher::new().with_error(
            CERTS,
            FetchError::Transport("connection refused".to_string()),
        );
        let fetcher = key_set_fetcher(mock);
        let url = Url::parse(CERTS).unwrap();

        let err = fetcher.fetch_key_set(ISSUER, &url).await.unwrap_err();
        assert!(matches!(err, ResolveError::FetchFailed { ref url, .. } if url == CERTS));
    }
}
