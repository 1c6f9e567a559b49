//! Issuer metadata discovery.
//!
//! An issuer's key-set endpoint is read from its OpenID discovery document at
//! `<issuer>/.well-known/openid-configuration`. The document must name the
//! same issuer it was fetched for; otherwise a misconfigured or hostile
//! document could point key resolution somewhere else.

use crate::errors::DiscoveryError;
use crate::fetch::{fetch_bounded, parse_http_url, FetchError, FetchKind, JsonFetcher};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Path of the discovery document relative to the issuer.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// The discovery document fields used here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryDocument {
    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default)]
    pub jwks_uri: Option<String>,
}

/// Discovery document URL for `issuer`.
pub fn discovery_url(issuer: &str) -> Result<Url, FetchError> {
    parse_http_url(&format!("{}{}", issuer.trim_end_matches('/'), DISCOVERY_PATH))
}

/// Resolves issuers to their key-set endpoints.
pub struct MetadataResolver {
    fetcher: Arc<dyn JsonFetcher>,
    timeout: Duration,
}

impl MetadataResolver {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Fetch `issuer`'s discovery document and return its `jwks_uri`.
    ///
    /// # Errors
    ///
    /// - `FetchFailed` if the document cannot be fetched or decoded
    /// - `IssuerMismatch` if the document names another issuer, or none
    /// - `MissingKeysUri` / `InvalidKeysUri` if `jwks_uri` is absent or not http(s)
    #[instrument(skip(self))]
    pub async fn resolve_endpoint(&self, issuer: &str) -> Result<Url, DiscoveryError> {
        let url = discovery_url(issuer).map_err(|source| DiscoveryError::FetchFailed {
            url: format!("{}{}", issuer, DISCOVERY_PATH),
            source,
        })?;

        let body = fetch_bounded(self.fetcher.as_ref(), &url, self.timeout, FetchKind::Discovery)
            .await
            .map_err(|source| DiscoveryError::FetchFailed {
                url: url.to_string(),
                source,
            })?;

        let document: DiscoveryDocument =
            serde_json::from_value(body).map_err(|e| DiscoveryError::FetchFailed {
                url: url.to_string(),
                source: FetchError::Decode(e.to_string()),
            })?;

        if document.issuer.as_deref() != Some(issuer) {
            tracing::warn!(
                target: "keyres.discovery",
                expected = %issuer,
                actual = ?document.issuer,
                "Discovery document names a different issuer"
            );
            return Err(DiscoveryError::IssuerMismatch {
                expected: issuer.to_string(),
                actual: document.issuer,
            });
        }

        let raw = document
            .jwks_uri
            .ok_or_else(|| DiscoveryError::MissingKeysUri {
                issuer: issuer.to_string(),
            })?;

        let endpoint = parse_http_url(&raw).map_err(|_| DiscoveryError::InvalidKeysUri {
            issuer: issuer.to_string(),
            uri: raw.clone(),
        })?;

        tracing::debug!(target: "keyres.discovery", issuer = %issuer, jwks_uri = %endpoint, "Discovered key set endpoint");

        Ok(endpoint)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockFetcher;
    use serde_json::json;

    const ISSUER: &str = "https://issuer.example";
    const DISCOVERY: &str = "https://issuer.example/.well-known/openid-configuration";

    fn resolver(mock: MockFetcher) -> MetadataResolver {
        MetadataResolver::new(Arc::new(mock), Duration::from_secs(15))
    }

    #[test]
    fn test_discovery_url() {
        assert_eq!(discovery_url(ISSUER).unwrap().as_str(), DISCOVERY);
        assert_eq!(discovery_url("https://issuer.example/").unwrap().as_str(), DISCOVERY);
        assert_eq!(
            discovery_url("https://login.example/tenant-a").unwrap().as_str(),
            "https://login.example/tenant-a/.well-known/openid-configuration"
        );
        assert!(discovery_url("issuer-without-scheme").is_err());
    }

    #[tokio::test]
    async fn test_resolve_endpoint() {
        let mock = MockFetcher::new().with_json(
            DISCOVERY,
            json!({
                "issuer": ISSUER,
                "jwks_uri": "https://issuer.example/certs",
                "authorization_endpoint": "https://issuer.example/authorize"
            }),
        );

        let endpoint = resolver(mock).resolve_endpoint(ISSUER).await.unwrap();
        assert_eq!(endpoint.as_str(), "https://issuer.example/certs");
    }

    #[tokio::test]
    async fn test_issuer_mismatch() {
        let mock = MockFetcher::new().with_json(
            DISCOVERY,
            json!({"issuer": "http://foo", "jwks_uri": "https://evil.example/certs"}),
        );

        let err = resolver(mock).resolve_endpoint(ISSUER).await.unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::IssuerMismatch { ref actual, .. } if actual.as_deref() == Some("http://foo")
        ));
    }

    #[tokio::test]
    async fn test_issuer_must_match_exactly() {
        // Trailing slash differs from the trusted string.
        let mock = MockFetcher::new().with_json(
            DISCOVERY,
            json!({"issuer": "https://issuer.example/", "jwks_uri": "https://issuer.example/certs"}),
        );

        let err = resolver(mock).resolve_endpoint(ISSUER).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::IssuerMismatch { .. }));
    }

    #[tokio::test]
    async fn test_missing_issuer_is_mismatch() {
        let mock = MockFetcher::new()
            .with_json(DISCOVERY, json!({"jwks_uri": "https://issuer.example/certs"}));

        let err = resolver(mock).resolve_endpoint(ISSUER).await.unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::IssuerMismatch { actual: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_jwks_uri() {
        let mock = MockFetcher::new().with_json(DISCOVERY, json!({"issuer": ISSUER}));

        let err = resolver(mock).resolve_endpoint(ISSUER).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingKeysUri { .. }));
    }

    #[tokio::test]
    async fn test_invalid_jwks_uri() {
        let mock = MockFetcher::new().with_json(
            DISCOVERY,
            json!({"issuer": ISSUER, "jwks_uri": "javascript:alert(1)"}),
        );

        let err = resolver(mock).resolve_endpoint(ISSUER).await.unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::InvalidKeysUri { ref uri, .. } if uri == "javascript:alert(1)"
        ));
    }

    #[tokio::test]
    async fn test_document_of_wrong_shape() {
        let mock = MockFetcher::new().with_json(DISCOVERY, json!({"issuer": 42}));

        let err = resolver(mock).resolve_endpoint(ISSUER).await.unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::FetchFailed {
                source: FetchError::Decode(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let mock = MockFetcher::new();

        let err = resolver(mock).resolve_endpoint(ISSUER).await.unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::FetchFailed { ref url, source: FetchError::Status(404) } if url == DISCOVERY
        ));
    }
}
