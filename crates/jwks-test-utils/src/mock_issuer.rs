//! Mock OpenID issuer for integration tests
//!
//! Wraps a `wiremock::MockServer` whose URI is the issuer identifier, so the
//! discovery document lives at `<issuer>/.well-known/openid-configuration`.

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the discovery document.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Default path of the key set.
pub const JWKS_PATH: &str = "/certs";

/// Mock issuer serving discovery and key set documents.
///
/// # Example
/// ```rust,ignore
/// let issuer = MockIssuer::start().await;
/// issuer.mount_discovery().await;
/// issuer.mount_jwks(&[keypair.jwk()]).await;
///
/// assert_eq!(issuer.request_count(JWKS_PATH).await, 0);
/// ```
pub struct MockIssuer {
    server: MockServer,
}

impl MockIssuer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// The issuer identifier (the server's base URI, no trailing slash).
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.server.uri(), DISCOVERY_PATH)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serve a discovery document naming this issuer and its key set.
    pub async fn mount_discovery(&self) {
        self.mount_discovery_document(json!({
            "issuer": self.issuer(),
            "jwks_uri": self.jwks_url(),
        }))
        .await;
    }

    /// Serve an arbitrary discovery document.
    pub async fn mount_discovery_document(&self, document: Value) {
        self.mount_json(DISCOVERY_PATH, 200, document).await;
    }

    /// Serve a key set with `keys` at [`JWKS_PATH`].
    pub async fn mount_jwks(&self, keys: &[Value]) {
        self.mount_json(JWKS_PATH, 200, json!({ "keys": keys })).await;
    }

    /// Answer `path` with `status` and a JSON body.
    pub async fn mount_json(&self, route: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer `path` with a delayed key set.
    pub async fn mount_slow_json(&self, route: &str, body: Value, delay: std::time::Duration) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(body)
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Number of requests received for `route`.
    pub async fn request_count(&self, route: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == route)
            .count()
    }
}
