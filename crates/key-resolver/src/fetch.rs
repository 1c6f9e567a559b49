//! Bounded JSON fetching.
//!
//! Discovery documents and key sets are both small JSON documents served by
//! endpoints the resolver does not control. [`JsonFetcher`] is the seam the
//! resolver fetches through; [`HttpFetcher`] is the production implementation
//! and [`mock::MockFetcher`] serves canned documents in tests.
//!
//! Every fetch made by the resolver is wrapped in its own timeout, regardless
//! of what the fetcher implementation does.

use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Largest response body accepted from an issuer endpoint.
pub const MAX_RESPONSE_BYTES: usize = 256 * 1024;

/// Why a document could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("unexpected content type {}", .0.as_deref().unwrap_or("<none>"))]
    ContentType(Option<String>),

    #[error("response body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("invalid JSON body: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether the endpoint could not be reached at all (as opposed to
    /// answering with something unusable).
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Timeout(_) | FetchError::Transport(_))
    }
}

/// Which document a fetch is for. Used for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Discovery,
    KeySet,
}

impl FetchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchKind::Discovery => "discovery",
            FetchKind::KeySet => "key_set",
        }
    }
}

/// Fetches a JSON document.
///
/// Implementations should fail with [`FetchError::Status`] on non-2xx
/// responses and [`FetchError::ContentType`] when the body is not JSON.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn fetch_json(&self, url: &Url) -> Result<Value, FetchError>;
}

/// Parse an absolute `http` or `https` URL.
pub fn parse_http_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|_| FetchError::InvalidUrl(raw.to_string()))?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(FetchError::InvalidUrl(raw.to_string())),
    }
}

/// `application/json` or any `application/*+json` media type.
fn is_json_content_type(value: &str) -> bool {
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// [`JsonFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "keyres.fetch", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { client, timeout }
    }
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
    async fn fetch_json(&self, url: &Url) -> Result<Value, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match content_type.as_deref() {
            Some(value) if is_json_content_type(value) => {}
            _ => return Err(FetchError::ContentType(content_type)),
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_RESPONSE_BYTES as u64)
        {
            return Err(FetchError::BodyTooLarge(MAX_RESPONSE_BYTES));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Transport(e.to_string())
            }
        })? {
            if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(FetchError::BodyTooLarge(MAX_RESPONSE_BYTES));
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Fetch through `fetcher`, bounded by `timeout`, recording metrics.
pub(crate) async fn fetch_bounded(
    fetcher: &dyn JsonFetcher,
    url: &Url,
    timeout: Duration,
    kind: FetchKind,
) -> Result<Value, FetchError> {
    let start = Instant::now();

    let result = match tokio::time::timeout(timeout, fetcher.fetch_json(url)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    };

    metrics::record_fetch(kind.as_str(), result.is_ok(), start.elapsed());

    if let Err(e) = &result {
        tracing::warn!(
            target: "keyres.fetch",
            kind = kind.as_str(),
            url = %url,
            error = %e,
            "Fetch failed"
        );
    }

    result
}

/// In-memory [`JsonFetcher`] for tests.
pub mod mock {
    use super::{FetchError, JsonFetcher, Url};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    /// Serves canned responses by URL and counts calls.
    ///
    /// URLs without a configured response fail with `Status(404)`.
    #[derive(Debug, Default)]
    pub struct MockFetcher {
        responses: Mutex<HashMap<String, Result<Value, FetchError>>>,
        calls: Mutex<HashMap<String, usize>>,
        delay: Mutex<Option<Duration>>,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `body` for `url`.
        pub fn with_json(self, url: &str, body: Value) -> Self {
            self.set_json(url, body);
            self
        }

        /// Fail every fetch of `url` with `error`.
        pub fn with_error(self, url: &str, error: FetchError) -> Self {
            self.set_error(url, error);
            self
        }

        /// Sleep before answering each fetch.
        pub fn with_delay(self, delay: Duration) -> Self {
            *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
            self
        }

        /// Replace the response for `url`.
        pub fn set_json(&self, url: &str, body: Value) {
            self.responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(url.to_string(), Ok(body));
        }

        /// Replace the response for `url` with a failure.
        pub fn set_error(&self, url: &str, error: FetchError) {
            self.responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(url.to_string(), Err(error));
        }

        /// Number of fetches of `url`.
        pub fn call_count(&self, url: &str) -> usize {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(url)
                .copied()
                .unwrap_or(0)
        }

        /// Number of fetches across all URLs.
        pub fn total_calls(&self) -> usize {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .sum()
        }
    }

    #[async_trait]
    impl JsonFetcher for MockFetcher {
        async fn fetch_json(&self, url: &Url) -> Result<Value, FetchError> {
            *self
                .calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(url.to_string())
                .or_insert(0) += 1;

            let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(url.as_str())
                .cloned()
                .unwrap_or(Err(FetchError::Status(404)))
        }
    }
}
