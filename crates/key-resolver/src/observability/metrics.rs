//! Metrics definitions for key resolution.
//!
//! All metrics follow Prometheus naming conventions:
//! - `keyres_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded by code. Issuers and key ids are never used as labels:
//! - `result`: hit, miss, expired, static
//! - `kind`: discovery, key_set
//! - `status`: success, error

use metrics::{counter, histogram};
use std::time::Duration;

/// Outcome of a cache lookup during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
    Expired,
    Static,
}

impl CacheLookup {
    fn as_str(self) -> &'static str {
        match self {
            CacheLookup::Hit => "hit",
            CacheLookup::Miss => "miss",
            CacheLookup::Expired => "expired",
            CacheLookup::Static => "static",
        }
    }
}

/// Record a key cache lookup.
///
/// Metric: `keyres_cache_lookups_total`
/// Labels: `result`
pub fn record_cache_lookup(result: CacheLookup) {
    counter!("keyres_cache_lookups_total", "result" => result.as_str()).increment(1);
}

/// Record an outbound fetch.
///
/// Metric: `keyres_fetches_total`, `keyres_fetch_duration_seconds`
/// Labels: `kind`, `status`
pub fn record_fetch(kind: &'static str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    histogram!("keyres_fetch_duration_seconds", "kind" => kind).record(duration.as_secs_f64());

    counter!("keyres_fetches_total", "kind" => kind, "status" => status).increment(1);
}

/// Record published keys that could not be imported.
///
/// Metric: `keyres_keys_skipped_total`
pub fn record_keys_skipped(count: usize) {
    if count > 0 {
        counter!("keyres_keys_skipped_total").increment(count as u64);
    }
}
