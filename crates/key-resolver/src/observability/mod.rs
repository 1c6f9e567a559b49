//! Observability for key resolution.
//!
//! Metrics are recorded through the `metrics` facade; installing an exporter is
//! left to the embedding service.

pub mod metrics;
