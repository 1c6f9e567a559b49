//! Gateway handlers.

use crate::claims::Claims;
use axum::{Extension, Json};

/// Liveness check.
///
/// Returns "OK" whenever the process is serving requests.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Echo the verified claims of the caller.
pub async fn whoami(Extension(claims): Extension<Claims>) -> Json<Claims> {
    tracing::debug!(target: "jwt_auth.handlers", claims = ?claims, "Serving verified claims");
    Json(claims)
}
