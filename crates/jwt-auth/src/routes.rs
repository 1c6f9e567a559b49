//! HTTP routes for the gateway.

use crate::handlers;
use crate::middleware::{require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the application routes.
///
/// - `/health` is public
/// - `/` requires a valid bearer token and echoes its claims
pub fn build_routes(auth_state: Arc<AuthState>) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let protected_routes = Router::new()
        .route("/", get(handlers::whoami))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}
