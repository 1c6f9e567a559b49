//! JWT gateway
//!
//! Serves a token-protected echo endpoint backed by issuer-scoped key
//! resolution. Useful for checking an issuer setup end to end.

use anyhow::Context;
use jwt_auth::config::{Config, LogFormat};
use jwt_auth::middleware::AuthState;
use jwt_auth::{routes, JwtValidator, KeySource};
use key_resolver::KeyResolver;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "jwt_auth=debug,key_resolver=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration is loaded before tracing so LOG_FORMAT can pick the layer
    let config = Config::from_env();
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or_default(),
    );

    info!("Starting JWT gateway");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        issuers = config.resolver.issuers.len(),
        prewarm = config.resolver.prewarm,
        leeway_seconds = config.leeway_seconds,
        "Configuration loaded successfully"
    );

    // Pre-warms every dynamic issuer unless JWKS_PREWARM=false
    let resolver = KeyResolver::build(&config.resolver).await.map_err(|e| {
        error!("Failed to initialize key resolver: {}", e);
        e
    })?;

    let validator = JwtValidator::new(
        KeySource::resolver(Arc::new(resolver)),
        config.verify_options(),
    );
    let auth_state = Arc::new(AuthState {
        jwt_validator: Arc::new(validator),
    });

    let app = routes::build_routes(auth_state);

    let bind_address: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address))?;

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind to {bind_address}"))?;

    info!("Gateway listening on {}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Gateway shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
