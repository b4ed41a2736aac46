//! callsync - diagnostics server for the sync core
//!
//! Runs the cache, event bus and change-feed subscriptions against the
//! in-memory backend and exposes them over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use callsync::{create_router, spawn_cleanup_task, AppState, Config, InMemoryBackend};

/// Main entry point for the callsync diagnostics server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build cache, bus and one subscription per watched resource
/// 4. Start the change-feed subscriptions
/// 5. Start background TTL cleanup task
/// 6. Start HTTP server on configured port
/// 7. On SIGINT/SIGTERM stop subscriptions and the cleanup task
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callsync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting callsync diagnostics server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_capacity={}, cache_ttl_ms={}, port={}, watched={:?}",
        config.cache_capacity, config.cache_ttl_ms, config.server_port, config.watched_resources
    );

    let backend = InMemoryBackend::new();
    let state = AppState::from_config(&config, Arc::new(backend.clone()), Arc::new(backend))
        .context("invalid configuration")?;

    state
        .start_watching()
        .context("failed to start change-feed subscriptions")?;
    info!("Watching {} resource(s)", state.watches.len());

    let cleanup_handle = spawn_cleanup_task(
        state.cache.clone(),
        Duration::from_secs(config.cleanup_interval),
    );
    info!("Background cleanup task started");

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.stop_watching().await;
    cleanup_handle.abort();
    info!("Subscriptions stopped, cleanup task aborted");

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
