//! Page Cache - counted, TTL-cached page fetching service
//!
//! Serves pages through an access counter and an expiring cache backed by
//! an in-memory or Redis store.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use page_cache::api::{create_router, AppState};
use page_cache::store::open_store;
use page_cache::{spawn_cleanup_task, Config, HttpFetcher, KeyValueStore};

/// Main entry point for the page cache service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the configured store
/// 4. Start the expiry sweep (memory store only)
/// 5. Compose the counting, caching page fetcher
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "page_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting page cache service");

    let config = Config::from_env();
    info!(
        "Configuration loaded: store={:?}, cache_ttl={}s, port={}, cleanup_interval={}s",
        config.store, config.cache_ttl, config.server_port, config.cleanup_interval
    );

    let (store, memory) = open_store(&config)
        .await
        .context("failed to open key-value store")?;
    info!("Store initialized: {}", store.backend_name());

    let cleanup_handle = memory.map(|memory| spawn_cleanup_task(memory, config.cleanup_interval));

    let origin = HttpFetcher::new(&config.fetch_config()).context("failed to build HTTP client")?;
    let state = AppState::new(origin, store, config.cache_ttl())
        .context("failed to compose page fetcher")?;

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweeper.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Expiry sweep aborted");
    }
}
