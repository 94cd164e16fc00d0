//! Server startup, shutdown, and worker spawning logic.
//!
//! `run_server` opens the configured storage backend, optionally runs
//! migrations, connects the cache when enabled, starts the visit worker and
//! serves the router until a shutdown signal arrives.

use crate::cache::{Cache, RedirectCache};
use crate::config::{Config, StorageBackend};
use crate::db::{LinkRepository, MemoryRepository, PgRepository};
use crate::error::{AppError, AppResult};
use crate::jobs::{create_job_channel, Worker};
use crate::routes;
use crate::services::link_service::LinkService;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Open the configured storage backend, running migrations first if asked.
pub async fn open_repository(config: &Config, should_migrate: bool) -> AppResult<Arc<dyn LinkRepository>> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            info!("Connecting to database...");
            let repository = PgRepository::new(
                &config.database.url,
                config.database.max_connections,
                config.database.min_connections,
                config.database.acquire_timeout_seconds,
            )
            .await?;

            if should_migrate {
                info!("Running database migrations...");
                repository.run_migrations().await?;
                info!("Migrations completed successfully");
            }

            Ok(Arc::new(repository))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; links are lost on shutdown");
            Ok(Arc::new(MemoryRepository::new()))
        }
    }
}

/// Connect the Redis cache if enabled. An unreachable cache is logged and skipped.
pub async fn open_cache(config: &Config) -> AppResult<Option<Arc<dyn RedirectCache>>> {
    if !config.cache.enabled {
        return Ok(None);
    }

    info!("Connecting to cache...");
    let cache = Cache::new(
        &config.cache.url,
        config.cache.max_connections,
        config.cache.default_ttl_seconds,
    )
    .await?;

    match cache.ping().await {
        Ok(_) => {
            info!("Cache connection verified");
            Ok(Some(Arc::new(cache)))
        }
        Err(e) => {
            warn!("Cache ping failed: {}. Continuing without cache.", e);
            Ok(None)
        }
    }
}

/// Run the web server with the given configuration.
///
/// # Errors
///
/// Fails if the storage backend cannot be opened, migrations fail, the
/// address cannot be bound or the server stops with an error.
pub async fn run_server(config: Config, addr: String, should_migrate: bool) -> AppResult<()> {
    info!("Starting urlsh server...");

    let repository = open_repository(&config, should_migrate).await?;
    let cache = open_cache(&config).await?;

    // Create background job worker
    let (job_sender, job_receiver) = create_job_channel();
    let worker = Worker::new(repository.clone(), job_receiver);
    let worker_handle = tokio::spawn(worker.run());

    let state = Arc::new(AppState {
        links: LinkService::new(repository, config.shortener.clone()),
        cache,
        job_sender,
        storage_backend: config.storage.backend,
    });

    let app = routes::create_router(state, config.cors.allowed_origins, config.rate_limit)?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    info!("Server listening on {}", addr);
    info!("Base URL: {}", config.shortener.base_url);

    // Peer addresses back the client IP when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    // The router owned the last job sender, so the worker drains and exits
    worker_handle.await.unwrap_or_else(|e| {
        error!("Worker task failed: {:?}", e);
    });

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("Shutdown signal received");
}
