//! Administrative command handlers.

use crate::cache::{Cache, RedirectCache};
use crate::config::{Config, StorageBackend};
use crate::error::{AppError, AppResult};
use crate::render;
use crate::server::open_repository;
use clap::Subcommand;
use tracing::info;

/// Administrative commands available via CLI.
#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Delete expired links and their access logs
    CleanExpired,

    /// Run database migrations
    Migrate,

    /// Show link statistics
    Stats,

    /// Ping the cache server
    PingCache,
}

/// Run an administrative command with the given configuration.
pub async fn run(config: Config, admin_command: AdminCommands) -> AppResult<()> {
    match admin_command {
        AdminCommands::CleanExpired => clean_expired(config).await,
        AdminCommands::Migrate => migrate(config).await,
        AdminCommands::Stats => stats(config).await,
        AdminCommands::PingCache => ping_cache(config).await,
    }
}

async fn clean_expired(config: Config) -> AppResult<()> {
    info!("Cleaning expired links...");

    let repository = open_repository(&config, false).await?;
    let deleted_count = repository.delete_expired().await?;

    info!("Deleted {} expired link(s)", deleted_count);
    Ok(())
}

async fn migrate(config: Config) -> AppResult<()> {
    if config.storage.backend != StorageBackend::Postgres {
        return Err(AppError::Configuration(
            "migrations require STORAGE_BACKEND=postgres".to_string(),
        ));
    }

    open_repository(&config, true).await?;
    Ok(())
}

async fn stats(config: Config) -> AppResult<()> {
    info!("Fetching statistics...");

    let repository = open_repository(&config, false).await?;
    let stats = repository.stats().await?;

    println!("{}", render::stats(&stats));
    Ok(())
}

async fn ping_cache(config: Config) -> AppResult<()> {
    info!("Pinging cache server...");

    let cache = Cache::new(
        &config.cache.url,
        config.cache.max_connections,
        config.cache.default_ttl_seconds,
    )
    .await?;

    let response = cache.ping().await?;

    info!("Cache server responded: {}", response);
    Ok(())
}
