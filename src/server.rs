//! HTTP server initialization and runtime setup.
//!
//! Selects storage, cache and counter backends from configuration, spawns
//! the background workers and runs the Axum server until a shutdown signal.

use crate::config::{Config, CounterBackend, StorageBackend};
use crate::domain::click_worker::run_click_worker;
use crate::domain::repositories::{CounterStore, LinkRepository};
use crate::infrastructure::cache::{CacheService, LocalCache, NullCache, RedisCache, TieredCache};
use crate::infrastructure::persistence::{MemoryLinkRepository, PgLinkRepository};
use crate::infrastructure::rate_limit::{MemoryCounterStore, RedisCounterStore};
use crate::routes::app_router;
use crate::state::{AppState, Backends};
use crate::utils::clock::{SharedClock, SystemClock};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const CLICK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Link storage (PostgreSQL with migrations, or in-memory)
/// - Cache tiers (local, plus Redis when configured)
/// - Rate-limit counter store and its sweeper
/// - Background click worker
/// - Axum HTTP server with graceful shutdown
///
/// Clicks still queued at shutdown get a few seconds to drain.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - The Redis counter store is selected but unreachable
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let clock: SharedClock = Arc::new(SystemClock);

    let repository = build_repository(&config, clock.clone()).await?;
    let cache = Arc::new(build_cache(&config, clock.clone()).await);
    tracing::info!(tiers = ?cache.tier_names(), "Cache tiers ready");

    let counter_store = build_counter_store(&config, clock.clone()).await?;
    tracing::info!(backend = counter_store.backend(), "Rate limit counters ready");

    let (click_tx, click_rx) = mpsc::channel(config.click_queue_capacity);
    let click_worker = tokio::spawn(run_click_worker(click_rx, repository.clone()));
    tracing::info!("Click worker started");

    let state = AppState::new(
        &config,
        Backends {
            repository,
            cache,
            counter_store,
            clock,
            click_tx,
        },
    )?;

    let app = app_router(state, config.rate_limit_redirects);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if tokio::time::timeout(CLICK_DRAIN_TIMEOUT, click_worker)
        .await
        .is_err()
    {
        tracing::warn!("Click worker did not drain in time, pending clicks dropped");
    }

    Ok(())
}

async fn build_repository(config: &Config, clock: SharedClock) -> Result<Arc<dyn LinkRepository>> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for postgres storage")?;

            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
                .connect(url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to migrate")?;

            Ok(Arc::new(PgLinkRepository::new(Arc::new(pool))))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, links are lost on restart");
            Ok(Arc::new(MemoryLinkRepository::new(clock)))
        }
    }
}

async fn build_cache(config: &Config, clock: SharedClock) -> TieredCache {
    let local: Arc<dyn CacheService> = Arc::new(LocalCache::new(
        config.cache_max_size,
        config.cache_ttl(),
        config.cache_eviction,
        clock.clone(),
    ));
    let mut tiers = vec![local];

    if let Some(redis_url) = &config.redis_url {
        match RedisCache::connect(redis_url, config.redis_cache_ttl()).await {
            Ok(redis) => {
                tracing::info!("Shared cache enabled (Redis)");
                tiers.push(Arc::new(redis));
            }
            Err(e) => {
                tracing::warn!("Failed to connect to Redis: {}. Using NullCache.", e);
                tiers.push(Arc::new(NullCache::new()));
            }
        }
    }

    TieredCache::new(tiers, clock)
}

async fn build_counter_store(config: &Config, clock: SharedClock) -> Result<Arc<dyn CounterStore>> {
    match config.rate_limit_backend {
        CounterBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .context("REDIS_URL is required for the redis rate limit backend")?;
            let store = RedisCounterStore::connect(url, config.counter_store_timeout())
                .await
                .context("Failed to connect rate limit store")?;
            Ok(Arc::new(store))
        }
        CounterBackend::Memory => {
            let store = Arc::new(MemoryCounterStore::new(config.rate_limit_max_keys, clock));
            store
                .clone()
                .spawn_sweeper(Duration::from_secs(config.rate_limit_sweep_secs));
            Ok(store)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
