//! GeoSearch API
//!
//! Location search over points of interest with:
//! - Radius and bounding-box queries backed by PostgreSQL + PostGIS
//! - A shared result cache (in-memory or Redis) invalidated on every write
//! - Live change notifications over WebSocket

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use api::state::AppState;
use domain::cache::Cache;
use domain::events::ChangeNotifier;
use domain::poi::PoiRepository;
use infrastructure::{
    cache::{CacheConfig, CacheFactory},
    events::{NotifierConfig, NotifierFactory, NotifierType},
    services::{PoiService, PoiServiceConfig, ResultCache, ResultCacheConfig},
    storage::{PostgresConfig, StorageConfig, StorageFactory, StorageType},
};

/// Creates the application state from the default configuration sources
pub async fn create_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::load().unwrap_or_default();
    create_app_state_with_config(&config).await
}

/// Creates the application state with the given configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let repository = create_store(config).await?;
    let cache = create_cache(config).await?;
    let notifier = create_notifier(config).await?;

    let result_cache_config = ResultCacheConfig::default()
        .with_result_ttl(config.cache.ttl())
        .with_categories_ttl(config.cache.categories_ttl());
    let result_cache_config = if config.cache.enabled {
        result_cache_config
    } else {
        info!("Result cache disabled");
        result_cache_config.disabled()
    };

    let service_config = PoiServiceConfig::default()
        .with_geohash_precision(config.geo.geohash_precision)
        .with_radius_limits(config.geo.min_radius_m, config.geo.max_radius_m)
        .with_event_channel(config.events.channel.clone());

    let service = PoiService::with_config(
        repository,
        ResultCache::with_config(cache, result_cache_config),
        notifier.clone(),
        service_config,
    );

    Ok(AppState::new(
        Arc::new(service),
        notifier,
        config.geo.default_radius_m,
    ))
}

async fn create_store(config: &AppConfig) -> anyhow::Result<Arc<dyn PoiRepository>> {
    let store_type = StorageType::parse(&config.store.backend)
        .with_context(|| format!("Unknown store backend: {}", config.store.backend))?;

    let storage_config = match store_type {
        StorageType::InMemory => StorageConfig::in_memory(),
        StorageType::Postgres => {
            let url = config
                .store
                .url
                .clone()
                .context("store.url (or DATABASE_URL) is required for the postgres backend")?;

            let postgres = PostgresConfig::new(url)
                .with_max_connections(config.store.max_connections)
                .with_min_connections(config.store.min_connections)
                .with_acquire_timeout(config.store.acquire_timeout_secs)
                .with_idle_timeout(config.store.idle_timeout_secs);

            StorageConfig::postgres(postgres, config.store.run_migrations)
        }
    };

    info!("Store backend: {:?}", storage_config.storage_type());
    let repository = StorageFactory::create(&storage_config).await?;
    Ok(repository)
}

async fn create_cache(config: &AppConfig) -> anyhow::Result<Arc<dyn Cache>> {
    let cache_config = CacheConfig::from_settings(&config.cache)?;

    info!("Cache backend: {}", cache_config.cache_type);
    let cache = CacheFactory::new().create(&cache_config).await?;
    Ok(cache)
}

async fn create_notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn ChangeNotifier>> {
    let notifier_type: NotifierType = config.events.backend.parse()?;

    let notifier_config = NotifierConfig {
        notifier_type: notifier_type.clone(),
        redis_url: config.events.redis_url.clone(),
        capacity: config.events.capacity,
        ..Default::default()
    };

    info!("Events backend: {}", notifier_type);
    let notifier = NotifierFactory::create(&notifier_config).await?;
    Ok(notifier)
}
