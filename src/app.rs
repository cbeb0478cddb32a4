//! Application wiring for weathercache
//!
//! Builds the cache store, upstream client and lookup service from a
//! [`Config`]. Every dependency is constructed here and handed to the service;
//! nothing is global.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{CacheStore, DiskStore, RedisStore};
use crate::config::{CacheBackend, Config};
use crate::data::WeatherClient;
use crate::lookup::WeatherService;

/// Wired-up application
#[derive(Debug)]
pub struct App {
    pub config: Config,
    pub service: WeatherService,
}

impl App {
    /// Build the application from configuration
    ///
    /// The cache is optional: an unreachable Redis or a missing cache directory
    /// leaves the service in pass-through mode instead of failing startup.
    pub async fn build(config: Config, no_cache: bool) -> Self {
        let cache = if no_cache {
            info!("Cache disabled by --no-cache");
            None
        } else {
            open_cache(&config).await
        };

        let client = WeatherClient::new(&config.api_url, config.api_key.clone());
        let service = WeatherService::new(Arc::new(client))
            .with_cache_ttl(config.cache_ttl())
            .with_request_timeout(config.request_timeout());

        let service = match (cache, config.cache_backend.name()) {
            (Some(store), _) => service.with_cache(Some(store)),
            (None, Some(backend)) if !no_cache => service.with_unavailable_cache(backend),
            (None, _) => service,
        };

        Self { config, service }
    }
}

/// Open the configured cache backend, or `None` to run without one
pub async fn open_cache(config: &Config) -> Option<Arc<dyn CacheStore>> {
    match config.cache_backend {
        CacheBackend::Redis => RedisStore::connect(&config.redis, config.request_timeout())
            .await
            .map(|store| Arc::new(store) as Arc<dyn CacheStore>),
        CacheBackend::Disk => match DiskStore::new() {
            Some(store) => {
                info!(dir = %store.cache_dir().display(), "Using disk cache");
                Some(Arc::new(store) as Arc<dyn CacheStore>)
            }
            None => {
                warn!("Could not determine a cache directory - running without cache");
                None
            }
        },
        CacheBackend::None => None,
    }
}
