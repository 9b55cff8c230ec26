//! Fault-absorbing result cache used by the query service

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::cache::{Cache, CacheExt, CacheKeyGenerator, CacheKeyParams, DigestKeyGenerator};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_cache_error, record_cache_request};

/// Configuration for result caching
#[derive(Debug, Clone)]
pub struct ResultCacheConfig {
    /// TTL for search and get-by-id results
    pub result_ttl: Duration,
    /// TTL for the category listing
    pub categories_ttl: Duration,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            result_ttl: Duration::from_secs(60),
            categories_ttl: Duration::from_secs(600),
            enabled: true,
        }
    }
}

impl ResultCacheConfig {
    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    pub fn with_categories_ttl(mut self, ttl: Duration) -> Self {
        self.categories_ttl = ttl;
        self
    }

    /// Disables caching
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub backend: String,
    /// Entry count; absent when the backend could not be reached
    pub entries: Option<usize>,
}

/// Result cache that never fails
///
/// Backend errors and undecodable entries are logged, counted and reported as a miss (reads)
/// or as "nothing happened" (writes). Disabling the cache turns every operation into a no-op.
#[derive(Debug)]
pub struct ResultCache {
    cache: Arc<dyn Cache>,
    config: ResultCacheConfig,
    key_generator: DigestKeyGenerator,
}

impl ResultCache {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self::with_config(cache, ResultCacheConfig::default())
    }

    pub fn with_config(cache: Arc<dyn Cache>, config: ResultCacheConfig) -> Self {
        Self {
            cache,
            config,
            key_generator: DigestKeyGenerator::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn result_ttl(&self) -> Duration {
        self.config.result_ttl
    }

    pub fn categories_ttl(&self) -> Duration {
        self.config.categories_ttl
    }

    /// Derives the `{prefix}:{digest}` key for a parameter set
    pub fn key(&self, prefix: &str, params: &CacheKeyParams) -> String {
        self.key_generator.generate_with_namespace(prefix, params)
    }

    /// Gets a cached value; any failure is a miss
    pub async fn get<V>(&self, key: &str) -> Option<V>
    where
        V: DeserializeOwned + Send,
    {
        if !self.config.enabled {
            return None;
        }

        let kind = key_kind(key);

        match self.cache.get::<V>(key).await {
            Ok(Some(value)) => {
                debug!(key = %key, "Cache hit");
                record_cache_request(kind, true);
                Some(value)
            }
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                record_cache_request(kind, false);
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                record_cache_error("get");
                record_cache_request(kind, false);
                None
            }
        }
    }

    /// Stores a value; failures are logged and dropped
    pub async fn set<V>(&self, key: &str, value: &V, ttl: Duration)
    where
        V: Serialize + Send + Sync,
    {
        if !self.config.enabled {
            return;
        }

        if let Err(e) = self.cache.set(key, value, ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
            record_cache_error("set");
        }
    }

    /// Removes a single key, returning whether a value was removed
    pub async fn delete(&self, key: &str) -> bool {
        if !self.config.enabled {
            return false;
        }

        match self.cache.delete(key).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache delete failed");
                record_cache_error("delete");
                false
            }
        }
    }

    /// Removes every entry derived under `prefix`, returning how many were removed
    pub async fn clear_prefix(&self, prefix: &str) -> usize {
        if !self.config.enabled {
            return 0;
        }

        let pattern = format!("{}:", prefix);

        match self.cache.delete_prefix(&pattern).await {
            Ok(removed) => {
                debug!(prefix = %prefix, removed, "Cleared cache prefix");
                removed
            }
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "Cache prefix clear failed");
                record_cache_error("clear_prefix");
                0
            }
        }
    }

    /// Backend round-trip; unlike the other operations this reports the failure
    pub async fn ping(&self) -> Result<(), DomainError> {
        self.cache.ping().await
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = match self.cache.size().await {
            Ok(size) => Some(size),
            Err(e) => {
                warn!(error = %e, "Cache size lookup failed");
                record_cache_error("size");
                None
            }
        };

        CacheStats {
            enabled: self.config.enabled,
            backend: self.cache.backend_name().to_string(),
            entries,
        }
    }
}

fn key_kind(key: &str) -> &str {
    key.split_once(':').map(|(kind, _)| kind).unwrap_or(key)
}
