//! In-memory cache implementation using moka

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::Cache;
use crate::domain::DomainError;

/// Longest lifetime any entry is given, whatever the configured TTL
pub const MAX_ENTRY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Upper bound on any entry's lifetime; per-entry TTLs above it are cut short
    pub max_ttl: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            max_ttl: Duration::from_secs(3600),
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }
}

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Serialized JSON value
    data: String,
    /// `None` when the deadline is not representable; moka's TTL still bounds the entry
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Process-local cache backed by moka
///
/// Entries carry their own deadline and are checked on every read, so an entry is never
/// served past its TTL even if moka has not evicted it yet.
#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
    max_ttl: Duration,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let max_ttl = config.max_ttl.min(MAX_ENTRY_TTL);
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(max_ttl)
            .build();

        Self { cache, max_ttl }
    }

    /// Keys currently held whose name starts with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DomainError> {
        self.cache.run_pending_tasks().await;

        let cache = self.cache.clone();
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || {
            cache
                .iter()
                .filter(|(k, _)| k.starts_with(prefix.as_str()))
                .map(|(k, _)| k.to_string())
                .collect()
        })
        .await
        .map_err(|e| DomainError::cache(format!("Failed to iterate cache: {}", e)))
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.cache.get(key).await {
            Some(entry) if entry.is_expired() => {
                self.cache.remove(key).await;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data)),
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let entry = CacheEntry {
            data: value.to_string(),
            expires_at: Instant::now().checked_add(ttl.min(self.max_ttl)),
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let removed = self.cache.remove(key).await;
        Ok(removed.is_some_and(|entry| !entry.is_expired()))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, DomainError> {
        let keys = self.keys_with_prefix(prefix).await?;
        let mut deleted = 0;

        for key in keys {
            if self.cache.remove(&key).await.is_some() {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn size(&self) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}
