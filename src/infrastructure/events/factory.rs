//! Notifier factory for runtime selection

use std::sync::Arc;

use crate::domain::events::ChangeNotifier;
use crate::domain::DomainError;

use super::broadcast::{BroadcastNotifier, DEFAULT_CHANNEL_CAPACITY};
use super::redis::{RedisNotifier, RedisNotifierConfig, DEFAULT_CHANNEL_PREFIX};

/// Supported notifier backends
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NotifierType {
    /// Subscribers in this process only
    #[default]
    InProcess,
    /// Redis pub/sub, shared across instances
    Redis,
}

impl std::fmt::Display for NotifierType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifierType::InProcess => write!(f, "in_process"),
            NotifierType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for NotifierType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_process" | "inprocess" | "local" | "memory" => Ok(NotifierType::InProcess),
            "redis" => Ok(NotifierType::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown events backend: {}. Valid backends: in_process, redis",
                s
            ))),
        }
    }
}

/// Configuration for notifier factory
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub notifier_type: NotifierType,
    /// Redis URL (required for Redis type)
    pub redis_url: Option<String>,
    pub channel_prefix: String,
    pub capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            notifier_type: NotifierType::InProcess,
            redis_url: None,
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Factory for creating change notifiers
#[derive(Debug, Default)]
pub struct NotifierFactory;

impl NotifierFactory {
    pub async fn create(config: &NotifierConfig) -> Result<Arc<dyn ChangeNotifier>, DomainError> {
        match config.notifier_type {
            NotifierType::InProcess => Ok(Arc::new(BroadcastNotifier::new(config.capacity))),
            NotifierType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("Redis URL is required for the Redis events backend")
                })?;

                let redis_config = RedisNotifierConfig::new(url)
                    .with_channel_prefix(config.channel_prefix.clone())
                    .with_capacity(config.capacity);

                Ok(Arc::new(RedisNotifier::connect(redis_config).await?))
            }
        }
    }
}
