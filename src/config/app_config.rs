use std::time::Duration;

use serde::Deserialize;

use crate::infrastructure::observability::MetricsConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub cache: CacheSettings,
    pub geo: GeoConfig,
    pub events: EventsConfig,
    pub metrics: MetricsConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty or `*` allows any origin
    pub cors_origins: Vec<String>,
    /// Send `Strict-Transport-Security`; enable only behind TLS
    pub hsts: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// POI store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `postgres` or `in_memory`
    pub backend: String,
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub run_migrations: bool,
}

/// Result cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `in_memory` or `redis`
    pub backend: String,
    pub enabled: bool,
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub ttl_secs: u64,
    pub categories_ttl_secs: u64,
    pub max_capacity: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub geohash_precision: usize,
    pub default_radius_m: f64,
    pub min_radius_m: f64,
    pub max_radius_m: f64,
}

/// Change notification settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// `in_process` or `redis`
    pub backend: String,
    pub redis_url: Option<String>,
    pub channel: String,
    /// Per-channel buffer before slow subscribers start losing events
    pub capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            hsts: false,
        }
    }
}

/// Per-process request rate limiting
///
/// Counters live in this process only; instances behind a load balancer each apply the
/// limit on their own.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests allowed per client within one window
    pub requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: 100,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.max(1))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "in_memory".to_string(),
            url: None,
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 600,
            run_migrations: false,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "in_memory".to_string(),
            enabled: true,
            redis_url: None,
            key_prefix: "geosearch".to_string(),
            ttl_secs: 60,
            categories_ttl_secs: 600,
            max_capacity: 10_000,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn categories_ttl(&self) -> Duration {
        Duration::from_secs(self.categories_ttl_secs)
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            geohash_precision: 5,
            default_radius_m: 1000.0,
            min_radius_m: 50.0,
            max_radius_m: 50_000.0,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            backend: "in_process".to_string(),
            redis_url: None,
            channel: "poi".to_string(),
            capacity: 256,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: Self = config.try_deserialize()?;
        app_config.apply_url_overrides(
            std::env::var("DATABASE_URL").ok(),
            std::env::var("REDIS_URL").ok(),
        );

        Ok(app_config)
    }

    /// `DATABASE_URL` and `REDIS_URL` win over file and `APP__` settings
    pub fn apply_url_overrides(&mut self, database_url: Option<String>, redis_url: Option<String>) {
        if let Some(url) = database_url.filter(|u| !u.is_empty()) {
            self.store.url = Some(url);
        }

        if let Some(url) = redis_url.filter(|u| !u.is_empty()) {
            self.cache.redis_url = Some(url.clone());
            self.events.redis_url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert_eq!(config.cache.categories_ttl(), Duration::from_secs(600));
        assert_eq!(config.geo.geohash_precision, 5);
        assert_eq!(config.events.channel, "poi");
        assert!(config.metrics.enabled);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests, 100);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert!(!config.server.hsts);
    }

    #[test]
    fn test_zero_rate_limit_window_is_clamped() {
        let config: AppConfig =
            serde_json::from_str(r#"{"rate_limit": {"window_secs": 0, "requests": 5}}"#).unwrap();

        assert_eq!(config.rate_limit.window(), Duration::from_secs(1));
        assert_eq!(config.rate_limit.requests, 5);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"cache": {"backend": "redis", "ttl_secs": 5}, "logging": {"format": "json"}}"#,
        )
        .unwrap();

        assert_eq!(config.cache.backend, "redis");
        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.cache.key_prefix, "geosearch");
        assert!(matches!(config.logging.format, LogFormat::Json));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_url_overrides() {
        let mut config = AppConfig::default();
        config.apply_url_overrides(
            Some("postgres://db/geo".to_string()),
            Some("redis://cache:6379".to_string()),
        );

        assert_eq!(config.store.url.as_deref(), Some("postgres://db/geo"));
        assert_eq!(config.cache.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.events.redis_url.as_deref(), Some("redis://cache:6379"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let mut config = AppConfig::default();
        config.store.url = Some("postgres://configured".to_string());
        config.apply_url_overrides(Some(String::new()), None);

        assert_eq!(config.store.url.as_deref(), Some("postgres://configured"));
    }
}
