//! Storage factory for runtime store selection

use std::sync::Arc;

use crate::domain::poi::PoiRepository;
use crate::domain::DomainError;

use super::in_memory::InMemoryPoiRepository;
use super::migrations::run_migrations;
use super::postgres::{PostgresConfig, PostgresPoiRepository};

/// Supported storage types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// PostgreSQL + PostGIS storage
    Postgres,
}

impl StorageType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    InMemory,
    Postgres {
        config: PostgresConfig,
        /// Apply pending schema migrations after connecting
        run_migrations: bool,
    },
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn postgres(config: PostgresConfig, run_migrations: bool) -> Self {
        Self::Postgres {
            config,
            run_migrations,
        }
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres { .. } => StorageType::Postgres,
        }
    }
}

/// Factory for creating POI stores
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates a POI store based on the configuration
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn PoiRepository>, DomainError> {
        match config {
            StorageConfig::InMemory => Ok(Arc::new(InMemoryPoiRepository::new())),
            StorageConfig::Postgres {
                config,
                run_migrations: migrate,
            } => {
                let pool = config.connect().await?;

                if *migrate {
                    run_migrations(&pool).await?;
                }

                Ok(Arc::new(PostgresPoiRepository::new(pool)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_parse() {
        assert_eq!(StorageType::parse("memory"), Some(StorageType::InMemory));
        assert_eq!(StorageType::parse("in_memory"), Some(StorageType::InMemory));
        assert_eq!(StorageType::parse("postgres"), Some(StorageType::Postgres));
        assert_eq!(StorageType::parse("PG"), Some(StorageType::Postgres));
        assert_eq!(StorageType::parse("sqlite"), None);
    }

    #[test]
    fn test_storage_config_types() {
        assert_eq!(
            StorageConfig::in_memory().storage_type(),
            StorageType::InMemory
        );

        let postgres = StorageConfig::postgres(PostgresConfig::new("postgres://localhost/test"), true);
        assert_eq!(postgres.storage_type(), StorageType::Postgres);
    }

    #[tokio::test]
    async fn test_create_in_memory() {
        let store = StorageFactory::create(&StorageConfig::in_memory())
            .await
            .unwrap();

        assert!(store.ping().await.is_ok());
        assert!(store.category_counts().await.unwrap().is_empty());
    }
}
