//! Storage infrastructure - POI store implementations

mod factory;
mod in_memory;
pub mod migrations;
mod postgres;

pub use factory::{StorageConfig, StorageFactory, StorageType};
pub use in_memory::InMemoryPoiRepository;
pub use migrations::{poi_migrations, revert_latest, run_migrations, Migration, PostgresMigrator};
pub use postgres::{PostgresConfig, PostgresPoiRepository};
