//! POI store trait

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::domain::error::DomainError;

use super::entity::{
    BoundsQuery, CategoryCount, NewPoi, Poi, PoiChanges, PoiId, PoiStats, PoiWithDistance,
    RadiusQuery,
};

/// Persistent geospatial store for POIs
///
/// Every method is a single round-trip and every mutation is atomic. Errors are always
/// `DomainError::Storage` (or `Validation` for rejected input); absence is reported through
/// `Option`/`bool`, never as an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PoiRepository: Send + Sync {
    /// POIs within `radius_m` of the center, ordered by distance then id ascending
    async fn find_within_radius(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<PoiWithDistance>, DomainError>;

    /// POIs inside the bounding box (inclusive), ordered by id descending
    async fn find_within_bounds(&self, query: &BoundsQuery) -> Result<Vec<Poi>, DomainError>;

    /// Gets a POI by id
    async fn get(&self, id: PoiId) -> Result<Option<Poi>, DomainError>;

    /// Inserts a POI, assigning id and timestamps
    async fn insert(&self, poi: NewPoi) -> Result<Poi, DomainError>;

    /// Inserts many POIs in one transaction, returning how many were written
    async fn insert_many(&self, pois: Vec<NewPoi>) -> Result<usize, DomainError>;

    /// Applies a partial update, returning the new state or `None` if the id is unknown
    async fn update(&self, id: PoiId, changes: PoiChanges) -> Result<Option<Poi>, DomainError>;

    /// Deletes a POI, returning the removed row or `None` if the id is unknown
    async fn delete(&self, id: PoiId) -> Result<Option<Poi>, DomainError>;

    /// Counts per non-null category, highest count first, ties by name
    async fn category_counts(&self) -> Result<Vec<CategoryCount>, DomainError>;

    /// Aggregate statistics
    async fn stats(&self) -> Result<PoiStats, DomainError>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<(), DomainError>;
}
