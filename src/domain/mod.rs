//! Domain layer - Core business logic and entities

pub mod cache;
pub mod error;
pub mod events;
pub mod geo;
pub mod poi;

pub use cache::{Cache, CacheExt, CacheKeyGenerator, CacheKeyParams, DigestKeyGenerator};
pub use error::DomainError;
pub use events::{ChangeEvent, ChangeKind, ChangeNotifier, POI_CHANNEL};
pub use geo::{BoundingBox, Coordinates, SpatialPrefilter};
pub use poi::{
    BoundsQuery, CategoryCount, Metadata, NewPoi, Poi, PoiChanges, PoiId, PoiRepository, PoiStats,
    PoiSummary, PoiWithDistance, RadiusQuery,
};
