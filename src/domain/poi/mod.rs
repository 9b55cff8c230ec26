//! POI domain - entities and the store abstraction

mod entity;
mod repository;

pub use entity::{
    BoundsQuery, CategoryCount, Metadata, NewPoi, Poi, PoiChanges, PoiId, PoiStats, PoiSummary,
    PoiWithDistance, RadiusQuery, MAX_CATEGORY_LENGTH, MAX_NAME_LENGTH,
};
pub use repository::PoiRepository;

#[cfg(test)]
pub use repository::MockPoiRepository;
