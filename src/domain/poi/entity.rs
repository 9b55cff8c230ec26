//! Point-of-interest entity and store inputs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::geo::{BoundingBox, Coordinates, SpatialPrefilter};

/// Store-assigned POI identifier
pub type PoiId = i64;

/// Free-form POI metadata
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Maximum length of a POI name
pub const MAX_NAME_LENGTH: u64 = 255;

/// Maximum length of a POI category
pub const MAX_CATEGORY_LENGTH: u64 = 100;

/// A persisted point of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: PoiId,
    pub name: String,
    pub category: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Poi {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lon: self.lon,
        }
    }

    /// List-view projection without metadata or timestamps
    pub fn summary(&self, dist_m: Option<f64>) -> PoiSummary {
        PoiSummary {
            id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            lat: self.lat,
            lon: self.lon,
            dist_m,
        }
    }
}

/// Compact POI representation returned by search operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiSummary {
    pub id: PoiId,
    pub name: String,
    pub category: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// Exact distance in meters from the search center (nearby searches only)
    pub dist_m: Option<f64>,
}

/// A POI together with its exact distance from a query center
#[derive(Debug, Clone, PartialEq)]
pub struct PoiWithDistance {
    pub poi: Poi,
    pub dist_m: f64,
}

/// Fields for inserting a POI; the spatial token is computed by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct NewPoi {
    pub name: String,
    pub category: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub geohash: String,
    pub metadata: Metadata,
}

/// Partial update; `None` leaves the stored value unchanged
///
/// `geohash` must be set whenever `lat` or `lon` is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiChanges {
    pub name: Option<String>,
    pub category: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub geohash: Option<String>,
    pub metadata: Option<Metadata>,
}

impl PoiChanges {
    pub fn moves(&self) -> bool {
        self.lat.is_some() || self.lon.is_some()
    }
}

/// Radius search issued to the store
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusQuery {
    pub center: Coordinates,
    pub radius_m: f64,
    /// Candidate rows must carry a token starting with one of these; `None` disables the prefilter
    pub prefilter: Option<SpatialPrefilter>,
    pub category: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Bounding-box search issued to the store
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsQuery {
    pub bounds: BoundingBox,
    pub category: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Number of POIs in a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

/// Aggregate statistics over the whole POI set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiStats {
    pub total_pois: i64,
    pub category_count: i64,
    pub oldest_poi: Option<DateTime<Utc>>,
    pub newest_poi: Option<DateTime<Utc>>,
    /// Extent of all POIs; absent when the store is empty
    pub bounds: Option<BoundingBox>,
}

impl PoiStats {
    pub fn empty() -> Self {
        Self {
            total_pois: 0,
            category_count: 0,
            oldest_poi: None,
            newest_poi: None,
            bounds: None,
        }
    }
}
