//! Geographic primitives and the geohash prefilter
//!
//! Coordinates are WGS84 degrees. Distances are great-circle meters on a spherical earth,
//! which is what the in-memory store uses; the PostGIS store computes exact spheroid distances.

pub mod geohash;

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

pub use geohash::SpatialPrefilter;

/// Minimum valid latitude
pub const MIN_LAT: f64 = -90.0;
/// Maximum valid latitude
pub const MAX_LAT: f64 = 90.0;
/// Minimum valid longitude
pub const MIN_LON: f64 = -180.0;
/// Maximum valid longitude
pub const MAX_LON: f64 = 180.0;

/// Mean earth radius in meters (IUGG)
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Meters spanned by one degree of latitude
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * PI / 180.0;

/// WGS84 meridional radius of curvature at the equator, a(1 - e^2)
pub const WGS84_MIN_MERIDIONAL_RADIUS_M: f64 = 6_335_439.327;

/// Shortest length of one degree of latitude on the WGS84 spheroid (at the equator)
///
/// Prefilter cells are sized with this so a cell is never taller, in spheroidal meters, than
/// the sizing assumed.
pub const MIN_METERS_PER_LAT_DEGREE: f64 = WGS84_MIN_MERIDIONAL_RADIUS_M * PI / 180.0;

/// A validated latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Creates coordinates, rejecting non-finite or out-of-range values
    pub fn new(lat: f64, lon: f64) -> Result<Self, DomainError> {
        validate_lat(lat)?;
        validate_lon(lon)?;
        Ok(Self { lat, lon })
    }

    /// Great-circle (haversine) distance to another point, in meters
    pub fn distance_m(&self, other: &Coordinates) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }
}

/// Axis-aligned latitude/longitude rectangle, min corner south-west
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Creates a bounding box; every coordinate must be in range and min must not exceed max
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Result<Self, DomainError> {
        validate_lat(min_lat)?;
        validate_lat(max_lat)?;
        validate_lon(min_lon)?;
        validate_lon(max_lon)?;

        if min_lat > max_lat || min_lon > max_lon {
            return Err(DomainError::validation(
                "Invalid bounding box: min values must be less than max values",
            ));
        }

        Ok(Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        })
    }

    /// Inclusive containment test
    pub fn contains(&self, point: &Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }
}

fn validate_lat(lat: f64) -> Result<(), DomainError> {
    if lat.is_finite() && (MIN_LAT..=MAX_LAT).contains(&lat) {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "Invalid latitude {}: must be between {} and {}",
            lat, MIN_LAT, MAX_LAT
        )))
    }
}

fn validate_lon(lon: f64) -> Result<(), DomainError> {
    if lon.is_finite() && (MIN_LON..=MAX_LON).contains(&lon) {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "Invalid longitude {}: must be between {} and {}",
            lon, MIN_LON, MAX_LON
        )))
    }
}
