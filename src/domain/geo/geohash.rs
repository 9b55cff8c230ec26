//! Geohash encoding and the 3x3 neighborhood prefilter
//!
//! A geohash of precision `p` carries `5p` bits, interleaved starting with a longitude bit.
//! Working on the integer cell indices (rather than on the base-32 string) makes neighbor
//! lookup a matter of `±1` with longitude wrapping at the antimeridian and reflection across
//! the poles for latitude.

use crate::domain::DomainError;

use super::{Coordinates, MAX_LAT, METERS_PER_DEGREE, MIN_METERS_PER_LAT_DEGREE};

/// Geohash base-32 alphabet
pub const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Precision used for stored POI tokens unless configured otherwise
pub const DEFAULT_PRECISION: usize = 5;

/// Maximum supported precision (60 bits)
pub const MAX_PRECISION: usize = 12;

/// Number of tokens returned by [`neighborhood`]
pub const NEIGHBORHOOD_SIZE: usize = 9;

/// Decoded extent of a single geohash cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeohashCell {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl GeohashCell {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Prefilter tokens handed to the store for a radius query
///
/// All tokens share the same length. The store keeps a token of the full stored precision per
/// row, so a row is a candidate when its token starts with one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialPrefilter {
    pub precision: usize,
    pub tokens: Vec<String>,
}

impl SpatialPrefilter {
    /// Builds the prefilter for a circle, or `None` when no cell size can cover it
    ///
    /// The chosen precision is the finest one not exceeding `max_precision` whose cells are at
    /// least `radius_m` tall and wide, so the circle never leaves the 3x3 neighborhood.
    pub fn around(center: &Coordinates, radius_m: f64, max_precision: usize) -> Option<Self> {
        let precision = precision_for_radius(center.lat, radius_m, max_precision)?;

        Some(Self {
            precision,
            tokens: neighborhood(center.lat, center.lon, precision).to_vec(),
        })
    }

    /// Whether a stored token falls inside the prefilter
    pub fn matches(&self, stored: &str) -> bool {
        self.tokens.iter().any(|t| stored.starts_with(t.as_str()))
    }
}

/// Encodes a point as a geohash of the given precision (clamped to 1..=12)
pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
    let precision = clamp_precision(precision);
    let (lat_idx, lon_idx) = cell_index(lat, lon, precision);
    encode_index(lat_idx, lon_idx, precision)
}

/// Decodes a geohash into the bounds of its cell
pub fn decode_bounds(hash: &str) -> Result<GeohashCell, DomainError> {
    let precision = hash.len();

    if precision == 0 || precision > MAX_PRECISION {
        return Err(DomainError::validation(format!(
            "Invalid geohash '{}': length must be between 1 and {}",
            hash, MAX_PRECISION
        )));
    }

    let mut value: u64 = 0;

    for c in hash.bytes() {
        let digit = BASE32
            .iter()
            .position(|&b| b == c.to_ascii_lowercase())
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "Invalid geohash '{}': unexpected character '{}'",
                    hash, c as char
                ))
            })?;
        value = (value << 5) | digit as u64;
    }

    let (lon_bits, lat_bits) = bit_split(precision);
    let total = 5 * precision as u32;
    let mut lat_idx: u64 = 0;
    let mut lon_idx: u64 = 0;

    for i in 0..total {
        let bit = (value >> (total - 1 - i)) & 1;

        if i % 2 == 0 {
            lon_idx = (lon_idx << 1) | bit;
        } else {
            lat_idx = (lat_idx << 1) | bit;
        }
    }

    let lat_step = 180.0 / (1u64 << lat_bits) as f64;
    let lon_step = 360.0 / (1u64 << lon_bits) as f64;

    Ok(GeohashCell {
        min_lat: -90.0 + lat_idx as f64 * lat_step,
        max_lat: -90.0 + (lat_idx + 1) as f64 * lat_step,
        min_lon: -180.0 + lon_idx as f64 * lon_step,
        max_lon: -180.0 + (lon_idx + 1) as f64 * lon_step,
    })
}

/// The cell containing the point followed by its eight neighbors
///
/// Order: center, then north-west, north, north-east, west, east, south-west, south,
/// south-east. Tokens are always valid and pairwise distinct: longitude wraps, and a row that
/// would fall off a pole is reflected onto the extreme row on the opposite side of the world.
pub fn neighborhood(lat: f64, lon: f64, precision: usize) -> [String; NEIGHBORHOOD_SIZE] {
    let precision = clamp_precision(precision);
    let (lon_bits, lat_bits) = bit_split(precision);
    let lon_cells = 1i64 << lon_bits;
    let lat_cells = 1i64 << lat_bits;

    let (lat_idx, lon_idx) = cell_index(lat, lon, precision);
    let (lat_idx, lon_idx) = (lat_idx as i64, lon_idx as i64);

    let at = |dlat: i64, dlon: i64| -> String {
        let mut row = lat_idx + dlat;
        let mut col = lon_idx + dlon;

        if row >= lat_cells {
            row = lat_cells - 1;
            col += lon_cells / 2;
        } else if row < 0 {
            row = 0;
            col += lon_cells / 2;
        }

        encode_index(row as u64, col.rem_euclid(lon_cells) as u64, precision)
    };

    [
        at(0, 0),
        at(1, -1),
        at(1, 0),
        at(1, 1),
        at(0, -1),
        at(0, 1),
        at(-1, -1),
        at(-1, 0),
        at(-1, 1),
    ]
}

/// Conservative height and width of a cell in meters; the width is measured at the given latitude
///
/// The height uses the shortest WGS84 meridian degree and the width the mean-sphere parallel,
/// both of which underestimate the spheroidal extent the store measures distances on.
pub fn cell_size_m(precision: usize, lat: f64) -> (f64, f64) {
    let precision = clamp_precision(precision);
    let (lon_bits, lat_bits) = bit_split(precision);

    let height_deg = 180.0 / (1u64 << lat_bits) as f64;
    let width_deg = 360.0 / (1u64 << lon_bits) as f64;
    let lat = lat.abs().min(MAX_LAT);

    (
        height_deg * MIN_METERS_PER_LAT_DEGREE,
        width_deg * METERS_PER_DEGREE * lat.to_radians().cos().max(0.0),
    )
}

/// Finest precision (up to `max_precision`) whose cells contain a circle of `radius_m`
/// in the 3x3 neighborhood of the cell holding its center
pub fn precision_for_radius(lat: f64, radius_m: f64, max_precision: usize) -> Option<usize> {
    let max_precision = clamp_precision(max_precision);

    if !radius_m.is_finite() || radius_m < 0.0 {
        return None;
    }

    // Longitude degrees shrink toward the poles, so size the width at the circle's
    // most poleward latitude.
    let poleward_lat = lat.abs() + radius_m / MIN_METERS_PER_LAT_DEGREE;

    if poleward_lat >= MAX_LAT {
        return None;
    }

    (1..=max_precision).rev().find(|&precision| {
        let (height, width) = cell_size_m(precision, poleward_lat);
        height >= radius_m && width >= radius_m
    })
}

fn clamp_precision(precision: usize) -> usize {
    precision.clamp(1, MAX_PRECISION)
}

/// Returns (longitude bits, latitude bits); longitude takes the extra bit for odd totals
fn bit_split(precision: usize) -> (u32, u32) {
    let total = 5 * precision as u32;
    ((total + 1) / 2, total / 2)
}

fn cell_index(lat: f64, lon: f64, precision: usize) -> (u64, u64) {
    let (lon_bits, lat_bits) = bit_split(precision);
    let lat_cells = 1u64 << lat_bits;
    let lon_cells = 1u64 << lon_bits;

    // Float-to-int casts saturate, so out-of-range and NaN inputs clamp into the grid.
    let lat_idx = (((lat + 90.0) / 180.0) * lat_cells as f64).floor() as u64;
    let lon_idx = (((lon + 180.0) / 360.0) * lon_cells as f64).floor() as u64;

    (lat_idx.min(lat_cells - 1), lon_idx.min(lon_cells - 1))
}

fn encode_index(lat_idx: u64, lon_idx: u64, precision: usize) -> String {
    let (lon_bits, lat_bits) = bit_split(precision);
    let total = 5 * precision as u32;
    let mut value: u64 = 0;

    for i in 0..total {
        let bit = if i % 2 == 0 {
            (lon_idx >> (lon_bits - 1 - i / 2)) & 1
        } else {
            (lat_idx >> (lat_bits - 1 - i / 2)) & 1
        };
        value = (value << 1) | bit;
    }

    (0..precision)
        .map(|chunk| {
            let shift = 5 * (precision - 1 - chunk);
            BASE32[((value >> shift) & 0x1f) as usize] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn assert_valid_neighborhood(lat: f64, lon: f64, precision: usize) {
        let tokens = neighborhood(lat, lon, precision);
        let distinct: HashSet<&String> = tokens.iter().collect();

        assert_eq!(
            distinct.len(),
            NEIGHBORHOOD_SIZE,
            "duplicate tokens at ({}, {}) p{}: {:?}",
            lat,
            lon,
            precision,
            tokens
        );

        for token in &tokens {
            assert_eq!(token.len(), precision);
            assert!(decode_bounds(token).is_ok(), "invalid token {}", token);
        }
    }

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode(57.64911, 10.40744, 11), "u4pruydqqvj");
        assert_eq!(encode(42.605, -5.603, 5), "ezs42");
        assert_eq!(encode(29.7604, -95.3698, 5), "9vk1m");
    }

    #[test]
    fn test_encode_clamps_precision() {
        assert_eq!(encode(42.605, -5.603, 0).len(), 1);
        assert_eq!(encode(42.605, -5.603, 40).len(), MAX_PRECISION);
    }

    #[test]
    fn test_decode_bounds_contains_point() {
        let cell = decode_bounds("ezs42").unwrap();

        assert!(cell.min_lat <= 42.605 && 42.605 <= cell.max_lat);
        assert!(cell.min_lon <= -5.603 && -5.603 <= cell.max_lon);

        let (lat, lon) = cell.center();
        assert_eq!(encode(lat, lon, 5), "ezs42");
    }

    #[test]
    fn test_decode_rejects_invalid_characters() {
        assert!(decode_bounds("ezs4a").is_err());
        assert!(decode_bounds("").is_err());
        assert!(decode_bounds("0123456789bcd").is_err());
    }

    #[test]
    fn test_neighborhood_known_values() {
        let tokens = neighborhood(42.605, -5.603, 5);

        assert_eq!(
            tokens,
            [
                "ezs42", "ezefx", "ezs48", "ezs49", "ezefr", "ezs43", "ezefp", "ezs40", "ezs41",
            ]
            .map(String::from)
        );
    }

    #[test]
    fn test_neighborhood_center_first() {
        let tokens = neighborhood(29.7604, -95.3698, 5);
        assert_eq!(tokens[0], "9vk1m");
        assert_valid_neighborhood(29.7604, -95.3698, 5);
    }

    #[test]
    fn test_neighborhood_near_poles_and_antimeridian() {
        for &(lat, lon) in &[
            (89.0, 179.0),
            (89.0, -179.0),
            (-89.0, 179.0),
            (-89.0, -179.0),
            (90.0, 180.0),
            (-90.0, -180.0),
            (0.0, 179.999),
            (0.0, -180.0),
        ] {
            for precision in 1..=MAX_PRECISION {
                assert_valid_neighborhood(lat, lon, precision);
            }
        }
    }

    #[test]
    fn test_neighborhood_wraps_antimeridian() {
        let east_edge = neighborhood(0.0, 179.99, 5);
        let west_edge = encode(0.0, -179.99, 5);

        // East neighbor of the last column is the first column
        assert_eq!(east_edge[5], west_edge);
    }

    #[test]
    fn test_neighborhood_reflects_across_pole() {
        let tokens = neighborhood(90.0, 0.0, 3);
        let north = decode_bounds(&tokens[2]).unwrap();
        let center = decode_bounds(&tokens[0]).unwrap();

        // North of the top row is the top row on the far side of the pole
        assert_eq!(north.max_lat, 90.0);
        assert_eq!(center.max_lat, 90.0);
        assert!((north.center().1 - center.center().1).abs() > 179.0);
    }

    #[test]
    fn test_neighbors_are_adjacent() {
        let tokens = neighborhood(42.605, -5.603, 6);
        let center = decode_bounds(&tokens[0]).unwrap();
        let height = center.max_lat - center.min_lat;
        let width = center.max_lon - center.min_lon;
        let (clat, clon) = center.center();

        for token in &tokens[1..] {
            let (lat, lon) = decode_bounds(token).unwrap().center();
            assert!((lat - clat).abs() <= height * 1.01);
            assert!((lon - clon).abs() <= width * 1.01);
        }
    }

    #[test]
    fn test_cell_size_shrinks_with_precision() {
        let (h5, w5) = cell_size_m(5, 0.0);
        let (h6, w6) = cell_size_m(6, 0.0);

        assert!(h5 > 4_000.0 && h5 < 5_000.0);
        assert!(w5 > 4_000.0 && w5 < 5_000.0);
        assert!(h6 < h5 && w6 < w5);
    }

    #[test]
    fn test_precision_for_radius() {
        assert_eq!(precision_for_radius(29.7604, 1_000.0, 5), Some(5));
        assert_eq!(precision_for_radius(29.7604, 1_000.0, 12), Some(5));
        assert_eq!(precision_for_radius(29.7604, 10_000.0, 5), Some(4));
        assert_eq!(precision_for_radius(29.7604, 50_000.0, 5), Some(3));
        assert_eq!(precision_for_radius(0.0, 100.0, 12), Some(7));
    }

    #[test]
    fn test_precision_for_radius_uses_spheroid_cell_height() {
        // The mean-sphere height of a precision-5 cell is ~4886 m but only ~4859 m on WGS84
        assert_eq!(precision_for_radius(0.0, 4_880.0, 5), Some(4));
        assert_eq!(precision_for_radius(0.0, 4_850.0, 5), Some(5));
    }

    #[test]
    fn test_neighborhood_covers_spheroid_radius_at_cell_edge() {
        for precision in 2..=8 {
            let (height, _) = cell_size_m(precision, 0.0);
            let sphere_height = height * METERS_PER_DEGREE / MIN_METERS_PER_LAT_DEGREE;
            let radius = sphere_height * 0.999;

            // Center sits just inside the southern edge of its cell
            let cell = decode_bounds(&encode(0.001, 10.0, precision)).unwrap();
            let center = Coordinates::new(cell.min_lat + 1e-9, 10.0).unwrap();
            let Some(prefilter) = SpatialPrefilter::around(&center, radius, precision) else {
                continue;
            };

            // Due-south point at the radius, measured along the shortest WGS84 meridian degree
            let south = center.lat - radius / MIN_METERS_PER_LAT_DEGREE;
            let north = center.lat + radius / MIN_METERS_PER_LAT_DEGREE;
            assert!(
                prefilter.matches(&encode(south, center.lon, precision)),
                "precision {} radius {} misses the southern rim",
                precision,
                radius
            );
            assert!(prefilter.matches(&encode(north, center.lon, precision)));
        }
    }

    #[test]
    fn test_precision_for_radius_near_pole() {
        assert_eq!(precision_for_radius(89.9, 50_000.0, 5), None);
        assert!(precision_for_radius(-89.0, 1_000.0, 5).is_some());
    }

    #[test]
    fn test_prefilter_matches_by_prefix() {
        let center = Coordinates::new(29.7604, -95.3698).unwrap();
        let prefilter = SpatialPrefilter::around(&center, 10_000.0, 5).unwrap();

        assert_eq!(prefilter.precision, 4);
        assert_eq!(prefilter.tokens.len(), NEIGHBORHOOD_SIZE);
        assert!(prefilter.matches(&encode(29.7604, -95.3698, 5)));
        assert!(!prefilter.matches(&encode(40.7128, -74.0060, 5)));
    }

    #[test]
    fn test_prefilter_covers_points_inside_radius() {
        let center = Coordinates::new(29.7604, -95.3698).unwrap();
        let radius = 5_000.0;
        let prefilter = SpatialPrefilter::around(&center, radius, 5).unwrap();

        for step in 0..36 {
            let bearing = (step as f64 * 10.0).to_radians();
            let dlat = radius * 0.99 * bearing.cos() / METERS_PER_DEGREE;
            let dlon = radius * 0.99 * bearing.sin()
                / (METERS_PER_DEGREE * center.lat.to_radians().cos());
            let token = encode(center.lat + dlat, center.lon + dlon, 5);

            assert!(prefilter.matches(&token), "bearing {} not covered", step * 10);
        }
    }
}
