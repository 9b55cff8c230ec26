//! Request and response types for the POI endpoints

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::poi::CategoryCount;
use crate::infrastructure::services::{BboxSearch, CreatePoiRequest, NearbySearch};

/// Largest page a radius search may request
pub const MAX_NEARBY_LIMIT: u32 = 200;
/// Largest page a bounding-box search may request
pub const MAX_BBOX_LIMIT: u32 = 500;

fn default_nearby_limit() -> u32 {
    50
}

fn default_bbox_limit() -> u32 {
    100
}

/// Query string of `GET /v1/nearby`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NearbyParams {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
    /// Falls back to the configured default radius
    pub radius_m: Option<f64>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[serde(default = "default_nearby_limit")]
    #[validate(range(min = 1, max = MAX_NEARBY_LIMIT))]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl NearbyParams {
    pub fn into_search(self, default_radius_m: f64) -> NearbySearch {
        NearbySearch {
            lat: self.lat,
            lon: self.lon,
            radius_m: self.radius_m.unwrap_or(default_radius_m),
            category: self.category,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Query string of `GET /v1/bbox`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BboxParams {
    #[validate(range(min = -90.0, max = 90.0))]
    pub min_lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub min_lon: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub max_lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub max_lon: f64,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[serde(default = "default_bbox_limit")]
    #[validate(range(min = 1, max = MAX_BBOX_LIMIT))]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl From<BboxParams> for BboxSearch {
    fn from(params: BboxParams) -> Self {
        Self {
            min_lat: params.min_lat,
            min_lon: params.min_lon,
            max_lat: params.max_lat,
            max_lon: params.max_lon,
            category: params.category,
            limit: params.limit,
            offset: params.offset,
        }
    }
}

/// Body of `POST /v1/pois/bulk`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkCreateRequest {
    #[validate(length(min = 1, max = 1000))]
    pub pois: Vec<CreatePoiRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCreateResponse {
    pub inserted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryCount>,
    pub total: usize,
}

impl CategoriesResponse {
    pub fn new(categories: Vec<CategoryCount>) -> Self {
        Self {
            total: categories.len(),
            categories,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_params_defaults() {
        let params: NearbyParams = serde_json::from_str(r#"{"lat": 29.76, "lon": -95.37}"#).unwrap();

        assert_eq!(params.limit, 50);
        assert_eq!(params.offset, 0);
        assert!(params.validate().is_ok());

        let search = params.into_search(1000.0);
        assert_eq!(search.radius_m, 1000.0);
    }

    #[test]
    fn test_nearby_limit_bounds() {
        let params: NearbyParams =
            serde_json::from_str(r#"{"lat": 0, "lon": 0, "limit": 201}"#).unwrap();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_bbox_params_defaults_and_bounds() {
        let params: BboxParams = serde_json::from_str(
            r#"{"min_lat": 29, "min_lon": -96, "max_lat": 30, "max_lon": -95}"#,
        )
        .unwrap();
        assert_eq!(params.limit, 100);
        assert!(params.validate().is_ok());

        let too_many: BboxParams = serde_json::from_str(
            r#"{"min_lat": 29, "min_lon": -96, "max_lat": 30, "max_lon": -95, "limit": 501}"#,
        )
        .unwrap();
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn test_bulk_request_rejects_empty() {
        let request = BulkCreateRequest { pois: Vec::new() };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_bulk_request_size_limit() {
        let poi = CreatePoiRequest {
            name: "Kiosk".to_string(),
            category: None,
            lat: 1.0,
            lon: 1.0,
            metadata: Default::default(),
        };

        let full = BulkCreateRequest {
            pois: vec![poi.clone(); 1000],
        };
        assert!(full.validate().is_ok());

        let oversized = BulkCreateRequest {
            pois: vec![poi; 1001],
        };
        let errors = oversized.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("pois"));
    }

    #[test]
    fn test_categories_response_total() {
        let response = CategoriesResponse::new(vec![CategoryCount {
            name: "cafe".to_string(),
            count: 2,
        }]);

        assert_eq!(response.total, 1);
    }
}
