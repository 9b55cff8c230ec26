//! Spatial search endpoint handlers

use axum::extract::State;
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, BboxParams, Json, NearbyParams, ValidQuery};
use crate::infrastructure::services::{BboxResult, NearbyResult};

/// GET /v1/nearby
pub async fn nearby(
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<NearbyParams>,
) -> Result<Json<NearbyResult>, ApiError> {
    debug!(lat = params.lat, lon = params.lon, radius_m = ?params.radius_m, "Nearby search");

    let result = state
        .poi_service
        .nearby(params.into_search(state.default_radius_m))
        .await?;

    Ok(Json(result))
}

/// GET /v1/bbox
pub async fn bbox(
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<BboxParams>,
) -> Result<Json<BboxResult>, ApiError> {
    debug!(
        min_lat = params.min_lat,
        min_lon = params.min_lon,
        max_lat = params.max_lat,
        max_lon = params.max_lon,
        "Bounding box search"
    );

    let result = state.poi_service.bbox(params.into()).await?;

    Ok(Json(result))
}
