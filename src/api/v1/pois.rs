//! POI CRUD endpoint handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, BulkCreateRequest, BulkCreateResponse, DeleteResponse, Json};
use crate::domain::poi::{Poi, PoiId};
use crate::infrastructure::services::{CreatePoiRequest, UpdatePoiRequest};

fn check_id(id: PoiId) -> Result<PoiId, ApiError> {
    if id < 1 {
        return Err(ApiError::bad_request("POI id must be a positive integer").with_param("id"));
    }
    Ok(id)
}

/// GET /v1/pois/{poi_id}
pub async fn get_poi(
    State(state): State<AppState>,
    Path(poi_id): Path<PoiId>,
) -> Result<Json<Poi>, ApiError> {
    debug!(poi_id, "Getting POI");

    let poi = state.poi_service.get(check_id(poi_id)?).await?;

    Ok(Json(poi))
}

/// POST /v1/pois
pub async fn create_poi(
    State(state): State<AppState>,
    Json(request): Json<CreatePoiRequest>,
) -> Result<(StatusCode, Json<Poi>), ApiError> {
    let poi = state.poi_service.create(request).await?;

    Ok((StatusCode::CREATED, Json(poi)))
}

/// PATCH /v1/pois/{poi_id}
pub async fn update_poi(
    State(state): State<AppState>,
    Path(poi_id): Path<PoiId>,
    Json(request): Json<UpdatePoiRequest>,
) -> Result<Json<Poi>, ApiError> {
    let poi = state
        .poi_service
        .update(check_id(poi_id)?, request)
        .await?;

    Ok(Json(poi))
}

/// DELETE /v1/pois/{poi_id}
pub async fn delete_poi(
    State(state): State<AppState>,
    Path(poi_id): Path<PoiId>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.poi_service.delete(check_id(poi_id)?).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("POI {} deleted successfully", poi_id),
    }))
}

/// POST /v1/pois/bulk
pub async fn bulk_create(
    State(state): State<AppState>,
    Json(request): Json<BulkCreateRequest>,
) -> Result<(StatusCode, Json<BulkCreateResponse>), ApiError> {
    validator::Validate::validate(&request)?;

    let inserted = state.poi_service.bulk_create(request.pois).await?;

    Ok((StatusCode::CREATED, Json(BulkCreateResponse { inserted })))
}
