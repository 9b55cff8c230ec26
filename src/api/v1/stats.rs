//! Category and statistics endpoint handlers

use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::types::{ApiError, CategoriesResponse, Json};
use crate::domain::poi::PoiStats;
use crate::infrastructure::services::CacheStats;

/// GET /v1/categories
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let categories = state.poi_service.categories().await?;

    Ok(Json(CategoriesResponse::new(categories)))
}

/// GET /v1/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<PoiStats>, ApiError> {
    let stats = state.poi_service.stats().await?;

    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub cache: CacheStats,
}

/// GET /v1/cache/stats
pub async fn get_cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        cache: state.poi_service.cache_stats().await,
    })
}
