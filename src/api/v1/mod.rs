//! Versioned POI API endpoints

pub mod pois;
pub mod search;
pub mod stats;

use axum::{
    routing::{get, post},
    Router,
};

use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/nearby", get(search::nearby))
        .route("/bbox", get(search::bbox))
        .route("/pois", post(pois::create_poi))
        .route("/pois/bulk", post(pois::bulk_create))
        .route(
            "/pois/{poi_id}",
            get(pois::get_poi)
                .patch(pois::update_poi)
                .delete(pois::delete_poi),
        )
        .route("/categories", get(stats::list_categories))
        .route("/stats", get(stats::get_stats))
        .route("/cache/stats", get(stats::get_cache_stats))
}
