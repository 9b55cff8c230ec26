//! Application services - query/cache coordination

mod poi_service;
mod result_cache;

pub use poi_service::{
    BboxResult, BboxSearch, CreatePoiRequest, NearbyResult, NearbySearch, PoiService,
    PoiServiceConfig, PoiServiceTrait, UpdatePoiRequest, BBOX_PREFIX, CATEGORIES_PREFIX,
    NEARBY_PREFIX, POI_PREFIX,
};
pub use result_cache::{CacheStats, ResultCache, ResultCacheConfig};
