//! POI query service - cached reads and invalidating writes

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::domain::cache::CacheKeyParams;
use crate::domain::events::{ChangeEvent, ChangeNotifier, POI_CHANNEL};
use crate::domain::geo::geohash::{self, DEFAULT_PRECISION, MAX_PRECISION};
use crate::domain::geo::{BoundingBox, Coordinates, SpatialPrefilter};
use crate::domain::poi::{
    BoundsQuery, CategoryCount, Metadata, NewPoi, Poi, PoiChanges, PoiId, PoiRepository,
    PoiStats, PoiSummary, RadiusQuery,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_event_published, record_store_query};

use super::result_cache::{CacheStats, ResultCache};

/// Cache key prefix for radius searches
pub const NEARBY_PREFIX: &str = "nearby";
/// Cache key prefix for bounding-box searches
pub const BBOX_PREFIX: &str = "bbox";
/// Cache key prefix for get-by-id lookups
pub const POI_PREFIX: &str = "poi";
/// Cache key prefix for the category listing
pub const CATEGORIES_PREFIX: &str = "categories";

/// Query service configuration
#[derive(Debug, Clone)]
pub struct PoiServiceConfig {
    /// Precision of the geohash stored with every POI
    pub geohash_precision: usize,
    pub min_radius_m: f64,
    pub max_radius_m: f64,
    /// Channel change events are published on
    pub event_channel: String,
}

impl Default for PoiServiceConfig {
    fn default() -> Self {
        Self {
            geohash_precision: DEFAULT_PRECISION,
            min_radius_m: 50.0,
            max_radius_m: 50_000.0,
            event_channel: POI_CHANNEL.to_string(),
        }
    }
}

impl PoiServiceConfig {
    pub fn with_geohash_precision(mut self, precision: usize) -> Self {
        self.geohash_precision = precision.clamp(1, MAX_PRECISION);
        self
    }

    pub fn with_radius_limits(mut self, min_radius_m: f64, max_radius_m: f64) -> Self {
        self.min_radius_m = min_radius_m;
        self.max_radius_m = max_radius_m;
        self
    }

    pub fn with_event_channel(mut self, channel: impl Into<String>) -> Self {
        self.event_channel = channel.into();
        self
    }
}

/// Radius search parameters
#[derive(Debug, Clone, PartialEq)]
pub struct NearbySearch {
    pub lat: f64,
    pub lon: f64,
    pub radius_m: f64,
    pub category: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Bounding-box search parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BboxSearch {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
    pub category: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Radius search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyResult {
    pub cached: bool,
    pub items: Vec<PoiSummary>,
    pub count: usize,
    pub center: Coordinates,
    pub radius_m: f64,
}

/// Bounding-box search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BboxResult {
    pub cached: bool,
    pub items: Vec<PoiSummary>,
    pub count: usize,
    pub bounds: BoundingBox,
}

/// Request to create a POI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreatePoiRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Request to partially update a POI; absent fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct UpdatePoiRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: Option<f64>,
    pub metadata: Option<Metadata>,
}

/// Cached search payload
#[derive(Debug, Serialize, Deserialize)]
struct CachedItems {
    items: Vec<PoiSummary>,
    count: usize,
}

/// Trait for the POI service (for dynamic dispatch in AppState)
#[async_trait]
pub trait PoiServiceTrait: Send + Sync + Debug {
    /// POIs within a radius, nearest first
    async fn nearby(&self, search: NearbySearch) -> Result<NearbyResult, DomainError>;

    /// POIs inside a bounding box, newest id first
    async fn bbox(&self, search: BboxSearch) -> Result<BboxResult, DomainError>;

    /// Gets a POI by id
    async fn get(&self, id: PoiId) -> Result<Poi, DomainError>;

    async fn create(&self, request: CreatePoiRequest) -> Result<Poi, DomainError>;

    async fn update(&self, id: PoiId, request: UpdatePoiRequest) -> Result<Poi, DomainError>;

    /// Deletes a POI, returning the removed row
    async fn delete(&self, id: PoiId) -> Result<Poi, DomainError>;

    /// Category counts, highest first
    async fn categories(&self) -> Result<Vec<CategoryCount>, DomainError>;

    /// Inserts many POIs at once; no per-item events are published
    async fn bulk_create(&self, requests: Vec<CreatePoiRequest>) -> Result<usize, DomainError>;

    async fn stats(&self) -> Result<PoiStats, DomainError>;

    async fn cache_stats(&self) -> CacheStats;

    /// Store round-trip for readiness checks
    async fn check_store(&self) -> Result<(), DomainError>;

    /// Cache round-trip for readiness checks
    async fn check_cache(&self) -> Result<(), DomainError>;
}

/// POI service implementation
pub struct PoiService {
    repository: Arc<dyn PoiRepository>,
    cache: ResultCache,
    notifier: Arc<dyn ChangeNotifier>,
    config: PoiServiceConfig,
}

impl Debug for PoiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoiService")
            .field("cache", &self.cache)
            .field("notifier", &self.notifier.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

impl PoiService {
    pub fn new(
        repository: Arc<dyn PoiRepository>,
        cache: ResultCache,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        Self::with_config(repository, cache, notifier, PoiServiceConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn PoiRepository>,
        cache: ResultCache,
        notifier: Arc<dyn ChangeNotifier>,
        config: PoiServiceConfig,
    ) -> Self {
        Self {
            repository,
            cache,
            notifier,
            config,
        }
    }

    fn poi_key(&self, id: PoiId) -> String {
        self.cache
            .key(POI_PREFIX, &CacheKeyParams::new().with_int("id", id))
    }

    fn validate_radius(&self, radius_m: f64) -> Result<(), DomainError> {
        if !radius_m.is_finite()
            || radius_m < self.config.min_radius_m
            || radius_m > self.config.max_radius_m
        {
            return Err(DomainError::validation(format!(
                "Invalid radius {}: must be between {} and {} meters",
                radius_m, self.config.min_radius_m, self.config.max_radius_m
            )));
        }
        Ok(())
    }

    fn new_poi(&self, request: CreatePoiRequest) -> Result<NewPoi, DomainError> {
        validate_request(&request)?;
        let name = validate_name(request.name)?;
        let coordinates = Coordinates::new(request.lat, request.lon)?;

        Ok(NewPoi {
            name,
            category: normalize_category(request.category),
            lat: coordinates.lat,
            lon: coordinates.lon,
            geohash: geohash::encode(
                coordinates.lat,
                coordinates.lon,
                self.config.geohash_precision,
            ),
            metadata: request.metadata,
        })
    }

    /// Drops every cache entry a write to `id` could have affected
    async fn invalidate(&self, id: PoiId, categories_changed: bool) {
        self.cache.delete(&self.poi_key(id)).await;
        self.cache.clear_prefix(NEARBY_PREFIX).await;
        self.cache.clear_prefix(BBOX_PREFIX).await;

        if categories_changed {
            self.cache.clear_prefix(CATEGORIES_PREFIX).await;
        }
    }

    async fn publish(&self, event: ChangeEvent) {
        let channel = self.config.event_channel.as_str();

        match self.notifier.publish(channel, &event).await {
            Ok(receivers) => {
                record_event_published(channel);
                debug!(
                    channel = %channel,
                    event_type = %event.kind,
                    poi_id = event.poi_id,
                    receivers,
                    "Published change event"
                );
            }
            Err(e) => {
                warn!(channel = %channel, poi_id = event.poi_id, error = %e, "Failed to publish change event");
            }
        }
    }
}

#[async_trait]
impl PoiServiceTrait for PoiService {
    #[instrument(skip(self), fields(lat = search.lat, lon = search.lon, radius_m = search.radius_m))]
    async fn nearby(&self, search: NearbySearch) -> Result<NearbyResult, DomainError> {
        let center = Coordinates::new(search.lat, search.lon)?;
        self.validate_radius(search.radius_m)?;
        validate_limit(search.limit)?;
        let category = normalize_category(search.category);

        let params = CacheKeyParams::new()
            .with_float("lat", center.lat)
            .with_float("lon", center.lon)
            .with_float("radius_m", search.radius_m)
            .with_text("category", category.as_deref())
            .with_int("limit", i64::from(search.limit))
            .with_int("offset", i64::from(search.offset));
        let key = self.cache.key(NEARBY_PREFIX, &params);

        if let Some(cached) = self.cache.get::<CachedItems>(&key).await {
            return Ok(NearbyResult {
                cached: true,
                items: cached.items,
                count: cached.count,
                center,
                radius_m: search.radius_m,
            });
        }

        let query = RadiusQuery {
            center,
            radius_m: search.radius_m,
            prefilter: SpatialPrefilter::around(
                &center,
                search.radius_m,
                self.config.geohash_precision,
            ),
            category,
            limit: search.limit,
            offset: search.offset,
        };

        record_store_query("nearby");
        let rows = self.repository.find_within_radius(&query).await?;

        let items: Vec<PoiSummary> = rows
            .iter()
            .map(|row| row.poi.summary(Some(row.dist_m)))
            .collect();
        let payload = CachedItems {
            count: items.len(),
            items,
        };

        self.cache.set(&key, &payload, self.cache.result_ttl()).await;

        Ok(NearbyResult {
            cached: false,
            count: payload.count,
            items: payload.items,
            center,
            radius_m: search.radius_m,
        })
    }

    #[instrument(skip(self))]
    async fn bbox(&self, search: BboxSearch) -> Result<BboxResult, DomainError> {
        let bounds = BoundingBox::new(search.min_lat, search.min_lon, search.max_lat, search.max_lon)?;
        validate_limit(search.limit)?;
        let category = normalize_category(search.category);

        let params = CacheKeyParams::new()
            .with_float("min_lat", bounds.min_lat)
            .with_float("min_lon", bounds.min_lon)
            .with_float("max_lat", bounds.max_lat)
            .with_float("max_lon", bounds.max_lon)
            .with_text("category", category.as_deref())
            .with_int("limit", i64::from(search.limit))
            .with_int("offset", i64::from(search.offset));
        let key = self.cache.key(BBOX_PREFIX, &params);

        if let Some(cached) = self.cache.get::<CachedItems>(&key).await {
            return Ok(BboxResult {
                cached: true,
                items: cached.items,
                count: cached.count,
                bounds,
            });
        }

        let query = BoundsQuery {
            bounds,
            category,
            limit: search.limit,
            offset: search.offset,
        };

        record_store_query("bbox");
        let rows = self.repository.find_within_bounds(&query).await?;

        let items: Vec<PoiSummary> = rows.iter().map(|poi| poi.summary(None)).collect();
        let payload = CachedItems {
            count: items.len(),
            items,
        };

        self.cache.set(&key, &payload, self.cache.result_ttl()).await;

        Ok(BboxResult {
            cached: false,
            count: payload.count,
            items: payload.items,
            bounds,
        })
    }

    #[instrument(skip(self))]
    async fn get(&self, id: PoiId) -> Result<Poi, DomainError> {
        let key = self.poi_key(id);

        if let Some(poi) = self.cache.get::<Poi>(&key).await {
            return Ok(poi);
        }

        record_store_query("get");
        let poi = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::poi_not_found(id))?;

        self.cache.set(&key, &poi, self.cache.result_ttl()).await;

        Ok(poi)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    async fn create(&self, request: CreatePoiRequest) -> Result<Poi, DomainError> {
        let new_poi = self.new_poi(request)?;

        record_store_query("insert");
        let poi = self.repository.insert(new_poi).await?;

        self.invalidate(poi.id, poi.category.is_some()).await;
        self.publish(ChangeEvent::created(poi.clone())).await;

        info!(poi_id = poi.id, name = %poi.name, "Created POI");
        Ok(poi)
    }

    #[instrument(skip(self, request))]
    async fn update(&self, id: PoiId, request: UpdatePoiRequest) -> Result<Poi, DomainError> {
        validate_request(&request)?;
        let name = request.name.map(validate_name).transpose()?;

        record_store_query("get");
        let existing = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::poi_not_found(id))?;

        let mut changes = PoiChanges {
            name,
            category: normalize_category(request.category),
            lat: request.lat,
            lon: request.lon,
            geohash: None,
            metadata: request.metadata,
        };

        if changes.moves() {
            let moved = Coordinates::new(
                changes.lat.unwrap_or(existing.lat),
                changes.lon.unwrap_or(existing.lon),
            )?;
            changes.geohash = Some(geohash::encode(
                moved.lat,
                moved.lon,
                self.config.geohash_precision,
            ));
        }

        let category_changed =
            changes.category.is_some() && changes.category != existing.category;

        record_store_query("update");
        let poi = self
            .repository
            .update(id, changes)
            .await?
            .ok_or_else(|| DomainError::poi_not_found(id))?;

        self.invalidate(id, category_changed).await;
        self.publish(ChangeEvent::updated(poi.clone())).await;

        info!(poi_id = poi.id, name = %poi.name, "Updated POI");
        Ok(poi)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: PoiId) -> Result<Poi, DomainError> {
        record_store_query("delete");
        let removed = self
            .repository
            .delete(id)
            .await?
            .ok_or_else(|| DomainError::poi_not_found(id))?;

        self.invalidate(id, removed.category.is_some()).await;
        self.publish(ChangeEvent::deleted(id, None)).await;

        info!(poi_id = id, "Deleted POI");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<CategoryCount>, DomainError> {
        let key = self.cache.key(CATEGORIES_PREFIX, &CacheKeyParams::new());

        if let Some(categories) = self.cache.get::<Vec<CategoryCount>>(&key).await {
            return Ok(categories);
        }

        record_store_query("categories");
        let categories = self.repository.category_counts().await?;

        self.cache
            .set(&key, &categories, self.cache.categories_ttl())
            .await;

        Ok(categories)
    }

    #[instrument(skip(self, requests), fields(count = requests.len()))]
    async fn bulk_create(&self, requests: Vec<CreatePoiRequest>) -> Result<usize, DomainError> {
        if requests.is_empty() {
            return Ok(0);
        }

        let new_pois = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                self.new_poi(request).map_err(|e| {
                    DomainError::validation(format!("Item {}: {}", index, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        record_store_query("insert_many");
        let inserted = self.repository.insert_many(new_pois).await?;

        self.cache.clear_prefix(NEARBY_PREFIX).await;
        self.cache.clear_prefix(BBOX_PREFIX).await;
        self.cache.clear_prefix(CATEGORIES_PREFIX).await;

        info!(inserted, "Bulk created POIs");
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn stats(&self) -> Result<PoiStats, DomainError> {
        record_store_query("stats");
        self.repository.stats().await
    }

    async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn check_store(&self) -> Result<(), DomainError> {
        self.repository.ping().await
    }

    async fn check_cache(&self) -> Result<(), DomainError> {
        self.cache.ping().await
    }
}

fn validate_request<T: Validate>(request: &T) -> Result<(), DomainError> {
    request
        .validate()
        .map_err(|e| DomainError::validation(e.to_string()))
}

fn validate_name(name: String) -> Result<String, DomainError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(DomainError::validation("POI name cannot be empty"));
    }

    Ok(trimmed.to_string())
}

fn validate_limit(limit: u32) -> Result<(), DomainError> {
    if limit == 0 {
        return Err(DomainError::validation("Limit must be at least 1"));
    }
    Ok(())
}

/// Blank categories are treated as absent
fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}
