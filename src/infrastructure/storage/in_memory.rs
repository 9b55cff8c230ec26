//! In-memory POI store

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::geo::BoundingBox;
use crate::domain::poi::{
    BoundsQuery, CategoryCount, NewPoi, Poi, PoiChanges, PoiId, PoiRepository, PoiStats,
    PoiWithDistance, RadiusQuery,
};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
struct StoredPoi {
    poi: Poi,
    geohash: String,
}

#[derive(Debug, Default)]
struct State {
    next_id: PoiId,
    rows: BTreeMap<PoiId, StoredPoi>,
}

impl State {
    fn insert(&mut self, new: NewPoi) -> Poi {
        self.next_id += 1;
        let now = Utc::now();

        let poi = Poi {
            id: self.next_id,
            name: new.name,
            category: new.category,
            lat: new.lat,
            lon: new.lon,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        };

        self.rows.insert(
            poi.id,
            StoredPoi {
                poi: poi.clone(),
                geohash: new.geohash,
            },
        );

        poi
    }
}

/// Thread-safe in-memory POI store
///
/// Distances are haversine meters. Useful for tests and single-process development; data is
/// lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryPoiRepository {
    state: RwLock<State>,
}

impl InMemoryPoiRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, DomainError> {
        self.state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, DomainError> {
        self.state
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }
}

fn category_matches(poi: &Poi, category: Option<&str>) -> bool {
    category.is_none_or(|c| poi.category.as_deref() == Some(c))
}

#[async_trait]
impl PoiRepository for InMemoryPoiRepository {
    async fn find_within_radius(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<PoiWithDistance>, DomainError> {
        let state = self.read()?;

        let mut found: Vec<PoiWithDistance> = state
            .rows
            .values()
            .filter(|row| {
                query
                    .prefilter
                    .as_ref()
                    .is_none_or(|prefilter| prefilter.matches(&row.geohash))
            })
            .filter(|row| category_matches(&row.poi, query.category.as_deref()))
            .filter_map(|row| {
                let dist_m = query.center.distance_m(&row.poi.coordinates());
                (dist_m <= query.radius_m).then(|| PoiWithDistance {
                    poi: row.poi.clone(),
                    dist_m,
                })
            })
            .collect();

        found.sort_by(|a, b| {
            a.dist_m
                .total_cmp(&b.dist_m)
                .then_with(|| a.poi.id.cmp(&b.poi.id))
        });

        Ok(found
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn find_within_bounds(&self, query: &BoundsQuery) -> Result<Vec<Poi>, DomainError> {
        let state = self.read()?;

        Ok(state
            .rows
            .values()
            .rev()
            .filter(|row| query.bounds.contains(&row.poi.coordinates()))
            .filter(|row| category_matches(&row.poi, query.category.as_deref()))
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .map(|row| row.poi.clone())
            .collect())
    }

    async fn get(&self, id: PoiId) -> Result<Option<Poi>, DomainError> {
        Ok(self.read()?.rows.get(&id).map(|row| row.poi.clone()))
    }

    async fn insert(&self, poi: NewPoi) -> Result<Poi, DomainError> {
        Ok(self.write()?.insert(poi))
    }

    async fn insert_many(&self, pois: Vec<NewPoi>) -> Result<usize, DomainError> {
        let mut state = self.write()?;
        let count = pois.len();

        for poi in pois {
            state.insert(poi);
        }

        Ok(count)
    }

    async fn update(&self, id: PoiId, changes: PoiChanges) -> Result<Option<Poi>, DomainError> {
        let mut state = self.write()?;

        let Some(row) = state.rows.get_mut(&id) else {
            return Ok(None);
        };

        let poi = &mut row.poi;

        if let Some(name) = changes.name {
            poi.name = name;
        }
        if let Some(category) = changes.category {
            poi.category = Some(category);
        }
        if let Some(lat) = changes.lat {
            poi.lat = lat;
        }
        if let Some(lon) = changes.lon {
            poi.lon = lon;
        }
        if let Some(metadata) = changes.metadata {
            poi.metadata = metadata;
        }
        if let Some(geohash) = changes.geohash {
            row.geohash = geohash;
        }

        row.poi.updated_at = Utc::now();

        Ok(Some(row.poi.clone()))
    }

    async fn delete(&self, id: PoiId) -> Result<Option<Poi>, DomainError> {
        Ok(self.write()?.rows.remove(&id).map(|row| row.poi))
    }

    async fn category_counts(&self) -> Result<Vec<CategoryCount>, DomainError> {
        let state = self.read()?;

        let mut counts: HashMap<&str, i64> = HashMap::new();
        for category in state.rows.values().filter_map(|row| row.poi.category.as_deref()) {
            *counts.entry(category).or_default() += 1;
        }

        let mut categories: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(name, count)| CategoryCount {
                name: name.to_string(),
                count,
            })
            .collect();

        categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        Ok(categories)
    }

    async fn stats(&self) -> Result<PoiStats, DomainError> {
        let state = self.read()?;
        let mut pois = state.rows.values().map(|row| &row.poi);

        let Some(first) = pois.next() else {
            return Ok(PoiStats::empty());
        };

        let mut stats = PoiStats {
            total_pois: 1,
            category_count: 0,
            oldest_poi: Some(first.created_at),
            newest_poi: Some(first.created_at),
            bounds: Some(BoundingBox {
                min_lat: first.lat,
                min_lon: first.lon,
                max_lat: first.lat,
                max_lon: first.lon,
            }),
        };
        let mut categories: Vec<&str> = first.category.as_deref().into_iter().collect();

        for poi in pois {
            stats.total_pois += 1;
            stats.oldest_poi = stats.oldest_poi.min(Some(poi.created_at));
            stats.newest_poi = stats.newest_poi.max(Some(poi.created_at));

            if let Some(bounds) = stats.bounds.as_mut() {
                bounds.min_lat = bounds.min_lat.min(poi.lat);
                bounds.min_lon = bounds.min_lon.min(poi.lon);
                bounds.max_lat = bounds.max_lat.max(poi.lat);
                bounds.max_lon = bounds.max_lon.max(poi.lon);
            }

            if let Some(category) = poi.category.as_deref() {
                categories.push(category);
            }
        }

        categories.sort_unstable();
        categories.dedup();
        stats.category_count = categories.len() as i64;

        Ok(stats)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.read().map(|_| ())
    }
}
