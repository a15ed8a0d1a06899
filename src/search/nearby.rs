//! Radius search over POIs.

use std::sync::Arc;

use crate::cache::{quantize, quantize_coordinate, CacheKey, ResultCache};
use crate::error::{EngineError, Result};
use crate::math::geo;
use crate::models::{Category, Coordinate, NearbyHit};
use crate::store::Store;
use crate::upstream::RetryPolicy;

/// Radius precision in cache keys: centimetres.
const RADIUS_SCALE: f64 = 100.0;

/// A validated nearby search. `center` and `radius_meters` are snapped to
/// cache-key precision, so equal keys always mean equal results.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub center: Coordinate,
    pub radius_meters: f64,
    pub category: Option<Category>,
    pub limit: usize,
}

impl NearbyQuery {
    pub fn new(
        center: Coordinate,
        radius_meters: f64,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Self> {
        center.validate()?;
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(EngineError::invalid(format!(
                "radius must be a positive number of meters, got {radius_meters}"
            )));
        }
        if limit == 0 {
            return Err(EngineError::invalid("limit must be positive"));
        }
        Ok(Self {
            center: quantize_coordinate(&center),
            radius_meters: quantize(radius_meters, RADIUS_SCALE),
            category,
            limit,
        })
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::builder("nearby")
            .coordinate(&self.center)
            .rounded(self.radius_meters, RADIUS_SCALE)
            .opt_str(self.category.as_ref().map(Category::as_str))
            .u64(self.limit as u64)
            .finish()
    }
}

pub struct NearbyEngine {
    store: Arc<dyn Store>,
    cache: ResultCache<Vec<NearbyHit>>,
    retry: RetryPolicy,
}

impl NearbyEngine {
    pub fn new(store: Arc<dyn Store>, cache: ResultCache<Vec<NearbyHit>>, retry: RetryPolicy) -> Self {
        Self {
            store,
            cache,
            retry,
        }
    }

    /// POIs within `radius_meters` of `center`, nearest first, ties by id.
    pub async fn nearby(
        &self,
        center: Coordinate,
        radius_meters: f64,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<NearbyHit>> {
        let query = NearbyQuery::new(center, radius_meters, category, limit)?;
        self.search(&query).await
    }

    pub async fn search(&self, query: &NearbyQuery) -> Result<Vec<NearbyHit>> {
        self.cache
            .get_or_try_insert(query.cache_key(), self.cache.default_ttl(), self.compute(query))
            .await
    }

    async fn compute(&self, query: &NearbyQuery) -> Result<Vec<NearbyHit>> {
        let category = query.category.as_ref();
        let pois = self
            .retry
            .run("load pois", || self.store.load_pois(category))
            .await?;

        let mut hits: Vec<NearbyHit> = pois
            .into_iter()
            .filter(|poi| category.map_or(true, |c| &poi.category == c))
            .filter_map(|poi| {
                let at = poi.coordinate();
                if let Err(e) = at.validate() {
                    tracing::warn!("Skipping POI {} ({}): {e}", poi.id, poi.name);
                    return None;
                }
                let distance_meters = geo::haversine(&query.center, &at);
                (distance_meters <= query.radius_meters).then(|| NearbyHit {
                    bearing_degrees: geo::initial_bearing(&query.center, &at),
                    distance_meters,
                    poi,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance_meters
                .total_cmp(&b.distance_meters)
                .then_with(|| a.poi.id.cmp(&b.poi.id))
        });
        hits.truncate(query.limit);
        Ok(hits)
    }

    pub fn cache(&self) -> &ResultCache<Vec<NearbyHit>> {
        &self.cache
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }
}
