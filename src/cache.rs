//! Bounded result cache shared by the engines.
//!
//! Backed by `moka::future::Cache` with LRU eviction and a per-entry TTL.
//! Concurrent misses on the same key collapse into a single computation
//! (`try_get_with`), and entries are only ever inserted whole.
//!
//! `invalidate_all` bumps a generation counter that is part of every internal
//! key, so a computation that started before the invalidation can never
//! publish a stale value that later requests would observe.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use moka::Expiry;

use crate::error::{EngineError, Result};
use crate::models::Coordinate;

/// Fractional digits kept when hashing coordinates (~1.1 m at the equator).
const COORD_PRECISION: f64 = 1e5;

/// Snap `value` to the grid `rounded` hashes it at.
pub fn quantize(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}

/// Snap a coordinate to the precision used in cache keys. Engines that key
/// on a coordinate must compute from the snapped value, otherwise two nearby
/// callers sharing a key would see results measured from each other's point.
pub fn quantize_coordinate(coord: &Coordinate) -> Coordinate {
    Coordinate {
        lat: quantize(coord.lat, COORD_PRECISION),
        lon: quantize(coord.lon, COORD_PRECISION),
    }
}

/// Deterministic digest of a request's semantic content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn builder(namespace: &str) -> CacheKeyBuilder {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"campus-route/v1\0");
        CacheKeyBuilder { hasher }.str(namespace)
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Incrementally feeds length-prefixed fields into a blake3 hasher so that
/// `("ab", "c")` and `("a", "bc")` never collide.
pub struct CacheKeyBuilder {
    hasher: blake3::Hasher,
}

impl CacheKeyBuilder {
    pub fn str(mut self, value: &str) -> Self {
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn opt_str(self, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.u64(1).str(v),
            None => self.u64(0),
        }
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    pub fn i64(mut self, value: i64) -> Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    /// Hash a float after rounding to `scale` units, so jitter below the
    /// precision maps to the same key.
    pub fn rounded(self, value: f64, scale: f64) -> Self {
        self.i64((value * scale).round() as i64)
    }

    pub fn coordinate(self, coord: &Coordinate) -> Self {
        self.rounded(coord.lat, COORD_PRECISION)
            .rounded(coord.lon, COORD_PRECISION)
    }

    pub fn finish(self) -> CacheKey {
        CacheKey(*self.hasher.finalize().as_bytes())
    }
}

#[derive(Clone)]
struct Timed<V> {
    value: V,
    ttl: Duration,
}

struct PerEntryTtl;

impl<K, V> Expiry<K, Timed<V>> for PerEntryTtl {
    fn expire_after_create(&self, _key: &K, value: &Timed<V>, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &K,
        value: &Timed<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

type Slot = (u64, CacheKey);

/// Generic key→value cache with TTL and bounded size.
///
/// Cloning is cheap and yields a handle to the same underlying cache.
/// A cache built with capacity 0 is disabled: every lookup misses.
#[derive(Clone)]
pub struct ResultCache<V> {
    name: &'static str,
    inner: Option<Cache<Slot, Timed<V>>>,
    default_ttl: Duration,
    generation: Arc<AtomicU64>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V> ResultCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, max_entries: u64, default_ttl: Duration) -> Self {
        let inner = (max_entries > 0).then(|| {
            Cache::builder()
                .name(name)
                .max_capacity(max_entries)
                .eviction_policy(EvictionPolicy::lru())
                .expire_after(PerEntryTtl)
                .build()
        });
        Self {
            name,
            inner,
            default_ttl,
            generation: Arc::new(AtomicU64::new(0)),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled(name: &'static str) -> Self {
        Self::new(name, 0, Duration::ZERO)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        (self.generation.load(Ordering::Acquire), *key)
    }

    /// Look up a value.
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let found = match &self.inner {
            Some(cache) => cache.get(&self.slot(key)).await.map(|t| t.value),
            None => None,
        };
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store a value for `ttl`. A zero TTL is a no-op.
    pub async fn put(&self, key: CacheKey, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        if let Some(cache) = &self.inner {
            cache.insert(self.slot(&key), Timed { value, ttl }).await;
        }
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// success. Concurrent callers with the same key share one computation;
    /// failures are returned to every waiter and never cached.
    pub async fn get_or_try_insert<F>(&self, key: CacheKey, ttl: Duration, compute: F) -> Result<V>
    where
        F: Future<Output = Result<V>> + Send,
    {
        if let Some(hit) = self.get(&key).await {
            tracing::debug!(cache = self.name, key = %key.to_hex(), "cache hit");
            return Ok(hit);
        }
        tracing::debug!(cache = self.name, key = %key.to_hex(), "cache miss");

        let cache = match (&self.inner, ttl.is_zero()) {
            (Some(cache), false) => cache,
            _ => return compute.await,
        };

        cache
            .try_get_with(self.slot(&key), async move {
                compute.await.map(|value| Timed { value, ttl })
            })
            .await
            .map(|t| t.value)
            .map_err(|e: Arc<EngineError>| (*e).clone())
    }

    /// Drop every entry. Values computed before this call are never served
    /// afterwards.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
        tracing::debug!(cache = self.name, "cache invalidated");
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.as_ref().map_or(0, |c| c.entry_count())
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit rate in [0, 1]; 0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let h = self.hits() as f64;
        let total = h + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            h / total
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }
}
