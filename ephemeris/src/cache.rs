//! Result cache shielding providers from redundant computation.
//!
//! The cache is a passive, thread-safe key→value store. Two independent
//! policies compose: LRU eviction bounds the entry count, and a per-entry
//! TTL makes stale entries read as misses before any sweep would remove
//! them. Expiry is checked on every `get` before a hit is honored.

use async_trait::async_trait;
use eph_core::{JulianDay, LunarPosition, PlanetaryPositions, SolarPosition};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Which quantity a cache entry (or request) refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantityKind {
    PlanetaryPositions,
    SunPosition,
    MoonPosition,
}

impl QuantityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantityKind::PlanetaryPositions => "planetary_positions",
            QuantityKind::SunPosition => "sun_position",
            QuantityKind::MoonPosition => "moon_position",
        }
    }
}

/// Cache key for one (quantity, Julian Day) pair.
pub fn cache_key(kind: QuantityKind, jd: JulianDay) -> String {
    format!("{}_{:.6}", kind.as_str(), jd.value())
}

/// A cached computation result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheValue {
    Planetary(PlanetaryPositions),
    Solar(SolarPosition),
    Lunar(LunarPosition),
}

/// Hit/miss accounting snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

/// Passive, thread-safe position cache.
#[async_trait]
pub trait PositionCache: Send + Sync {
    /// Absence (including expiry) is a normal outcome, not an error.
    async fn get(&self, key: &str) -> Option<CacheValue>;

    /// Overwrites any existing entry for `key` and resets its expiry.
    async fn set(&self, key: &str, value: CacheValue, ttl: Duration);

    /// Returns whether an entry was present.
    async fn delete(&self, key: &str) -> bool;

    async fn clear(&self);

    async fn stats(&self) -> CacheStats;
}

#[derive(Clone, Copy)]
struct CacheEntry {
    value: CacheValue,
    cached_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// In-memory LRU cache with per-entry TTL.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).expect("capacity is at least 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl PositionCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        let mut entries = self.entries.lock();
        match entries.get(key).copied() {
            Some(entry) if entry.is_expired() => {
                // Lazy removal: an expired entry reads as a miss.
                entries.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) {
        let mut entries = self.entries.lock();
        let evicted = entries.push(
            key.to_string(),
            CacheEntry {
                value,
                cached_at: Instant::now(),
                ttl,
            },
        );
        // `push` returns the displaced pair both for same-key overwrites
        // and for capacity evictions; only the latter counts as eviction.
        if let Some((displaced_key, _)) = evicted {
            if displaced_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %displaced_key, "cache evicted least recently used entry");
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    async fn clear(&self) {
        self.entries.lock().clear();
    }

    async fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// Cache that stores nothing; used to disable caching entirely.
pub struct NoopCache;

#[async_trait]
impl PositionCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<CacheValue> {
        None
    }

    async fn set(&self, _key: &str, _value: CacheValue, _ttl: Duration) {}

    async fn delete(&self, _key: &str) -> bool {
        false
    }

    async fn clear(&self) {}

    async fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}
