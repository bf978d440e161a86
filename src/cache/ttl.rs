//! Time-bounded in-memory cache.
//!
//! Entries expire a fixed TTL after insertion and are never served past
//! that point: an expired entry found on read is removed and reported as a
//! miss. Time comes from an injected [`Clock`] so expiry can be driven
//! deterministically in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

// =============================================================================
// Clock
// =============================================================================

/// Monotonic time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + offset
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Configuration for a [`TtlCache`].
#[derive(Debug, Clone)]
pub struct TtlCacheConfig {
    /// How long an entry stays valid after insertion
    pub ttl: Duration,
    /// Maximum number of entries before eviction kicks in
    pub max_entries: usize,
}

impl Default for TtlCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_entries: 10_000,
        }
    }
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub inserts: AtomicU64,
    pub evictions: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// String-keyed cache with per-entry expiry.
pub struct TtlCache<V> {
    config: TtlCacheConfig,
    entries: DashMap<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(config: TtlCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TtlCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            clock,
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &TtlCacheConfig {
        &self.config
    }

    /// Get a live entry.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // Expired: drop it so it can never be served
        if self
            .entries
            .remove_if(key, |_, entry| entry.expires_at <= now)
            .is_some()
        {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace an entry, restarting its TTL.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        if self.entries.len() >= self.config.max_entries {
            self.make_room();
        }

        let expires_at = self.clock.now() + self.config.ttl;
        self.entries.insert(key.into(), CacheEntry { value, expires_at });
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Remove every expired entry; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.stats
                .evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            inserts: self.stats.inserts.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Expired entries go first; if still full, drop the half closest to expiry.
    fn make_room(&self) {
        if self.purge_expired() > 0 && self.entries.len() < self.config.max_entries {
            return;
        }

        let mut by_expiry: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().expires_at))
            .collect();
        by_expiry.sort_by_key(|(_, expires_at)| *expires_at);

        let to_remove = (by_expiry.len() / 2).max(1);
        for (key, _) in by_expiry.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }
        self.stats
            .evictions
            .fetch_add(to_remove as u64, Ordering::Relaxed);
        debug!(evicted = to_remove, "TTL cache at capacity");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_secs: u64, max_entries: usize) -> (TtlCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock(
            TtlCacheConfig {
                ttl: Duration::from_secs(ttl_secs),
                max_entries,
            },
            clock.clone(),
        );
        (cache, clock)
    }

    #[test]
    fn test_hit_within_ttl() {
        let (cache, clock) = cache(600, 10);
        cache.insert("a", 1);
        clock.advance(Duration::from_secs(599));
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_expired_entry_is_never_served() {
        let (cache, clock) = cache(600, 10);
        cache.insert("a", 1);
        clock.advance(Duration::from_secs(600));
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_reinsert_restarts_ttl() {
        let (cache, clock) = cache(10, 10);
        cache.insert("a", 1);
        clock.advance(Duration::from_secs(8));
        cache.insert("a", 2);
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn test_purge_expired() {
        let (cache, clock) = cache(10, 10);
        cache.insert("a", 1);
        clock.advance(Duration::from_secs(5));
        cache.insert("b", 2);
        clock.advance(Duration::from_secs(6));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_capacity_evicts_oldest_half() {
        let (cache, clock) = cache(100, 4);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.insert(*key, i as u32);
            clock.advance(Duration::from_secs(1));
        }
        cache.insert("e", 4);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("e"), Some(4));
    }
}
