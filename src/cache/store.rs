//! In-memory PDF cache
//!
//! `CacheStore` is a strict LRU bounded by entry count, with a per-entry TTL
//! checked lazily on lookup. All state sits behind one mutex, so promoting an
//! entry on a hit and evicting the least-recently-used entry on insert can
//! never interleave.

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::entry::{CacheEntry, Fingerprint};
use super::stats::{CacheStats, CacheStatsTracker};

struct StoreInner {
    entries: LruCache<Fingerprint, CacheEntry>,
    total_size_bytes: u64,
}

impl StoreInner {
    fn remove(&mut self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let entry = self.entries.pop(fingerprint)?;
        self.total_size_bytes -= entry.size_bytes as u64;
        Some(entry)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<Fingerprint> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(fp, _)| fp.clone())
            .collect();

        for fp in &expired {
            self.remove(fp);
        }
        expired.len()
    }
}

/// Content-addressed LRU store of rendered PDFs
pub struct CacheStore {
    inner: Mutex<StoreInner>,
    stats: CacheStatsTracker,
    enabled: bool,
    max_entries: NonZeroUsize,
    ttl: Duration,
}

impl CacheStore {
    /// Create a store holding at most `max_entries` documents for `ttl` each
    ///
    /// A `max_entries` of zero is treated as one; `Config::validate` rejects it
    /// before we get here.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(StoreInner {
                entries: LruCache::new(max_entries),
                total_size_bytes: 0,
            }),
            stats: CacheStatsTracker::new(),
            enabled: true,
            max_entries,
            ttl,
        }
    }

    /// Create a store from configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        let mut store = Self::new(config.max_entries, config.ttl());
        store.enabled = config.enabled;
        store
    }

    /// Whether lookups and inserts do anything
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Configured time-to-live for new entries
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a rendered PDF
    ///
    /// Returns the payload only if present and unexpired, promoting the entry
    /// to most-recently-used. An expired entry is removed and reported as a miss.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Bytes> {
        self.lookup_at(fingerprint, Instant::now())
    }

    pub(crate) fn lookup_at(&self, fingerprint: &Fingerprint, now: Instant) -> Option<Bytes> {
        if !self.enabled {
            return None;
        }

        let mut inner = self.inner.lock();

        let expired = match inner.entries.peek(fingerprint) {
            None => {
                self.stats.increment_misses();
                return None;
            }
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            inner.remove(fingerprint);
            self.stats.increment_misses();
            self.stats.add_expirations(1);
            tracing::debug!(fingerprint = %fingerprint.short(), "Cache entry expired on lookup");
            return None;
        }

        // get() promotes to most-recently-used
        let payload = inner.entries.get(fingerprint).map(|e| e.payload.clone());
        self.stats.increment_hits();
        payload
    }

    /// Store a rendered PDF with the given TTL
    ///
    /// Overwrites any entry with the same fingerprint. When the store is full
    /// the least-recently-used entry is evicted first.
    pub fn insert(&self, fingerprint: Fingerprint, payload: Bytes, ttl: Duration) {
        self.insert_at(fingerprint, payload, ttl, Instant::now());
    }

    pub(crate) fn insert_at(
        &self,
        fingerprint: Fingerprint,
        payload: Bytes,
        ttl: Duration,
        now: Instant,
    ) {
        if !self.enabled {
            return;
        }

        let entry = CacheEntry::new(fingerprint.clone(), payload, ttl, now);
        let size = entry.size_bytes as u64;

        let mut inner = self.inner.lock();
        inner.remove(&fingerprint);

        if let Some((evicted_fp, evicted)) = inner.entries.push(fingerprint, entry) {
            inner.total_size_bytes -= evicted.size_bytes as u64;
            self.stats.add_evictions(1);
            tracing::debug!(
                fingerprint = %evicted_fp.short(),
                size_bytes = evicted.size_bytes,
                "Evicted least-recently-used cache entry"
            );
        }
        inner.total_size_bytes += size;
    }

    /// Remove all entries, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.total_size_bytes = 0;
        removed
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub(crate) fn purge_expired_at(&self, now: Instant) -> usize {
        let removed = self.inner.lock().purge_expired(now);
        if removed > 0 {
            self.stats.add_expirations(removed as u64);
        }
        removed
    }

    /// Current statistics (expired entries are purged before counting)
    pub fn stats(&self) -> CacheStats {
        self.stats_at(Instant::now())
    }

    pub(crate) fn stats_at(&self, now: Instant) -> CacheStats {
        self.purge_expired_at(now);

        let inner = self.inner.lock();
        let mut stats = CacheStats {
            enabled: self.enabled,
            entry_count: inner.entries.len(),
            max_entries: self.max_entries.get(),
            total_size_bytes: inner.total_size_bytes,
            ttl_seconds: self.ttl.as_secs(),
            ..Default::default()
        };
        drop(inner);

        self.stats.fill(&mut stats);
        stats
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
