//! Cache statistics types
//!
//! This module provides structures for tracking cache performance metrics:
//! - `CacheStats`: Point-in-time view of the store (entries, sizes, counters)
//! - `CacheStatsTracker`: Lock-free counters updated by the store

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for monitoring and the `/cache/stats` endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Whether the cache serves and stores documents
    pub enabled: bool,
    /// Current number of live entries
    pub entry_count: usize,
    /// Maximum number of entries
    pub max_entries: usize,
    /// Sum of cached payload sizes in bytes
    pub total_size_bytes: u64,
    /// Configured time-to-live in seconds
    pub ttl_seconds: u64,
    /// Number of lookups that returned a payload
    pub hits: u64,
    /// Number of lookups that found nothing usable
    pub misses: u64,
    /// Number of entries dropped to make room (LRU)
    pub evictions: u64,
    /// Number of entries dropped because their TTL elapsed
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total lookups)
    /// Returns 0.0 if there were no lookups
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics tracker using atomics for thread safety
#[derive(Debug, Default)]
pub(crate) struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    /// Fill the counter fields of a stats snapshot
    pub fn fill(&self, stats: &mut CacheStats) {
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
        stats.evictions = self.evictions.load(Ordering::Relaxed);
        stats.expirations = self.expirations.load(Ordering::Relaxed);
    }
}
