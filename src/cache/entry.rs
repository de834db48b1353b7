//! Cache key and entry types
//!
//! This module defines the core cache entry structures:
//! - `Fingerprint`: SHA-256 digest of the HTML input, used as the cache key
//! - `CacheEntry`: Rendered PDF bytes with metadata for TTL and size accounting

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::time::Instant;

use crate::constants::MAX_DURATION_SECS;

/// Content fingerprint identifying a cached document
///
/// Hex-encoded SHA-256 over the exact UTF-8 bytes of the HTML input. Identical
/// input always yields the same fingerprint; the value is stable across
/// restarts even though nothing here relies on that.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of an HTML document
    pub fn of(html: &str) -> Self {
        let digest = Sha256::digest(html.as_bytes());
        Fingerprint(hex::encode(digest))
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cached PDF and its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Fingerprint of the HTML this PDF was rendered from
    pub fingerprint: Fingerprint,
    /// Rendered PDF bytes
    pub payload: Bytes,
    /// When the entry was inserted
    pub created_at: Instant,
    /// Entry is invalid once `now > expires_at`
    pub expires_at: Instant,
    /// Payload size used for aggregate size accounting
    pub size_bytes: usize,
}

impl CacheEntry {
    /// Create an entry that expires `ttl` after `now`
    ///
    /// A TTL past the representable range is capped at `MAX_DURATION_SECS`.
    pub fn new(fingerprint: Fingerprint, payload: Bytes, ttl: Duration, now: Instant) -> Self {
        let size_bytes = payload.len();
        let ttl = ttl.min(Duration::from_secs(MAX_DURATION_SECS));
        Self {
            fingerprint,
            payload,
            created_at: now,
            expires_at: now + ttl,
            size_bytes,
        }
    }

    /// Check if the entry has expired at `now`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Time left before expiry (zero once expired)
    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}
