//! Store counters
//!
//! Key reads (GET/MGET) and hash-field reads (HGET/HMGET, the snapshot
//! path) are counted apart so the two caching strategies can be told
//! apart in one store.

use serde::Serialize;

/// Point-in-time counters of a [`CacheStore`](crate::cache::CacheStore).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub field_hits: u64,
    pub field_misses: u64,
    /// Entries dropped because their TTL elapsed, lazily or by a purge
    pub expirations: u64,
    /// Live entries when the snapshot was taken
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&mut self, found: bool) {
        if found {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub(crate) fn record_field_read(&mut self, found: bool) {
        if found {
            self.field_hits += 1;
        } else {
            self.field_misses += 1;
        }
    }

    pub(crate) fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    /// Share of key reads that found a value; None before the first read.
    pub fn hit_rate(&self) -> Option<f64> {
        let reads = self.hits + self.misses;
        (reads > 0).then(|| self.hits as f64 / reads as f64)
    }

    /// Same as [`CacheStats::hit_rate`] for hash-field reads.
    pub fn field_hit_rate(&self) -> Option<f64> {
        let reads = self.field_hits + self.field_misses;
        (reads > 0).then(|| self.field_hits as f64 / reads as f64)
    }
}
