//! Per-tier statistics: atomic counters plus point-in-time snapshots
//!
//! Counters are mutated only by the owning tier and read by anyone as an
//! immutable [`TierStatistics`] snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use serde::Serialize;

/// Hot counters for one tier. Padded to avoid false sharing between the
/// caller threads hammering hits/misses and the background sweeps.
#[derive(Debug, Default)]
pub struct AtomicTierStats {
    hits: CachePadded<AtomicU64>,
    misses: CachePadded<AtomicU64>,
    evictions: CachePadded<AtomicU64>,
    expirations: CachePadded<AtomicU64>,
    io_errors: CachePadded<AtomicU64>,
    item_count: CachePadded<AtomicU64>,
    size_bytes: CachePadded<AtomicU64>,
}

impl AtomicTierStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_io_error(&self) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the tier's authoritative usage after a mutation.
    #[inline]
    pub fn set_usage(&self, items: u64, bytes: u64) {
        self.item_count.store(items, Ordering::Relaxed);
        self.size_bytes.store(bytes, Ordering::Relaxed);
    }

    /// Point-in-time snapshot.
    pub fn snapshot(&self) -> TierStatistics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        TierStatistics {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
            item_count: self.item_count.load(Ordering::Relaxed),
            size_bytes: self.size_bytes.load(Ordering::Relaxed),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// Immutable statistics snapshot for one tier.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TierStatistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub io_errors: u64,
    pub item_count: u64,
    pub size_bytes: u64,
    /// hits / (hits + misses), 0.0 when no operations were recorded
    pub hit_rate: f64,
}

/// Snapshot pair returned by the coordinator's `stats`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CombinedStats {
    pub memory: TierStatistics,
    /// Zeroed when the disk tier is disabled
    pub disk: TierStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_derived_from_counters() {
        let stats = AtomicTierStats::new();
        for _ in 0..3 {
            stats.record_hit();
        }
        stats.record_miss();
        let snap = stats.snapshot();
        assert_eq!(snap.hits, 3);
        assert_eq!(snap.misses, 1);
        assert!((snap.hit_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_stats_have_zero_hit_rate() {
        let snap = AtomicTierStats::new().snapshot();
        assert_eq!(snap.hit_rate, 0.0);
        assert_eq!(snap.item_count, 0);
    }

    #[test]
    fn usage_reflects_last_store() {
        let stats = AtomicTierStats::new();
        stats.set_usage(5, 1024);
        stats.set_usage(4, 768);
        let snap = stats.snapshot();
        assert_eq!(snap.item_count, 4);
        assert_eq!(snap.size_bytes, 768);
    }
}
