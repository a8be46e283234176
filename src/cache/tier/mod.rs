//! Cache tier abstraction
//!
//! Tiers form a closed set selected by configuration at startup: the
//! memory tier is always present, the disk tier is optional. The trait is
//! the seam a future tier (e.g. a remote store) would implement.

pub mod disk;
pub mod memory;

use std::time::Duration;

use crate::cache::stats::TierStatistics;
use crate::error::CacheError;

/// Tier identity, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierLocation {
    Memory,
    Disk,
}

/// One cache level with its own capacity and TTL policy.
///
/// Implementations confine side effects to their own state and must be
/// safe under concurrent access from arbitrary caller threads. The only
/// error `put` may surface is [`CacheError::Capacity`] for a value that
/// can never be admitted; everything else is a tier-internal failure
/// handled fail-open by the caller.
pub trait CacheTier: Send + Sync {
    fn location(&self) -> TierLocation;

    /// Insert or overwrite. Evicts least-recently-used entries until the
    /// tier's capacity invariants hold before admitting the new entry.
    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Returns the payload on a fresh hit; expired or absent entries are
    /// misses (expired entries are lazily removed).
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Remove the entry if present; no-op otherwise.
    fn invalidate(&self, key: &str);

    /// Point-in-time statistics snapshot.
    fn stats(&self) -> TierStatistics;

    /// Drop every entry.
    fn clear(&self);
}

pub use disk::DiskTier;
pub use memory::MemoryTier;
