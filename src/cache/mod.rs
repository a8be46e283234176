//! Two-tier cache: in-memory LRU tier, persistent disk tier, and the
//! coordinator that unifies them behind one get/put/invalidate contract.

pub mod coordinator;
pub mod entry;
pub mod stats;
pub mod tier;

/// Byte budgets are configured in decimal megabytes.
pub(crate) const BYTES_PER_MB: u64 = 1_000_000;
