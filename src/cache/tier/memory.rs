//! In-memory LRU tier with TTL expiry
//!
//! A single mutex guards the index and recency order; no I/O happens
//! inside the lock. Eviction is strict LRU: the recency sequence is
//! assigned at insertion and bumped on every hit, so the smallest
//! sequence is always the least recently used entry (sequences are
//! unique, which also preserves earliest-created-first order among
//! entries that were never read).

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::cache::entry::{epoch_millis, CacheEntry};
use crate::cache::stats::{AtomicTierStats, TierStatistics};
use crate::cache::tier::{CacheTier, TierLocation};
use crate::cache::BYTES_PER_MB;
use crate::config::MemoryTierConfig;
use crate::error::CacheError;

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, CacheEntry>,
    /// (recency sequence, key), ascending: front is the LRU victim
    recency: BTreeSet<(u64, String)>,
    size_bytes: u64,
    next_seq: u64,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&(entry.last_accessed, key.to_owned()));
        self.size_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn lru_key(&self) -> Option<String> {
        self.recency.iter().next().map(|(_, key)| key.clone())
    }
}

/// Bounded in-process LRU cache with TTL expiry.
#[derive(Debug)]
pub struct MemoryTier {
    state: Mutex<MemoryState>,
    stats: Arc<AtomicTierStats>,
    max_items: usize,
    max_bytes: u64,
}

impl MemoryTier {
    pub fn new(config: &MemoryTierConfig) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            stats: Arc::new(AtomicTierStats::new()),
            max_items: config.max_items,
            max_bytes: config.max_size_mb * BYTES_PER_MB,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheTier for MemoryTier {
    fn location(&self) -> TierLocation {
        TierLocation::Memory
    }

    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let size = value.len() as u64;
        if size > self.max_bytes {
            return Err(CacheError::Capacity {
                size_bytes: size,
                limit_bytes: self.max_bytes,
            });
        }

        let mut state = self.lock();
        state.remove(key);

        // Make room before admitting: both budgets must hold afterwards.
        let mut evicted = 0u64;
        while state.entries.len() + 1 > self.max_items
            || state.size_bytes + size > self.max_bytes
        {
            let Some(victim) = state.lru_key() else { break };
            state.remove(&victim);
            self.stats.record_eviction();
            evicted += 1;
        }
        if evicted > 0 {
            log::debug!("memory tier evicted {} entries admitting {}", evicted, key);
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let entry = CacheEntry::new(value, ttl, seq);
        state.size_bytes += entry.size_bytes;
        state.recency.insert((seq, key.to_owned()));
        state.entries.insert(key.to_owned(), entry);

        self.stats
            .set_usage(state.entries.len() as u64, state.size_bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.lock();

        let expired = match state.entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(epoch_millis()),
        };

        if expired {
            state.remove(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            self.stats
                .set_usage(state.entries.len() as u64, state.size_bytes);
            return None;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        // Bump recency: re-key the ordering entry under the fresh sequence.
        let (old, payload) = {
            let entry = state.entries.get_mut(key)?;
            let old = (entry.last_accessed, key.to_owned());
            entry.last_accessed = seq;
            entry.hit_count += 1;
            (old, entry.payload.clone())
        };
        state.recency.remove(&old);
        state.recency.insert((seq, key.to_owned()));

        self.stats.record_hit();
        Some(payload)
    }

    fn invalidate(&self, key: &str) {
        let mut state = self.lock();
        if state.remove(key).is_some() {
            self.stats
                .set_usage(state.entries.len() as u64, state.size_bytes);
        }
    }

    fn stats(&self) -> TierStatistics {
        self.stats.snapshot()
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.recency.clear();
        state.size_bytes = 0;
        self.stats.set_usage(0, 0);
    }
}
