//! Tiered cache coordinator
//!
//! Unifies the memory and disk tiers behind one get/put/invalidate
//! contract: memory first, disk on miss, promotion on a disk hit.
//! The coordinator never holds a lock across both tiers; a get that
//! misses in memory and hits on disk is two independent critical
//! sections, and a racing put wins last-writer-wins.
//!
//! Disk failures are fail-open: a write-through put succeeds as long as
//! the memory write succeeded, and the disk failure is logged and
//! counted. The only error a caller sees is [`CacheError::Capacity`] for
//! a value no tier can ever admit.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;

use crate::cache::stats::CombinedStats;
use crate::cache::tier::{CacheTier, MemoryTier};
use crate::config::WriteMode;
use crate::error::CacheError;

/// Per-key in-flight load slot: the leader publishes its result here and
/// every concurrent caller for the same key waits on it.
#[derive(Default)]
struct InFlight {
    result: Mutex<Option<Result<Vec<u8>, CacheError>>>,
    ready: Condvar,
}

impl InFlight {
    fn complete(&self, result: Result<Vec<u8>, CacheError>) {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> Result<Vec<u8>, CacheError> {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Two-tier cache facade over the memory tier and an optional second
/// tier (disk by default), selected by configuration at startup.
pub struct TieredCache {
    memory: MemoryTier,
    overflow: Option<Box<dyn CacheTier>>,
    write_mode: WriteMode,
    /// TTL granted to values promoted from the overflow tier
    promotion_ttl: Duration,
    in_flight: DashMap<String, Arc<InFlight>>,
}

impl TieredCache {
    pub fn new(
        memory: MemoryTier,
        overflow: Option<Box<dyn CacheTier>>,
        write_mode: WriteMode,
        promotion_ttl: Duration,
    ) -> Self {
        Self {
            memory,
            overflow,
            write_mode,
            promotion_ttl,
            in_flight: DashMap::new(),
        }
    }

    /// Memory tier first; on miss, the overflow tier. An overflow hit is
    /// promoted into the memory tier (subject to its own admission rule)
    /// before the value is returned.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(value) = self.memory.get(key) {
            return Some(value);
        }

        let overflow = self.overflow.as_ref()?;
        let value = overflow.get(key)?;

        // Promote with the memory tier's default TTL semantics; a failed
        // promotion still serves the value.
        if let Err(err) = self.memory.put(key, value.clone(), self.promotion_ttl) {
            log::debug!("promotion of {} skipped: {}", key, err);
        }
        Some(value)
    }

    /// Write according to the configured [`WriteMode`]. Fail-open: a
    /// tier failure is absorbed as long as at least one configured tier
    /// admitted the value; `Capacity` surfaces only when nothing did.
    pub fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        match self.write_mode {
            WriteMode::MemoryOnly => self.memory.put(key, value, ttl),
            WriteMode::DiskOnly => match self.overflow.as_ref() {
                Some(tier) => match tier.put(key, value, ttl) {
                    Ok(()) => Ok(()),
                    Err(err) if err.is_fail_open() => {
                        log::warn!("disk-only write for {} skipped: {}", key, err);
                        Ok(())
                    }
                    Err(err) => Err(err),
                },
                None => Err(CacheError::configuration(
                    "write_mode is disk_only but no overflow tier is configured",
                )),
            },
            WriteMode::WriteThrough => {
                let memory_result = self.memory.put(key, value.clone(), ttl);
                let overflow_result = match self.overflow.as_ref() {
                    Some(tier) => tier.put(key, value, ttl),
                    None => Ok(()),
                };

                match (memory_result, overflow_result) {
                    (Ok(()), Ok(())) => Ok(()),
                    (Ok(()), Err(err)) => {
                        // Cache is a performance aid, not a durability
                        // guarantee: report through the error channel only.
                        log::warn!("write-through to overflow tier failed for {}: {}", key, err);
                        Ok(())
                    }
                    (Err(err), Ok(())) if self.overflow.is_some() => {
                        log::warn!("memory tier rejected {}: {}", key, err);
                        Ok(())
                    }
                    (Err(err), _) => Err(err),
                }
            }
        }
    }

    /// Remove from every tier, regardless of individual failures.
    pub fn invalidate(&self, key: &str) {
        self.memory.invalidate(key);
        if let Some(tier) = self.overflow.as_ref() {
            tier.invalidate(key);
        }
    }

    /// Cache-aside helper with an at-most-one-loader guarantee per key:
    /// concurrent callers for the same missing key block behind a single
    /// in-flight load and all receive its result. The slot is removed
    /// once the load completes, so a failed load may be retried on the
    /// next miss.
    pub fn get_or_load<F>(&self, key: &str, ttl: Duration, loader: F) -> Result<Vec<u8>, CacheError>
    where
        F: FnOnce() -> Result<Vec<u8>, CacheError>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let (slot, is_leader) = match self.in_flight.entry(key.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                (Arc::clone(occupied.get()), false)
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let slot = Arc::new(InFlight::default());
                vacant.insert(Arc::clone(&slot));
                (slot, true)
            }
        };

        if !is_leader {
            return slot.wait();
        }

        // Leader path. Re-check under the registration: a concurrent put
        // or a just-finished load may have filled the cache.
        let result = match self.get(key) {
            Some(value) => Ok(value),
            None => loader().map(|value| {
                if let Err(err) = self.put(key, value.clone(), ttl) {
                    log::warn!("caching loaded value for {} failed: {}", key, err);
                }
                value
            }),
        };

        slot.complete(result.clone());
        self.in_flight.remove(key);
        result
    }

    /// Snapshot of both tiers' statistics.
    pub fn stats(&self) -> CombinedStats {
        CombinedStats {
            memory: self.memory.stats(),
            disk: self
                .overflow
                .as_ref()
                .map(|tier| tier.stats())
                .unwrap_or_default(),
        }
    }

    /// Drop every entry from every tier.
    pub fn clear(&self) {
        self.memory.clear();
        if let Some(tier) = self.overflow.as_ref() {
            tier.clear();
        }
    }
}
