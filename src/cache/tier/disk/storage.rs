//! File-per-entry disk storage with an in-memory metadata index
//!
//! Entries live under the configured directory as `<hash>.lhe` files.
//! Writes are durable-atomic: the record is written to a `.tmp` sibling,
//! fsynced, then renamed over the final name, so a crash mid-write never
//! leaves a readable corrupt entry. Reads verify length and checksum;
//! anything that fails verification is purged and reported as absent.
//!
//! The store is single-owner: the disk tier's I/O worker thread holds it
//! exclusively, so no internal locking is needed. Statistics go through
//! the shared atomic counters.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::entry::{epoch_millis, hash_bytes, DiskRecord};
use crate::cache::stats::AtomicTierStats;
use crate::error::CacheError;

const ENTRY_EXTENSION: &str = "lhe";
const TMP_EXTENSION: &str = "tmp";

/// Index metadata for one persisted entry.
#[derive(Debug, Clone)]
struct IndexSlot {
    path: PathBuf,
    size_bytes: u64,
    expires_at_ms: u64,
    recency: u64,
    hit_count: u64,
}

/// Directory-backed entry store. Owned exclusively by the I/O worker.
#[derive(Debug)]
pub(crate) struct DiskStore {
    dir: PathBuf,
    max_bytes: u64,
    index: HashMap<String, IndexSlot>,
    /// (recency, key) ascending: front is the LRU victim
    recency: BTreeSet<(u64, String)>,
    size_bytes: u64,
    next_seq: u64,
    stats: Arc<AtomicTierStats>,
}

impl DiskStore {
    /// Open the store, running startup recovery: scan the directory,
    /// rebuild the index, and discard expired or unreadable entries.
    /// Returns only once the store is ready to serve.
    pub(crate) fn open(
        dir: &Path,
        max_bytes: u64,
        stats: Arc<AtomicTierStats>,
    ) -> Result<Self, CacheError> {
        fs::create_dir_all(dir)
            .map_err(|e| CacheError::storage(format!("create {}: {}", dir.display(), e)))?;

        let mut store = Self {
            dir: dir.to_owned(),
            max_bytes,
            index: HashMap::new(),
            recency: BTreeSet::new(),
            size_bytes: 0,
            next_seq: 0,
            stats,
        };
        store.recover()?;
        Ok(store)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let hash = hash_bytes(key.as_bytes());
        self.dir.join(format!("{:016x}.{}", hash, ENTRY_EXTENSION))
    }

    fn recover(&mut self) -> Result<(), CacheError> {
        let now_ms = epoch_millis();
        let mut recovered: Vec<(String, IndexSlot, u64)> = Vec::new();
        let mut purged = 0usize;

        let dir_entries = fs::read_dir(&self.dir)
            .map_err(|e| CacheError::storage(format!("scan {}: {}", self.dir.display(), e)))?;
        for dir_entry in dir_entries {
            let Ok(dir_entry) = dir_entry else { continue };
            let path = dir_entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                // Leftover temp files are failed writes; never readable entries.
                Some(TMP_EXTENSION) => {
                    let _ = fs::remove_file(&path);
                }
                Some(ENTRY_EXTENSION) => {
                    match fs::read(&path).map_err(CacheError::from).and_then(|bytes| {
                        let size = bytes.len() as u64;
                        DiskRecord::decode_verified(&bytes).map(|r| (r, size))
                    }) {
                        Ok((record, size)) if !record.is_expired(now_ms) => {
                            recovered.push((
                                record.key.clone(),
                                IndexSlot {
                                    path,
                                    size_bytes: size,
                                    expires_at_ms: record.expires_at_ms,
                                    recency: 0,
                                    hit_count: 0,
                                },
                                record.created_at_ms,
                            ));
                        }
                        Ok(_) => {
                            let _ = fs::remove_file(&path);
                            self.stats.record_expiration();
                            purged += 1;
                        }
                        Err(_) => {
                            let _ = fs::remove_file(&path);
                            self.stats.record_io_error();
                            purged += 1;
                        }
                    }
                }
                _ => {}
            }
        }

        // Seed recency from creation order so pre-restart LRU order is
        // approximated by age.
        recovered.sort_by_key(|(_, _, created_at_ms)| *created_at_ms);
        for (key, mut slot, _) in recovered {
            slot.recency = self.next_seq;
            self.next_seq += 1;
            self.size_bytes += slot.size_bytes;
            self.recency.insert((slot.recency, key.clone()));
            self.index.insert(key, slot);
        }

        // The budget may have shrunk between runs.
        while self.size_bytes > self.max_bytes {
            if !self.evict_lru() {
                break;
            }
        }

        self.publish_usage();
        log::info!(
            "disk tier ready: {} entries ({} bytes) recovered from {}, {} purged",
            self.index.len(),
            self.size_bytes,
            self.dir.display(),
            purged
        );
        Ok(())
    }

    fn publish_usage(&self) {
        self.stats.set_usage(self.index.len() as u64, self.size_bytes);
    }

    /// Remove the least-recently-used entry (index and backing file).
    fn evict_lru(&mut self) -> bool {
        let Some((_, key)) = self.recency.iter().next().cloned() else {
            return false;
        };
        if let Some(slot) = self.remove_slot(&key) {
            let _ = fs::remove_file(&slot.path);
            self.stats.record_eviction();
        }
        true
    }

    fn remove_slot(&mut self, key: &str) -> Option<IndexSlot> {
        let slot = self.index.remove(key)?;
        self.recency.remove(&(slot.recency, key.to_owned()));
        self.size_bytes -= slot.size_bytes;
        Some(slot)
    }

    pub(crate) fn put(
        &mut self,
        key: &str,
        payload: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let record = DiskRecord::new(key, payload, ttl);
        let expires_at_ms = record.expires_at_ms;
        let bytes = record.encode()?;
        let size = bytes.len() as u64;

        if size > self.max_bytes {
            return Err(CacheError::Capacity {
                size_bytes: size,
                limit_bytes: self.max_bytes,
            });
        }

        // Replace-then-evict keeps accounting simple: the old version of
        // this key never counts against the new one.
        if let Some(old) = self.remove_slot(key) {
            let _ = fs::remove_file(&old.path);
        }
        while self.size_bytes + size > self.max_bytes {
            if !self.evict_lru() {
                break;
            }
        }

        let path = self.entry_path(key);
        // The replace/evict above already changed the index; keep the
        // published usage honest even when the write itself fails.
        if let Err(err) = self.write_atomic(&path, &bytes) {
            self.publish_usage();
            return Err(err);
        }

        let recency = self.next_seq;
        self.next_seq += 1;
        self.recency.insert((recency, key.to_owned()));
        self.index.insert(
            key.to_owned(),
            IndexSlot {
                path,
                size_bytes: size,
                expires_at_ms,
                recency,
                hit_count: 0,
            },
        );
        self.size_bytes += size;
        self.publish_usage();
        Ok(())
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        let tmp = path.with_extension(TMP_EXTENSION);
        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            drop(file);
            fs::rename(&tmp, path)
        })();
        if let Err(err) = result {
            let _ = fs::remove_file(&tmp);
            return Err(CacheError::storage(format!(
                "write {}: {}",
                path.display(),
                err
            )));
        }
        Ok(())
    }

    pub(crate) fn get(&mut self, key: &str) -> Option<Vec<u8>> {
        let (expires_at_ms, path) = match self.index.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(slot) => (slot.expires_at_ms, slot.path.clone()),
        };

        if epoch_millis() > expires_at_ms {
            if let Some(slot) = self.remove_slot(key) {
                let _ = fs::remove_file(&slot.path);
            }
            self.stats.record_expiration();
            self.stats.record_miss();
            self.publish_usage();
            return None;
        }
        let record = match fs::read(&path)
            .map_err(CacheError::from)
            .and_then(|bytes| DiskRecord::decode_verified(&bytes))
        {
            Ok(record) => record,
            Err(err) => {
                // Fail-open: purge and report a miss, never an error.
                log::warn!("disk tier purging unreadable entry for {}: {}", key, err);
                if let Some(slot) = self.remove_slot(key) {
                    let _ = fs::remove_file(&slot.path);
                }
                self.stats.record_io_error();
                self.stats.record_miss();
                self.publish_usage();
                return None;
            }
        };

        if record.key != key {
            // File-name hash collision: the file belongs to another key.
            // Drop only our index entry; the file is the other key's data.
            self.remove_slot(key);
            self.stats.record_miss();
            self.publish_usage();
            return None;
        }

        let recency = self.next_seq;
        self.next_seq += 1;
        if let Some(slot) = self.index.get_mut(key) {
            self.recency.remove(&(slot.recency, key.to_owned()));
            slot.recency = recency;
            slot.hit_count += 1;
            self.recency.insert((recency, key.to_owned()));
        }
        self.stats.record_hit();
        Some(record.payload)
    }

    pub(crate) fn invalidate(&mut self, key: &str) {
        if let Some(slot) = self.remove_slot(key) {
            let _ = fs::remove_file(&slot.path);
            self.publish_usage();
        }
    }

    pub(crate) fn clear(&mut self) {
        for (_, slot) in self.index.drain() {
            let _ = fs::remove_file(&slot.path);
        }
        self.recency.clear();
        self.size_bytes = 0;
        self.publish_usage();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    #[cfg(test)]
    pub(crate) fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}
