//! Persistent disk tier fronted by a dedicated I/O worker
//!
//! All filesystem work happens on one named worker thread that owns the
//! [`storage::DiskStore`]; callers talk to it over a bounded channel and
//! wait for replies with a timeout, so every disk operation is
//! time-bounded. A timed-out read is a miss; a timed-out write is logged
//! and skipped. Statistics live in shared atomics so snapshots never
//! cross the channel.

pub(crate) mod storage;

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::cache::stats::{AtomicTierStats, TierStatistics};
use crate::cache::tier::{CacheTier, TierLocation};
use crate::cache::BYTES_PER_MB;
use crate::config::DiskTierConfig;
use crate::error::CacheError;
use storage::DiskStore;

/// Depth of the request channel; puts beyond this back-pressure briefly.
const REQUEST_QUEUE_DEPTH: usize = 256;

enum DiskRequest {
    Get {
        key: String,
        reply: Sender<Option<Vec<u8>>>,
    },
    Put {
        key: String,
        payload: Vec<u8>,
        ttl: Duration,
        reply: Sender<Result<(), CacheError>>,
    },
    Invalidate {
        key: String,
        reply: Sender<()>,
    },
    Clear {
        reply: Sender<()>,
    },
    Shutdown,
}

/// Bounded persistent cache tier surviving process restarts.
pub struct DiskTier {
    request_tx: Sender<DiskRequest>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<AtomicTierStats>,
    io_timeout: Duration,
}

impl DiskTier {
    /// Open the tier. Startup recovery (directory scan, index rebuild,
    /// purge of expired/unreadable entries) completes before this
    /// returns; afterwards the I/O worker owns the store.
    pub fn open(config: &DiskTierConfig) -> Result<Self, CacheError> {
        let stats = Arc::new(AtomicTierStats::new());
        let store = DiskStore::open(
            &config.directory,
            config.max_size_mb * BYTES_PER_MB,
            Arc::clone(&stats),
        )?;

        let (request_tx, request_rx) = bounded(REQUEST_QUEUE_DEPTH);
        let worker = std::thread::Builder::new()
            .name("loggerhead-disk-io".to_string())
            .spawn(move || Self::worker_loop(store, request_rx))
            .map_err(|e| CacheError::storage(format!("spawn disk worker: {}", e)))?;

        Ok(Self {
            request_tx,
            worker: Mutex::new(Some(worker)),
            stats,
            io_timeout: Duration::from_millis(config.io_timeout_ms),
        })
    }

    fn worker_loop(mut store: DiskStore, request_rx: Receiver<DiskRequest>) {
        while let Ok(request) = request_rx.recv() {
            match request {
                DiskRequest::Get { key, reply } => {
                    // The caller may already have timed out; a dead reply
                    // channel is not an error.
                    let _ = reply.send(store.get(&key));
                }
                DiskRequest::Put {
                    key,
                    payload,
                    ttl,
                    reply,
                } => {
                    let _ = reply.send(store.put(&key, payload, ttl));
                }
                DiskRequest::Invalidate { key, reply } => {
                    store.invalidate(&key);
                    let _ = reply.send(());
                }
                DiskRequest::Clear { reply } => {
                    store.clear();
                    let _ = reply.send(());
                }
                DiskRequest::Shutdown => break,
            }
        }
        log::debug!("disk I/O worker exiting");
    }

    fn request<T>(
        &self,
        request: DiskRequest,
        reply_rx: Receiver<T>,
        op: &'static str,
    ) -> Result<T, CacheError> {
        self.request_tx
            .send_timeout(request, self.io_timeout)
            .map_err(|_| CacheError::timeout(format!("disk {} enqueue", op)))?;
        reply_rx
            .recv_timeout(self.io_timeout)
            .map_err(|_| CacheError::timeout(format!("disk {}", op)))
    }

    /// Stop the I/O worker after it drains queued requests.
    pub fn shutdown(&self) {
        let _ = self.request_tx.send(DiskRequest::Shutdown);
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }
    }
}

impl CacheTier for DiskTier {
    fn location(&self) -> TierLocation {
        TierLocation::Disk
    }

    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let (reply_tx, reply_rx) = bounded(1);
        let request = DiskRequest::Put {
            key: key.to_owned(),
            payload: value,
            ttl,
            reply: reply_tx,
        };
        match self.request(request, reply_rx, "put") {
            Ok(result) => result,
            Err(err) => {
                // Timed-out write: logged and skipped.
                log::warn!("disk tier write for {} skipped: {}", key, err);
                self.stats.record_io_error();
                Err(err)
            }
        }
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let (reply_tx, reply_rx) = bounded(1);
        let request = DiskRequest::Get {
            key: key.to_owned(),
            reply: reply_tx,
        };
        match self.request(request, reply_rx, "get") {
            Ok(result) => result,
            Err(err) => {
                // Timed-out read: treated as a miss.
                log::warn!("disk tier read for {} failed open: {}", key, err);
                self.stats.record_io_error();
                self.stats.record_miss();
                None
            }
        }
    }

    fn invalidate(&self, key: &str) {
        let (reply_tx, reply_rx) = bounded(1);
        let request = DiskRequest::Invalidate {
            key: key.to_owned(),
            reply: reply_tx,
        };
        if let Err(err) = self.request(request, reply_rx, "invalidate") {
            log::warn!("disk tier invalidate for {} failed: {}", key, err);
            self.stats.record_io_error();
        }
    }

    fn stats(&self) -> TierStatistics {
        self.stats.snapshot()
    }

    fn clear(&self) {
        let (reply_tx, reply_rx) = bounded(1);
        if let Err(err) = self.request(DiskRequest::Clear { reply: reply_tx }, reply_rx, "clear") {
            log::warn!("disk tier clear failed: {}", err);
            self.stats.record_io_error();
        }
    }
}

impl Drop for DiskTier {
    fn drop(&mut self) {
        self.shutdown();
    }
}
