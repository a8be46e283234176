//! Cache entries and the on-disk record format
//!
//! Memory entries carry wall-clock expiry (epoch milliseconds) plus a
//! monotonic recency sequence used for LRU ordering. Disk entries are
//! persisted as bincode-encoded [`DiskRecord`]s guarded by a payload
//! length and an ahash-64 checksum; any verification failure on read is
//! treated as corruption and the record is purged.

use std::hash::Hasher;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ahash::AHasher;

use crate::error::CacheError;

/// Current wall-clock time as epoch milliseconds.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// ahash-64 over a byte payload, used as the record checksum and for
/// deriving entry file names.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = AHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// A single entry owned by the memory tier.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Opaque serialized payload
    pub payload: Vec<u8>,
    /// Payload size in bytes
    pub size_bytes: u64,
    /// Creation time, epoch milliseconds
    pub created_at_ms: u64,
    /// Expiry time, epoch milliseconds (`created_at_ms` + TTL)
    pub expires_at_ms: u64,
    /// Recency sequence assigned on insert and on every hit
    pub last_accessed: u64,
    /// Number of hits served by this entry
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn new(payload: Vec<u8>, ttl: Duration, recency: u64) -> Self {
        let created_at_ms = epoch_millis();
        let size_bytes = payload.len() as u64;
        Self {
            payload,
            size_bytes,
            created_at_ms,
            expires_at_ms: created_at_ms.saturating_add(ttl.as_millis() as u64),
            last_accessed: recency,
            hit_count: 0,
        }
    }

    /// True once the wall clock has passed the entry's expiry.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }
}

/// On-disk representation of a single cache entry.
#[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
pub struct DiskRecord {
    /// Original cache key; verified on read so file-name hash collisions
    /// surface as misses rather than wrong values
    pub key: String,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    pub payload_len: u64,
    pub checksum: u64,
    pub payload: Vec<u8>,
}

impl DiskRecord {
    pub fn new(key: &str, payload: Vec<u8>, ttl: Duration) -> Self {
        let created_at_ms = epoch_millis();
        Self {
            key: key.to_owned(),
            created_at_ms,
            expires_at_ms: created_at_ms.saturating_add(ttl.as_millis() as u64),
            payload_len: payload.len() as u64,
            checksum: hash_bytes(&payload),
            payload,
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }

    /// Serialize for storage.
    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CacheError::storage(format!("record encode failed: {}", e)))
    }

    /// Deserialize and verify payload length and checksum. Any failure
    /// means the stored bytes cannot be trusted.
    pub fn decode_verified(bytes: &[u8]) -> Result<Self, CacheError> {
        let (record, _len): (DiskRecord, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| CacheError::corruption(format!("record decode failed: {}", e)))?;

        if record.payload.len() as u64 != record.payload_len {
            return Err(CacheError::corruption(format!(
                "payload length mismatch: header {} vs actual {}",
                record.payload_len,
                record.payload.len()
            )));
        }
        if hash_bytes(&record.payload) != record.checksum {
            return Err(CacheError::corruption("payload checksum mismatch"));
        }
        Ok(record)
    }
}
