//! Error taxonomy for cache, telemetry and worker operations
//!
//! The only error a cache caller ever sees is [`CacheError::Capacity`]
//! (a single value too large to ever be admitted). Storage, corruption
//! and timeout failures are absorbed by the owning tier: logged, counted
//! in tier statistics, and surfaced through the performance report.

/// Error type shared across the cache tiers, coordinator and runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheError {
    /// A single value exceeds the tier's byte budget and can never be
    /// admitted, regardless of eviction.
    Capacity { size_bytes: u64, limit_bytes: u64 },
    /// Disk or channel I/O failure. Fail-open for cache callers.
    Storage(String),
    /// A stored entry failed length or checksum verification on read.
    /// The entry is purged and the read treated as a miss.
    Corruption(String),
    /// A disk operation exceeded its configured time bound.
    Timeout(String),
    /// Invalid configuration value or unparseable configuration file.
    Configuration(String),
    /// The component has shut down and no longer accepts work.
    Shutdown,
}

impl CacheError {
    /// Create a storage error
    #[inline]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a corruption error
    #[inline]
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create a timeout error
    #[inline]
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    #[inline]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// True for failures the coordinator absorbs instead of raising
    /// (everything except `Capacity` and `Configuration`).
    pub fn is_fail_open(&self) -> bool {
        matches!(
            self,
            CacheError::Storage(_)
                | CacheError::Corruption(_)
                | CacheError::Timeout(_)
                | CacheError::Shutdown
        )
    }
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Capacity {
                size_bytes,
                limit_bytes,
            } => write!(
                f,
                "value of {} bytes exceeds tier capacity of {} bytes",
                size_bytes, limit_bytes
            ),
            CacheError::Storage(msg) => write!(f, "storage error: {}", msg),
            CacheError::Corruption(msg) => write!(f, "corrupt cache entry: {}", msg),
            CacheError::Timeout(msg) => write!(f, "operation timed out: {}", msg),
            CacheError::Configuration(msg) => write!(f, "invalid configuration: {}", msg),
            CacheError::Shutdown => write!(f, "component is shut down"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_not_fail_open() {
        let err = CacheError::Capacity {
            size_bytes: 10,
            limit_bytes: 5,
        };
        assert!(!err.is_fail_open());
        assert!(err.to_string().contains("10 bytes"));
    }

    #[test]
    fn io_errors_convert_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CacheError = io.into();
        assert!(err.is_fail_open());
        assert!(matches!(err, CacheError::Storage(_)));
    }
}
