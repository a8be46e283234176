//! Loggerhead prelude - convenient imports for users
//!
//! Everything needed to configure, build, and operate the core.

// Re-export the public API
pub use crate::loggerhead::{Loggerhead, LoggerheadBuilder};

// Errors callers handle
pub use crate::error::CacheError;

// Configuration surface
pub use crate::config::{
    CoreConfig, DiskTierConfig, MemoryTierConfig, MonitorConfig, ScalingConfig, WriteMode,
};

// Telemetry types surfaced through reports and samplers
pub use crate::runtime::ResourceSampler;
pub use crate::telemetry::{PerformanceReport, ResourceSample, RollingMetrics};

// Per-tier statistics snapshots
pub use crate::cache::stats::{CombinedStats, TierStatistics};
