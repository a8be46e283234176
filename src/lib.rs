//! Loggerhead - performance core for high-throughput logging pipelines
//!
//! A two-tier cache (in-memory LRU + TTL over a persistent disk tier)
//! coordinated with write-through and promotion, a sliding-window
//! performance monitor with hysteresis-based throttling, and a
//! load-scaled worker pool driven by one background control loop.
//!
//! # Features
//!
//! - **Tiered caching**: memory tier first, disk tier behind it, with
//!   promotion on overflow hits and configurable write modes
//! - **Fail-open storage**: disk corruption, I/O errors, and timeouts
//!   degrade to cache misses instead of surfacing to callers
//! - **Single-flight loads**: concurrent misses for one key run the
//!   loader exactly once
//! - **Adaptive throttling**: rolling resource aggregates with a
//!   degraded-state hysteresis before intake recovers
//! - **Worker scaling**: bounded pool resized per control tick within
//!   configured limits and a cooldown

// Public API modules
pub mod loggerhead;
pub mod prelude;

pub mod cache;
pub mod config;
pub mod error;
pub mod runtime;
pub mod telemetry;
pub mod worker;

// Re-export the public API at the crate root for convenience
pub use config::{CoreConfig, WriteMode};
pub use error::CacheError;
pub use loggerhead::{Loggerhead, LoggerheadBuilder};
pub use prelude::*;
