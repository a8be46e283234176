//! Configuration for the cache tiers, performance monitor and worker scaling

pub mod types;

pub use types::{
    CoreConfig, DiskTierConfig, MemoryTierConfig, MonitorConfig, ScalingConfig, WriteMode,
};
