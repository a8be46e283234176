//! Core configuration types and defaults
//!
//! Every value has a default; a `CoreConfig::default()` instance is valid
//! and usable without a configuration file. Files in TOML or JSON format
//! can override any section.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Write policy applied by the tiered coordinator on `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Write to both tiers (disk failures are fail-open).
    #[default]
    WriteThrough,
    /// Write to the memory tier only.
    MemoryOnly,
    /// Write to the disk tier only.
    DiskOnly,
}

/// In-memory LRU tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTierConfig {
    /// Byte budget in megabytes
    pub max_size_mb: u64,
    /// Maximum number of entries
    pub max_items: usize,
    /// Default time-to-live in seconds
    pub ttl_seconds: u64,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 100,
            max_items: 10_000,
            ttl_seconds: 300, // 5 minutes
        }
    }
}

/// Persistent disk tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskTierConfig {
    /// Whether the disk tier is constructed at all
    pub enabled: bool,
    /// Storage directory (one file per entry)
    pub directory: PathBuf,
    /// Byte budget in megabytes
    pub max_size_mb: u64,
    /// Default time-to-live in seconds
    pub ttl_seconds: u64,
    /// Upper bound on any single disk operation, in milliseconds.
    /// A timed-out read is a miss; a timed-out write is logged and skipped.
    pub io_timeout_ms: u64,
}

impl Default for DiskTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(".loggerhead-cache"),
            max_size_mb: 1024,   // 1 GB
            ttl_seconds: 86_400, // 1 day
            io_timeout_ms: 2_000,
        }
    }
}

/// Performance monitor configuration: sampling window and throttle thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Number of resource samples kept in the rolling window
    pub metrics_window_size: usize,
    /// Rolling memory aggregate above this throttles intake
    pub max_memory_mb: f64,
    /// Rolling CPU aggregate above this throttles intake
    pub max_cpu_percent: f64,
    /// Rolling disk write rate (MB/s) above this throttles intake
    pub max_disk_write_mbs: f64,
    /// Rolling network send rate (MB/s) above this throttles intake
    pub max_network_mbs: f64,
    /// Consecutive healthy samples required to leave the degraded state
    pub recovery_samples: u32,
    /// Control loop tick interval in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            metrics_window_size: 1_000,
            max_memory_mb: 1024.0, // 1 GB
            max_cpu_percent: 80.0,
            max_disk_write_mbs: 50.0,
            max_network_mbs: 50.0,
            recovery_samples: 3,
            tick_interval_ms: 1_000,
        }
    }
}

/// Worker pool scaling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    /// Lower bound on active workers
    pub min_workers: usize,
    /// Upper bound on active workers
    pub max_workers: usize,
    /// Load ratio at or above which a worker is added
    pub scale_up_threshold: f64,
    /// Load ratio at or below which a worker is retired
    pub scale_down_threshold: f64,
    /// Ticks after a scaling action during which no further action is taken
    pub cooldown_ticks: u32,
    /// Job queue capacity; a full queue drops the submitted job
    pub queue_capacity: usize,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            min_workers: 2,
            max_workers: 8,
            scale_up_threshold: 0.75,
            scale_down_threshold: 0.25,
            cooldown_ticks: 3,
            queue_capacity: 10_000,
        }
    }
}

/// Top-level configuration for the performance core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub memory_tier: MemoryTierConfig,
    pub disk_tier: DiskTierConfig,
    pub write_mode: WriteMode,
    pub monitor: MonitorConfig,
    pub scaling: ScalingConfig,
}

impl CoreConfig {
    /// Load configuration from a TOML or JSON file, selected by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CacheError::configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: CoreConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents)
                .map_err(|e| CacheError::configuration(format!("TOML parse error: {}", e)))?,
            Some("json") => serde_json::from_str(&contents)
                .map_err(|e| CacheError::configuration(format!("JSON parse error: {}", e)))?,
            other => {
                return Err(CacheError::configuration(format!(
                    "unsupported config format: {:?}",
                    other
                )));
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints. Called by the builder before any
    /// component is constructed.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.memory_tier.max_items == 0 {
            return Err(CacheError::configuration("memory_tier.max_items must be > 0"));
        }
        if self.memory_tier.max_size_mb == 0 {
            return Err(CacheError::configuration("memory_tier.max_size_mb must be > 0"));
        }
        if self.disk_tier.enabled {
            if self.disk_tier.max_size_mb == 0 {
                return Err(CacheError::configuration("disk_tier.max_size_mb must be > 0"));
            }
            if self.disk_tier.io_timeout_ms == 0 {
                return Err(CacheError::configuration("disk_tier.io_timeout_ms must be > 0"));
            }
        }
        if !self.disk_tier.enabled && self.write_mode == WriteMode::DiskOnly {
            return Err(CacheError::configuration(
                "write_mode is disk_only but the disk tier is disabled",
            ));
        }
        if self.monitor.metrics_window_size == 0 {
            return Err(CacheError::configuration(
                "monitor.metrics_window_size must be > 0",
            ));
        }
        if self.monitor.recovery_samples == 0 {
            return Err(CacheError::configuration("monitor.recovery_samples must be > 0"));
        }
        if self.monitor.tick_interval_ms == 0 {
            return Err(CacheError::configuration("monitor.tick_interval_ms must be > 0"));
        }
        if self.scaling.min_workers == 0 {
            return Err(CacheError::configuration("scaling.min_workers must be > 0"));
        }
        if self.scaling.min_workers > self.scaling.max_workers {
            return Err(CacheError::configuration(
                "scaling.min_workers must not exceed scaling.max_workers",
            ));
        }
        let up = self.scaling.scale_up_threshold;
        let down = self.scaling.scale_down_threshold;
        if !(0.0..=1.0).contains(&up) || !(0.0..=1.0).contains(&down) || down >= up {
            return Err(CacheError::configuration(
                "scaling thresholds must satisfy 0 <= scale_down < scale_up <= 1",
            ));
        }
        if self.scaling.queue_capacity == 0 {
            return Err(CacheError::configuration("scaling.queue_capacity must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::default();
        config.validate().expect("defaults must validate");
        assert_eq!(config.memory_tier.max_items, 10_000);
        assert_eq!(config.monitor.metrics_window_size, 1_000);
        assert_eq!(config.scaling.min_workers, 2);
        assert_eq!(config.scaling.max_workers, 8);
        assert_eq!(config.write_mode, WriteMode::WriteThrough);
    }

    #[test]
    fn rejects_inverted_worker_bounds() {
        let mut config = CoreConfig::default();
        config.scaling.min_workers = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_scaling_thresholds() {
        let mut config = CoreConfig::default();
        config.scaling.scale_down_threshold = 0.8;
        config.scaling.scale_up_threshold = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_disk_only_without_disk_tier() {
        let mut config = CoreConfig::default();
        config.disk_tier.enabled = false;
        config.write_mode = WriteMode::DiskOnly;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_toml_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("core.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(
            file,
            "[memory_tier]\nmax_items = 2\n\n[scaling]\nmax_workers = 4\n"
        )
        .expect("write");

        let config = CoreConfig::from_file(&path).expect("load");
        assert_eq!(config.memory_tier.max_items, 2);
        assert_eq!(config.scaling.max_workers, 4);
        // Untouched sections keep their defaults.
        assert_eq!(config.disk_tier.ttl_seconds, 86_400);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("core.yaml");
        std::fs::write(&path, "memory_tier: {}").expect("write");
        assert!(CoreConfig::from_file(&path).is_err());
    }
}
