//! Telemetry data types
//!
//! Samples are produced by an external resource-sampling collaborator
//! (OS counters); the monitor only consumes already-measured values.

use serde::{Deserialize, Serialize};

use crate::cache::entry::epoch_millis;
use crate::config::MonitorConfig;

/// One measurement of system resource usage. Immutable once recorded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceSample {
    /// Measurement time, epoch milliseconds
    pub timestamp_ms: u64,
    /// Resident memory in megabytes
    pub memory_mb: f64,
    /// Process CPU usage, 0..100 per core convention of the sampler
    pub cpu_percent: f64,
    /// Disk write rate in MB/s
    pub disk_write_mbs: f64,
    /// Network send rate in MB/s
    pub network_mbs: f64,
    /// Operations processed per second
    pub throughput_ops: f64,
}

impl ResourceSample {
    /// Convenience constructor stamping the current wall clock.
    pub fn now(
        memory_mb: f64,
        cpu_percent: f64,
        disk_write_mbs: f64,
        network_mbs: f64,
        throughput_ops: f64,
    ) -> Self {
        Self {
            timestamp_ms: epoch_millis(),
            memory_mb,
            cpu_percent,
            disk_write_mbs,
            network_mbs,
            throughput_ops,
        }
    }
}

/// Resource ceilings above which intake is throttled. Immutable after
/// configuration load.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThrottleThresholds {
    pub max_memory_mb: f64,
    pub max_cpu_percent: f64,
    pub max_disk_write_mbs: f64,
    pub max_network_mbs: f64,
}

impl ThrottleThresholds {
    /// True when a single sample exceeds any ceiling.
    pub fn sample_breaches(&self, sample: &ResourceSample) -> bool {
        sample.memory_mb > self.max_memory_mb
            || sample.cpu_percent > self.max_cpu_percent
            || sample.disk_write_mbs > self.max_disk_write_mbs
            || sample.network_mbs > self.max_network_mbs
    }
}

impl From<&MonitorConfig> for ThrottleThresholds {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            max_memory_mb: config.max_memory_mb,
            max_cpu_percent: config.max_cpu_percent,
            max_disk_write_mbs: config.max_disk_write_mbs,
            max_network_mbs: config.max_network_mbs,
        }
    }
}

/// Simple moving averages over the current sample window.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RollingMetrics {
    pub sample_count: usize,
    pub avg_memory_mb: f64,
    pub avg_cpu_percent: f64,
    pub avg_disk_write_mbs: f64,
    pub avg_network_mbs: f64,
    pub avg_throughput_ops: f64,
}

impl RollingMetrics {
    /// Normalized load: the worst aggregate relative to its threshold.
    /// 0.0 with an empty window; may exceed 1.0 under overload.
    pub fn load_ratio(&self, thresholds: &ThrottleThresholds) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        let ratios = [
            self.avg_memory_mb / thresholds.max_memory_mb,
            self.avg_cpu_percent / thresholds.max_cpu_percent,
            self.avg_disk_write_mbs / thresholds.max_disk_write_mbs,
            self.avg_network_mbs / thresholds.max_network_mbs,
        ];
        ratios.into_iter().fold(0.0f64, f64::max).max(0.0)
    }

    /// True when any aggregate exceeds its threshold.
    pub fn breaches(&self, thresholds: &ThrottleThresholds) -> bool {
        self.avg_memory_mb > thresholds.max_memory_mb
            || self.avg_cpu_percent > thresholds.max_cpu_percent
            || self.avg_disk_write_mbs > thresholds.max_disk_write_mbs
            || self.avg_network_mbs > thresholds.max_network_mbs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ThrottleThresholds {
        ThrottleThresholds {
            max_memory_mb: 1000.0,
            max_cpu_percent: 80.0,
            max_disk_write_mbs: 50.0,
            max_network_mbs: 50.0,
        }
    }

    #[test]
    fn load_ratio_tracks_worst_dimension() {
        let metrics = RollingMetrics {
            sample_count: 10,
            avg_memory_mb: 500.0,  // 0.5
            avg_cpu_percent: 60.0, // 0.75, the worst dimension
            avg_disk_write_mbs: 5.0,
            avg_network_mbs: 5.0,
            avg_throughput_ops: 0.0,
        };
        assert!((metrics.load_ratio(&thresholds()) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn empty_window_has_zero_load() {
        let metrics = RollingMetrics::default();
        assert_eq!(metrics.load_ratio(&thresholds()), 0.0);
        assert!(!metrics.breaches(&thresholds()));
    }
}
