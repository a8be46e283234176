//! Performance monitor: sliding-window sampler and throttle state machine
//!
//! Two states: Sampling (normal) and Degraded (throttling active). The
//! monitor enters Degraded as soon as any rolling aggregate exceeds its
//! threshold, and leaves only after a configured number of consecutive
//! healthy samples, hysteresis that keeps transient spikes from
//! flapping the throttle.
//!
//! The ring buffer and aggregates are mutated only under the state lock
//! (by the control loop in normal operation); `should_throttle` reads a
//! padded atomic so hot callers never contend on that lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crossbeam_utils::CachePadded;

use crate::config::MonitorConfig;
use crate::telemetry::report::{recommendations, PerformanceReport};
use crate::telemetry::types::{ResourceSample, RollingMetrics, ThrottleThresholds};

#[derive(Debug)]
struct MonitorState {
    /// Fixed-capacity ring of the most recent samples
    window: Vec<ResourceSample>,
    /// Next slot to overwrite once the ring is full
    next_slot: usize,
    /// Running sums over the window, maintained incrementally
    sum_memory_mb: f64,
    sum_cpu_percent: f64,
    sum_disk_write_mbs: f64,
    sum_network_mbs: f64,
    sum_throughput_ops: f64,
    degraded: bool,
    healthy_streak: u32,
}

/// Sliding-window resource monitor producing throttle decisions,
/// a normalized load signal, and performance reports.
pub struct PerformanceMonitor {
    thresholds: ThrottleThresholds,
    window_size: usize,
    recovery_samples: u32,
    state: Mutex<MonitorState>,
    throttling: CachePadded<AtomicBool>,
    /// Pipeline operation counters feeding the report's success rate
    ops_total: CachePadded<AtomicU64>,
    ops_failed: CachePadded<AtomicU64>,
}

impl PerformanceMonitor {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            thresholds: ThrottleThresholds::from(config),
            window_size: config.metrics_window_size,
            recovery_samples: config.recovery_samples,
            state: Mutex::new(MonitorState {
                window: Vec::with_capacity(config.metrics_window_size),
                next_slot: 0,
                sum_memory_mb: 0.0,
                sum_cpu_percent: 0.0,
                sum_disk_write_mbs: 0.0,
                sum_network_mbs: 0.0,
                sum_throughput_ops: 0.0,
                degraded: false,
                healthy_streak: 0,
            }),
            throttling: CachePadded::new(AtomicBool::new(false)),
            ops_total: CachePadded::new(AtomicU64::new(0)),
            ops_failed: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Append a sample (overwriting the oldest when the window is full),
    /// recompute the rolling aggregates, and run the state transition.
    pub fn record_sample(&self, sample: ResourceSample) {
        let mut state = self.lock();

        if state.window.len() < self.window_size {
            state.window.push(sample);
        } else {
            let slot = state.next_slot;
            let old = state.window[slot];
            state.sum_memory_mb -= old.memory_mb;
            state.sum_cpu_percent -= old.cpu_percent;
            state.sum_disk_write_mbs -= old.disk_write_mbs;
            state.sum_network_mbs -= old.network_mbs;
            state.sum_throughput_ops -= old.throughput_ops;
            state.window[slot] = sample;
            state.next_slot = (slot + 1) % self.window_size;
        }
        state.sum_memory_mb += sample.memory_mb;
        state.sum_cpu_percent += sample.cpu_percent;
        state.sum_disk_write_mbs += sample.disk_write_mbs;
        state.sum_network_mbs += sample.network_mbs;
        state.sum_throughput_ops += sample.throughput_ops;

        let metrics = Self::metrics_of(&state);
        let breached = metrics.breaches(&self.thresholds);

        if !state.degraded {
            if breached {
                state.degraded = true;
                state.healthy_streak = 0;
                log::warn!(
                    "entering degraded state: load ratio {:.2}",
                    metrics.load_ratio(&self.thresholds)
                );
            }
        } else {
            // The streak counts consecutive healthy samples; leaving the
            // degraded state additionally requires the aggregates to have
            // cleared, so a lingering spike in the window keeps throttling.
            if self.thresholds.sample_breaches(&sample) {
                state.healthy_streak = 0;
            } else {
                state.healthy_streak += 1;
            }
            if state.healthy_streak >= self.recovery_samples && !breached {
                state.degraded = false;
                state.healthy_streak = 0;
                log::info!(
                    "leaving degraded state after {} healthy samples",
                    self.recovery_samples
                );
            }
        }

        self.throttling.store(state.degraded, Ordering::Relaxed);
    }

    /// Count one pipeline operation for the report's success rate.
    pub fn record_operation(&self, success: bool) {
        self.ops_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.ops_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// True iff the monitor is in the Degraded state.
    pub fn should_throttle(&self) -> bool {
        self.throttling.load(Ordering::Relaxed)
    }

    /// Consistent snapshot of the rolling aggregates.
    pub fn rolling_metrics(&self) -> RollingMetrics {
        Self::metrics_of(&self.lock())
    }

    /// Normalized load score derived from the rolling aggregates:
    /// the worst dimension relative to its threshold.
    pub fn load_ratio(&self) -> f64 {
        self.rolling_metrics().load_ratio(&self.thresholds)
    }

    pub fn thresholds(&self) -> &ThrottleThresholds {
        &self.thresholds
    }

    /// Rolling aggregates plus rule-derived recommendations.
    pub fn report(&self) -> PerformanceReport {
        let metrics = self.rolling_metrics();
        let throttling = self.should_throttle();
        let total = self.ops_total.load(Ordering::Relaxed);
        let failed = self.ops_failed.load(Ordering::Relaxed);
        // The two counters are incremented separately, so a concurrent
        // reader may briefly see failed ahead of total.
        let success_rate = if total > 0 {
            total.saturating_sub(failed) as f64 / total as f64
        } else {
            1.0
        };

        PerformanceReport {
            throttling,
            load_ratio: metrics.load_ratio(&self.thresholds),
            success_rate,
            recommendations: recommendations(
                &metrics,
                &self.thresholds,
                throttling,
                success_rate,
            ),
            metrics,
        }
    }

    fn metrics_of(state: &MonitorState) -> RollingMetrics {
        let count = state.window.len();
        if count == 0 {
            return RollingMetrics::default();
        }
        let n = count as f64;
        RollingMetrics {
            sample_count: count,
            avg_memory_mb: state.sum_memory_mb / n,
            avg_cpu_percent: state.sum_cpu_percent / n,
            avg_disk_write_mbs: state.sum_disk_write_mbs / n,
            avg_network_mbs: state.sum_network_mbs / n,
            avg_throughput_ops: state.sum_throughput_ops / n,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(window: usize, recovery: u32) -> PerformanceMonitor {
        PerformanceMonitor::new(&MonitorConfig {
            metrics_window_size: window,
            max_memory_mb: 100.0,
            max_cpu_percent: 80.0,
            max_disk_write_mbs: 50.0,
            max_network_mbs: 50.0,
            recovery_samples: recovery,
            tick_interval_ms: 1_000,
        })
    }

    fn sample(memory_mb: f64) -> ResourceSample {
        ResourceSample::now(memory_mb, 10.0, 1.0, 1.0, 100.0)
    }

    #[test]
    fn throttles_on_breach_and_recovers_with_hysteresis() {
        let monitor = monitor(3, 3);
        assert!(!monitor.should_throttle());

        for _ in 0..3 {
            monitor.record_sample(sample(200.0));
        }
        assert!(monitor.should_throttle(), "window average over threshold");

        // Healthy samples below threshold; the window average drops
        // immediately but recovery requires three consecutive samples.
        monitor.record_sample(sample(1.0));
        monitor.record_sample(sample(1.0));
        assert!(monitor.should_throttle(), "hysteresis still holding");
        monitor.record_sample(sample(1.0));
        assert!(!monitor.should_throttle(), "recovered after three samples");
    }

    #[test]
    fn breach_during_recovery_resets_the_streak() {
        let monitor = monitor(1, 3);
        monitor.record_sample(sample(200.0));
        assert!(monitor.should_throttle());

        monitor.record_sample(sample(1.0));
        monitor.record_sample(sample(1.0));
        monitor.record_sample(sample(200.0)); // relapse
        monitor.record_sample(sample(1.0));
        monitor.record_sample(sample(1.0));
        assert!(monitor.should_throttle(), "streak was reset by the relapse");
        monitor.record_sample(sample(1.0));
        assert!(!monitor.should_throttle());
    }

    #[test]
    fn ring_overwrites_oldest_sample() {
        let monitor = monitor(3, 1);
        monitor.record_sample(sample(90.0));
        monitor.record_sample(sample(30.0));
        monitor.record_sample(sample(30.0));
        monitor.record_sample(sample(30.0)); // evicts the 90.0 sample

        let metrics = monitor.rolling_metrics();
        assert_eq!(metrics.sample_count, 3);
        assert!((metrics.avg_memory_mb - 30.0).abs() < 1e-9);
    }

    #[test]
    fn load_ratio_follows_worst_aggregate() {
        let monitor = monitor(4, 1);
        monitor.record_sample(sample(50.0)); // memory at 50% of its cap
        assert!((monitor.load_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn report_counts_operation_success_rate() {
        let monitor = monitor(4, 1);
        for _ in 0..19 {
            monitor.record_operation(true);
        }
        monitor.record_operation(false);
        let report = monitor.report();
        assert!((report.success_rate - 0.95).abs() < 1e-9);
    }

    #[test]
    fn all_failed_operations_floor_at_zero_success() {
        let monitor = monitor(4, 1);
        for _ in 0..5 {
            monitor.record_operation(false);
        }
        let report = monitor.report();
        assert_eq!(report.success_rate, 0.0);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("failure rate")));
    }
}
