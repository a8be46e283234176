//! Performance report and recommendation rules
//!
//! Recommendations are plain-rule evaluations over the rolling
//! aggregates: each rule fires when an aggregate approaches or crosses
//! its configured ceiling.

use serde::Serialize;

use crate::telemetry::types::{RollingMetrics, ThrottleThresholds};

/// Share of a ceiling at which "approaching limit" rules fire.
const APPROACH_FACTOR: f64 = 0.9;
/// Failure share above which the failure-rate rule fires.
const FAILURE_RATE_LIMIT: f64 = 0.05;

/// Snapshot returned by [`PerformanceMonitor::report`].
///
/// [`PerformanceMonitor::report`]: crate::telemetry::PerformanceMonitor::report
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    /// Rolling aggregates over the current window
    pub metrics: RollingMetrics,
    /// Whether intake throttling is currently active
    pub throttling: bool,
    /// Normalized load score (worst aggregate relative to its ceiling)
    pub load_ratio: f64,
    /// Share of recorded operations that succeeded, 1.0 when none recorded
    pub success_rate: f64,
    /// Human-readable findings, empty when everything is healthy
    pub recommendations: Vec<String>,
}

impl PerformanceReport {
    /// Render as a JSON string for log sinks and dashboards.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Evaluate the recommendation rules against a metrics snapshot.
pub(crate) fn recommendations(
    metrics: &RollingMetrics,
    thresholds: &ThrottleThresholds,
    throttling: bool,
    success_rate: f64,
) -> Vec<String> {
    let mut findings = Vec::new();

    if throttling {
        findings.push(
            "throttling active: reduce intake until resource aggregates recover".to_string(),
        );
    }
    if metrics.avg_memory_mb > thresholds.max_memory_mb * APPROACH_FACTOR {
        findings.push(
            "memory usage approaching limit: reduce cache size or increase eviction aggressiveness"
                .to_string(),
        );
    }
    if metrics.avg_cpu_percent > thresholds.max_cpu_percent * APPROACH_FACTOR {
        findings.push("CPU usage approaching limit: consider reducing worker count".to_string());
    }
    if metrics.avg_disk_write_mbs > thresholds.max_disk_write_mbs * APPROACH_FACTOR {
        findings
            .push("disk write rate approaching limit: batch or defer disk writes".to_string());
    }
    if metrics.avg_network_mbs > thresholds.max_network_mbs * APPROACH_FACTOR {
        findings.push(
            "network send rate approaching limit: batch or compress outbound payloads".to_string(),
        );
    }
    if success_rate < 1.0 - FAILURE_RATE_LIMIT {
        findings.push(format!(
            "high operation failure rate: {:.1}%",
            (1.0 - success_rate) * 100.0
        ));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ThrottleThresholds {
        ThrottleThresholds {
            max_memory_mb: 100.0,
            max_cpu_percent: 80.0,
            max_disk_write_mbs: 50.0,
            max_network_mbs: 50.0,
        }
    }

    #[test]
    fn healthy_metrics_produce_no_findings() {
        let metrics = RollingMetrics {
            sample_count: 10,
            avg_memory_mb: 10.0,
            avg_cpu_percent: 10.0,
            avg_disk_write_mbs: 1.0,
            avg_network_mbs: 1.0,
            avg_throughput_ops: 100.0,
        };
        assert!(recommendations(&metrics, &thresholds(), false, 1.0).is_empty());
    }

    #[test]
    fn near_limit_memory_recommends_smaller_cache() {
        let metrics = RollingMetrics {
            sample_count: 10,
            avg_memory_mb: 95.0,
            ..Default::default()
        };
        let findings = recommendations(&metrics, &thresholds(), false, 1.0);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("memory usage approaching limit"));
    }

    #[test]
    fn failure_rate_rule_fires_above_five_percent() {
        let metrics = RollingMetrics::default();
        let findings = recommendations(&metrics, &thresholds(), false, 0.9);
        assert!(findings.iter().any(|f| f.contains("failure rate")));
    }

    #[test]
    fn report_serializes_to_json() {
        let report = PerformanceReport {
            metrics: RollingMetrics::default(),
            throttling: true,
            load_ratio: 1.25,
            success_rate: 1.0,
            recommendations: vec!["throttling active".to_string()],
        };
        let json = report.to_json();
        assert!(json.contains("\"throttling\":true"));
        assert!(json.contains("load_ratio"));
    }
}
