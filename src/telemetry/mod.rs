//! Resource sampling window, throttle state machine and reporting

pub mod monitor;
pub mod report;
pub mod types;

pub use monitor::PerformanceMonitor;
pub use report::PerformanceReport;
pub use types::{ResourceSample, RollingMetrics, ThrottleThresholds};
