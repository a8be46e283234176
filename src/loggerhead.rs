//! Public facade
//!
//! `Loggerhead` assembles the tiered cache, the performance monitor,
//! the worker pool, and (when a sampler is supplied) the background
//! control loop into one handle. Built through [`LoggerheadBuilder`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::cache::coordinator::TieredCache;
use crate::cache::stats::CombinedStats;
use crate::cache::tier::{CacheTier, DiskTier, MemoryTier};
use crate::config::CoreConfig;
use crate::error::CacheError;
use crate::runtime::{ControlLoop, ResourceSampler};
use crate::telemetry::{PerformanceMonitor, PerformanceReport, ResourceSample};
use crate::worker::{PoolScaler, WorkerPool};

/// Builder for [`Loggerhead`]. Starts from [`CoreConfig::default`];
/// each setter overrides one piece of the configuration.
pub struct LoggerheadBuilder {
    config: CoreConfig,
    sampler: Option<Box<dyn ResourceSampler>>,
}

impl Default for LoggerheadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerheadBuilder {
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
            sampler: None,
        }
    }

    /// Start from a configuration file (`.toml` or `.json`).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        Ok(Self {
            config: CoreConfig::from_file(path)?,
            sampler: None,
        })
    }

    /// Replace the entire configuration.
    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Directory backing the disk tier.
    pub fn cache_directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.disk_tier.directory = dir.as_ref().to_path_buf();
        self
    }

    /// Enable or disable the disk tier.
    pub fn disk_enabled(mut self, enabled: bool) -> Self {
        self.config.disk_tier.enabled = enabled;
        self
    }

    /// How writes are distributed across tiers.
    pub fn write_mode(mut self, mode: crate::config::WriteMode) -> Self {
        self.config.write_mode = mode;
        self
    }

    /// Memory-tier capacity in entries.
    pub fn memory_max_items(mut self, max_items: usize) -> Self {
        self.config.memory_tier.max_items = max_items;
        self
    }

    /// Resource sampler driving the background control loop. Without
    /// one, no control thread is spawned and samples are fed through
    /// [`Loggerhead::record_sample`].
    pub fn sampler<S: ResourceSampler>(mut self, sampler: S) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    /// Validate the configuration and assemble the runtime.
    pub fn build(self) -> Result<Loggerhead, CacheError> {
        self.config.validate()?;

        let memory = MemoryTier::new(&self.config.memory_tier);
        let overflow: Option<Box<dyn CacheTier>> = if self.config.disk_tier.enabled {
            Some(Box::new(DiskTier::open(&self.config.disk_tier)?))
        } else {
            None
        };
        let default_ttl = Duration::from_secs(self.config.memory_tier.ttl_seconds);
        let cache = TieredCache::new(memory, overflow, self.config.write_mode, default_ttl);

        let monitor = Arc::new(PerformanceMonitor::new(&self.config.monitor));
        let pool = Arc::new(WorkerPool::new(
            self.config.scaling.min_workers,
            self.config.scaling.queue_capacity,
        )?);

        let control = match self.sampler {
            Some(sampler) => {
                let scaler = PoolScaler::new(Arc::clone(&pool), self.config.scaling.clone());
                Some(ControlLoop::spawn(
                    sampler,
                    Arc::clone(&monitor),
                    scaler,
                    Duration::from_millis(self.config.monitor.tick_interval_ms),
                )?)
            }
            None => None,
        };

        info!(
            "loggerhead core started ({} workers, disk tier {})",
            pool.worker_count(),
            if self.config.disk_tier.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );

        Ok(Loggerhead {
            cache,
            monitor,
            pool,
            control,
            default_ttl,
            stopped: AtomicBool::new(false),
        })
    }
}

/// Assembled runtime handle. Cheap operations only; all I/O and
/// background work happens on owned named threads.
pub struct Loggerhead {
    cache: TieredCache,
    monitor: Arc<PerformanceMonitor>,
    pool: Arc<WorkerPool>,
    control: Option<ControlLoop>,
    default_ttl: Duration,
    stopped: AtomicBool,
}

impl Loggerhead {
    pub fn builder() -> LoggerheadBuilder {
        LoggerheadBuilder::new()
    }

    /// Tiered lookup with promotion on an overflow hit.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache.get(key)
    }

    /// Store with the configured default TTL.
    pub fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.put_with_ttl(key, value, self.default_ttl)
    }

    /// Store with an explicit TTL.
    pub fn put_with_ttl(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let result = self.cache.put(key, value, ttl);
        self.monitor.record_operation(result.is_ok());
        result
    }

    /// Remove a key from every tier.
    pub fn invalidate(&self, key: &str) {
        self.cache.invalidate(key);
    }

    /// Cached value, or run `loader` exactly once across concurrent
    /// callers and cache its result under the default TTL.
    pub fn get_or_load<F>(&self, key: &str, loader: F) -> Result<Vec<u8>, CacheError>
    where
        F: FnOnce() -> Result<Vec<u8>, CacheError>,
    {
        let result = self.cache.get_or_load(key, self.default_ttl, loader);
        self.monitor.record_operation(result.is_ok());
        result
    }

    /// Per-tier statistics snapshot.
    pub fn stats(&self) -> CombinedStats {
        self.cache.stats()
    }

    /// Drop every cached entry in every tier.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// True while the monitor holds the degraded state.
    pub fn should_throttle(&self) -> bool {
        self.monitor.should_throttle()
    }

    /// Current rolling aggregates, load signal, and recommendations.
    pub fn performance_report(&self) -> PerformanceReport {
        self.monitor.report()
    }

    /// Feed one resource measurement to the monitor. Used when no
    /// sampler-driven control loop is running.
    pub fn record_sample(&self, sample: ResourceSample) {
        self.monitor.record_sample(sample);
    }

    /// Count one pipeline operation toward the report's success rate.
    pub fn record_operation(&self, success: bool) {
        self.monitor.record_operation(success);
    }

    /// Live workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Enqueue background work; false when the queue is full.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.submit(Box::new(job))
    }

    /// Stop the control loop and retire the worker pool. Idempotent;
    /// the disk tier's I/O thread joins when the handle drops.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(control) = &self.control {
            control.shutdown();
        }
        self.pool.shutdown();
        info!("loggerhead core stopped");
    }
}

impl Drop for Loggerhead {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriteMode;

    #[test]
    fn memory_only_roundtrip_without_disk() {
        let core = LoggerheadBuilder::new()
            .disk_enabled(false)
            .write_mode(WriteMode::MemoryOnly)
            .build()
            .unwrap();
        core.put("k", b"v".to_vec()).unwrap();
        assert_eq!(core.get("k"), Some(b"v".to_vec()));
        core.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent_and_stops_workers() {
        let core = LoggerheadBuilder::new().disk_enabled(false).build().unwrap();
        assert!(core.worker_count() >= 2);
        core.shutdown();
        core.shutdown();
        assert_eq!(core.worker_count(), 0);
    }
}
