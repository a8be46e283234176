//! Background control loop
//!
//! One named thread owns the periodic work: sample resources, feed the
//! monitor, let the scaler act on the resulting load signal. Shutdown
//! is a channel send plus join, so the loop always observes a clean
//! stop between ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::debug;

use crate::error::CacheError;
use crate::telemetry::{PerformanceMonitor, ResourceSample};
use crate::worker::PoolScaler;

/// Source of resource measurements consumed once per tick.
///
/// Implementations typically read OS counters; tests substitute fixed
/// or scripted values.
pub trait ResourceSampler: Send + 'static {
    fn sample(&mut self) -> ResourceSample;
}

impl<F> ResourceSampler for F
where
    F: FnMut() -> ResourceSample + Send + 'static,
{
    fn sample(&mut self) -> ResourceSample {
        self()
    }
}

impl ResourceSampler for Box<dyn ResourceSampler> {
    fn sample(&mut self) -> ResourceSample {
        (**self).sample()
    }
}

/// Handle to the control thread. Dropping it stops the loop.
pub struct ControlLoop {
    shutdown_tx: Sender<()>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl ControlLoop {
    /// Spawn the control thread ticking at `tick_interval`.
    pub fn spawn<S: ResourceSampler>(
        mut sampler: S,
        monitor: Arc<PerformanceMonitor>,
        mut scaler: PoolScaler,
        tick_interval: Duration,
    ) -> Result<Self, CacheError> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let thread = std::thread::Builder::new()
            .name("loggerhead-control".to_string())
            .spawn(move || loop {
                match shutdown_rx.recv_timeout(tick_interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let sample = sampler.sample();
                        monitor.record_sample(sample);
                        scaler.tick(monitor.load_ratio());
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| CacheError::storage(format!("spawn control loop: {}", e)))?;

        Ok(Self {
            shutdown_tx,
            thread: Mutex::new(Some(thread)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Stop the loop and join the thread. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
            debug!("control loop stopped");
        }
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConfig, ScalingConfig};
    use crate::worker::WorkerPool;

    fn monitor(window: usize) -> Arc<PerformanceMonitor> {
        let config = MonitorConfig {
            metrics_window_size: window,
            ..Default::default()
        };
        Arc::new(PerformanceMonitor::new(&config))
    }

    #[test]
    fn loop_feeds_monitor_each_tick() {
        let monitor = monitor(16);
        let config = ScalingConfig::default();
        let pool = Arc::new(WorkerPool::new(config.min_workers, 16).unwrap());
        let scaler = PoolScaler::new(pool, config);
        let sampler = || ResourceSample::now(10.0, 10.0, 1.0, 1.0, 100.0);

        let control = ControlLoop::spawn(
            sampler,
            Arc::clone(&monitor),
            scaler,
            Duration::from_millis(10),
        )
        .unwrap();

        for _ in 0..100 {
            if monitor.rolling_metrics().sample_count >= 3 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        control.shutdown();
        assert!(monitor.rolling_metrics().sample_count >= 3);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let monitor = monitor(4);
        let config = ScalingConfig::default();
        let pool = Arc::new(WorkerPool::new(config.min_workers, 16).unwrap());
        let scaler = PoolScaler::new(pool, config);
        let control = ControlLoop::spawn(
            || ResourceSample::default(),
            monitor,
            scaler,
            Duration::from_millis(5),
        )
        .unwrap();
        control.shutdown();
        control.shutdown();
    }
}
