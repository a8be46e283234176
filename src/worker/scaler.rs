//! Load-driven pool scaling
//!
//! One scaling decision per control tick, bounded by the configured
//! worker range, with a cooldown after every action so the pool does
//! not oscillate on a noisy load signal.

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::config::ScalingConfig;
use crate::worker::pool::WorkerPool;

/// Action taken by one scaler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalingAction {
    None,
    ScaledUp,
    ScaledDown,
}

/// Scaler state snapshot for telemetry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScalerState {
    pub workers: usize,
    pub cooldown_remaining: u32,
    pub last_action: ScalingAction,
}

/// Adjusts pool size from the monitor's normalized load signal.
pub struct PoolScaler {
    pool: Arc<WorkerPool>,
    config: ScalingConfig,
    cooldown_remaining: u32,
    last_action: ScalingAction,
}

impl PoolScaler {
    pub fn new(pool: Arc<WorkerPool>, config: ScalingConfig) -> Self {
        Self {
            pool,
            config,
            cooldown_remaining: 0,
            last_action: ScalingAction::None,
        }
    }

    /// Evaluate one control tick against the current load ratio.
    pub fn tick(&mut self, load_ratio: f64) -> ScalingAction {
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            self.last_action = ScalingAction::None;
            return ScalingAction::None;
        }

        let workers = self.pool.worker_count();
        let action = if load_ratio >= self.config.scale_up_threshold
            && workers < self.config.max_workers
        {
            match self.pool.spawn_worker() {
                Ok(()) => {
                    info!(
                        "scaled up to {} workers (load {:.2})",
                        self.pool.worker_count(),
                        load_ratio
                    );
                    ScalingAction::ScaledUp
                }
                Err(e) => {
                    warn!("scale up failed: {}", e);
                    ScalingAction::None
                }
            }
        } else if load_ratio <= self.config.scale_down_threshold
            && workers > self.config.min_workers
        {
            self.pool.scale_down();
            info!(
                "scaled down to {} workers (load {:.2})",
                self.pool.worker_count(),
                load_ratio
            );
            ScalingAction::ScaledDown
        } else {
            ScalingAction::None
        };

        if action != ScalingAction::None {
            self.cooldown_remaining = self.config.cooldown_ticks;
        }
        self.last_action = action;
        action
    }

    pub fn state(&self) -> ScalerState {
        ScalerState {
            workers: self.pool.worker_count(),
            cooldown_remaining: self.cooldown_remaining,
            last_action: self.last_action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScalingConfig {
        ScalingConfig {
            min_workers: 2,
            max_workers: 4,
            scale_up_threshold: 0.75,
            scale_down_threshold: 0.25,
            cooldown_ticks: 2,
            queue_capacity: 16,
        }
    }

    fn scaler() -> PoolScaler {
        let cfg = config();
        let pool = Arc::new(WorkerPool::new(cfg.min_workers, cfg.queue_capacity).unwrap());
        PoolScaler::new(pool, cfg)
    }

    #[test]
    fn high_load_adds_worker_up_to_max() {
        let mut scaler = scaler();
        assert_eq!(scaler.tick(0.9), ScalingAction::ScaledUp);
        assert_eq!(scaler.state().workers, 3);
        // Cooldown swallows the next two ticks.
        assert_eq!(scaler.tick(0.9), ScalingAction::None);
        assert_eq!(scaler.tick(0.9), ScalingAction::None);
        assert_eq!(scaler.tick(0.9), ScalingAction::ScaledUp);
        assert_eq!(scaler.state().workers, 4);
        // At max, high load produces no action and no cooldown.
        assert_eq!(scaler.tick(0.9), ScalingAction::None);
        assert_eq!(scaler.tick(0.9), ScalingAction::None);
        assert_eq!(scaler.state().workers, 4);
    }

    #[test]
    fn low_load_retires_worker_down_to_min() {
        let mut scaler = scaler();
        scaler.tick(0.9);
        scaler.tick(0.1);
        scaler.tick(0.1);
        assert_eq!(scaler.state().workers, 3);
        assert_eq!(scaler.tick(0.1), ScalingAction::ScaledDown);
        assert_eq!(scaler.state().workers, 2);
        // Wait out cooldown, then verify the floor holds.
        scaler.tick(0.1);
        scaler.tick(0.1);
        assert_eq!(scaler.tick(0.1), ScalingAction::None);
        assert_eq!(scaler.state().workers, 2);
    }

    #[test]
    fn moderate_load_leaves_pool_alone() {
        let mut scaler = scaler();
        assert_eq!(scaler.tick(0.5), ScalingAction::None);
        assert_eq!(scaler.tick(0.5), ScalingAction::None);
        assert_eq!(scaler.state().workers, 2);
        assert_eq!(scaler.state().cooldown_remaining, 0);
    }
}
