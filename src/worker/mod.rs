//! Worker pool and load-driven scaling
//!
//! The pool executes submitted jobs on named threads; the scaler
//! resizes it from the performance monitor's load signal, one decision
//! per control tick.

pub mod pool;
pub mod scaler;

pub use pool::{Job, WorkerPool};
pub use scaler::{PoolScaler, ScalerState, ScalingAction};
