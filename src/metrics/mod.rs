//! Per-update metrics logging
//!
//! The training loop hands every update's rewards and curiosity features to
//! a [`MetricsLogger`] and asks it to persist everything at the end of the
//! run. [`TemporalLogger`] keeps one record per update and writes them as
//! JSON.

use std::path::Path;

use anyhow::Result;
use tch::Tensor;

pub mod logger;

pub use logger::{MetricRecord, TemporalLogger};

/// Sink for per-update training metrics
pub trait MetricsLogger {
    /// Record one update
    ///
    /// # Arguments
    /// * `rewards` - Rewards collected during the rollout `[T, N]`
    /// * `features` - Curiosity features of the rollout's next states `[T*N, F]`
    fn log(&mut self, rewards: &Tensor, features: &Tensor) -> Result<()>;

    /// Persist everything recorded so far
    fn save(&mut self) -> Result<()>;

    /// Directory this run's artifacts are written to
    fn data_dir(&self) -> &Path;
}
