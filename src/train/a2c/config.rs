//! Training configuration and hyperparameters
//!
//! This module defines the configuration parameters for A2C + curiosity
//! training and provides validation, builder methods and JSON persistence.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use super::schedule::ScheduleConfig;
use crate::error::CurioError;

/// Training configuration parameters
///
/// Built once before training and only read afterwards. Default values
/// describe a small run that trains quickly on the bundled toy environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Environment name, used for the log directory
    pub env_name: String,

    /// Number of updates (rollout + optimizer step) to run
    pub num_updates: usize,

    /// Steps per environment in each rollout (`T`)
    pub rollout_size: usize,

    /// Number of parallel environments (`N`)
    pub num_envs: usize,

    /// Frames per stacked observation
    pub frame_stack_depth: usize,

    /// Discount factor (gamma)
    pub discount_factor: f64,

    /// Value loss coefficient
    pub value_coeff: f64,

    /// Entropy bonus coefficient
    pub entropy_coeff: f64,

    /// Maximum global gradient norm
    pub max_grad_norm: f64,

    /// Schedule weighting the curiosity penalty
    pub curiosity_coeff: ScheduleConfig,

    /// Forward model loss coefficient
    pub forward_loss_coeff: f64,

    /// Inverse model loss coefficient
    pub inverse_loss_coeff: f64,

    /// Learning rate for the shared optimizer
    pub learning_rate: f64,

    /// Updates between progress reports
    pub log_interval: usize,

    /// Seed for the global tch RNG, applied by `Runner::new` before the first rollout
    ///
    /// Networks are usually built before the runner, so seed with
    /// `tch::manual_seed(config.seed)` before construction as well for a
    /// reproducible initialization.
    pub seed: i64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            env_name: "TwoArmedBandit".to_string(),
            num_updates: 2500,
            rollout_size: 5,
            num_envs: 4,
            frame_stack_depth: 4,
            discount_factor: 0.99,
            value_coeff: 0.5,
            entropy_coeff: 0.02,
            max_grad_norm: 0.5,
            curiosity_coeff: ScheduleConfig::default(),
            forward_loss_coeff: 1.0,
            inverse_loss_coeff: 1.0,
            learning_rate: 7e-4,
            log_interval: 100,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    ///
    /// Failures are [`CurioError::Config`] wrapped in `anyhow::Error`.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| -> Result<()> { Err(anyhow!(CurioError::Config(msg.to_string()))) };
        // Both reject NaN
        let non_negative = |x: f64| x.is_finite() && x >= 0.0;
        let positive = |x: f64| x.is_finite() && x > 0.0;

        if self.env_name.is_empty() {
            return fail("env_name must not be empty");
        }
        if self.num_updates == 0 {
            return fail("num_updates must be positive");
        }
        if self.rollout_size == 0 {
            return fail("rollout_size must be positive");
        }
        if self.num_envs == 0 {
            return fail("num_envs must be positive");
        }
        if self.frame_stack_depth == 0 {
            return fail("frame_stack_depth must be positive");
        }
        if !(0.0..=1.0).contains(&self.discount_factor) {
            return fail("discount_factor must be in [0, 1]");
        }
        if !non_negative(self.value_coeff) {
            return fail("value_coeff must be finite and non-negative");
        }
        if !non_negative(self.entropy_coeff) {
            return fail("entropy_coeff must be finite and non-negative");
        }
        if !positive(self.max_grad_norm) {
            return fail("max_grad_norm must be finite and positive");
        }
        if !non_negative(self.forward_loss_coeff) {
            return fail("forward_loss_coeff must be finite and non-negative");
        }
        if !non_negative(self.inverse_loss_coeff) {
            return fail("inverse_loss_coeff must be finite and non-negative");
        }
        if !positive(self.learning_rate) {
            return fail("learning_rate must be finite and positive");
        }
        if self.log_interval == 0 {
            return fail("log_interval must be positive");
        }
        self.curiosity_coeff.validate()
    }

    /// Write the configuration as JSON to `<dir>/config_<timestamp>.json`
    ///
    /// Returns the path written.
    pub fn save(&self, dir: impl AsRef<Path>, timestamp: &str) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;

        let path = dir.join(format!("config_{}.json", timestamp));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Read a configuration previously written by [`save`](Self::save)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set environment name
    pub fn env_name(mut self, name: impl Into<String>) -> Self {
        self.env_name = name.into();
        self
    }

    /// Set number of updates
    pub fn num_updates(mut self, updates: usize) -> Self {
        self.num_updates = updates;
        self
    }

    /// Set rollout length
    pub fn rollout_size(mut self, size: usize) -> Self {
        self.rollout_size = size;
        self
    }

    /// Set number of parallel environments
    pub fn num_envs(mut self, n: usize) -> Self {
        self.num_envs = n;
        self
    }

    /// Set frame stack depth
    pub fn frame_stack_depth(mut self, depth: usize) -> Self {
        self.frame_stack_depth = depth;
        self
    }

    /// Set discount factor
    pub fn discount_factor(mut self, gamma: f64) -> Self {
        self.discount_factor = gamma;
        self
    }

    /// Set value loss coefficient
    pub fn value_coeff(mut self, coeff: f64) -> Self {
        self.value_coeff = coeff;
        self
    }

    /// Set entropy bonus coefficient
    pub fn entropy_coeff(mut self, coeff: f64) -> Self {
        self.entropy_coeff = coeff;
        self
    }

    /// Set maximum gradient norm
    pub fn max_grad_norm(mut self, norm: f64) -> Self {
        self.max_grad_norm = norm;
        self
    }

    /// Set curiosity penalty schedule
    pub fn curiosity_coeff(mut self, schedule: ScheduleConfig) -> Self {
        self.curiosity_coeff = schedule;
        self
    }

    /// Set forward model loss coefficient
    pub fn forward_loss_coeff(mut self, coeff: f64) -> Self {
        self.forward_loss_coeff = coeff;
        self
    }

    /// Set inverse model loss coefficient
    pub fn inverse_loss_coeff(mut self, coeff: f64) -> Self {
        self.inverse_loss_coeff = coeff;
        self
    }

    /// Set learning rate
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set progress report interval
    pub fn log_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval;
        self
    }

    /// Set random seed
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }
}
