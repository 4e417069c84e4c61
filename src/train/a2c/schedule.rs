//! Per-update coefficient schedules
//!
//! The curiosity penalty is weighted by a scalar that changes once per
//! update. A schedule is a value, a rule for moving it, and a count of how
//! many times it has moved:
//!
//! - `Constant`: never changes
//! - `Exponential`: multiplies by `factor` each step, stopping at `bound`
//! - `Linear`: adds `delta` each step, stopping at `bound`
//!
//! Whether a rule decays or grows follows from its parameters (`factor < 1`
//! or `delta < 0` decay). The value never crosses `bound`, so every
//! schedule is monotone in its configured direction.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::error::CurioError;

/// How the coefficient moves on each step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum DecayRule {
    /// Fixed value
    Constant,

    /// `value <- value * factor`, clamped at `bound`
    Exponential {
        /// Multiplier applied each step (must be positive)
        factor: f64,
        /// Value the schedule stops at
        bound: f64,
    },

    /// `value <- value + delta`, clamped at `bound`
    Linear {
        /// Increment applied each step
        delta: f64,
        /// Value the schedule stops at
        bound: f64,
    },
}

/// Serializable description of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Value at update 0
    pub initial: f64,

    /// Rule applied after every update
    #[serde(flatten)]
    pub rule: DecayRule,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { initial: 1e-2, rule: DecayRule::Exponential { factor: 0.999, bound: 0.0 } }
    }
}

impl ScheduleConfig {
    /// Schedule that holds `value` forever
    pub fn constant(value: f64) -> Self {
        Self { initial: value, rule: DecayRule::Constant }
    }

    /// Schedule multiplying by `factor` each update until it reaches `bound`
    pub fn exponential(initial: f64, factor: f64, bound: f64) -> Self {
        Self { initial, rule: DecayRule::Exponential { factor, bound } }
    }

    /// Schedule adding `delta` each update until it reaches `bound`
    pub fn linear(initial: f64, delta: f64, bound: f64) -> Self {
        Self { initial, rule: DecayRule::Linear { delta, bound } }
    }

    /// Validate schedule parameters
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| CurioError::Config(format!("curiosity_coeff: {}", msg));

        ensure!(
            self.initial.is_finite(),
            invalid(format!("initial value {} is not finite", self.initial))
        );

        match self.rule {
            DecayRule::Constant => {}
            DecayRule::Exponential { factor, bound } => {
                ensure!(
                    factor.is_finite() && factor > 0.0,
                    invalid(format!("factor must be positive, got {}", factor))
                );
                ensure!(bound.is_finite(), invalid(format!("bound {} is not finite", bound)));
                let decays = factor < 1.0;
                ensure!(
                    (decays && self.initial >= bound) || (!decays && self.initial <= bound),
                    invalid(format!(
                        "initial value {} lies beyond bound {} for factor {}",
                        self.initial, bound, factor
                    ))
                );
            }
            DecayRule::Linear { delta, bound } => {
                ensure!(delta.is_finite(), invalid(format!("delta {} is not finite", delta)));
                ensure!(bound.is_finite(), invalid(format!("bound {} is not finite", bound)));
                let decays = delta < 0.0;
                ensure!(
                    (decays && self.initial >= bound) || (!decays && self.initial <= bound),
                    invalid(format!(
                        "initial value {} lies beyond bound {} for delta {}",
                        self.initial, bound, delta
                    ))
                );
            }
        }
        Ok(())
    }
}

/// A scalar that changes once per update
///
/// Read with [`value`](Self::value) while assembling the loss; advanced with
/// [`step`](Self::step) after the optimizer step.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSchedule {
    config: ScheduleConfig,
    value: f64,
    steps: usize,
}

impl CoefficientSchedule {
    /// Build a schedule, validating its parameters
    pub fn new(config: ScheduleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, value: config.initial, steps: 0 })
    }

    /// Current coefficient
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Number of times [`step`](Self::step) has been called
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Parameters the schedule was built from
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Advance by one update and return the new value
    pub fn step(&mut self) -> f64 {
        self.value = match self.config.rule {
            DecayRule::Constant => self.value,
            DecayRule::Exponential { factor, bound } => {
                let next = self.value * factor;
                if factor < 1.0 { next.max(bound) } else { next.min(bound) }
            }
            DecayRule::Linear { delta, bound } => {
                let next = self.value + delta;
                if delta < 0.0 { next.max(bound) } else { next.min(bound) }
            }
        };
        self.steps += 1;
        self.value
    }

    /// Return to the initial value
    pub fn reset(&mut self) {
        self.value = self.config.initial;
        self.steps = 0;
    }
}
