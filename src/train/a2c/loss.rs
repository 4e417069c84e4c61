//! Loss computation functions for A2C with curiosity
//!
//! The objective minimized each update is
//!
//! ```text
//! policy + value_coeff * value - entropy_coeff * entropy_sum
//!     + forward_coeff * forward + inverse_coeff * inverse
//!     - curiosity_coeff * penalty
//! ```
//!
//! `forward` and `penalty` measure the same prediction error with the
//! detach on opposite sides: `forward` trains the forward model toward the
//! agent's features, `penalty` pushes the agent's features toward states the
//! forward model cannot predict yet.

use tch::{Kind, Reduction, Tensor};

use super::config::TrainingConfig;
use crate::buffer::A2cTerms;
use crate::policy::CuriosityOutput;

/// Forward model loss `mse(φ̂, detach(φ_next))`
///
/// # Arguments
/// * `predicted_features` - Forward model predictions `[T*N, F]`
/// * `next_features` - Recorded next-state features `[T*N, F]`, used as a fixed target
pub fn forward_loss(predicted_features: &Tensor, next_features: &Tensor) -> Tensor {
    predicted_features.mse_loss(&next_features.detach(), Reduction::Mean)
}

/// Inverse model loss: cross-entropy of the predicted action logits
///
/// # Arguments
/// * `action_logits` - Inverse model logits `[T*N, num_actions]`
/// * `actions` - Actions actually taken, any shape with `T*N` elements
pub fn inverse_loss(action_logits: &Tensor, actions: &Tensor) -> Tensor {
    action_logits.cross_entropy_for_logits(&actions.view([-1]).to_kind(Kind::Int64))
}

/// Curiosity penalty `mse(φ_next, detach(φ̂))`
///
/// Only the producer of `next_features` receives gradient.
pub fn curiosity_penalty(next_features: &Tensor, predicted_features: &Tensor) -> Tensor {
    next_features.mse_loss(&predicted_features.detach(), Reduction::Mean)
}

/// A2C part of the objective: `policy + value_coeff * value - entropy_coeff * entropy`
pub fn a2c_objective(
    policy_loss: &Tensor,
    value_loss: &Tensor,
    entropy: &Tensor,
    value_coeff: f64,
    entropy_coeff: f64,
) -> Tensor {
    policy_loss + value_coeff * value_loss - entropy_coeff * entropy
}

/// Curiosity terms of one update
#[derive(Debug)]
pub struct CuriosityLoss {
    /// Forward model loss
    pub forward: Tensor,

    /// Inverse model loss
    pub inverse: Tensor,

    /// Prediction error with the prediction detached
    pub penalty: Tensor,
}

impl CuriosityLoss {
    /// Compute all curiosity terms
    ///
    /// # Arguments
    /// * `output` - Curiosity module output for the rollout
    /// * `next_features` - Agent features of the next states `[T*N, F]`
    /// * `actions` - Actions taken `[T*N]`
    pub fn new(output: &CuriosityOutput, next_features: &Tensor, actions: &Tensor) -> Self {
        Self {
            forward: forward_loss(&output.predicted_features, next_features),
            inverse: inverse_loss(&output.predicted_action_logits, actions),
            penalty: curiosity_penalty(next_features, &output.predicted_features),
        }
    }

    /// `forward_coeff * forward + inverse_coeff * inverse`
    pub fn icm_loss(&self, forward_coeff: f64, inverse_coeff: f64) -> Tensor {
        forward_coeff * &self.forward + inverse_coeff * &self.inverse
    }

    /// Per-update intrinsic reward diagnostic (the penalty's value)
    pub fn intrinsic_reward(&self) -> f64 {
        f64::try_from(&self.penalty).unwrap_or(0.0)
    }
}

/// Assemble the full objective for one update
///
/// # Arguments
/// * `a2c` - Policy and value terms from the rollout buffer
/// * `entropy_sum` - Policy entropy summed over the rollout steps
/// * `curiosity` - Curiosity terms
/// * `config` - Loss coefficients
/// * `curiosity_coeff` - Current value of the curiosity schedule
pub fn total_loss(
    a2c: &A2cTerms,
    entropy_sum: &Tensor,
    curiosity: &CuriosityLoss,
    config: &TrainingConfig,
    curiosity_coeff: f64,
) -> Tensor {
    a2c_objective(
        &a2c.policy_loss,
        &a2c.value_loss,
        entropy_sum,
        config.value_coeff,
        config.entropy_coeff,
    ) + curiosity.icm_loss(config.forward_loss_coeff, config.inverse_loss_coeff)
        - curiosity_coeff * &curiosity.penalty
}
