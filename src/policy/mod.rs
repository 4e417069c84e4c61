//! Policy, value and curiosity networks
//!
//! The training loop only sees the two traits defined here. Any network
//! built with tch-rs can be trained by implementing them; [`mlp`] and
//! [`icm`] provide small reference implementations sharing one
//! `VarStore` (see [`MlpIcmNetworks`]).

use anyhow::Result;
use tch::{Device, Tensor};

pub mod icm;
pub mod mlp;

pub use icm::MlpCuriosity;
pub use mlp::{Activation, MlpActorCritic, MlpConfig, MlpIcmNetworks};

/// Output of one policy query for a batch of `N` stacked states
#[derive(Debug)]
pub struct AgentOutput {
    /// Sampled actions `[N]` (Int64)
    pub action: Tensor,

    /// Log probability of each sampled action `[N]`
    pub log_prob: Tensor,

    /// Policy entropy averaged over the batch (scalar)
    pub entropy: Tensor,

    /// State value estimates `[N]`
    pub value: Tensor,

    /// Feature embedding of the states `[N, feature_size]`
    pub feature: Tensor,
}

/// Actor-critic agent consumed by the training loop
///
/// Every tensor in [`AgentOutput`] must stay attached to the autograd graph
/// when called outside `tch::no_grad`, since the loss backpropagates through
/// them.
pub trait PolicyValueAgent {
    /// Sample actions for a batch of stacked states `[N, frames, H, W]`
    fn get_action(&self, states: &Tensor) -> AgentOutput;

    /// Clear recurrent state for environments whose episode just ended
    ///
    /// Feed-forward agents have nothing to reset.
    fn reset_recurrent_state(&mut self, _dones: &[bool]) {}

    /// Width of the feature embedding
    fn feature_size(&self) -> usize;

    /// Device the agent's parameters live on
    fn device(&self) -> Device;
}

/// Output of the curiosity module over a whole rollout
#[derive(Debug)]
pub struct CuriosityOutput {
    /// Encoded next states `φ(s_{t+1})` `[T*N, feature_size]`
    pub features: Tensor,

    /// Forward model predictions `φ̂(s_{t+1})` `[T*N, feature_size]`
    pub predicted_features: Tensor,

    /// Inverse model action logits `[T*N, num_actions]`
    pub predicted_action_logits: Tensor,
}

/// Intrinsic Curiosity Module consumed by the training loop
pub trait CuriosityModule {
    /// Run the encoder, forward and inverse models over a rollout
    ///
    /// # Arguments
    ///
    /// * `num_envs` - Number of environments `N`
    /// * `states` - All states, time-major `[(T+1)*N, frames, H, W]`
    /// * `actions` - Actions taken, time-major `[T*N]`
    fn forward(
        &self,
        num_envs: usize,
        states: &Tensor,
        actions: &Tensor,
    ) -> Result<CuriosityOutput>;

    /// Number of discrete actions the inverse model predicts
    fn num_actions(&self) -> usize;

    /// Width of the predicted features, which must match the agent's feature width
    fn feature_size(&self) -> usize;
}
