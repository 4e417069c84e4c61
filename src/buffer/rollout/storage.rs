//! Rollout buffer storage and data management
//!
//! This module handles the core storage functionality for rollout buffers,
//! including data insertion, retrieval, loss-term computation and the
//! between-update reset.

use anyhow::{ensure, Result};
use tch::{Device, Kind, Tensor};

use super::advantage::{a2c_policy_loss, a2c_value_loss, compute_returns};
use super::episode::{EpisodeRewardTracker, RewardStats};
use crate::env::VecStepResult;
use crate::error::{check_shape, CurioError};
use crate::train::TrainingConfig;

/// Loss terms and diagnostics produced from one complete rollout
#[derive(Debug)]
pub struct A2cTerms {
    /// `-mean(log_prob * detach(A))`, carries gradient to the actor
    pub policy_loss: Tensor,

    /// `mean(A²)`, carries gradient to the critic
    pub value_loss: Tensor,

    /// Rewards collected during the rollout `[num_steps, num_envs]`
    pub rewards: Tensor,

    /// Bootstrapped discounted returns `[num_steps, num_envs]`
    pub returns: Tensor,

    /// Detached advantages `[num_steps, num_envs]`
    pub advantages: Tensor,
}

/// Rollout buffer for storing trajectories
///
/// Plain data (states, actions, rewards, done flags) lives in preallocated
/// tensors outside the autograd graph and is overwritten in place. Policy
/// outputs that must carry gradient into the loss (log probabilities,
/// values, features) live in fixed-capacity slot vectors that
/// [`after_update`](Self::after_update) empties, so nothing from update `k`
/// is reachable during update `k + 1`.
///
/// # Buffer Layout
///
/// - `states`: `[num_steps + 1, num_envs, *obs_shape]`
/// - `actions`, `rewards`, `dones`: `[num_steps, num_envs]`
/// - `log_probs`, `values`: `num_steps` slots of `[num_envs]`
/// - `features`: `num_steps + 1` slots of `[num_envs, feature_size]`
#[derive(Debug)]
pub struct RolloutBuffer {
    /// Number of steps per rollout
    num_steps: usize,

    /// Number of parallel environments
    num_envs: usize,

    /// Shape of one observation, normally `(frames, H, W)`
    obs_shape: Vec<i64>,

    /// Width of the feature embedding
    feature_size: usize,

    /// Discount factor
    gamma: f64,

    device: Device,

    /// Stacked observations [num_steps + 1, num_envs, *obs_shape]
    states: Tensor,

    /// Actions taken [num_steps, num_envs]
    actions: Tensor,

    /// Rewards received [num_steps, num_envs]
    rewards: Tensor,

    /// Episode end flags as 0.0/1.0 [num_steps, num_envs]
    dones: Tensor,

    log_probs: Vec<Option<Tensor>>,
    values: Vec<Option<Tensor>>,
    features: Vec<Option<Tensor>>,

    episodes: EpisodeRewardTracker,
}

impl RolloutBuffer {
    /// Create a buffer sized from the training configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Training configuration (`rollout_size`, `num_envs`,
    ///   `frame_stack_depth`, `discount_factor`)
    /// * `obs_shape` - Observation shape `(frames, H, W)` reported by the environment
    /// * `feature_size` - Width of the agent's feature embedding
    /// * `device` - Device the buffer tensors live on
    pub fn new(
        config: &TrainingConfig,
        obs_shape: &[usize],
        feature_size: usize,
        device: Device,
    ) -> Result<Self> {
        config.validate()?;
        ensure!(
            obs_shape.len() == 3,
            CurioError::Config(format!(
                "observation shape must be (frames, H, W), got {:?}",
                obs_shape
            ))
        );
        ensure!(
            obs_shape[0] == config.frame_stack_depth,
            CurioError::Config(format!(
                "environment stacks {} frames but frame_stack_depth is {}",
                obs_shape[0], config.frame_stack_depth
            ))
        );

        Self::with_shape(
            config.rollout_size,
            config.num_envs,
            obs_shape,
            feature_size,
            config.discount_factor,
            device,
        )
    }

    /// Create a buffer from explicit dimensions
    pub fn with_shape(
        num_steps: usize,
        num_envs: usize,
        obs_shape: &[usize],
        feature_size: usize,
        gamma: f64,
        device: Device,
    ) -> Result<Self> {
        ensure!(num_steps > 0, CurioError::Config("rollout size must be positive".into()));
        ensure!(num_envs > 0, CurioError::Config("number of environments must be positive".into()));
        ensure!(feature_size > 0, CurioError::Config("feature size must be positive".into()));

        let obs_shape: Vec<i64> = obs_shape.iter().map(|&d| d as i64).collect();
        let t = num_steps as i64;
        let n = num_envs as i64;

        let mut state_dims = vec![t + 1, n];
        state_dims.extend_from_slice(&obs_shape);

        let float = (Kind::Float, device);
        Ok(Self {
            num_steps,
            num_envs,
            obs_shape,
            feature_size,
            gamma,
            device,
            states: Tensor::zeros(state_dims.as_slice(), float),
            actions: Tensor::zeros([t, n], (Kind::Int64, device)),
            rewards: Tensor::zeros([t, n], float),
            dones: Tensor::zeros([t, n], float),
            log_probs: (0..num_steps).map(|_| None).collect(),
            values: (0..num_steps).map(|_| None).collect(),
            features: (0..=num_steps).map(|_| None).collect(),
            episodes: EpisodeRewardTracker::new(num_envs),
        })
    }

    /// Convert a batch of raw observations into a `[num_envs, *obs_shape]` tensor
    pub fn obs_to_tensor(&self, observations: &[Vec<f32>]) -> Result<Tensor> {
        let obs_len: i64 = self.obs_shape.iter().product();
        check_shape("observations", &[self.num_envs as i64], &[observations.len() as i64])?;

        let mut flat = Vec::with_capacity(self.num_envs * obs_len as usize);
        for obs in observations {
            check_shape("observation", &[obs_len], &[obs.len() as i64])?;
            flat.extend_from_slice(obs);
        }

        let mut dims = vec![self.num_envs as i64];
        dims.extend_from_slice(&self.obs_shape);
        Ok(Tensor::from_slice(&flat).view(dims.as_slice()).to_device(self.device))
    }

    /// Write the observations returned by the initial reset into slot 0
    pub fn reset_initial(&mut self, observations: &[Vec<f32>]) -> Result<()> {
        let obs = self.obs_to_tensor(observations)?;
        tch::no_grad(|| self.states.get(0).copy_(&obs));
        Ok(())
    }

    /// Record one rollout step at index `step`
    ///
    /// The per-step fields are written at `step`; `observations` (the result
    /// of taking `action`) goes into state slot `step + 1`.
    ///
    /// # Arguments
    ///
    /// * `step` - Timestep within the rollout (0 to num_steps-1)
    /// * `rewards` - Reward per environment
    /// * `observations` - Next observation per environment
    /// * `action` - Actions taken `[num_envs]`
    /// * `log_prob` - Log probabilities of the actions `[num_envs]`, with graph
    /// * `value` - Value estimates of `states[step]` `[num_envs]`, with graph
    /// * `dones` - Episode end flags per environment
    /// * `feature` - Feature embedding of `states[step]` `[num_envs, feature_size]`, with graph
    ///
    /// # Errors
    ///
    /// Any length or shape mismatch is reported as [`CurioError::Shape`] and
    /// leaves the buffer untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        step: usize,
        rewards: &[f32],
        observations: &[Vec<f32>],
        action: &Tensor,
        log_prob: &Tensor,
        value: &Tensor,
        dones: &[bool],
        feature: &Tensor,
    ) -> Result<()> {
        ensure!(
            step < self.num_steps,
            CurioError::Config(format!("step {} >= rollout size {}", step, self.num_steps))
        );

        let n = self.num_envs as i64;
        check_shape("rewards", &[n], &[rewards.len() as i64])?;
        check_shape("dones", &[n], &[dones.len() as i64])?;
        check_shape("action", &[n], &action.size())?;
        check_shape("log_prob", &[n], &log_prob.size())?;
        check_shape("value", &[n], &value.size())?;
        check_shape("feature", &[n, self.feature_size as i64], &feature.size())?;
        let obs = self.obs_to_tensor(observations)?;

        let done_flags: Vec<f32> = dones.iter().map(|&d| if d { 1.0 } else { 0.0 }).collect();
        let idx = step as i64;

        tch::no_grad(|| {
            self.states.get(idx + 1).copy_(&obs);
            self.actions.get(idx).copy_(&action.to_kind(Kind::Int64));
            self.rewards.get(idx).copy_(&Tensor::from_slice(rewards));
            self.dones.get(idx).copy_(&Tensor::from_slice(&done_flags));
        });

        self.log_probs[step] = Some(log_prob.shallow_clone());
        self.values[step] = Some(value.shallow_clone());
        self.features[step] = Some(feature.shallow_clone());
        Ok(())
    }

    /// Record the feature embedding of `states[num_steps]`
    ///
    /// This is the curiosity target for the last transition. It comes from a
    /// no-gradient pass and is stored detached.
    pub fn set_final_feature(&mut self, feature: &Tensor) -> Result<()> {
        check_shape(
            "final_feature",
            &[self.num_envs as i64, self.feature_size as i64],
            &feature.size(),
        )?;
        self.features[self.num_steps] = Some(feature.detach());
        Ok(())
    }

    /// Stacked observation at slot `t` (0 to num_steps) `[num_envs, *obs_shape]`
    ///
    /// Returns an owned copy. A view would share the arena's version counter,
    /// and the in-place writes of later steps would invalidate any graph
    /// built on it.
    pub fn get_state(&self, t: usize) -> Tensor {
        debug_assert!(t <= self.num_steps, "state slot {} > num_steps {}", t, self.num_steps);
        self.states.get(t as i64).copy()
    }

    /// Compute the A2C loss terms from a complete rollout
    ///
    /// # Arguments
    ///
    /// * `final_value` - Value estimate of `states[num_steps]` `[num_envs]`;
    ///   treated as a constant
    pub fn compute_a2c_terms(&self, final_value: &Tensor) -> Result<A2cTerms> {
        let filled = self.filled_steps();
        ensure!(
            filled == self.num_steps,
            CurioError::Incomplete { filled, expected: self.num_steps }
        );
        check_shape("final_value", &[self.num_envs as i64], &final_value.size())?;

        let log_probs = Tensor::stack(&self.collect_slots(&self.log_probs), 0);
        let values = Tensor::stack(&self.collect_slots(&self.values), 0);

        let returns = tch::no_grad(|| {
            compute_returns(&self.rewards, &self.dones, &final_value.detach(), self.gamma)
        });
        let advantages = &returns - &values;

        Ok(A2cTerms {
            policy_loss: a2c_policy_loss(&log_probs, &advantages),
            value_loss: a2c_value_loss(&advantages),
            rewards: self.rewards.copy(),
            returns,
            advantages: advantages.detach(),
        })
    }

    /// Reseed slot 0 from the last state and release everything else
    ///
    /// Must run after every optimizer step.
    pub fn after_update(&mut self) {
        let t = self.num_steps as i64;
        tch::no_grad(|| {
            let last = self.states.get(t).copy();
            self.states.get(0).copy_(&last);
            let _ = self.states.narrow(0, 1, t).zero_();
            let _ = self.actions.zero_();
            let _ = self.rewards.zero_();
            let _ = self.dones.zero_();
        });

        for slot in self.log_probs.iter_mut().chain(&mut self.values).chain(&mut self.features) {
            *slot = None;
        }
    }

    /// Update per-environment episode reward sums from a batched step
    pub fn log_episode_rewards(&mut self, step: &VecStepResult) {
        self.episodes.record(&step.rewards, &step.dones);
    }

    /// Statistics over recently completed episodes
    pub fn reward_stats(&self) -> Option<RewardStats> {
        self.episodes.stats()
    }

    /// Per-environment episode reward tracker
    pub fn episodes(&self) -> &EpisodeRewardTracker {
        &self.episodes
    }

    /// All stacked states flattened time-major `[(num_steps + 1) * num_envs, *obs_shape]`
    pub fn states_flat(&self) -> Tensor {
        let mut dims = vec![-1];
        dims.extend_from_slice(&self.obs_shape);
        self.states.view(dims.as_slice())
    }

    /// Actions flattened time-major `[num_steps * num_envs]`
    pub fn actions_flat(&self) -> Tensor {
        self.actions.view([-1])
    }

    /// Recorded features of the next states `[num_steps * num_envs, feature_size]`
    ///
    /// Requires every feature slot including the final one.
    pub fn next_features(&self) -> Result<Tensor> {
        let filled = self.filled_features();
        ensure!(
            filled == self.num_steps + 1,
            CurioError::Incomplete { filled, expected: self.num_steps + 1 }
        );

        let next = self.collect_slots(&self.features[1..]);
        Ok(Tensor::stack(&next, 0).view([-1, self.feature_size as i64]))
    }

    /// Number of step slots currently filled (at most num_steps)
    pub fn filled_steps(&self) -> usize {
        self.log_probs.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of feature slots currently filled (at most num_steps + 1)
    pub fn filled_features(&self) -> usize {
        self.features.iter().filter(|slot| slot.is_some()).count()
    }

    /// Graph-carrying tensors currently held across all slot vectors
    pub fn retained_tensors(&self) -> usize {
        self.log_probs
            .iter()
            .chain(&self.values)
            .chain(&self.features)
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Get buffer shape (num_steps, num_envs)
    pub fn shape(&self) -> (usize, usize) {
        (self.num_steps, self.num_envs)
    }

    /// Width of the feature embedding
    pub fn feature_size(&self) -> usize {
        self.feature_size
    }

    /// Device the buffer tensors live on
    pub fn device(&self) -> Device {
        self.device
    }

    fn collect_slots(&self, slots: &[Option<Tensor>]) -> Vec<Tensor> {
        slots.iter().flatten().map(Tensor::shallow_clone).collect()
    }
}
