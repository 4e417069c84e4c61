//! Two-armed bandit
//!
//! A toy environment for exercising the training loop end to end:
//! - State: a single constant 1x1 frame
//! - Actions: two choices (0 or 1)
//! - Reward: +1.0 for action 1, 0.0 for action 0
//! - Episodes: fixed length, then `terminated`
//!
//! [`TwoArmedBandit::new`] is fully deterministic, so two runs with the same
//! policy produce identical trajectories. [`TwoArmedBandit::with_payout`]
//! makes arm 1 pay only with some probability, drawn from a seeded RNG.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Environment, SpaceInfo, SpaceType, StepInfo, StepResult};

/// Single-state bandit with two arms
#[derive(Debug, Clone)]
pub struct TwoArmedBandit {
    steps: usize,
    episode_length: usize,
    payout_prob: f64,
    rng: StdRng,
}

impl TwoArmedBandit {
    /// Create a deterministic bandit whose episodes last `episode_length` steps
    pub fn new(episode_length: usize) -> Self {
        Self::with_payout(episode_length, 1.0, 0)
    }

    /// Create a bandit whose arm 1 pays with probability `payout_prob`
    ///
    /// `payout_prob` is clamped to `[0, 1]`. Arm 0 never pays.
    pub fn with_payout(episode_length: usize, payout_prob: f64, seed: u64) -> Self {
        Self {
            steps: 0,
            episode_length: episode_length.max(1),
            payout_prob: payout_prob.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Steps taken in the current episode
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn observation(&self) -> Vec<f32> {
        vec![1.0]
    }
}

impl Default for TwoArmedBandit {
    fn default() -> Self {
        Self::new(16)
    }
}

impl Environment for TwoArmedBandit {
    fn reset(&mut self) -> Result<Vec<f32>> {
        self.steps = 0;
        Ok(self.observation())
    }

    fn step(&mut self, action: i64) -> Result<StepResult> {
        anyhow::ensure!((0..2).contains(&action), "invalid bandit action {}", action);

        let pays = action == 1 && (self.payout_prob >= 1.0 || self.rng.gen_bool(self.payout_prob));
        let reward = if pays { 1.0 } else { 0.0 };
        self.steps += 1;

        Ok(StepResult {
            observation: self.observation(),
            reward,
            terminated: self.steps >= self.episode_length,
            truncated: false,
            info: StepInfo::default(),
        })
    }

    fn observation_space(&self) -> SpaceInfo {
        SpaceInfo {
            shape: vec![1, 1], // one 1x1 frame
            space_type: SpaceType::Box,
        }
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(2) }
    }
}
