//! Per-environment episode reward accounting
//!
//! Diagnostic only: nothing here feeds the loss.

use std::collections::VecDeque;

/// Number of completed episodes the summary statistics cover
pub const REWARD_WINDOW: usize = 100;

/// Summary of recently completed episode rewards
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardStats {
    /// Episodes in the window
    pub episodes: usize,
    /// Episodes completed since the tracker was created
    pub total_episodes: usize,
    /// Mean episode reward
    pub mean: f32,
    /// Lowest episode reward
    pub min: f32,
    /// Highest episode reward
    pub max: f32,
}

/// Running reward sums for `N` environments
///
/// Each environment's sum restarts exactly when that environment reports
/// `done`; the finished total is moved into a window of the last
/// [`REWARD_WINDOW`] episodes. Older totals are only counted.
#[derive(Debug, Clone)]
pub struct EpisodeRewardTracker {
    running: Vec<f32>,
    recent: VecDeque<f32>,
    total_episodes: usize,
}

impl EpisodeRewardTracker {
    /// Create a tracker for `num_envs` environments
    pub fn new(num_envs: usize) -> Self {
        Self {
            running: vec![0.0; num_envs],
            recent: VecDeque::with_capacity(REWARD_WINDOW),
            total_episodes: 0,
        }
    }

    /// Accumulate one step of rewards and flush totals of finished episodes
    ///
    /// `rewards` and `dones` hold one entry per environment.
    pub fn record(&mut self, rewards: &[f32], dones: &[bool]) {
        for (env_id, (&reward, &done)) in rewards.iter().zip(dones).enumerate() {
            let Some(sum) = self.running.get_mut(env_id) else {
                break;
            };
            *sum += reward;

            if done {
                let total = std::mem::take(sum);
                if self.recent.len() == REWARD_WINDOW {
                    self.recent.pop_front();
                }
                self.recent.push_back(total);
                self.total_episodes += 1;
            }
        }
    }

    /// Reward accumulated so far in each environment's current episode
    pub fn running(&self) -> &[f32] {
        &self.running
    }

    /// Totals of the last [`REWARD_WINDOW`] completed episodes, oldest first
    pub fn recent(&self) -> &VecDeque<f32> {
        &self.recent
    }

    /// Episodes completed since the tracker was created
    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }

    /// Statistics over the last [`REWARD_WINDOW`] completed episodes
    ///
    /// Returns `None` until the first episode completes.
    pub fn stats(&self) -> Option<RewardStats> {
        if self.recent.is_empty() {
            return None;
        }

        let episodes = self.recent.len();
        let sum: f32 = self.recent.iter().sum();
        let min = self.recent.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self.recent.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        Some(RewardStats {
            episodes,
            total_episodes: self.total_episodes,
            mean: sum / episodes as f32,
            min,
            max,
        })
    }
}
