//! Training statistics for A2C with curiosity
//!
//! This module defines structures for tracking and aggregating
//! per-update metrics during training.

use serde::Serialize;

use crate::buffer::RewardStats;

/// Statistics for a single update
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateStats {
    /// Update index (0-based)
    pub update: usize,

    /// Total objective
    pub total_loss: f64,

    /// Policy-gradient loss
    pub policy_loss: f64,

    /// Critic loss
    pub value_loss: f64,

    /// Policy entropy summed over the rollout
    pub entropy: f64,

    /// Forward model loss
    pub forward_loss: f64,

    /// Inverse model loss
    pub inverse_loss: f64,

    /// Curiosity penalty, also the intrinsic reward diagnostic
    pub curiosity_penalty: f64,

    /// Curiosity coefficient the loss was assembled with
    pub curiosity_coeff: f64,

    /// Mean extrinsic reward per step and environment
    pub mean_reward: f64,

    /// Global gradient norm before clipping
    pub grad_norm: f64,
}

/// Aggregated statistics across updates
///
/// Provides a running average and the best total loss seen so far for
/// monitoring training progress.
#[derive(Debug, Clone)]
pub struct AggregatedStats {
    /// Statistics from the latest update
    pub current: UpdateStats,

    /// Exponential moving average of recent updates
    pub running_avg: UpdateStats,

    /// Lowest total loss so far
    pub best_total_loss: f64,

    /// Number of updates recorded
    pub total_updates: usize,
}

impl Default for AggregatedStats {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregatedStats {
    /// Smoothing factor of the moving average
    pub const ALPHA: f64 = 0.1;

    /// Create empty aggregated statistics
    pub fn new() -> Self {
        Self {
            current: UpdateStats::default(),
            running_avg: UpdateStats::default(),
            best_total_loss: f64::INFINITY,
            total_updates: 0,
        }
    }

    /// Record one update
    pub fn update(&mut self, stats: &UpdateStats) {
        // The first update seeds the average instead of being blended with zeros
        if self.total_updates == 0 {
            self.running_avg = stats.clone();
        } else {
            let ema = |avg: f64, x: f64| Self::ALPHA * x + (1.0 - Self::ALPHA) * avg;
            let avg = &mut self.running_avg;
            avg.total_loss = ema(avg.total_loss, stats.total_loss);
            avg.policy_loss = ema(avg.policy_loss, stats.policy_loss);
            avg.value_loss = ema(avg.value_loss, stats.value_loss);
            avg.entropy = ema(avg.entropy, stats.entropy);
            avg.forward_loss = ema(avg.forward_loss, stats.forward_loss);
            avg.inverse_loss = ema(avg.inverse_loss, stats.inverse_loss);
            avg.curiosity_penalty = ema(avg.curiosity_penalty, stats.curiosity_penalty);
            avg.curiosity_coeff = ema(avg.curiosity_coeff, stats.curiosity_coeff);
            avg.mean_reward = ema(avg.mean_reward, stats.mean_reward);
            avg.grad_norm = ema(avg.grad_norm, stats.grad_norm);
            avg.update = stats.update;
        }

        self.current = stats.clone();
        self.total_updates += 1;

        if stats.total_loss < self.best_total_loss {
            self.best_total_loss = stats.total_loss;
        }
    }
}

/// Summary of a finished training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Statistics of every update, in order
    pub updates: Vec<UpdateStats>,

    /// Curiosity coefficient used by each update
    pub coefficients: Vec<f64>,

    /// Totals of the most recent completed episodes (at most
    /// [`REWARD_WINDOW`](crate::buffer::rollout::REWARD_WINDOW)), oldest first
    pub episode_rewards: Vec<f32>,

    /// Statistics over the most recent completed episodes
    pub reward_stats: Option<RewardStats>,

    /// Aggregated loss statistics
    pub aggregated: AggregatedStats,
}

impl TrainingReport {
    /// Total objective of the last update
    pub fn final_loss(&self) -> Option<f64> {
        self.updates.last().map(|s| s.total_loss)
    }
}
