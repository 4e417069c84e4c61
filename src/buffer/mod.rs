//! Experience storage for on-policy training

/// Rollout buffer, return computation and episode reward tracking
pub mod rollout;

pub use rollout::{A2cTerms, EpisodeRewardTracker, RewardStats, RolloutBuffer};
