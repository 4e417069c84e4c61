//! Rollout buffer for storing and processing trajectories
//!
//! This module implements the per-update experience storage for A2C
//! training with a curiosity module, including:
//! - Trajectory storage (stacked states, actions, rewards, done flags)
//! - Graph-carrying policy outputs (log probabilities, values, features)
//! - Bootstrapped discounted returns and the A2C loss terms
//! - Per-environment episode reward accounting for diagnostics
//!
//! # Buffer Layout
//!
//! The buffer uses a time-major `[num_steps, num_envs]` layout where:
//! - `num_steps` (`T`): number of timesteps per rollout
//! - `num_envs` (`N`): number of parallel environments
//!
//! States and features carry one extra time slot (`T + 1`): slot 0 holds the
//! state the rollout starts from and slot `T` holds the state used to
//! bootstrap the final return and the curiosity target of the last
//! transition.
//!
//! # Lifecycle
//!
//! ```text
//! reset_initial(obs)                      once, before the first update
//! loop {
//!     insert(t, ...)        for t in 0..T
//!     set_final_feature(feature)
//!     compute_a2c_terms(final_value)
//!     after_update()        slot 0 <- slot T, everything else released
//! }
//! ```

mod advantage;
mod episode;
mod storage;

#[cfg(test)]
mod tests;

pub use advantage::{a2c_policy_loss, a2c_value_loss, compute_returns};
pub use episode::{EpisodeRewardTracker, RewardStats, REWARD_WINDOW};
pub use storage::{A2cTerms, RolloutBuffer};
