//! Advantage Actor-Critic (A2C) with an Intrinsic Curiosity Module
//!
//! This module implements synchronous multi-environment A2C whose
//! objective is extended with the curiosity terms of an ICM: a forward
//! model predicting the next state's features, an inverse model predicting
//! the action between two states, and a scheduled penalty that rewards the
//! agent for reaching states the forward model predicts poorly.
//!
//! # Algorithm Overview
//!
//! ```text
//! For each update:
//!   1. Collect T steps from N environments with the current policy
//!   2. Bootstrap returns from the critic's value of the last state
//!   3. Run the curiosity module over all (T+1)*N states
//!   4. Minimize A2C loss + ICM loss - coefficient * curiosity penalty
//!   5. Reset the rollout buffer and step the coefficient schedule
//! ```
//!
//! # References
//!
//! - [Asynchronous Methods for Deep Reinforcement Learning](https://arxiv.org/abs/1602.01783)
//! - [Curiosity-driven Exploration by Self-supervised Prediction](https://arxiv.org/abs/1705.05363)

mod config;
mod loss;
mod runner;
mod schedule;
mod stats;

pub use config::TrainingConfig;
pub use loss::{
    a2c_objective, curiosity_penalty, forward_loss, inverse_loss, total_loss, CuriosityLoss,
};
pub use runner::Runner;
pub use schedule::{CoefficientSchedule, DecayRule, ScheduleConfig};
pub use stats::{AggregatedStats, TrainingReport, UpdateStats};
