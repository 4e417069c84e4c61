//! # Curio
//!
//! Synchronous A2C with an Intrinsic Curiosity Module, in Rust
//!
//! Curio is the training core of a curiosity-driven actor-critic agent. It
//! combines Rust's performance and safety with PyTorch's neural network
//! capabilities (via tch-rs).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use curio_rl::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = TrainingConfig::new().num_envs(4).frame_stack_depth(4);
//! // Seed before building the networks so their initialization is reproducible
//! tch::manual_seed(config.seed);
//! let env = EnvPool::new(|| FrameStack::new(TwoArmedBandit::new(16), 4), config.num_envs);
//!
//! let nets =
//!     MlpIcmNetworks::new(&env.observation_shape(), env.num_actions(), MlpConfig::default());
//! let optimizer = nets.optimizer(config.learning_rate)?;
//! let (_vs, agent, curiosity) = nets.into_parts();
//!
//! let timestamp = run_timestamp();
//! let logger = TemporalLogger::new(&config.env_name, &timestamp, "runs");
//!
//! let mut runner = Runner::new(config, env, agent, curiosity, optimizer, logger)?
//!     .with_timestamp(timestamp);
//! let report = runner.train()?;
//! println!("final loss: {:?}", report.final_loss());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Environment traits and implementations
pub mod env;

/// Actor-critic and curiosity network traits and MLP implementations
pub mod policy;

/// Rollout storage, returns and episode accounting
pub mod buffer;

/// Training loop, losses, configuration and schedules
pub mod train;

/// Per-update metrics logging
pub mod metrics;

/// Error types
pub mod error;

/// Utility functions and helpers
pub mod utils;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::buffer::{RewardStats, RolloutBuffer};
    pub use crate::env::{
        bandit::TwoArmedBandit, frame_stack::FrameStack, pool::EnvPool, Environment,
        VecEnvironment,
    };
    pub use crate::error::CurioError;
    pub use crate::metrics::{MetricsLogger, TemporalLogger};
    pub use crate::policy::{
        CuriosityModule, MlpActorCritic, MlpConfig, MlpCuriosity, MlpIcmNetworks,
        PolicyValueAgent,
    };
    pub use crate::train::{
        CoefficientSchedule, Runner, ScheduleConfig, TrainingConfig, TrainingReport,
    };
    pub use crate::utils::run_timestamp;
}

/// Current version of curio-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
