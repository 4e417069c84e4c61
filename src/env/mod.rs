//! Environment traits and implementations
//!
//! Two levels of interface live here:
//!
//! - [`Environment`]: a single simulator instance stepped one action at a time
//! - [`VecEnvironment`]: `N` instances stepped together with one batched call,
//!   which is what the training loop consumes
//!
//! [`pool::EnvPool`] turns any `Environment` into a `VecEnvironment`, and
//! [`frame_stack::FrameStack`] turns a frame-producing environment into one
//! that emits `(depth, H, W)` stacked observations.

use anyhow::Result;

/// Core trait for a single RL environment instance
pub trait Environment {
    /// Reset the environment and return the initial observation
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Step the environment with a discrete action
    fn step(&mut self, action: i64) -> Result<StepResult>;

    /// Get the observation space
    fn observation_space(&self) -> SpaceInfo;

    /// Get the action space
    fn action_space(&self) -> SpaceInfo;

    /// Release any resources held by the environment
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A batch of `N` environments stepped synchronously
///
/// `step` blocks until every environment has produced its next
/// observation. Observations are flattened row-major in the layout given by
/// `observation_space().shape`, normally `(frames, H, W)`.
pub trait VecEnvironment {
    /// Number of environments in the batch
    fn num_envs(&self) -> usize;

    /// Observation space of a single environment
    fn observation_space(&self) -> SpaceInfo;

    /// Action space of a single environment
    fn action_space(&self) -> SpaceInfo;

    /// Reset every environment, returning one observation per environment
    fn reset(&mut self) -> Result<Vec<Vec<f32>>>;

    /// Step every environment with one action each
    fn step(&mut self, actions: &[i64]) -> Result<VecStepResult>;

    /// Release every environment
    fn close(&mut self) -> Result<()>;

    /// Observation shape of a single environment, normally `(frames, H, W)`
    fn observation_shape(&self) -> Vec<usize> {
        self.observation_space().shape
    }

    /// Number of discrete actions, or 0 for a non-discrete action space
    fn num_actions(&self) -> usize {
        self.action_space().discrete_n().unwrap_or(0)
    }
}

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Next observation
    pub observation: Vec<f32>,

    /// Reward received
    pub reward: f32,

    /// Whether the episode terminated
    pub terminated: bool,

    /// Whether the episode was truncated
    pub truncated: bool,

    /// Additional info
    pub info: StepInfo,
}

impl StepResult {
    /// Whether the episode ended for any reason
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Result of stepping a batch of environments
///
/// All vectors have one entry per environment.
#[derive(Debug, Clone, Default)]
pub struct VecStepResult {
    /// Observations for each environment
    pub observations: Vec<Vec<f32>>,

    /// Rewards for each environment
    pub rewards: Vec<f32>,

    /// Episode-end flags for each environment
    pub dones: Vec<bool>,

    /// Per-environment info
    pub infos: Vec<StepInfo>,
}

impl VecStepResult {
    /// Number of environments in the result
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// Space information for observations and actions
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Data type
    pub space_type: SpaceType,
}

impl SpaceInfo {
    /// Number of discrete options, if the space is discrete
    pub fn discrete_n(&self) -> Option<usize> {
        match self.space_type {
            SpaceType::Discrete(n) => Some(n),
            SpaceType::Box => None,
        }
    }

    /// Total number of scalar elements in one sample of this space
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Space data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceType {
    /// Discrete space with n options
    Discrete(usize),

    /// Continuous space (Box)
    Box,
}

/// Additional step information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepInfo {
    /// Length of the episode that just finished, set only on the final step
    pub episode_length: Option<usize>,
}

pub mod bandit;
pub mod frame_stack;
pub mod pool;
