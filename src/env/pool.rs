//! Vectorized environment pool
//!
//! [`EnvPool`] owns `N` independent environment instances and exposes them as
//! one [`VecEnvironment`]. A step is a single blocking call from the caller's
//! point of view; internally the environments are stepped in parallel on the
//! Rayon thread pool.
//!
//! Environments whose episode ends are reset immediately. The returned
//! observation for that slot is the first observation of the next episode,
//! while `dones` still reports the end of the previous one.
//!
//! # Example
//!
//! ```rust,no_run
//! use curio_rl::env::{
//!     bandit::TwoArmedBandit, frame_stack::FrameStack, pool::EnvPool, VecEnvironment,
//! };
//!
//! let mut pool = EnvPool::new(|| FrameStack::new(TwoArmedBandit::new(8), 4), 4);
//! let observations = pool.reset().unwrap();
//! let result = pool.step(&[0, 1, 0, 1]).unwrap();
//! assert_eq!(observations.len(), result.len());
//! ```

use anyhow::{ensure, Result};
use rayon::prelude::*;

use crate::env::{Environment, SpaceInfo, StepResult, VecEnvironment, VecStepResult};

/// A pool of environments stepped as one batch
pub struct EnvPool<E: Environment> {
    /// Vector of environment instances
    envs: Vec<E>,

    /// Steps taken in the current episode of each environment
    episode_lengths: Vec<usize>,
}

impl<E: Environment + Send> EnvPool<E> {
    /// Create a new environment pool
    ///
    /// # Arguments
    ///
    /// * `env_fn` - Factory function to create environment instances
    /// * `num_envs` - Number of parallel environments
    pub fn new<F>(env_fn: F, num_envs: usize) -> Self
    where
        F: Fn() -> E,
    {
        let envs = (0..num_envs).map(|_| env_fn()).collect();
        Self { envs, episode_lengths: vec![0; num_envs] }
    }

    /// Borrow a single environment
    pub fn env(&self, env_id: usize) -> &E {
        &self.envs[env_id]
    }
}

impl<E: Environment + Send> VecEnvironment for EnvPool<E> {
    fn num_envs(&self) -> usize {
        self.envs.len()
    }

    fn observation_space(&self) -> SpaceInfo {
        self.envs[0].observation_space()
    }

    fn action_space(&self) -> SpaceInfo {
        self.envs[0].action_space()
    }

    fn reset(&mut self) -> Result<Vec<Vec<f32>>> {
        self.episode_lengths.iter_mut().for_each(|len| *len = 0);
        self.envs.par_iter_mut().map(|env| env.reset()).collect()
    }

    fn step(&mut self, actions: &[i64]) -> Result<VecStepResult> {
        ensure!(
            actions.len() == self.envs.len(),
            "Number of actions ({}) must match number of environments ({})",
            actions.len(),
            self.envs.len()
        );

        let results: Vec<StepResult> = self
            .envs
            .par_iter_mut()
            .zip(actions.par_iter())
            .map(|(env, &action)| -> Result<StepResult> {
                let mut result = env.step(action)?;
                if result.done() {
                    result.observation = env.reset()?;
                }
                Ok(result)
            })
            .collect::<Result<_>>()?;

        let mut batch = VecStepResult {
            observations: Vec::with_capacity(results.len()),
            rewards: Vec::with_capacity(results.len()),
            dones: Vec::with_capacity(results.len()),
            infos: Vec::with_capacity(results.len()),
        };

        for (result, length) in results.into_iter().zip(self.episode_lengths.iter_mut()) {
            *length += 1;
            let done = result.done();
            let mut info = result.info;
            if done {
                info.episode_length = Some(*length);
                *length = 0;
            }

            batch.observations.push(result.observation);
            batch.rewards.push(result.reward);
            batch.dones.push(done);
            batch.infos.push(info);
        }

        Ok(batch)
    }

    fn close(&mut self) -> Result<()> {
        for env in &mut self.envs {
            env.close()?;
        }
        Ok(())
    }
}
