//! Training loop orchestration
//!
//! The [`Runner`] owns every piece of per-run state (environment, networks,
//! optimizer, rollout buffer, coefficient schedule, metrics logger) and
//! drives them through the fixed per-update sequence.

use anyhow::{bail, ensure, Result};
use tch::{nn, Device, Kind, Tensor};

use super::config::TrainingConfig;
use super::loss::{total_loss, CuriosityLoss};
use super::schedule::CoefficientSchedule;
use super::stats::{AggregatedStats, TrainingReport, UpdateStats};
use crate::buffer::RolloutBuffer;
use crate::env::VecEnvironment;
use crate::error::{check_shape, CurioError};
use crate::metrics::MetricsLogger;
use crate::policy::{CuriosityModule, CuriosityOutput, PolicyValueAgent};
use crate::utils::run_timestamp;

/// A2C + curiosity training loop
///
/// # Per-update sequence
///
/// ```text
/// 1. rollout       T agent queries and environment steps, then one
///                  no-grad query for the bootstrap value and feature
/// 2. loss          A2C terms from the buffer, curiosity terms from the
///                  curiosity module, weighted by the current coefficient
/// 3. optimize      zero_grad, backward, clip_grad_norm, step
/// 4. bookkeeping   log metrics, reset the buffer, step the schedule
/// ```
///
/// After the last update the environment is closed, the logger flushed and
/// the configuration saved next to the metrics.
pub struct Runner<E, A, C, L> {
    config: TrainingConfig,
    env: E,
    agent: A,
    curiosity: C,
    optimizer: nn::Optimizer,
    logger: L,
    buffer: RolloutBuffer,
    schedule: CoefficientSchedule,
    stats: AggregatedStats,
    timestamp: String,
}

impl<E, A, C, L> Runner<E, A, C, L>
where
    E: VecEnvironment,
    A: PolicyValueAgent,
    C: CuriosityModule,
    L: MetricsLogger,
{
    /// Create a runner, validating that all parts agree on their dimensions
    ///
    /// # Arguments
    ///
    /// * `config` - Training configuration
    /// * `env` - Batched environment with `config.num_envs` instances
    /// * `agent` - Actor-critic producing actions, values and features
    /// * `curiosity` - Curiosity module over the same feature space
    /// * `optimizer` - Optimizer covering the parameters of both networks
    /// * `logger` - Metrics sink
    pub fn new(
        config: TrainingConfig,
        env: E,
        agent: A,
        curiosity: C,
        optimizer: nn::Optimizer,
        logger: L,
    ) -> Result<Self> {
        config.validate()?;

        ensure!(
            env.num_envs() == config.num_envs,
            CurioError::Config(format!(
                "environment batch has {} instances but num_envs is {}",
                env.num_envs(),
                config.num_envs
            ))
        );
        ensure!(
            env.num_actions() > 0,
            CurioError::Config("environment must have a discrete action space".into())
        );
        ensure!(
            curiosity.num_actions() == env.num_actions(),
            CurioError::Config(format!(
                "curiosity module predicts {} actions but the environment has {}",
                curiosity.num_actions(),
                env.num_actions()
            ))
        );
        ensure!(
            curiosity.feature_size() == agent.feature_size(),
            CurioError::Config(format!(
                "curiosity module predicts {} features but the agent embeds {}",
                curiosity.feature_size(),
                agent.feature_size()
            ))
        );

        tch::manual_seed(config.seed);

        let buffer = RolloutBuffer::new(
            &config,
            &env.observation_shape(),
            agent.feature_size(),
            agent.device(),
        )?;
        let schedule = CoefficientSchedule::new(config.curiosity_coeff)?;

        Ok(Self {
            config,
            env,
            agent,
            curiosity,
            optimizer,
            logger,
            buffer,
            schedule,
            stats: AggregatedStats::new(),
            timestamp: run_timestamp(),
        })
    }

    /// Use `timestamp` instead of the current time to name the saved configuration
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Get reference to the rollout buffer
    pub fn buffer(&self) -> &RolloutBuffer {
        &self.buffer
    }

    /// Get reference to the coefficient schedule
    pub fn schedule(&self) -> &CoefficientSchedule {
        &self.schedule
    }

    /// Get reference to the agent
    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Get reference to the metrics logger
    pub fn logger(&self) -> &L {
        &self.logger
    }

    /// Aggregated loss statistics so far
    pub fn stats(&self) -> &AggregatedStats {
        &self.stats
    }

    /// Timestamp naming this run's saved configuration
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Run `num_updates` updates, then tear down
    ///
    /// # Errors
    ///
    /// Environment, shape and logger errors propagate unchanged. A NaN or
    /// infinite objective aborts with [`CurioError::NonFiniteLoss`].
    pub fn train(&mut self) -> Result<TrainingReport> {
        let observations = self.env.reset()?;
        self.buffer.reset_initial(&observations)?;

        tracing::info!(
            env = %self.config.env_name,
            num_updates = self.config.num_updates,
            rollout_size = self.config.rollout_size,
            num_envs = self.config.num_envs,
            "starting training"
        );

        let mut updates = Vec::with_capacity(self.config.num_updates);
        let mut coefficients = Vec::with_capacity(self.config.num_updates);

        for update in 0..self.config.num_updates {
            let stats = self.update(update)?;
            coefficients.push(stats.curiosity_coeff);
            self.stats.update(&stats);

            if update % self.config.log_interval == 0 {
                self.report_progress(&stats);
            }
            updates.push(stats);
        }

        self.env.close()?;
        self.logger.save()?;
        let config_path = self.config.save(self.logger.data_dir(), &self.timestamp)?;

        tracing::info!(
            updates = updates.len(),
            best_loss = self.stats.best_total_loss,
            config = %config_path.display(),
            "training finished"
        );

        Ok(TrainingReport {
            updates,
            coefficients,
            episode_rewards: self.buffer.episodes().recent().iter().copied().collect(),
            reward_stats: self.buffer.reward_stats(),
            aggregated: self.stats.clone(),
        })
    }

    /// Collect one rollout into the buffer
    ///
    /// Returns the bootstrap value of the last state (computed without
    /// gradient) and the policy entropy summed over the rollout steps.
    pub fn episode_rollout(&mut self) -> Result<(Tensor, Tensor)> {
        let num_steps = self.config.rollout_size;
        let mut entropy_sum = Tensor::zeros([], (Kind::Float, self.agent.device()));

        for step in 0..num_steps {
            let out = self.agent.get_action(&self.buffer.get_state(step));
            entropy_sum = entropy_sum + &out.entropy;

            let cpu_actions = out.action.to_device(Device::Cpu).to_kind(Kind::Int64);
            let actions = Vec::<i64>::try_from(&cpu_actions)?;
            let result = self.env.step(&actions)?;

            self.buffer.log_episode_rewards(&result);
            self.buffer.insert(
                step,
                &result.rewards,
                &result.observations,
                &out.action,
                &out.log_prob,
                &out.value,
                &result.dones,
                &out.feature,
            )?;
            self.agent.reset_recurrent_state(&result.dones);
        }

        let bootstrap = tch::no_grad(|| self.agent.get_action(&self.buffer.get_state(num_steps)));
        self.buffer.set_final_feature(&bootstrap.feature)?;

        Ok((bootstrap.value, entropy_sum))
    }

    /// Run one full update: rollout, loss, optimizer step and bookkeeping
    fn update(&mut self, update: usize) -> Result<UpdateStats> {
        let (final_value, entropy_sum) = self.episode_rollout()?;

        let actions = self.buffer.actions_flat();
        let states = self.buffer.states_flat();
        let icm = self.curiosity.forward(self.config.num_envs, &states, &actions)?;
        self.check_curiosity_output(&icm)?;
        let curiosity = CuriosityLoss::new(&icm, &self.buffer.next_features()?, &actions);

        let a2c = self.buffer.compute_a2c_terms(&final_value)?;
        let curiosity_coeff = self.schedule.value();
        let loss = total_loss(&a2c, &entropy_sum, &curiosity, &self.config, curiosity_coeff);

        let total = f64::try_from(&loss)?;
        if !total.is_finite() {
            bail!(CurioError::NonFiniteLoss { update, value: total });
        }

        self.optimizer.zero_grad();
        loss.backward();

        // A finite objective can still backpropagate NaN (e.g. sqrt at 0)
        let grad_norm = self.grad_norm()?;
        if !grad_norm.is_finite() {
            bail!(CurioError::NonFiniteGradient { update, norm: grad_norm });
        }

        self.optimizer.clip_grad_norm(self.config.max_grad_norm);
        self.optimizer.step();

        self.logger.log(&a2c.rewards, &icm.features.detach())?;

        let stats = UpdateStats {
            update,
            total_loss: total,
            policy_loss: f64::try_from(&a2c.policy_loss).unwrap_or(0.0),
            value_loss: f64::try_from(&a2c.value_loss).unwrap_or(0.0),
            entropy: f64::try_from(&entropy_sum).unwrap_or(0.0),
            forward_loss: f64::try_from(&curiosity.forward).unwrap_or(0.0),
            inverse_loss: f64::try_from(&curiosity.inverse).unwrap_or(0.0),
            curiosity_penalty: curiosity.intrinsic_reward(),
            curiosity_coeff,
            mean_reward: f64::try_from(&a2c.rewards.mean(Kind::Float)).unwrap_or(0.0),
            grad_norm,
        };

        // Releases every graph-carrying tensor of this update
        self.buffer.after_update();
        self.schedule.step();

        Ok(stats)
    }

    /// Reject curiosity outputs that would broadcast against the rollout
    fn check_curiosity_output(&self, icm: &CuriosityOutput) -> Result<()> {
        let (num_steps, num_envs) = self.buffer.shape();
        let transitions = (num_steps * num_envs) as i64;

        check_shape(
            "predicted_features",
            &[transitions, self.buffer.feature_size() as i64],
            &icm.predicted_features.size(),
        )?;
        check_shape(
            "predicted_action_logits",
            &[transitions, self.curiosity.num_actions() as i64],
            &icm.predicted_action_logits.size(),
        )?;
        Ok(())
    }

    /// Global L2 norm of the gradients held by the optimizer's variables
    fn grad_norm(&self) -> Result<f64> {
        let norm = tch::no_grad(|| {
            let mut norm_sq = Tensor::zeros([], (Kind::Double, self.agent.device()));
            for var in self.optimizer.trainable_variables() {
                let grad = var.grad();
                if grad.defined() {
                    norm_sq += grad.to_kind(Kind::Double).pow_tensor_scalar(2).sum(Kind::Double);
                }
            }
            norm_sq.sqrt()
        });
        Ok(f64::try_from(&norm)?)
    }

    fn report_progress(&self, stats: &UpdateStats) {
        tracing::info!(
            update = stats.update,
            loss = stats.total_loss,
            policy = stats.policy_loss,
            value = stats.value_loss,
            entropy = stats.entropy,
            grad_norm = stats.grad_norm,
            intrinsic = stats.curiosity_penalty,
            coeff = stats.curiosity_coeff,
            "update"
        );

        match self.buffer.reward_stats() {
            Some(rewards) => tracing::info!(
                episodes = rewards.total_episodes,
                mean = rewards.mean,
                min = rewards.min,
                max = rewards.max,
                "episode rewards (last {})",
                rewards.episodes
            ),
            None => tracing::info!("no completed episodes yet"),
        }
    }
}
