//! Train A2C + ICM on the two-armed bandit
//!
//! A smoke run of the full training loop. The bandit pays 1.0 for arm 1
//! and nothing for arm 0, so the mean episode reward should climb towards
//! the episode length as training progresses.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example train_bandit --release
//! ```

use anyhow::Result;
use curio_rl::prelude::*;

const EPISODE_LENGTH: usize = 16;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let config = TrainingConfig::new()
        .num_updates(500)
        .num_envs(4)
        .frame_stack_depth(4)
        .log_interval(50);

    let depth = config.frame_stack_depth;
    let env = EnvPool::new(
        || FrameStack::new(TwoArmedBandit::new(EPISODE_LENGTH), depth),
        config.num_envs,
    );

    tracing::info!("Environment: {}", config.env_name);
    tracing::info!("  Observation shape: {:?}", env.observation_shape());
    tracing::info!("  Actions: {}", env.num_actions());
    tracing::info!("  Num envs: {}", config.num_envs);
    tracing::info!("  Rollout size: {}", config.rollout_size);

    // Seed before building the networks so their initialization is reproducible
    tch::manual_seed(config.seed);
    let nets =
        MlpIcmNetworks::new(&env.observation_shape(), env.num_actions(), MlpConfig::default());
    let optimizer = nets.optimizer(config.learning_rate)?;
    let (vs, agent, curiosity) = nets.into_parts();

    let timestamp = run_timestamp();
    let logger = TemporalLogger::new(&config.env_name, &timestamp, "runs");

    let mut runner = Runner::new(config, env, agent, curiosity, optimizer, logger)?
        .with_timestamp(timestamp);
    let report = runner.train()?;

    match report.reward_stats {
        Some(stats) => tracing::info!(
            episodes = stats.total_episodes,
            mean = stats.mean,
            min = stats.min,
            max = stats.max,
            "Episode rewards (max possible {})",
            EPISODE_LENGTH
        ),
        None => tracing::warn!("No episode finished during training"),
    }
    if let Some(loss) = report.final_loss() {
        tracing::info!("Final loss: {:.4}", loss);
    }

    let weights = runner.logger().data_dir().join("weights.ot");
    vs.save(&weights)?;
    tracing::info!("Saved weights to {}", weights.display());

    Ok(())
}
