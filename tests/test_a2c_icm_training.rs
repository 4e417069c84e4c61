//! End-to-end training runs on the deterministic two-armed bandit
//!
//! Every run here uses CPU tensors and a temporary log directory.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use curio_rl::prelude::*;
use curio_rl::policy::AgentOutput;
use tch::{Device, Tensor};

/// libtorch's RNG is process-global, so seeded runs must not interleave
static TORCH_RNG: Mutex<()> = Mutex::new(());

fn rng_lock() -> MutexGuard<'static, ()> {
    TORCH_RNG.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build a runner over `num_envs` bandits stacking `depth` frames
fn bandit_runner(
    config: TrainingConfig,
    log_dir: &Path,
) -> Runner<EnvPool<FrameStack<TwoArmedBandit>>, MlpActorCritic, MlpCuriosity, TemporalLogger> {
    tch::manual_seed(config.seed);

    let depth = config.frame_stack_depth;
    let env = EnvPool::new(|| FrameStack::new(TwoArmedBandit::new(6), depth), config.num_envs);
    let nets = MlpIcmNetworks::with_device(
        &env.observation_shape(),
        env.num_actions(),
        MlpConfig { hidden_dim: 32, ..Default::default() },
        Device::Cpu,
    );
    let optimizer = nets.optimizer(config.learning_rate).unwrap();
    let (_vs, agent, curiosity) = nets.into_parts();
    let logger = TemporalLogger::new(&config.env_name, "2024-01-01 00_00_00", log_dir);

    Runner::new(config, env, agent, curiosity, optimizer, logger)
        .unwrap()
        .with_timestamp("2024-01-01 00_00_00")
}

fn toy_config() -> TrainingConfig {
    TrainingConfig::new()
        .env_name("TwoArmedBandit")
        .num_updates(10)
        .rollout_size(4)
        .num_envs(1)
        .frame_stack_depth(1)
        .log_interval(5)
}

#[test]
fn test_ten_updates_with_finite_loss() {
    let _rng = rng_lock();
    let dir = tempfile::tempdir().unwrap();
    let mut runner = bandit_runner(toy_config(), dir.path());

    let report = runner.train().unwrap();

    assert_eq!(report.updates.len(), 10);
    for stats in &report.updates {
        assert!(stats.total_loss.is_finite(), "update {} loss {}", stats.update, stats.total_loss);
        assert!(stats.forward_loss >= 0.0);
        assert!(stats.inverse_loss >= 0.0);
    }

    // 40 steps with 6-step episodes
    assert_eq!(report.episode_rewards.len(), 6);
    let stats = report.reward_stats.unwrap();
    assert!(stats.mean >= 0.0 && stats.mean <= 6.0);

    assert_eq!(runner.buffer().retained_tensors(), 0);
    assert_eq!(runner.schedule().steps(), 10);
}

#[test]
fn test_run_artifacts_are_written() {
    let _rng = rng_lock();
    let dir = tempfile::tempdir().unwrap();
    let config = toy_config().num_updates(2);
    let mut runner = bandit_runner(config.clone(), dir.path());
    runner.train().unwrap();

    let run_dir = dir.path().join("TwoArmedBandit").join("2024-01-01 00_00_00");
    assert_eq!(runner.logger().data_dir(), run_dir.as_path());
    assert!(run_dir.join("metrics.json").exists());

    let saved = TrainingConfig::load(run_dir.join("config_2024-01-01 00_00_00.json")).unwrap();
    assert_eq!(saved, config);
}

#[test]
fn test_identical_configs_give_identical_runs() {
    let _rng = rng_lock();
    let config = toy_config()
        .num_envs(2)
        .frame_stack_depth(2)
        .curiosity_coeff(ScheduleConfig::exponential(0.2, 0.9, 0.0));

    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let report_a = bandit_runner(config.clone(), dir_a.path()).train().unwrap();
    let report_b = bandit_runner(config, dir_b.path()).train().unwrap();

    assert_eq!(report_a.coefficients, report_b.coefficients);
    for window in report_a.coefficients.windows(2) {
        assert!(window[1] <= window[0]);
    }
    for (a, b) in report_a.updates.iter().zip(&report_b.updates) {
        assert!((a.total_loss - b.total_loss).abs() < 1e-5);
    }
}

/// Agent whose value estimates are NaN
struct NanValueAgent(MlpActorCritic);

impl PolicyValueAgent for NanValueAgent {
    fn get_action(&self, states: &Tensor) -> AgentOutput {
        let mut out = self.0.get_action(states);
        out.value = out.value * f64::NAN;
        out
    }

    fn feature_size(&self) -> usize {
        self.0.feature_size()
    }

    fn device(&self) -> Device {
        self.0.device()
    }
}

#[test]
fn test_non_finite_loss_aborts_with_update_index() {
    let _rng = rng_lock();
    let dir = tempfile::tempdir().unwrap();
    let config = toy_config();

    let env = EnvPool::new(|| FrameStack::new(TwoArmedBandit::new(6), 1), 1);
    let nets = MlpIcmNetworks::with_device(
        &env.observation_shape(),
        env.num_actions(),
        MlpConfig::default(),
        Device::Cpu,
    );
    let optimizer = nets.optimizer(config.learning_rate).unwrap();
    let (_vs, agent, curiosity) = nets.into_parts();
    let logger = TemporalLogger::new(&config.env_name, "nan", dir.path());

    let mut runner =
        Runner::new(config, env, NanValueAgent(agent), curiosity, optimizer, logger).unwrap();
    let err = runner.train().unwrap_err();

    match err.downcast_ref::<CurioError>() {
        Some(CurioError::NonFiniteLoss { update, value }) => {
            assert_eq!(*update, 0);
            assert!(value.is_nan());
        }
        other => panic!("expected non-finite loss, got {:?}", other),
    }
}

/// Agent whose value has a finite forward pass and a non-finite gradient
struct SqrtAtZeroAgent(MlpActorCritic);

impl PolicyValueAgent for SqrtAtZeroAgent {
    fn get_action(&self, states: &Tensor) -> AgentOutput {
        let mut out = self.0.get_action(states);
        // sqrt(0) = 0, but its derivative is infinite
        let zero = &out.value - out.value.detach();
        out.value = &out.value + zero.sqrt();
        out
    }

    fn feature_size(&self) -> usize {
        self.0.feature_size()
    }

    fn device(&self) -> Device {
        self.0.device()
    }
}

#[test]
fn test_non_finite_gradient_aborts_before_the_optimizer_step() {
    let _rng = rng_lock();
    let dir = tempfile::tempdir().unwrap();
    let config = toy_config();

    let env = EnvPool::new(|| FrameStack::new(TwoArmedBandit::new(6), 1), 1);
    let nets = MlpIcmNetworks::with_device(
        &env.observation_shape(),
        env.num_actions(),
        MlpConfig::default(),
        Device::Cpu,
    );
    let optimizer = nets.optimizer(config.learning_rate).unwrap();
    let (vs, agent, curiosity) = nets.into_parts();
    let before: Vec<(String, Tensor)> =
        vs.variables().into_iter().map(|(name, t)| (name, t.copy())).collect();
    let logger = TemporalLogger::new(&config.env_name, "grad", dir.path());

    let mut runner =
        Runner::new(config, env, SqrtAtZeroAgent(agent), curiosity, optimizer, logger).unwrap();
    let err = runner.train().unwrap_err();

    match err.downcast_ref::<CurioError>() {
        Some(CurioError::NonFiniteGradient { update, norm }) => {
            assert_eq!(*update, 0);
            assert!(!norm.is_finite());
        }
        other => panic!("expected non-finite gradient, got {:?}", other),
    }

    let after = vs.variables();
    for (name, value) in &before {
        assert!(after[name].equal(value), "{} changed", name);
    }
}

#[test]
fn test_seeding_before_construction_reproduces_initial_weights() {
    let _rng = rng_lock();
    let config = toy_config();
    let depth = config.frame_stack_depth;
    let env = EnvPool::new(|| FrameStack::new(TwoArmedBandit::new(6), depth), 1);
    let build = || {
        tch::manual_seed(config.seed);
        MlpIcmNetworks::with_device(
            &env.observation_shape(),
            env.num_actions(),
            MlpConfig::default(),
            Device::Cpu,
        )
    };

    let first = build().var_store().variables();
    let second = build().var_store().variables();

    assert_eq!(first.len(), second.len());
    for (name, value) in &first {
        assert!(second[name].equal(value), "{} differs", name);
    }
}
