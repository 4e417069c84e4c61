//! Multi-Layer Perceptron (MLP) actor-critic for discrete actions
//!
//! This module provides a feedforward actor-critic over flattened stacked
//! frames. The trunk output doubles as the feature embedding the curiosity
//! loss compares against.
//!
//! # Architecture
//!
//! ```text
//! Input (frames * H * W)
//!         |
//!     [Dense(64)]
//!         |
//!       Tanh
//!         |
//!     [Dense(64)]
//!         |
//!       Tanh  ----------> feature
//!      /     \
//!  Policy   Value
//!  Network  Network
//!     |        |
//! [Dense(n)]  [Dense(1)]
//!     |        |
//!  Actions   Value
//! ```

use std::path::Path;

use anyhow::Result;
use tch::{
    Device, Kind, Tensor,
    nn::{self, Init, Module, OptimizerConfig},
};

use super::icm::MlpCuriosity;
use super::{AgentOutput, PolicyValueAgent};

/// Configuration for MLP architecture
#[derive(Debug, Clone)]
pub struct MlpConfig {
    /// Number of hidden layers in each trunk
    pub num_layers: usize,
    /// Hidden width, also the feature width
    pub hidden_dim: i64,
    /// Orthogonal weights instead of small Gaussian ones
    pub use_orthogonal_init: bool,
    /// Nonlinearity after every hidden layer
    pub activation: Activation,
}

/// Hidden-layer nonlinearity
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub enum Activation {
    ReLU,
    Tanh,
}

impl Activation {
    pub(crate) fn apply(self, x: &Tensor) -> Tensor {
        match self {
            Activation::ReLU => x.relu(),
            Activation::Tanh => x.tanh(),
        }
    }
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            num_layers: 2,
            hidden_dim: 64,
            use_orthogonal_init: true,
            activation: Activation::Tanh,
        }
    }
}

impl MlpConfig {
    pub(crate) fn hidden_linear_config(&self) -> nn::LinearConfig {
        // Orthogonal init for hidden layers
        let ws_init = if self.use_orthogonal_init {
            Init::Orthogonal { gain: 2.0_f64.sqrt() }
        } else {
            Init::Randn { mean: 0.0, stdev: 0.01 }
        };
        nn::LinearConfig { ws_init, ..Default::default() }
    }

    pub(crate) fn output_linear_config(&self) -> nn::LinearConfig {
        let ws_init = if self.use_orthogonal_init {
            Init::Orthogonal { gain: 0.01 }
        } else {
            Init::Randn { mean: 0.0, stdev: 0.01 }
        };
        nn::LinearConfig { ws_init, ..Default::default() }
    }
}

/// `num_layers` dense layers of width `hidden_dim`, each followed by the activation
pub(crate) fn mlp_trunk(path: &nn::Path, in_dim: i64, config: &MlpConfig) -> nn::Sequential {
    let linear_config = config.hidden_linear_config();
    let activation = config.activation;

    let mut trunk = nn::seq();
    let mut dim = in_dim;
    for layer in 0..config.num_layers.max(1) {
        trunk = trunk
            .add(nn::linear(
                path / format!("fc{}", layer + 1),
                dim,
                config.hidden_dim,
                linear_config,
            ))
            .add_fn(move |x| activation.apply(x));
        dim = config.hidden_dim;
    }
    trunk
}

/// Multi-layer perceptron actor-critic for discrete actions
///
/// Implements an actor-critic architecture with:
/// - Shared feature extraction layers over the flattened stacked frames
/// - Orthogonal weight initialization (better for RL)
/// - Separate policy head (outputs action logits)
/// - Separate value head (outputs state value estimate)
pub struct MlpActorCritic {
    shared: nn::Sequential,
    policy_head: nn::Linear,
    value_head: nn::Linear,
    hidden_dim: i64,
    device: Device,
}

impl MlpActorCritic {
    /// Create the network's variables under `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Variable store path to create parameters under
    /// * `obs_dim` - Flattened observation size (`frames * H * W`)
    /// * `action_dim` - Number of discrete actions
    /// * `config` - Architecture configuration
    pub fn new(path: &nn::Path, obs_dim: i64, action_dim: i64, config: &MlpConfig) -> Self {
        let shared = mlp_trunk(&(path / "shared"), obs_dim, config);

        // Policy and value heads with smaller gain for output layers
        let output_config = config.output_linear_config();
        let policy_head = nn::linear(path / "policy", config.hidden_dim, action_dim, output_config);
        let value_head = nn::linear(path / "value", config.hidden_dim, 1, output_config);

        Self {
            shared,
            policy_head,
            value_head,
            hidden_dim: config.hidden_dim,
            device: path.device(),
        }
    }

    /// Forward pass: compute action logits, values and features
    pub fn forward(&self, obs: &Tensor) -> (Tensor, Tensor, Tensor) {
        let flat = obs.flatten(1, -1).to_kind(Kind::Float);
        let features = self.shared.forward(&flat);
        let logits = self.policy_head.forward(&features);
        let values = self.value_head.forward(&features).squeeze_dim(-1);
        (logits, values, features)
    }
}

impl PolicyValueAgent for MlpActorCritic {
    fn get_action(&self, states: &Tensor) -> AgentOutput {
        let (logits, value, feature) = self.forward(states);

        // Use log_softmax for numerical stability
        let log_probs_all = logits.log_softmax(-1, Kind::Float);
        let probs = log_probs_all.exp();

        let action = probs.multinomial(1, true).squeeze_dim(-1);
        let log_prob = log_probs_all.gather(-1, &action.unsqueeze(-1), false).squeeze_dim(-1);

        // H = -Σ p(x) * log(p(x)), averaged over the batch
        let entropy =
            -(&probs * &log_probs_all).sum_dim_intlist(-1, false, Kind::Float).mean(Kind::Float);

        AgentOutput { action, log_prob, entropy, value, feature }
    }

    fn feature_size(&self) -> usize {
        self.hidden_dim as usize
    }

    fn device(&self) -> Device {
        self.device
    }
}

/// Actor-critic and curiosity module sharing one variable store
///
/// A single optimizer built from [`optimizer`](Self::optimizer) covers both
/// parameter sets, so one backward pass and one step train them jointly.
pub struct MlpIcmNetworks {
    vs: nn::VarStore,
    agent: MlpActorCritic,
    curiosity: MlpCuriosity,
}

impl MlpIcmNetworks {
    /// Build both networks on CUDA when available, otherwise CPU
    ///
    /// # Arguments
    ///
    /// * `obs_shape` - Observation shape, normally `(frames, H, W)`
    /// * `num_actions` - Number of discrete actions
    /// * `config` - Architecture shared by every MLP
    pub fn new(obs_shape: &[usize], num_actions: usize, config: MlpConfig) -> Self {
        Self::with_device(obs_shape, num_actions, config, Device::cuda_if_available())
    }

    /// Build both networks on `device`
    pub fn with_device(
        obs_shape: &[usize],
        num_actions: usize,
        config: MlpConfig,
        device: Device,
    ) -> Self {
        tracing::info!("MlpIcmNetworks using device: {:?}", device);
        let vs = nn::VarStore::new(device);
        let root = vs.root();

        let obs_dim = obs_shape.iter().product::<usize>() as i64;
        let action_dim = num_actions as i64;

        let agent = MlpActorCritic::new(&(&root / "a2c"), obs_dim, action_dim, &config);
        let curiosity = MlpCuriosity::new(&(&root / "icm"), obs_dim, action_dim, &config);

        Self { vs, agent, curiosity }
    }

    /// Create an Adam optimizer over both networks
    pub fn optimizer(&self, learning_rate: f64) -> Result<nn::Optimizer> {
        Ok(nn::Adam::default().build(&self.vs, learning_rate)?)
    }

    /// The actor-critic
    pub fn agent(&self) -> &MlpActorCritic {
        &self.agent
    }

    /// The curiosity module
    pub fn curiosity(&self) -> &MlpCuriosity {
        &self.curiosity
    }

    /// Get reference to variable store
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Split into the variable store and the two networks
    pub fn into_parts(self) -> (nn::VarStore, MlpActorCritic, MlpCuriosity) {
        (self.vs, self.agent, self.curiosity)
    }

    /// Save model parameters to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.vs.save(path)?;
        Ok(())
    }

    /// Load model parameters from a file
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.vs.load(path)?;
        Ok(())
    }
}
