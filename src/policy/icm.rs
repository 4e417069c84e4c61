//! MLP Intrinsic Curiosity Module
//!
//! Three small networks over a feature space of width `hidden_dim`:
//!
//! ```text
//! encoder:  s            -> φ(s)
//! forward:  φ(s_t), a_t  -> φ̂(s_{t+1})
//! inverse:  φ(s_t), φ(s_{t+1}) -> logits(a_t)
//! ```
//!
//! States arrive time-major, `(T+1) * N` of them, so the encodings of
//! `s_t` are the first `T * N` rows and those of `s_{t+1}` start `N` rows
//! later.

use anyhow::{ensure, Result};
use tch::{
    Kind, Tensor,
    nn::{self, Module},
};

use super::mlp::{mlp_trunk, MlpConfig};
use super::{CuriosityModule, CuriosityOutput};
use crate::error::CurioError;

/// Encoder, forward model and inverse model built from MLPs
pub struct MlpCuriosity {
    encoder: nn::Sequential,
    forward_model: nn::Sequential,
    inverse_model: nn::Sequential,
    num_actions: i64,
    feature_size: i64,
}

impl MlpCuriosity {
    /// Create the module's variables under `path`
    ///
    /// The feature width equals `config.hidden_dim`, matching
    /// [`MlpActorCritic`](super::MlpActorCritic) built from the same config.
    pub fn new(path: &nn::Path, obs_dim: i64, num_actions: i64, config: &MlpConfig) -> Self {
        let hidden = config.hidden_dim;
        let head = config.output_linear_config();
        let activation = config.activation;

        let encoder = mlp_trunk(&(path / "encoder"), obs_dim, config);

        let forward_model = nn::seq()
            .add(nn::linear(
                path / "forward" / "fc1",
                hidden + num_actions,
                hidden,
                config.hidden_linear_config(),
            ))
            .add_fn(move |x| activation.apply(x))
            .add(nn::linear(path / "forward" / "out", hidden, hidden, head));

        let inverse_model = nn::seq()
            .add(nn::linear(
                path / "inverse" / "fc1",
                2 * hidden,
                hidden,
                config.hidden_linear_config(),
            ))
            .add_fn(move |x| activation.apply(x))
            .add(nn::linear(path / "inverse" / "out", hidden, num_actions, head));

        Self { encoder, forward_model, inverse_model, num_actions, feature_size: hidden }
    }

    /// Encode a batch of states `[B, ...]` into features `[B, hidden_dim]`
    pub fn encode(&self, states: &Tensor) -> Tensor {
        self.encoder.forward(&states.flatten(1, -1).to_kind(Kind::Float))
    }
}

impl CuriosityModule for MlpCuriosity {
    fn forward(
        &self,
        num_envs: usize,
        states: &Tensor,
        actions: &Tensor,
    ) -> Result<CuriosityOutput> {
        let n = num_envs as i64;
        let total = states.size()[0];
        let transitions = actions.size()[0];

        ensure!(
            n > 0 && total == transitions + n,
            CurioError::Shape {
                field: "icm_states",
                expected: vec![transitions + n],
                actual: vec![total],
            }
        );

        let phi = self.encode(states);
        let phi_t = phi.narrow(0, 0, transitions);
        let phi_next = phi.narrow(0, n, transitions);

        let action_onehot = actions.onehot(self.num_actions).to_kind(Kind::Float);
        let predicted_features =
            self.forward_model.forward(&Tensor::cat(&[&phi_t, &action_onehot], 1));
        let predicted_action_logits =
            self.inverse_model.forward(&Tensor::cat(&[&phi_t, &phi_next], 1));

        Ok(CuriosityOutput { features: phi_next, predicted_features, predicted_action_logits })
    }

    fn num_actions(&self) -> usize {
        self.num_actions as usize
    }

    fn feature_size(&self) -> usize {
        self.feature_size as usize
    }
}
