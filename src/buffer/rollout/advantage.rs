//! Discounted returns and A2C loss terms
//!
//! Returns are bootstrapped from the critic's estimate of the state that
//! follows the rollout:
//!
//! ```text
//! R_T = V(s_T)
//! R_t = r_t + γ * R_{t+1} * (1 - done_t)
//! A_t = R_t - V(s_t)
//! ```
//!
//! A done flag at step `t` zeroes the propagated term, so a return never
//! crosses an episode boundary backwards.

use tch::{Kind, Tensor};

/// Compute bootstrapped discounted returns
///
/// # Arguments
/// * `rewards` - Rewards `[num_steps, num_envs]`
/// * `dones` - Done flags as 0.0/1.0 `[num_steps, num_envs]`
/// * `final_value` - Bootstrap value estimates `[num_envs]`
/// * `gamma` - Discount factor
///
/// # Returns
/// Returns tensor `[num_steps, num_envs]`
pub fn compute_returns(
    rewards: &Tensor,
    dones: &Tensor,
    final_value: &Tensor,
    gamma: f64,
) -> Tensor {
    let num_steps = rewards.size()[0];

    let mut running = final_value.shallow_clone();
    let mut returns = Vec::with_capacity(num_steps as usize);

    for t in (0..num_steps).rev() {
        running = rewards.get(t) + gamma * &running * (1.0 - dones.get(t));
        returns.push(running.shallow_clone());
    }

    returns.reverse();
    Tensor::stack(&returns, 0)
}

/// Policy-gradient loss `-mean(log_prob * A)` with the advantage detached
///
/// Only the actor receives gradient from this term.
pub fn a2c_policy_loss(log_probs: &Tensor, advantages: &Tensor) -> Tensor {
    -(log_probs * advantages.detach()).mean(Kind::Float)
}

/// Critic loss `mean(A²)`
pub fn a2c_value_loss(advantages: &Tensor) -> Tensor {
    advantages.square().mean(Kind::Float)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f32]) -> Tensor {
        Tensor::from_slice(values).view([-1, 1])
    }

    fn to_vec(t: &Tensor) -> Vec<f32> {
        Vec::<f32>::try_from(t.flatten(0, -1)).unwrap()
    }

    #[test]
    fn test_returns_without_terminals() {
        let rewards = column(&[1.0, 1.0, 1.0]);
        let dones = column(&[0.0, 0.0, 0.0]);
        let final_value = Tensor::from_slice(&[0.0f32]);

        let returns = to_vec(&compute_returns(&rewards, &dones, &final_value, 0.9));

        // R_2 = 1, R_1 = 1 + 0.9 * 1, R_0 = 1 + 0.9 * 1.9
        assert!((returns[2] - 1.0).abs() < 1e-6);
        assert!((returns[1] - 1.9).abs() < 1e-6);
        assert!((returns[0] - 2.71).abs() < 1e-5);
    }

    #[test]
    fn test_done_blocks_bootstrap() {
        let rewards = column(&[1.0, 1.0]);
        let dones = column(&[1.0, 0.0]);
        let final_value = Tensor::from_slice(&[5.0f32]);

        let returns = to_vec(&compute_returns(&rewards, &dones, &final_value, 0.9));

        assert!((returns[1] - 5.5).abs() < 1e-6);
        assert!((returns[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_environments_are_independent() {
        // Two environments, only the second one terminates at step 0
        let rewards = Tensor::from_slice(&[1.0f32, 1.0, 0.0, 0.0]).view([2, 2]);
        let dones = Tensor::from_slice(&[0.0f32, 1.0, 0.0, 0.0]).view([2, 2]);
        let final_value = Tensor::from_slice(&[2.0f32, 2.0]);

        let returns = to_vec(&compute_returns(&rewards, &dones, &final_value, 0.5));

        // env 0: R_1 = 0 + 0.5 * 2 = 1, R_0 = 1 + 0.5 * 1 = 1.5
        // env 1: R_1 = 1, R_0 = 1 (terminal)
        assert_eq!(returns, vec![1.5, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_policy_loss_detaches_advantages() {
        let log_probs = Tensor::from_slice(&[-0.5f32, -1.0]).set_requires_grad(true);
        let advantages = Tensor::from_slice(&[2.0f32, 1.0]).set_requires_grad(true);

        let loss = a2c_policy_loss(&log_probs, &advantages);
        let value: f64 = f64::try_from(&loss).unwrap();
        // -mean([-1.0, -1.0]) = 1.0
        assert!((value - 1.0).abs() < 1e-6);

        loss.backward();
        assert!(log_probs.grad().defined());
        assert!(!advantages.grad().defined());
    }

    #[test]
    fn test_value_loss() {
        let advantages = Tensor::from_slice(&[1.0f32, -3.0]);
        let loss: f64 = f64::try_from(&a2c_value_loss(&advantages)).unwrap();
        assert!((loss - 5.0).abs() < 1e-6);
    }
}
