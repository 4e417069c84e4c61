//! Tests for rollout buffer functionality

#[cfg(test)]
mod storage_tests {
    use tch::{Device, Kind, Tensor};

    use crate::buffer::rollout::storage::RolloutBuffer;
    use crate::env::{StepInfo, VecStepResult};
    use crate::error::CurioError;

    const FEATURES: usize = 2;

    fn buffer(num_steps: usize, num_envs: usize) -> RolloutBuffer {
        RolloutBuffer::with_shape(num_steps, num_envs, &[1, 1, 1], FEATURES, 0.9, Device::Cpu)
            .unwrap()
    }

    fn obs(num_envs: usize, value: f32) -> Vec<Vec<f32>> {
        vec![vec![value]; num_envs]
    }

    /// Insert step `t` with constant reward 1 and placeholder policy outputs
    fn insert_step(buffer: &mut RolloutBuffer, t: usize, done: bool) {
        let (_, n) = buffer.shape();
        let n_i = n as i64;
        buffer
            .insert(
                t,
                &vec![1.0; n],
                &obs(n, (t + 1) as f32),
                &Tensor::ones([n_i], (Kind::Int64, Device::Cpu)),
                &Tensor::zeros([n_i], (Kind::Float, Device::Cpu)),
                &Tensor::zeros([n_i], (Kind::Float, Device::Cpu)),
                &vec![done; n],
                &Tensor::zeros([n_i, FEATURES as i64], (Kind::Float, Device::Cpu)),
            )
            .unwrap();
    }

    fn fill(buffer: &mut RolloutBuffer) {
        let (num_steps, num_envs) = buffer.shape();
        for t in 0..num_steps {
            insert_step(buffer, t, false);
        }
        buffer
            .set_final_feature(&Tensor::zeros(
                [num_envs as i64, FEATURES as i64],
                (Kind::Float, Device::Cpu),
            ))
            .unwrap();
    }

    fn scalar(t: &Tensor) -> f64 {
        f64::try_from(t).unwrap()
    }

    #[test]
    fn test_slot_counts_after_full_rollout() {
        let mut buffer = buffer(5, 2);
        buffer.reset_initial(&obs(2, 0.0)).unwrap();

        for t in 0..5 {
            insert_step(&mut buffer, t, false);
        }
        assert_eq!(buffer.filled_steps(), 5);
        assert_eq!(buffer.filled_features(), 5);

        buffer
            .set_final_feature(&Tensor::zeros([2, FEATURES as i64], (Kind::Float, Device::Cpu)))
            .unwrap();
        assert_eq!(buffer.filled_steps(), 5);
        assert_eq!(buffer.filled_features(), 6);
    }

    #[test]
    fn test_observations_land_in_next_slot() {
        let mut buffer = buffer(3, 1);
        buffer.reset_initial(&obs(1, 7.0)).unwrap();
        insert_step(&mut buffer, 0, false);

        assert_eq!(scalar(&buffer.get_state(0).sum(Kind::Float)), 7.0);
        assert_eq!(scalar(&buffer.get_state(1).sum(Kind::Float)), 1.0);
        assert_eq!(buffer.get_state(1).size(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_insert_rejects_wrong_shapes() {
        let mut buffer = buffer(2, 2);
        buffer.reset_initial(&obs(2, 0.0)).unwrap();

        let err = buffer
            .insert(
                0,
                &[1.0, 1.0],
                &obs(2, 0.0),
                &Tensor::zeros([2], (Kind::Int64, Device::Cpu)),
                &Tensor::zeros([2], (Kind::Float, Device::Cpu)),
                &Tensor::zeros([2, 1], (Kind::Float, Device::Cpu)),
                &[false, false],
                &Tensor::zeros([2, FEATURES as i64], (Kind::Float, Device::Cpu)),
            )
            .unwrap_err();

        match err.downcast_ref::<CurioError>() {
            Some(CurioError::Shape { field, .. }) => assert_eq!(*field, "value"),
            other => panic!("expected shape error, got {:?}", other),
        }
        assert_eq!(buffer.filled_steps(), 0);

        // Wrong number of observations
        assert!(buffer.reset_initial(&obs(3, 0.0)).is_err());
        // Wrong observation length
        assert!(buffer.reset_initial(&[vec![0.0, 1.0], vec![0.0, 1.0]]).is_err());
    }

    #[test]
    fn test_insert_rejects_out_of_range_step() {
        let mut buffer = buffer(2, 1);
        let result = buffer.insert(
            2,
            &[0.0],
            &obs(1, 0.0),
            &Tensor::zeros([1], (Kind::Int64, Device::Cpu)),
            &Tensor::zeros([1], (Kind::Float, Device::Cpu)),
            &Tensor::zeros([1], (Kind::Float, Device::Cpu)),
            &[false],
            &Tensor::zeros([1, FEATURES as i64], (Kind::Float, Device::Cpu)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_compute_terms_requires_complete_rollout() {
        let mut buffer = buffer(3, 1);
        buffer.reset_initial(&obs(1, 0.0)).unwrap();
        insert_step(&mut buffer, 0, false);

        let err = buffer.compute_a2c_terms(&Tensor::zeros([1], (Kind::Float, Device::Cpu)));
        let err = err.unwrap_err();
        assert_eq!(
            err.downcast_ref::<CurioError>(),
            Some(&CurioError::Incomplete { filled: 1, expected: 3 })
        );
        assert!(buffer.next_features().is_err());
    }

    #[test]
    fn test_compute_terms_returns() {
        let mut buffer = buffer(3, 1);
        buffer.reset_initial(&obs(1, 0.0)).unwrap();
        fill(&mut buffer);

        let final_value = Tensor::zeros([1], (Kind::Float, Device::Cpu));
        let terms = buffer.compute_a2c_terms(&final_value).unwrap();
        let returns = Vec::<f32>::try_from(&terms.returns.view([-1])).unwrap();

        assert!((returns[0] - 2.71).abs() < 1e-5);
        assert!((returns[1] - 1.9).abs() < 1e-6);
        assert!((returns[2] - 1.0).abs() < 1e-6);

        // Values are zero, so advantages equal returns
        let expected_value_loss = (2.71f64.powi(2) + 1.9f64.powi(2) + 1.0) / 3.0;
        assert!((scalar(&terms.value_loss) - expected_value_loss).abs() < 1e-4);
        // Log probabilities are zero
        assert_eq!(scalar(&terms.policy_loss), 0.0);
        assert_eq!(scalar(&terms.rewards.sum(Kind::Float)), 3.0);
    }

    #[test]
    fn test_done_stops_bootstrap_in_buffer() {
        let mut buffer = buffer(2, 1);
        buffer.reset_initial(&obs(1, 0.0)).unwrap();
        insert_step(&mut buffer, 0, true);
        insert_step(&mut buffer, 1, false);

        let terms = buffer.compute_a2c_terms(&Tensor::from_slice(&[5.0f32])).unwrap();
        let returns = Vec::<f32>::try_from(terms.returns.view([-1])).unwrap();

        assert!((returns[1] - 5.5).abs() < 1e-6);
        assert!((returns[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_value_loss_reaches_critic() {
        let mut buffer = buffer(2, 1);
        buffer.reset_initial(&obs(1, 0.0)).unwrap();

        let critic = Tensor::zeros([1], (Kind::Float, Device::Cpu)).set_requires_grad(true);
        for t in 0..2 {
            buffer
                .insert(
                    t,
                    &[1.0],
                    &obs(1, 0.0),
                    &Tensor::zeros([1], (Kind::Int64, Device::Cpu)),
                    &(&critic * 0.0),
                    &(&critic * 1.0),
                    &[false],
                    &Tensor::zeros([1, FEATURES as i64], (Kind::Float, Device::Cpu)),
                )
                .unwrap();
        }

        let final_value = Tensor::zeros([1], (Kind::Float, Device::Cpu));
        let terms = buffer.compute_a2c_terms(&final_value).unwrap();
        terms.value_loss.backward();
        assert!(critic.grad().defined());
        assert!(!terms.advantages.requires_grad());
    }

    #[test]
    fn test_after_update_reseeds_first_slot() {
        let mut buffer = buffer(4, 2);
        buffer.reset_initial(&obs(2, 0.0)).unwrap();
        fill(&mut buffer);

        let last = buffer.get_state(4).copy();
        buffer.after_update();

        assert!(buffer.get_state(0).equal(&last));
        assert_eq!(scalar(&buffer.get_state(1).abs().sum(Kind::Float)), 0.0);
        assert_eq!(buffer.filled_steps(), 0);
        assert_eq!(buffer.filled_features(), 0);
    }

    #[test]
    fn test_no_tensors_retained_across_updates() {
        let mut buffer = buffer(3, 2);
        buffer.reset_initial(&obs(2, 0.0)).unwrap();

        for _ in 0..120 {
            fill(&mut buffer);
            assert_eq!(buffer.retained_tensors(), 3 + 3 + 4);
            buffer.after_update();
            assert_eq!(buffer.retained_tensors(), 0);
        }
    }

    #[test]
    fn test_flattened_views() {
        let mut buffer = buffer(3, 2);
        buffer.reset_initial(&obs(2, 0.0)).unwrap();
        fill(&mut buffer);

        assert_eq!(buffer.states_flat().size(), vec![8, 1, 1, 1]);
        assert_eq!(buffer.actions_flat().size(), vec![6]);
        assert_eq!(buffer.next_features().unwrap().size(), vec![6, FEATURES as i64]);
    }

    #[test]
    fn test_log_episode_rewards() {
        let mut buffer = buffer(2, 2);
        let step = VecStepResult {
            observations: obs(2, 0.0),
            rewards: vec![1.0, 0.5],
            dones: vec![true, false],
            infos: vec![StepInfo::default(); 2],
        };

        buffer.log_episode_rewards(&step);
        let stats = buffer.reward_stats().unwrap();
        assert_eq!(stats.episodes, 1);
        assert_eq!(stats.mean, 1.0);
        assert_eq!(buffer.episodes().running(), &[0.0, 0.5]);
    }
}
