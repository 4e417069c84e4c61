//! Running per-dimension statistics
//!
//! Used to follow the distribution of feature embeddings over a run.

use anyhow::{ensure, Result};
use tch::{Device, Kind, Tensor};

/// Running mean and standard deviation per dimension
///
/// Merges batches with the parallel variance formula, so the result does
/// not depend on how samples were split into batches.
#[derive(Debug, Clone)]
pub struct RunningMeanStd {
    mean: Vec<f64>,
    var: Vec<f64>,
    count: f64,
    epsilon: f64,
}

impl RunningMeanStd {
    /// Create statistics for `dim` dimensions
    ///
    /// # Arguments
    /// * `dim` - Number of dimensions per sample
    /// * `epsilon` - Small constant added to the variance before taking roots
    pub fn new(dim: usize, epsilon: f64) -> Self {
        Self { mean: vec![0.0; dim], var: vec![0.0; dim], count: 0.0, epsilon }
    }

    /// Number of dimensions per sample
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Merge a batch of samples stored row-major in `data`
    ///
    /// # Arguments
    /// * `data` - `batch_size * dim` values, one sample per row
    pub fn update(&mut self, data: &[f32]) -> Result<()> {
        let dim = self.dim();
        ensure!(
            dim > 0 && data.len() % dim == 0,
            "batch of {} values does not divide into samples of {}",
            data.len(),
            dim
        );
        if data.is_empty() {
            return Ok(());
        }

        let batch_size = (data.len() / dim) as f64;

        let mut batch_mean = vec![0.0; dim];
        for row in data.chunks(dim) {
            for (acc, &x) in batch_mean.iter_mut().zip(row) {
                *acc += x as f64;
            }
        }
        batch_mean.iter_mut().for_each(|m| *m /= batch_size);

        let mut batch_var = vec![0.0; dim];
        for row in data.chunks(dim) {
            for ((acc, &x), m) in batch_var.iter_mut().zip(row).zip(&batch_mean) {
                let diff = x as f64 - m;
                *acc += diff * diff;
            }
        }
        batch_var.iter_mut().for_each(|v| *v /= batch_size);

        let total = self.count + batch_size;
        for i in 0..dim {
            let delta = batch_mean[i] - self.mean[i];
            let m2 = self.var[i] * self.count
                + batch_var[i] * batch_size
                + delta * delta * self.count * batch_size / total;
            self.mean[i] += delta * batch_size / total;
            self.var[i] = m2 / total;
        }
        self.count = total;
        Ok(())
    }

    /// Merge a `[batch, dim]` tensor, detaching it and moving it to the CPU
    pub fn update_tensor(&mut self, batch: &Tensor) -> Result<()> {
        let size = batch.size();
        ensure!(
            size.len() == 2 && size[1] == self.dim() as i64,
            "expected a [batch, {}] tensor, got {:?}",
            self.dim(),
            size
        );
        let flat =
            batch.detach().to_device(Device::Cpu).to_kind(Kind::Float).contiguous().view([-1]);
        let data = Vec::<f32>::try_from(&flat)?;
        self.update(&data)
    }

    /// Get current mean
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Get current standard deviation
    pub fn std(&self) -> Vec<f64> {
        self.var.iter().map(|v| (v + self.epsilon).sqrt()).collect()
    }

    /// Get number of samples seen
    pub fn count(&self) -> f64 {
        self.count
    }
}
