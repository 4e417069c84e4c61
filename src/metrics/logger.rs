//! JSON metrics logger
//!
//! Artifacts of a run go to `<log_dir>/<env_name>/<timestamp>/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tch::{Kind, Tensor};

use super::MetricsLogger;
use crate::utils::RunningMeanStd;

/// Name of the metrics file inside the run directory
pub const METRICS_FILE: &str = "metrics.json";

/// Metrics of a single update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    /// Update index (0-based)
    pub update: usize,
    /// Mean reward over steps and environments
    pub reward_mean: f64,
    /// Standard deviation of the rewards
    pub reward_std: f64,
    /// Mean over all feature components
    pub feature_mean: f64,
    /// Standard deviation over all feature components
    pub feature_std: f64,
}

#[derive(Serialize)]
struct MetricsFile<'a> {
    env_name: &'a str,
    timestamp: &'a str,
    records: &'a [MetricRecord],
    feature_running_mean: &'a [f64],
    feature_running_std: Vec<f64>,
}

/// Logger that keeps one [`MetricRecord`] per update in memory
///
/// Feature statistics are also folded into a per-dimension
/// [`RunningMeanStd`] over the whole run.
#[derive(Debug, Clone)]
pub struct TemporalLogger {
    env_name: String,
    timestamp: String,
    data_dir: PathBuf,
    records: Vec<MetricRecord>,
    feature_stats: Option<RunningMeanStd>,
}

impl TemporalLogger {
    /// Create a logger for one run
    ///
    /// # Arguments
    /// * `env_name` - Environment name, the first directory level
    /// * `timestamp` - Run timestamp, the second directory level
    /// * `log_dir` - Root directory for all runs
    pub fn new(env_name: &str, timestamp: &str, log_dir: impl AsRef<Path>) -> Self {
        let data_dir = log_dir.as_ref().join(env_name).join(timestamp);
        Self {
            env_name: env_name.to_string(),
            timestamp: timestamp.to_string(),
            data_dir,
            records: Vec::new(),
            feature_stats: None,
        }
    }

    /// Records logged so far
    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Running per-dimension feature statistics, once any feature was logged
    pub fn feature_stats(&self) -> Option<&RunningMeanStd> {
        self.feature_stats.as_ref()
    }

    fn mean_std(t: &Tensor) -> (f64, f64) {
        let t = t.detach().to_kind(Kind::Float);
        let mean = f64::try_from(&t.mean(Kind::Float)).unwrap_or(f64::NAN);
        let std =
            if t.numel() > 1 { f64::try_from(&t.std(false)).unwrap_or(f64::NAN) } else { 0.0 };
        (mean, std)
    }
}

impl MetricsLogger for TemporalLogger {
    fn log(&mut self, rewards: &Tensor, features: &Tensor) -> Result<()> {
        let (reward_mean, reward_std) = Self::mean_std(rewards);
        let (feature_mean, feature_std) = Self::mean_std(features);

        let feature_dim = features.size().last().copied().unwrap_or(1).max(1) as usize;
        let stats =
            self.feature_stats.get_or_insert_with(|| RunningMeanStd::new(feature_dim, 1e-8));
        stats.update_tensor(&features.reshape([-1, feature_dim as i64]))?;

        self.records.push(MetricRecord {
            update: self.records.len(),
            reward_mean,
            reward_std,
            feature_mean,
            feature_std,
        });
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating log directory {}", self.data_dir.display()))?;

        let (running_mean, running_std) = match &self.feature_stats {
            Some(stats) => (stats.mean().to_vec(), stats.std()),
            None => (Vec::new(), Vec::new()),
        };
        let file = MetricsFile {
            env_name: &self.env_name,
            timestamp: &self.timestamp,
            records: &self.records,
            feature_running_mean: &running_mean,
            feature_running_std: running_std,
        };

        let path = self.data_dir.join(METRICS_FILE);
        fs::write(&path, serde_json::to_string_pretty(&file)?)
            .with_context(|| format!("writing {}", path.display()))?;

        tracing::debug!(path = %path.display(), records = self.records.len(), "metrics saved");
        Ok(())
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    #[test]
    fn test_data_dir_layout() {
        let logger = TemporalLogger::new("Bandit", "2024-01-01 00_00_00", "/tmp/runs");
        assert_eq!(logger.data_dir(), Path::new("/tmp/runs/Bandit/2024-01-01 00_00_00"));
    }

    #[test]
    fn test_log_records_statistics() {
        let mut logger = TemporalLogger::new("Bandit", "t", "/tmp/unused");
        let rewards = Tensor::from_slice(&[0.0f32, 1.0, 0.0, 1.0]).view([2, 2]);
        let features = Tensor::ones([4, 3], (Kind::Float, Device::Cpu));

        logger.log(&rewards, &features).unwrap();
        logger.log(&rewards, &features).unwrap();

        let records = logger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].update, 1);
        assert!((records[0].reward_mean - 0.5).abs() < 1e-6);
        assert!((records[0].reward_std - 0.5).abs() < 1e-6);
        assert!((records[0].feature_mean - 1.0).abs() < 1e-6);
        assert_eq!(logger.feature_stats().unwrap().count(), 8.0);
    }

    #[test]
    fn test_save_writes_metrics_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = TemporalLogger::new("Bandit", "run", dir.path());
        let rewards = Tensor::zeros([2, 1], (Kind::Float, Device::Cpu));
        let features = Tensor::zeros([2, 4], (Kind::Float, Device::Cpu));
        logger.log(&rewards, &features).unwrap();
        logger.save().unwrap();

        let path = dir.path().join("Bandit").join("run").join(METRICS_FILE);
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(json["env_name"], "Bandit");
        assert_eq!(json["records"].as_array().unwrap().len(), 1);
        assert_eq!(json["feature_running_mean"].as_array().unwrap().len(), 4);
    }
}
