//! Utility functions and helpers

pub mod running_stats;

pub use running_stats::RunningMeanStd;

/// UTC timestamp identifying a run, formatted `%Y-%m-%d %H_%M_%S`
pub fn run_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H_%M_%S").to_string()
}
