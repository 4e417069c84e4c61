//! Training algorithms
//!
//! This module implements A2C training with an Intrinsic Curiosity Module.

pub mod a2c;

pub use a2c::{
    AggregatedStats, CoefficientSchedule, CuriosityLoss, DecayRule, Runner, ScheduleConfig,
    TrainingConfig, TrainingReport, UpdateStats,
};
