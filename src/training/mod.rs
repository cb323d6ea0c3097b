//! Training orchestration.
//!
//! - [`TrainingConfig`] / [`TrainingPlan`]: validated configuration with
//!   derived quantities resolved once
//! - [`Trainer`]: epoch loop over a fixed [`LossStrategy`](crate::energy::LossStrategy)
//! - [`Checkpointer`]: model persistence
//! - [`ProgressReporter`]: per-epoch logging with ETA

mod checkpoint;
mod config;
mod error;
mod metrics;
mod trainer;

pub use checkpoint::{Checkpointer, RecorderCheckpointer};
pub use config::{TrainingConfig, TrainingPlan};
pub use error::TrainingError;
pub use metrics::{EpochMetrics, ProgressReporter, TrainingHistory};
pub use trainer::Trainer;
