//! Error type of the training orchestrator.

use thiserror::Error;

use crate::data::SampleFileError;
use crate::energy::EnergyError;
use crate::operators::OperatorError;

/// Errors raised while configuring or running a training job.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Operator store or side-information construction failed, including
    /// graph normalization (`OperatorError::Graph`)
    #[error(transparent)]
    Operator(#[from] OperatorError),

    /// Energy evaluation failed
    #[error(transparent)]
    Energy(#[from] EnergyError),

    /// Sample data could not be read or assembled
    #[error(transparent)]
    Data(#[from] SampleFileError),

    /// Configuration rejected before training started
    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    /// Model persistence failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}
