//! Error types for energy evaluation.

use thiserror::Error;

/// Errors raised at the boundary of the energy functional's operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnergyError {
    /// Batch shape does not match the operator or its partner batch.
    #[error("Shape mismatch in {operation}: expected {expected}, got {actual}")]
    ShapeMismatch {
        operation: &'static str,
        expected: String,
        actual: String,
    },

    /// Operator store unusable for this functional.
    #[error("Inconsistent dimension: {0}")]
    InconsistentDimension(String),

    /// Reference solutions with zero energy norm.
    #[error("Reference solution has zero norm for samples {samples:?}")]
    DegenerateReference { samples: Vec<usize> },

    /// Invalid energy configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Device to host transfer failed.
    #[error("Data transfer failed: {0}")]
    DataTransfer(String),
}

impl EnergyError {
    /// Create a shape mismatch error.
    pub fn shape_mismatch(
        operation: &'static str,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ShapeMismatch {
            operation,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
