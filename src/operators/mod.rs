//! Discretization operators on the host.
//!
//! This module provides:
//! - `f32` CSR storage for provider matrices (`CsrMatrix`)
//! - The write-once operator store of a PDE instance (`OperatorStore`)
//! - Degree normalization of mesh adjacency (`GraphNormalizer`)

mod adjacency;
mod sparse;
mod store;

pub use adjacency::{GraphError, GraphNormalizer, NormalizedAdjacency};
pub use sparse::CsrMatrix;
pub use store::{BoundaryPartition, OperatorError, OperatorKind, OperatorStore};
