//! # amortized-fem
//!
//! Physics-informed amortized solvers for a semilinear elliptic PDE.
//!
//! A learned approximator maps a batch of source terms (controls) on a fixed
//! finite-element mesh to predicted states. It is trained either by
//! minimizing the variational energy of
//!
//! ```text
//! -Δu + w_mass u + w_quartic u³ = f
//! ```
//!
//! directly (amortized, no reference solutions needed) or by regression onto
//! reference solutions (supervised).
//!
//! This crate provides:
//! - The PDE provider boundary and a P1 unit-square reference provider
//! - A write-once operator store (stiffness, mass, area, boundary, adjacency)
//! - Symmetric normalized graph adjacency
//! - A batched energy functional with loss, gap and error diagnostics
//! - Sample file reading, splitting and batching
//! - A baseline approximator and a training orchestrator with checkpoints
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use amortized_fem::{OperatorStore, UnitSquareP1, EnergyFunctional, EnergyConfig};
//!
//! let store = Arc::new(OperatorStore::build(&UnitSquareP1::new(16))?);
//! let functional = EnergyFunctional::<B>::new(store, EnergyConfig::default(), &device)?;
//! let energies = functional.per_sample_amortized_energy(controls, states)?;
//! ```

pub mod backend;
pub mod data;
pub mod energy;
pub mod graph;
pub mod model;
pub mod operators;
pub mod pde;
pub mod training;

// Re-export main types for convenience
pub use backend::SolverBackend;
#[cfg(feature = "ndarray")]
pub use backend::{CpuAutodiffBackend, CpuBackend};
pub use data::{read_sample_matrix, Batch, SampleFileError, SampleMatrix, SampleSet};
pub use energy::{EnergyConfig, EnergyError, EnergyFunctional, LossStrategy, MassTerm, NormalizedErrorReport};
pub use graph::GraphInfo;
pub use model::{AmortizedSolver, BoundaryMlp, BoundaryMlpConfig};
pub use operators::{
    BoundaryPartition, CsrMatrix, GraphError, GraphNormalizer, OperatorError, OperatorKind, OperatorStore,
};
pub use pde::{OperatorMatrix, PdeProvider, UnitSquareP1};
pub use training::{
    Checkpointer, EpochMetrics, RecorderCheckpointer, Trainer, TrainingConfig, TrainingError, TrainingHistory,
    TrainingPlan,
};
