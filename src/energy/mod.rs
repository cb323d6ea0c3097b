//! Physics-informed energy functional and its diagnostics.
//!
//! # Usage
//!
//! ```ignore
//! use amortized_fem::energy::{EnergyConfig, EnergyFunctional};
//!
//! let functional = EnergyFunctional::<B>::new(store.clone(), EnergyConfig::default(), &device)?;
//! let loss = functional.amortized_loss(controls, predicted)?;
//! let gap = functional.amortization_gap(controls, predicted, references)?;
//! ```

mod config;
mod diagnostics;
mod error;
mod functional;
mod spmv;

pub use config::{EnergyConfig, MassTerm};
pub use diagnostics::NormalizedErrorReport;
pub use error::EnergyError;
pub use functional::{EnergyFunctional, LossStrategy};
pub use spmv::BatchedSparseOperator;
