//! Physics-informed batched energy functional.
//!
//! For a batch of controls `X_c` and states `X_s` (both [batch, num_dofs])
//! the per-sample energy is
//!
//! ```text
//! e = ½ X_sᵀA X_s + w_mass·½ M(X_s) + w_quartic·¼ Σ area·X_s⁴ − X_sᵀ K X_c
//! ```
//!
//! Minimizing `e` over `X_s` for fixed `X_c` is the variational form of
//! `-Δu + w_mass u + w_quartic u³ = f`, so the energy itself serves as the
//! unsupervised training objective.

use std::fmt;
use std::sync::Arc;

use burn::prelude::*;

use super::{BatchedSparseOperator, EnergyConfig, EnergyError, MassTerm};
use crate::backend::tensor_from_slice;
use crate::data::Batch;
use crate::operators::{OperatorKind, OperatorStore};

/// Loss used to train the approximator, fixed for a whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LossStrategy {
    /// Minimize the physics energy; no reference solutions needed
    Amortized,
    /// Regress onto reference solutions in the mass-operator norm
    Supervised,
}

impl fmt::Display for LossStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossStrategy::Amortized => write!(f, "amortized"),
            LossStrategy::Supervised => write!(f, "supervised"),
        }
    }
}

/// Energy functional bound to one immutable [`OperatorStore`].
///
/// Operators are uploaded to the device once at construction and reused by
/// every loss variant.
#[derive(Clone, Debug)]
pub struct EnergyFunctional<B: Backend> {
    store: Arc<OperatorStore>,
    config: EnergyConfig,
    pub(super) stiffness: BatchedSparseOperator<B>,
    pub(super) mass: BatchedSparseOperator<B>,
    /// Area weights broadcast over the batch: [1, num_dofs]
    area: Tensor<B, 2>,
    num_dofs: usize,
}

impl<B: Backend> EnergyFunctional<B> {
    /// Build the functional and upload its operators to `device`.
    ///
    /// # Errors
    /// - `InvalidConfig` if the weights are negative or not finite
    /// - `InconsistentDimension` if `num_dofs != num_vertices`, since the
    ///   quartic term weights dofs by per-vertex area
    pub fn new(store: Arc<OperatorStore>, config: EnergyConfig, device: &B::Device) -> Result<Self, EnergyError> {
        config.validate()?;
        let num_dofs = store.num_dofs();
        if store.num_vertices() != num_dofs {
            return Err(EnergyError::InconsistentDimension(format!(
                "area weights cover {} vertices but the state has {} dofs",
                store.num_vertices(),
                num_dofs
            )));
        }

        let stiffness = BatchedSparseOperator::from_csr(store.stiffness(), device);
        let mass = BatchedSparseOperator::from_csr(store.mass(), device);
        let area = tensor_from_slice(store.area_weights(), device).reshape([1, num_dofs]);

        Ok(Self {
            store,
            config,
            stiffness,
            mass,
            area,
            num_dofs,
        })
    }

    /// Energy configuration.
    pub fn config(&self) -> &EnergyConfig {
        &self.config
    }

    /// Operator store this functional evaluates against.
    pub fn store(&self) -> &Arc<OperatorStore> {
        &self.store
    }

    /// Degrees of freedom per sample.
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    fn operator(&self, kind: OperatorKind) -> &BatchedSparseOperator<B> {
        match kind {
            OperatorKind::Stiffness => &self.stiffness,
            OperatorKind::Mass => &self.mass,
        }
    }

    /// Validate a single batch matrix: rank 2, second dimension `num_dofs`.
    pub(super) fn check_batch(&self, operation: &'static str, x: &Tensor<B, 2>) -> Result<[usize; 2], EnergyError> {
        let dims = x.dims();
        if dims[1] != self.num_dofs {
            return Err(EnergyError::shape_mismatch(
                operation,
                format!("[batch, {}]", self.num_dofs),
                format!("{:?}", dims),
            ));
        }
        Ok(dims)
    }

    /// Validate two aligned batch matrices of identical shape.
    pub(super) fn check_pair(
        &self,
        operation: &'static str,
        x: &Tensor<B, 2>,
        y: &Tensor<B, 2>,
    ) -> Result<[usize; 2], EnergyError> {
        let dims = self.check_batch(operation, x)?;
        let other = y.dims();
        if other != dims {
            return Err(EnergyError::shape_mismatch(
                operation,
                format!("{:?}", dims),
                format!("{:?}", other),
            ));
        }
        Ok(dims)
    }

    /// Energy of every sample, shapes already validated.
    pub(super) fn energy_unchecked(&self, x_c: Tensor<B, 2>, x_s: Tensor<B, 2>) -> Tensor<B, 1> {
        let stiffness = self.stiffness.quadratic_form(x_s.clone());

        let x2 = x_s.clone().mul(x_s.clone());
        let mass = match self.config.mass_term {
            MassTerm::Operator(kind) => self.operator(kind).quadratic_form(x_s.clone()),
            MassTerm::LumpedArea => x2.clone().mul(self.area.clone()).sum_dim(1).squeeze::<1>(1),
        };
        let quartic = x2.clone().mul(x2).mul(self.area.clone()).sum_dim(1).squeeze::<1>(1);
        let coupling = self.operator(self.config.coupling).bilinear_form(x_s, x_c);

        stiffness
            .mul_scalar(0.5)
            .add(mass.mul_scalar(0.5 * self.config.mass_weight))
            .add(quartic.mul_scalar(0.25 * self.config.quartic_weight))
            .sub(coupling)
    }

    /// Per-sample energy: [batch].
    ///
    /// # Errors
    /// `ShapeMismatch` unless both inputs are [batch, num_dofs] with equal batch.
    pub fn per_sample_amortized_energy(&self, x_c: Tensor<B, 2>, x_s: Tensor<B, 2>) -> Result<Tensor<B, 1>, EnergyError> {
        self.check_pair("per_sample_amortized_energy", &x_c, &x_s)?;
        Ok(self.energy_unchecked(x_c, x_s))
    }

    /// Batch sum of the per-sample energy: the amortized training objective.
    pub fn amortized_loss(&self, x_c: Tensor<B, 2>, x_s: Tensor<B, 2>) -> Result<Tensor<B, 1>, EnergyError> {
        self.check_pair("amortized_loss", &x_c, &x_s)?;
        Ok(self.energy_unchecked(x_c, x_s).sum())
    }

    /// `Σ (X_s − Y_s)ᵀ B (X_s − Y_s)` over the batch.
    pub fn supervised_loss(&self, x_s: Tensor<B, 2>, y_s: Tensor<B, 2>) -> Result<Tensor<B, 1>, EnergyError> {
        self.check_pair("supervised_loss", &x_s, &y_s)?;
        Ok(self.mass.quadratic_form(x_s.sub(y_s)).sum())
    }

    /// Loss selected by `strategy` for a predicted state batch.
    ///
    /// # Errors
    /// `InvalidConfig` for the supervised strategy on a batch without
    /// references; `ShapeMismatch` as for the individual losses.
    pub fn loss(
        &self,
        strategy: LossStrategy,
        batch: &Batch<B>,
        prediction: Tensor<B, 2>,
    ) -> Result<Tensor<B, 1>, EnergyError> {
        match strategy {
            LossStrategy::Amortized => self.amortized_loss(batch.controls.clone(), prediction),
            LossStrategy::Supervised => {
                let references = batch.references.clone().ok_or_else(|| {
                    EnergyError::InvalidConfig("supervised loss requires reference states".into())
                })?;
                self.supervised_loss(prediction, references)
            }
        }
    }
}
