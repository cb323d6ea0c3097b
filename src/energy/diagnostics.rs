//! Evaluation diagnostics against reference solutions.
//!
//! Both diagnostics are computed on detached tensors and downloaded to the
//! host; they are reported, never differentiated.

use burn::prelude::*;
use log::warn;

use super::{EnergyError, EnergyFunctional};
use crate::backend::{tensor_to_scalar, tensor_to_vec};

/// Per-sample relative errors in the mass-operator norm.
///
/// Samples whose reference has zero (or non-finite) norm are excluded from
/// the aggregate and listed in `degenerate`.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedErrorReport {
    /// Relative error per sample, `None` for degenerate references
    pub per_sample: Vec<Option<f64>>,
    /// Indices (within the batch) of degenerate references
    pub degenerate: Vec<usize>,
    /// Sum of the relative errors over non-degenerate samples
    pub total: f64,
}

impl NormalizedErrorReport {
    /// Number of samples that contributed to `total`.
    pub fn valid_samples(&self) -> usize {
        self.per_sample.len() - self.degenerate.len()
    }

    /// Whether at least one sample was excluded.
    pub fn is_partially_degenerate(&self) -> bool {
        !self.degenerate.is_empty()
    }

    /// Mean over the non-degenerate samples, `None` if there are none.
    pub fn mean(&self) -> Option<f64> {
        match self.valid_samples() {
            0 => None,
            n => Some(self.total / n as f64),
        }
    }

    /// The batch sum, or an error if any reference was degenerate.
    pub fn strict(&self) -> Result<f64, EnergyError> {
        if self.is_partially_degenerate() {
            return Err(EnergyError::DegenerateReference {
                samples: self.degenerate.clone(),
            });
        }
        Ok(self.total)
    }
}

impl<B: Backend> EnergyFunctional<B> {
    /// `Σ [e(X_c, X_s) − e(X_c, Y_s)]`: how far the predicted energy sits
    /// above the energy of the reference solution.
    pub fn amortization_gap(
        &self,
        x_c: Tensor<B, 2>,
        x_s: Tensor<B, 2>,
        y_s: Tensor<B, 2>,
    ) -> Result<f64, EnergyError> {
        self.check_pair("amortization_gap", &x_c, &x_s)?;
        self.check_pair("amortization_gap", &x_c, &y_s)?;

        let x_c = x_c.detach();
        let predicted = self.energy_unchecked(x_c.clone(), x_s.detach());
        let reference = self.energy_unchecked(x_c, y_s.detach());
        tensor_to_scalar(predicted.sub(reference).sum())
    }

    /// Relative error `‖X_s − Y_s‖_B / ‖Y_s‖_B` per sample, summed over the batch.
    pub fn normalized_l2_error(&self, x_s: Tensor<B, 2>, y_s: Tensor<B, 2>) -> Result<NormalizedErrorReport, EnergyError> {
        self.check_pair("normalized_l2_error", &x_s, &y_s)?;

        let x_s = x_s.detach();
        let y_s = y_s.detach();
        let diff_sq = tensor_to_vec(self.mass.quadratic_form(x_s.sub(y_s.clone())))?;
        let ref_sq = tensor_to_vec(self.mass.quadratic_form(y_s))?;

        let mut per_sample = Vec::with_capacity(ref_sq.len());
        let mut degenerate = Vec::new();
        let mut total = 0.0;
        for (i, (&d, &r)) in diff_sq.iter().zip(&ref_sq).enumerate() {
            let (d, r) = (f64::from(d), f64::from(r));
            if r > 0.0 && r.is_finite() {
                // B is PSD; clamp round-off below zero
                let e = d.max(0.0).sqrt() / r.sqrt();
                total += e;
                per_sample.push(Some(e));
            } else {
                degenerate.push(i);
                per_sample.push(None);
            }
        }

        if !degenerate.is_empty() {
            warn!(
                "normalized_l2_error: {} of {} reference solutions have zero norm and were excluded",
                degenerate.len(),
                per_sample.len()
            );
        }

        Ok(NormalizedErrorReport {
            per_sample,
            degenerate,
            total,
        })
    }
}
