//! Configuration of the energy functional.

use super::EnergyError;
use crate::operators::OperatorKind;

/// How the mass (linear reaction) term `½ w_mass ∫ u²` is discretized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MassTerm {
    /// Quadratic form `uᵀ M u` against an operator
    Operator(OperatorKind),
    /// Lumped quadrature `Σ area_i u_i²`
    LumpedArea,
}

/// Weights and operator choices of the variational energy
///
/// ```text
/// e(u; f) = ½ uᵀA u + w_mass · ½ M(u) + w_quartic · ¼ Σ area u⁴ − uᵀ K f
/// ```
///
/// where `M` is [`MassTerm`] and `K` is the coupling operator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnergyConfig {
    /// Weight of the mass term (default 10)
    pub mass_weight: f32,
    /// Weight of the quartic reaction term (default 10)
    pub quartic_weight: f32,
    /// Discretization of the mass term
    pub mass_term: MassTerm,
    /// Operator coupling state and control
    pub coupling: OperatorKind,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            mass_weight: 10.0,
            quartic_weight: 10.0,
            mass_term: MassTerm::Operator(OperatorKind::Mass),
            coupling: OperatorKind::Mass,
        }
    }
}

impl EnergyConfig {
    /// Set the mass term weight.
    pub fn with_mass_weight(mut self, w: f32) -> Self {
        self.mass_weight = w;
        self
    }

    /// Set the quartic term weight.
    pub fn with_quartic_weight(mut self, w: f32) -> Self {
        self.quartic_weight = w;
        self
    }

    /// Choose the mass term discretization.
    pub fn with_mass_term(mut self, term: MassTerm) -> Self {
        self.mass_term = term;
        self
    }

    /// Choose the coupling operator.
    pub fn with_coupling(mut self, kind: OperatorKind) -> Self {
        self.coupling = kind;
        self
    }

    /// Check that weights are finite and nonnegative.
    pub fn validate(&self) -> Result<(), EnergyError> {
        for (name, w) in [("mass_weight", self.mass_weight), ("quartic_weight", self.quartic_weight)] {
            if !w.is_finite() || w < 0.0 {
                return Err(EnergyError::InvalidConfig(format!(
                    "{} must be finite and nonnegative, got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }
}
