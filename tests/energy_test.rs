//! Energy functional and diagnostics on small, hand-checkable problems.
//!
//! The 3-dof identity problem has closed-form energies; the unit square
//! exercises the functional with distinct stiffness and mass operators.

#![cfg(feature = "ndarray")]

use std::sync::Arc;

use amortized_fem::backend::{tensor_from_rows, tensor_to_scalar, tensor_to_vec};
use amortized_fem::{
    CpuBackend, EnergyConfig, EnergyError, EnergyFunctional, MassTerm, OperatorKind, OperatorMatrix, OperatorStore,
    PdeProvider, SolverBackend, UnitSquareP1,
};
use approx::assert_relative_eq;
use burn::prelude::*;

/// `A = B = I(3)`, unit area weights, no boundary, path-graph adjacency.
struct IdentityProblem;

impl PdeProvider for IdentityProblem {
    fn name(&self) -> &str {
        "identity-3"
    }

    fn num_dofs(&self) -> usize {
        3
    }

    fn num_vertices(&self) -> usize {
        3
    }

    fn compute_operators(&self) -> (OperatorMatrix, OperatorMatrix) {
        let eye = OperatorMatrix::Triplets {
            dim: 3,
            entries: vec![(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)],
        };
        (eye.clone(), eye)
    }

    fn weight_area(&self) -> Vec<f64> {
        vec![1.0; 3]
    }

    fn boundary_flags(&self) -> Vec<Vec<f64>> {
        Vec::new()
    }

    fn adjacency_matrix(&self) -> OperatorMatrix {
        OperatorMatrix::Triplets {
            dim: 3,
            entries: vec![(0, 1, 1.0), (1, 0, 1.0), (1, 2, 1.0), (2, 1, 1.0)],
        }
    }
}

fn identity_functional() -> EnergyFunctional<CpuBackend> {
    let store = Arc::new(OperatorStore::build(&IdentityProblem).unwrap());
    EnergyFunctional::new(store, EnergyConfig::default(), &CpuBackend::default_device()).unwrap()
}

fn unit_square_functional(config: EnergyConfig) -> EnergyFunctional<CpuBackend> {
    let store = Arc::new(OperatorStore::build(&UnitSquareP1::new(4)).unwrap());
    EnergyFunctional::new(store, config, &CpuBackend::default_device()).unwrap()
}

fn rows(data: &[f32], batch: usize, n: usize) -> Tensor<CpuBackend, 2> {
    tensor_from_rows(data, [batch, n], &CpuBackend::default_device())
}

/// Deterministic, sign-changing test states.
fn wavy(batch: usize, n: usize, phase: f32) -> Vec<f32> {
    (0..batch * n)
        .map(|i| (0.7 * i as f32 + phase).sin() + 0.3 * (1.3 * i as f32).cos())
        .collect()
}

#[test]
fn test_identity_energy_is_24() {
    let f = identity_functional();
    let x_c = rows(&[0.0, 0.0, 0.0], 1, 3);
    let x_s = rows(&[1.0, 1.0, 1.0], 1, 3);

    let e = tensor_to_vec(f.per_sample_amortized_energy(x_c, x_s).unwrap()).unwrap();
    assert_eq!(e.len(), 1);
    assert_relative_eq!(e[0], 24.0, epsilon = 1e-5);
}

#[test]
fn test_identity_exact_match_diagnostics_vanish() {
    let f = identity_functional();
    let x_c = rows(&[0.0, 0.0, 0.0], 1, 3);
    let x_s = rows(&[1.0, 1.0, 1.0], 1, 3);
    let y_s = rows(&[1.0, 1.0, 1.0], 1, 3);

    let loss = tensor_to_scalar(f.supervised_loss(x_s.clone(), y_s.clone()).unwrap()).unwrap();
    assert_eq!(loss, 0.0);

    let report = f.normalized_l2_error(x_s.clone(), y_s.clone()).unwrap();
    assert_eq!(report.total, 0.0);
    assert!(!report.is_partially_degenerate());

    let gap = f.amortization_gap(x_c, x_s, y_s).unwrap();
    assert_eq!(gap, 0.0);
}

#[test]
fn test_zero_reference_is_flagged() {
    let f = identity_functional();
    let x_s = rows(&[1.0, 1.0, 1.0], 1, 3);
    let y_s = rows(&[0.0, 0.0, 0.0], 1, 3);

    let report = f.normalized_l2_error(x_s, y_s).unwrap();
    assert_eq!(report.degenerate, vec![0]);
    assert_eq!(report.per_sample, vec![None]);
    assert!(report.total.is_finite());
    assert_eq!(report.mean(), None);
    assert_eq!(
        report.strict(),
        Err(EnergyError::DegenerateReference { samples: vec![0] })
    );
}

#[test]
fn test_partially_degenerate_batch() {
    let f = identity_functional();
    let x_s = rows(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 0.0, 0.0], 3, 3);
    let y_s = rows(&[1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.5, 0.0, 0.0], 3, 3);

    let report = f.normalized_l2_error(x_s, y_s).unwrap();
    assert_eq!(report.degenerate, vec![1]);
    assert_eq!(report.valid_samples(), 2);
    assert_relative_eq!(report.per_sample[2].unwrap(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(report.total, 1.0, epsilon = 1e-6);
    assert!(report.strict().is_err());
}

#[test]
fn test_exact_match_properties_on_unit_square() {
    let f = unit_square_functional(EnergyConfig::default());
    let n = f.num_dofs();
    let x = rows(&wavy(5, n, 0.0), 5, n);
    let x_c = rows(&wavy(5, n, 1.0), 5, n);

    let loss = tensor_to_scalar(f.supervised_loss(x.clone(), x.clone()).unwrap()).unwrap();
    assert_eq!(loss, 0.0);

    let gap = f.amortization_gap(x_c, x.clone(), x.clone()).unwrap();
    assert_eq!(gap, 0.0);

    let report = f.normalized_l2_error(x.clone(), x).unwrap();
    assert!(report.degenerate.is_empty());
    assert_eq!(report.total, 0.0);
}

#[test]
fn test_quadratic_terms_are_non_negative() {
    let store = OperatorStore::build(&UnitSquareP1::new(5)).unwrap();
    let n = store.num_dofs();
    let device = CpuBackend::default_device();
    let x = rows(&wavy(8, n, 0.4), 8, n);

    for kind in [OperatorKind::Stiffness, OperatorKind::Mass] {
        let op = amortized_fem::energy::BatchedSparseOperator::<CpuBackend>::from_csr(store.operator(kind), &device);
        let q = tensor_to_vec(op.quadratic_form(x.clone())).unwrap();
        assert!(q.iter().all(|&v| v >= -1e-5), "{:?}: {:?}", kind, q);
    }
}

#[test]
fn test_mass_term_choice() {
    let base = unit_square_functional(EnergyConfig::default());
    let stiff = unit_square_functional(EnergyConfig::default().with_mass_term(MassTerm::Operator(OperatorKind::Stiffness)));
    let lumped = unit_square_functional(EnergyConfig::default().with_mass_term(MassTerm::LumpedArea));

    let store = base.store().clone();
    let n = base.num_dofs();
    let xs = wavy(1, n, 0.2);
    let xc = wavy(1, n, 2.0);

    let energy = |f: &EnergyFunctional<CpuBackend>| {
        tensor_to_scalar(f.amortized_loss(rows(&xc, 1, n), rows(&xs, 1, n)).unwrap()).unwrap()
    };
    let e_base = energy(&base);

    // Only the mass term differs: w_mass / 2 · (M'(x) − M(x))
    let xax = store.stiffness().quadratic_form(&xs);
    let xbx = store.mass().quadratic_form(&xs);
    let lumped_sq: f64 = xs
        .iter()
        .zip(store.area_weights())
        .map(|(&x, &a)| f64::from(a) * f64::from(x) * f64::from(x))
        .sum();

    assert_relative_eq!(energy(&stiff) - e_base, 5.0 * (xax - xbx), epsilon = 1e-3, max_relative = 1e-4);
    assert_relative_eq!(energy(&lumped) - e_base, 5.0 * (lumped_sq - xbx), epsilon = 1e-3, max_relative = 1e-4);
}

#[test]
fn test_coupling_choice() {
    let mass = unit_square_functional(EnergyConfig::default());
    let stiff = unit_square_functional(EnergyConfig::default().with_coupling(OperatorKind::Stiffness));

    let store = mass.store().clone();
    let n = mass.num_dofs();
    let xs = wavy(1, n, 0.5);
    let xc = wavy(1, n, 3.0);

    let e_mass = tensor_to_scalar(mass.amortized_loss(rows(&xc, 1, n), rows(&xs, 1, n)).unwrap()).unwrap();
    let e_stiff = tensor_to_scalar(stiff.amortized_loss(rows(&xc, 1, n), rows(&xs, 1, n)).unwrap()).unwrap();

    let dot = |kind: OperatorKind| -> f64 {
        let kx = store.operator(kind).mul_vec(&xc);
        xs.iter().zip(&kx).map(|(&a, &b)| f64::from(a) * f64::from(b)).sum()
    };

    // e = ... − xᵀ K f, so switching K from B to A changes e by xᵀBf − xᵀAf
    assert_relative_eq!(
        e_stiff - e_mass,
        dot(OperatorKind::Mass) - dot(OperatorKind::Stiffness),
        epsilon = 1e-3,
        max_relative = 1e-4
    );
}

#[test]
fn test_amortized_loss_sums_per_sample() {
    let f = unit_square_functional(EnergyConfig::default());
    let n = f.num_dofs();
    let x_c = rows(&wavy(4, n, 1.0), 4, n);
    let x_s = rows(&wavy(4, n, 0.0), 4, n);

    let per_sample = tensor_to_vec(f.per_sample_amortized_energy(x_c.clone(), x_s.clone()).unwrap()).unwrap();
    let total = tensor_to_scalar(f.amortized_loss(x_c, x_s).unwrap()).unwrap();
    let sum: f64 = per_sample.iter().map(|&v| f64::from(v)).sum();
    assert_relative_eq!(total, sum, epsilon = 1e-4, max_relative = 1e-5);
}

#[test]
fn test_wrong_width_is_rejected() {
    let f = identity_functional();
    let x_c = rows(&[0.0; 4], 1, 4);
    let x_s = rows(&[0.0; 4], 1, 4);
    let err = f.per_sample_amortized_energy(x_c, x_s).unwrap_err();
    assert!(matches!(
        err,
        EnergyError::ShapeMismatch { operation: "per_sample_amortized_energy", .. }
    ));
}

#[test]
fn test_negative_weight_is_rejected() {
    let store = Arc::new(OperatorStore::build(&IdentityProblem).unwrap());
    let config = EnergyConfig::default().with_mass_weight(-1.0);
    let result = EnergyFunctional::<CpuBackend>::new(store, config, &CpuBackend::default_device());
    assert!(matches!(result, Err(EnergyError::InvalidConfig(_))));
}
