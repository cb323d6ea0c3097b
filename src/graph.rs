//! Side information handed to the approximator.
//!
//! [`GraphInfo`] bundles the Dirichlet data, the interior mask, the
//! normalized adjacency and the mass operator of one PDE instance. It is
//! built once and never changes afterwards.

use burn::prelude::*;
use log::debug;

use crate::backend::tensor_from_slice;
use crate::energy::BatchedSparseOperator;
use crate::operators::{GraphNormalizer, OperatorError, OperatorStore};

/// Immutable side-information bundle on a device.
#[derive(Clone, Debug)]
pub struct GraphInfo<B: Backend> {
    boundary_values: Tensor<B, 1>,
    interior: Tensor<B, 1>,
    normalized_adjacency: BatchedSparseOperator<B>,
    mass: BatchedSparseOperator<B>,
}

impl<B: Backend> GraphInfo<B> {
    /// Build with boundary value 1 on every group.
    pub fn new(store: &OperatorStore, normalizer: &GraphNormalizer, device: &B::Device) -> Result<Self, OperatorError> {
        let values = vec![1.0; store.boundary_partition().num_groups()];
        Self::with_boundary_values(store, normalizer, &values, device)
    }

    /// Build with one Dirichlet value per boundary group.
    ///
    /// # Errors
    /// - `InconsistentDimension` if `values` does not have one entry per group
    /// - `Graph` if the adjacency has a negative weight or a vertex of zero degree
    pub fn with_boundary_values(
        store: &OperatorStore,
        normalizer: &GraphNormalizer,
        values: &[f32],
        device: &B::Device,
    ) -> Result<Self, OperatorError> {
        let partition = store.boundary_partition();
        if values.len() != partition.num_groups() {
            return Err(OperatorError::InconsistentDimension {
                quantity: "boundary values".into(),
                expected: partition.num_groups(),
                actual: values.len(),
            });
        }

        let normalized = normalizer.normalize(store.adjacency())?;
        debug!(
            "Normalized adjacency: {} vertices, nnz={}, self_loops={}",
            normalized.dim(),
            normalized.matrix().nnz(),
            normalizer.self_loops()
        );

        Ok(Self {
            boundary_values: tensor_from_slice(&partition.boundary_values(values), device),
            interior: tensor_from_slice(partition.interior(), device),
            normalized_adjacency: BatchedSparseOperator::from_csr(normalized.matrix(), device),
            mass: BatchedSparseOperator::from_csr(store.mass(), device),
        })
    }

    /// Dirichlet data `Σ_g value_g · flag_g`: [num_vertices]
    pub fn boundary_values(&self) -> &Tensor<B, 1> {
        &self.boundary_values
    }

    /// Interior indicator `1 − Σ_g flag_g`: [num_vertices]
    pub fn interior(&self) -> &Tensor<B, 1> {
        &self.interior
    }

    /// `D^(-1/2) (A [+ I]) D^(-1/2)` of the mesh adjacency.
    pub fn normalized_adjacency(&self) -> &BatchedSparseOperator<B> {
        &self.normalized_adjacency
    }

    /// Mass-like operator `B`.
    pub fn mass(&self) -> &BatchedSparseOperator<B> {
        &self.mass
    }

    /// Number of vertices covered by the bundle.
    pub fn num_vertices(&self) -> usize {
        self.interior.dims()[0]
    }
}

#[cfg(test)]
#[cfg(feature = "ndarray")]
mod tests {
    use super::*;
    use crate::backend::{tensor_to_vec, CpuBackend, SolverBackend};
    use crate::pde::UnitSquareP1;

    #[test]
    fn test_bundle_partition() {
        let store = OperatorStore::build(&UnitSquareP1::new(3)).unwrap();
        let device = CpuBackend::default_device();
        let info = GraphInfo::<CpuBackend>::new(&store, &GraphNormalizer::new(), &device).unwrap();

        assert_eq!(info.num_vertices(), 16);
        let bc = tensor_to_vec(info.boundary_values().clone()).unwrap();
        let interior = tensor_to_vec(info.interior().clone()).unwrap();
        for (b, i) in bc.iter().zip(&interior) {
            assert_eq!(b + i, 1.0);
        }
        assert_eq!(interior.iter().sum::<f32>(), 4.0);

        assert_eq!(info.mass().dim(), 16);
        assert_eq!(info.mass().nnz(), store.mass().nnz());
        assert_eq!(info.normalized_adjacency().dim(), 16);
    }

    #[test]
    fn test_wrong_value_count() {
        let store = OperatorStore::build(&UnitSquareP1::new(2)).unwrap();
        let device = CpuBackend::default_device();
        let err = GraphInfo::<CpuBackend>::with_boundary_values(&store, &GraphNormalizer::new(), &[1.0], &device)
            .unwrap_err();
        assert!(matches!(err, OperatorError::InconsistentDimension { .. }));
    }
}
