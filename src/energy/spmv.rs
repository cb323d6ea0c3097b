//! Device-resident sparse operators and the batched SpMV primitive.
//!
//! Every quadratic form in the energy functional goes through
//! [`BatchedSparseOperator::apply`], so all loss variants share one code
//! path and one precision.
//!
//! The product is expressed with gather/scatter on Burn tensors, which
//! keeps it differentiable on autodiff backends:
//!
//! ```text
//! contrib[b, k] = X[b, col[k]] * val[k]          (select on dim 1)
//! Y[b, i]       = Σ_{k : row[k] = i} contrib[b, k] (select_assign, sum reduction)
//! ```

use burn::prelude::*;

use crate::backend::{index_tensor, tensor_from_slice};
use crate::operators::CsrMatrix;

/// Sparse square matrix uploaded once to a device in COO form.
#[derive(Clone, Debug)]
pub struct BatchedSparseOperator<B: Backend> {
    /// Row index of each stored entry: [nnz]
    rows: Tensor<B, 1, Int>,
    /// Column index of each stored entry: [nnz]
    cols: Tensor<B, 1, Int>,
    /// Stored values, broadcast over the batch: [1, nnz]
    values: Tensor<B, 2>,
    dim: usize,
    nnz: usize,
}

impl<B: Backend> BatchedSparseOperator<B> {
    /// Upload a host CSR matrix.
    ///
    /// This performs a one-time data transfer that should be done at
    /// initialization, not per batch.
    pub fn from_csr(matrix: &CsrMatrix, device: &B::Device) -> Self {
        let (rows, cols, values) = matrix.to_coo();
        let nnz = values.len();
        Self {
            rows: index_tensor(&rows, device),
            cols: index_tensor(&cols, device),
            values: tensor_from_slice(&values, device).reshape([1, nnz]),
            dim: matrix.dim(),
            nnz,
        }
    }

    /// Operator dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Batched product `Y = X Mᵀ`, i.e. `M x` for every row `x` of `X`.
    ///
    /// # Arguments
    /// * `x` - Batch of vectors [batch, dim]
    ///
    /// # Returns
    /// Products [batch, dim]
    ///
    /// Callers validate shapes; this is the hot path.
    pub fn apply(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, _] = x.dims();
        let device = x.device();
        if self.nnz == 0 {
            return Tensor::zeros([batch, self.dim], &device);
        }

        let gathered = x.select(1, self.cols.clone());
        let contrib = gathered.mul(self.values.clone());
        Tensor::zeros([batch, self.dim], &device).select_assign(1, self.rows.clone(), contrib)
    }

    /// Batched quadratic form `xᵀ M x` for every row: [batch].
    pub fn quadratic_form(&self, x: Tensor<B, 2>) -> Tensor<B, 1> {
        let mx = self.apply(x.clone());
        mx.mul(x).sum_dim(1).squeeze::<1>(1)
    }

    /// Batched bilinear form `xᵀ M y` for aligned rows: [batch].
    pub fn bilinear_form(&self, x: Tensor<B, 2>, y: Tensor<B, 2>) -> Tensor<B, 1> {
        self.apply(y).mul(x).sum_dim(1).squeeze::<1>(1)
    }
}

#[cfg(test)]
#[cfg(feature = "ndarray")]
mod tests {
    use super::*;
    use crate::backend::{tensor_from_rows, tensor_to_vec, CpuAutodiffBackend, CpuBackend, SolverBackend};

    fn laplacian_1d(n: usize) -> CsrMatrix {
        let mut entries = Vec::new();
        for i in 0..n {
            entries.push((i, i, 2.0));
            if i > 0 {
                entries.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                entries.push((i, i + 1, -1.0));
            }
        }
        CsrMatrix::from_triplets(n, &entries)
    }

    #[test]
    fn test_apply_matches_host_product() {
        let device = CpuBackend::default_device();
        let m = laplacian_1d(4);
        let op = BatchedSparseOperator::<CpuBackend>::from_csr(&m, &device);

        let rows = [1.0, 2.0, 3.0, 4.0, -1.0, 0.5, 0.0, 2.0];
        let x = tensor_from_rows::<CpuBackend>(&rows, [2, 4], &device);
        let y = tensor_to_vec(op.apply(x)).unwrap();

        let expected0 = m.mul_vec(&rows[0..4]);
        let expected1 = m.mul_vec(&rows[4..8]);
        for i in 0..4 {
            assert!((y[i] - expected0[i]).abs() < 1e-6);
            assert!((y[4 + i] - expected1[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_quadratic_form_per_row() {
        let device = CpuBackend::default_device();
        let op = BatchedSparseOperator::<CpuBackend>::from_csr(&laplacian_1d(3), &device);
        let x = tensor_from_rows::<CpuBackend>(&[1.0, 1.0, 1.0, 1.0, 0.0, -1.0], [2, 3], &device);
        let q = tensor_to_vec(op.quadratic_form(x)).unwrap();
        // [1,1,1]: 2 ; [1,0,-1]: 2+2 = 4
        assert!((q[0] - 2.0).abs() < 1e-6);
        assert!((q[1] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_operator_gives_zeros() {
        let device = CpuBackend::default_device();
        let empty = CsrMatrix::from_triplets(3, &[]);
        let op = BatchedSparseOperator::<CpuBackend>::from_csr(&empty, &device);
        let x = tensor_from_rows::<CpuBackend>(&[1.0, 2.0, 3.0], [1, 3], &device);
        assert_eq!(tensor_to_vec(op.apply(x)).unwrap(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_apply_gradient_is_transpose_product() {
        let device = CpuAutodiffBackend::default_device();
        let m = CsrMatrix::from_triplets(3, &[(0, 0, 2.0), (0, 2, 1.0), (1, 0, -3.0), (2, 1, 0.5), (2, 2, 4.0)]);
        let op = BatchedSparseOperator::<CpuAutodiffBackend>::from_csr(&m, &device);

        let x = tensor_from_rows::<CpuAutodiffBackend>(&[1.0, -2.0, 0.5], [1, 3], &device).require_grad();
        let w = tensor_from_rows::<CpuAutodiffBackend>(&[1.0, 2.0, 3.0], [1, 3], &device);
        let grads = op.apply(x.clone()).mul(w).sum().backward();
        let g = tensor_to_vec(x.grad(&grads).unwrap()).unwrap();

        // d/dx wᵀ M x = Mᵀ w
        let expected = [2.0 - 6.0, 1.5, 1.0 + 12.0];
        for (a, b) in g.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-5, "{:?} vs {:?}", g, expected);
        }
    }

    #[test]
    fn test_quadratic_form_gradient() {
        let device = CpuAutodiffBackend::default_device();
        let m = laplacian_1d(4);
        let op = BatchedSparseOperator::<CpuAutodiffBackend>::from_csr(&m, &device);

        let rows = [1.0, 2.0, 3.0, 4.0, -1.0, 0.5, 0.0, 2.0];
        let x = tensor_from_rows::<CpuAutodiffBackend>(&rows, [2, 4], &device).require_grad();
        let grads = op.quadratic_form(x.clone()).sum().backward();
        let g = tensor_to_vec(x.grad(&grads).unwrap()).unwrap();

        for (r, row) in rows.chunks(4).enumerate() {
            let mx = m.mul_vec(row);
            for i in 0..4 {
                assert!((g[4 * r + i] - 2.0 * mx[i]).abs() < 1e-5);
            }
        }
    }
}
