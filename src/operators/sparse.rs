//! Host-side compressed sparse row matrices.
//!
//! Every provider matrix is narrowed to `f32` and stored here exactly once.
//! Device-side products go through
//! [`BatchedSparseOperator`](crate::energy::BatchedSparseOperator), which is
//! built from the COO view of a `CsrMatrix`.

use faer::Mat;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::pde::OperatorMatrix;

/// Square sparse matrix in CSR layout with `f32` values.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix {
    dim: usize,
    /// Row pointers, length `dim + 1`
    row_ptr: Vec<usize>,
    /// Column index of every stored entry, sorted within each row
    col_idx: Vec<usize>,
    values: Vec<f32>,
}

impl CsrMatrix {
    /// Build from coordinate triplets. Duplicate entries are summed and
    /// entries that sum to exactly zero are dropped.
    ///
    /// # Panics
    /// Panics if an index is out of range.
    pub fn from_triplets(dim: usize, entries: &[(usize, usize, f64)]) -> Self {
        let mut sorted: Vec<(usize, usize, f64)> = entries.to_vec();
        sorted.sort_unstable_by_key(|&(r, c, _)| (r, c));

        let mut row_ptr = vec![0usize; dim + 1];
        let mut col_idx = Vec::with_capacity(sorted.len());
        let mut values = Vec::with_capacity(sorted.len());

        let mut iter = sorted.into_iter().peekable();
        while let Some((r, c, mut v)) = iter.next() {
            assert!(r < dim && c < dim, "entry ({}, {}) out of range for dim {}", r, c, dim);
            while let Some(&(r2, c2, v2)) = iter.peek() {
                if r2 != r || c2 != c {
                    break;
                }
                v += v2;
                iter.next();
            }
            if v != 0.0 {
                col_idx.push(c);
                values.push(v as f32);
                row_ptr[r + 1] += 1;
            }
        }

        for i in 0..dim {
            row_ptr[i + 1] += row_ptr[i];
        }

        Self {
            dim,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Build from a dense square matrix, keeping nonzero entries only.
    ///
    /// # Panics
    /// Panics if the matrix is not square.
    pub fn from_dense(mat: &Mat<f64>) -> Self {
        assert_eq!(mat.nrows(), mat.ncols(), "dense operator must be square");
        let dim = mat.nrows();
        let mut entries = Vec::new();
        for i in 0..dim {
            for j in 0..dim {
                let v = mat[(i, j)];
                if v != 0.0 {
                    entries.push((i, j, v));
                }
            }
        }
        Self::from_triplets(dim, &entries)
    }

    /// Convert a provider matrix.
    pub fn from_operator(op: &OperatorMatrix) -> Self {
        match op {
            OperatorMatrix::Dense(m) => Self::from_dense(m),
            OperatorMatrix::Triplets { dim, entries } => Self::from_triplets(*dim, entries),
        }
    }

    /// Identity matrix.
    pub fn identity(dim: usize) -> Self {
        Self {
            dim,
            row_ptr: (0..=dim).collect(),
            col_idx: (0..dim).collect(),
            values: vec![1.0; dim],
        }
    }

    /// Diagonal matrix.
    pub fn diagonal(diag: &[f32]) -> Self {
        let entries: Vec<(usize, usize, f64)> = diag
            .iter()
            .enumerate()
            .map(|(i, &d)| (i, i, f64::from(d)))
            .collect();
        Self::from_triplets(diag.len(), &entries)
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate over `(col, value)` of row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Entry `(i, j)`, zero if not stored.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        match self.col_idx[range.clone()].binary_search(&j) {
            Ok(pos) => self.values[range.start + pos],
            Err(_) => 0.0,
        }
    }

    /// Coordinate view: `(rows, cols, values)` in storage order.
    pub fn to_coo(&self) -> (Vec<usize>, Vec<usize>, Vec<f32>) {
        let mut rows = Vec::with_capacity(self.nnz());
        for i in 0..self.dim {
            rows.extend(std::iter::repeat(i).take(self.row_ptr[i + 1] - self.row_ptr[i]));
        }
        (rows, self.col_idx.clone(), self.values.clone())
    }

    /// Row sums, accumulated in `f64`.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.dim)
            .map(|i| self.row(i).map(|(_, v)| f64::from(v)).sum())
            .collect()
    }

    /// Largest absolute entry.
    pub fn max_abs(&self) -> f32 {
        self.values.iter().fold(0.0f32, |acc, v| acc.max(v.abs()))
    }

    /// Check `|M_ij - M_ji| <= rel_tol * max|M|` for every stored entry.
    ///
    /// Returns the first offending `(i, j)` pair, if any.
    pub fn find_asymmetry(&self, rel_tol: f32) -> Option<(usize, usize)> {
        let tol = rel_tol * self.max_abs().max(f32::MIN_POSITIVE);
        for i in 0..self.dim {
            for (j, v) in self.row(i) {
                if (v - self.get(j, i)).abs() > tol {
                    return Some((i, j));
                }
            }
        }
        None
    }

    /// Whether the matrix is symmetric within `rel_tol`.
    pub fn is_symmetric(&self, rel_tol: f32) -> bool {
        self.find_asymmetry(rel_tol).is_none()
    }

    /// Return `D_l · M · D_r` for diagonal scalings given as vectors.
    pub fn scale(&self, left: &[f32], right: &[f32]) -> Self {
        assert_eq!(left.len(), self.dim);
        assert_eq!(right.len(), self.dim);
        let mut values = self.values.clone();
        for i in 0..self.dim {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                values[k] *= left[i] * right[self.col_idx[k]];
            }
        }
        Self {
            dim: self.dim,
            row_ptr: self.row_ptr.clone(),
            col_idx: self.col_idx.clone(),
            values,
        }
    }

    /// Return `M + alpha * I`.
    pub fn add_identity(&self, alpha: f32) -> Self {
        let (rows, cols, vals) = self.to_coo();
        let mut entries: Vec<(usize, usize, f64)> = rows
            .into_iter()
            .zip(cols)
            .zip(vals)
            .map(|((r, c), v)| (r, c, f64::from(v)))
            .collect();
        entries.extend((0..self.dim).map(|i| (i, i, f64::from(alpha))));
        Self::from_triplets(self.dim, &entries)
    }

    /// Sparse matrix-vector product `y = M x`.
    pub fn mul_vec(&self, x: &[f32]) -> Vec<f32> {
        assert_eq!(x.len(), self.dim, "vector length must match matrix dimension");
        let row_dot = |i: usize| -> f32 { self.row(i).map(|(j, v)| v * x[j]).sum() };

        #[cfg(feature = "parallel")]
        let y: Vec<f32> = (0..self.dim).into_par_iter().map(row_dot).collect();
        #[cfg(not(feature = "parallel"))]
        let y: Vec<f32> = (0..self.dim).map(row_dot).collect();

        y
    }

    /// Quadratic form `xᵀ M x`, accumulated in `f64`.
    pub fn quadratic_form(&self, x: &[f32]) -> f64 {
        self.mul_vec(x)
            .iter()
            .zip(x)
            .map(|(&mx, &xi)| f64::from(mx) * f64::from(xi))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_duplicates_are_summed() {
        let m = CsrMatrix::from_triplets(2, &[(0, 0, 1.0), (0, 0, 2.0), (1, 0, 1.0), (1, 0, -1.0)]);
        assert_eq!(m.get(0, 0), 3.0);
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.nnz(), 1);
    }

    #[test]
    fn test_dense_round_trip() {
        let mut d = Mat::zeros(3, 3);
        d[(0, 1)] = 4.0;
        d[(1, 0)] = 4.0;
        d[(2, 2)] = -1.5;
        let m = CsrMatrix::from_dense(&d);
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.get(0, 1), 4.0);
        assert_eq!(m.get(2, 2), -1.5);
        assert!(m.is_symmetric(1e-6));
    }

    #[test]
    fn test_mul_vec_and_quadratic_form() {
        let m = laplacian_1d(4);
        let y = m.mul_vec(&[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(y, vec![1.0, 0.0, 0.0, 1.0]);
        assert_eq!(m.quadratic_form(&[1.0, 1.0, 1.0, 1.0]), 2.0);
    }

    #[test]
    fn test_asymmetry_detected() {
        let m = CsrMatrix::from_triplets(2, &[(0, 1, 1.0), (1, 0, 0.5)]);
        assert_eq!(m.find_asymmetry(1e-6), Some((0, 1)));
    }

    #[test]
    fn test_scale_and_identity() {
        let m = laplacian_1d(3).add_identity(1.0);
        assert_eq!(m.get(1, 1), 3.0);
        let s = m.scale(&[2.0, 1.0, 1.0], &[1.0, 1.0, 0.5]);
        assert_eq!(s.get(0, 0), 6.0);
        assert_eq!(s.get(1, 2), -0.5);
        assert_eq!(CsrMatrix::identity(3).mul_vec(&[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_coo_view_matches_rows() {
        let m = laplacian_1d(3);
        let (rows, cols, vals) = m.to_coo();
        assert_eq!(rows, vec![0, 0, 1, 1, 1, 2, 2]);
        assert_eq!(cols, vec![0, 1, 0, 1, 2, 1, 2]);
        assert_eq!(vals.len(), 7);
    }
}
