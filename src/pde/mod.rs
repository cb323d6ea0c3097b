//! PDE operator/mesh provider interface.
//!
//! The provider is the external collaborator that owns the discretization.
//! Everything else in this crate consults it only through [`PdeProvider`],
//! and only once, when the [`OperatorStore`](crate::operators::OperatorStore)
//! is built.
//!
//! [`UnitSquareP1`] is a small structured provider (P1 elements on a
//! uniform triangulation of the unit square) used by the tests, the
//! benches and the demo binary.

mod unit_square;

pub use unit_square::UnitSquareP1;

use faer::Mat;

/// A square matrix handed over by the provider, dense or in triplet form.
#[derive(Clone, Debug)]
pub enum OperatorMatrix {
    /// Dense matrix (the provider assembled into a full array).
    Dense(Mat<f64>),
    /// Coordinate triplets `(row, col, value)`; duplicates are summed.
    Triplets {
        dim: usize,
        entries: Vec<(usize, usize, f64)>,
    },
}

impl OperatorMatrix {
    /// Number of rows of the matrix.
    pub fn nrows(&self) -> usize {
        match self {
            OperatorMatrix::Dense(m) => m.nrows(),
            OperatorMatrix::Triplets { dim, .. } => *dim,
        }
    }

    /// Number of columns of the matrix.
    pub fn ncols(&self) -> usize {
        match self {
            OperatorMatrix::Dense(m) => m.ncols(),
            OperatorMatrix::Triplets { dim, .. } => *dim,
        }
    }
}

/// Queries the energy functional and operator store need from a PDE instance.
///
/// Shapes are expressed in `num_dofs` (degrees of freedom) and
/// `num_vertices` (mesh vertices).
pub trait PdeProvider {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Number of degrees of freedom of the discretization.
    fn num_dofs(&self) -> usize;

    /// Number of mesh vertices.
    fn num_vertices(&self) -> usize;

    /// Stiffness-like operator `A` and mass-like operator `B`, both `num_dofs × num_dofs`.
    fn compute_operators(&self) -> (OperatorMatrix, OperatorMatrix);

    /// Per-vertex quadrature weights, length `num_vertices`.
    fn weight_area(&self) -> Vec<f64>;

    /// One 0/1 indicator vector per boundary group, each of length `num_vertices`.
    fn boundary_flags(&self) -> Vec<Vec<f64>>;

    /// Mesh connectivity, `num_vertices × num_vertices`.
    fn adjacency_matrix(&self) -> OperatorMatrix;
}
