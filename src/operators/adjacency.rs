//! Symmetric degree normalization of mesh adjacency.
//!
//! The approximator receives `D^(-1/2) (A [+ I]) D^(-1/2)`, the usual
//! graph-convolution conditioning. Weights must be nonnegative; with
//! positive degrees the result is then symmetric with spectral radius at
//! most 1.

use thiserror::Error;

use super::CsrMatrix;

/// Errors raised while normalizing an adjacency matrix.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// A vertex has zero (or negative) degree, so `D^(-1/2)` is undefined.
    #[error("Vertex {vertex} has degree {degree}; add self-loops or fix the mesh")]
    SingularDegree { vertex: usize, degree: f64 },

    /// Negative edge weight; the spectral bound needs nonnegative weights.
    #[error("Adjacency entry ({row}, {col}) is negative: {value}")]
    NegativeWeight { row: usize, col: usize, value: f32 },

    /// Adjacency matrix is not square.
    #[error("Adjacency matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
}

/// Degree-normalized adjacency, symmetric with spectral radius ≤ 1.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedAdjacency(CsrMatrix);

impl NormalizedAdjacency {
    /// Underlying sparse matrix.
    pub fn matrix(&self) -> &CsrMatrix {
        &self.0
    }

    /// Number of vertices.
    pub fn dim(&self) -> usize {
        self.0.dim()
    }
}

/// Produces [`NormalizedAdjacency`] from raw adjacency.
#[derive(Clone, Copy, Debug)]
pub struct GraphNormalizer {
    self_loops: bool,
}

impl Default for GraphNormalizer {
    fn default() -> Self {
        Self { self_loops: true }
    }
}

impl GraphNormalizer {
    /// Normalizer with self-loops enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `I` before computing degrees.
    pub fn with_self_loops(mut self, self_loops: bool) -> Self {
        self.self_loops = self_loops;
        self
    }

    /// Whether self-loops are added.
    pub fn self_loops(&self) -> bool {
        self.self_loops
    }

    /// Normalize `adj`.
    ///
    /// # Errors
    /// - [`GraphError::NegativeWeight`] for the first negative entry
    /// - [`GraphError::SingularDegree`] for the first vertex whose degree is
    ///   not strictly positive
    pub fn normalize(&self, adj: &CsrMatrix) -> Result<NormalizedAdjacency, GraphError> {
        for row in 0..adj.dim() {
            if let Some((col, value)) = adj.row(row).find(|&(_, v)| v < 0.0) {
                return Err(GraphError::NegativeWeight { row, col, value });
            }
        }

        let conditioned = if self.self_loops {
            adj.add_identity(1.0)
        } else {
            adj.clone()
        };

        let degrees = conditioned.row_sums();
        let mut inv_sqrt = Vec::with_capacity(degrees.len());
        for (vertex, &degree) in degrees.iter().enumerate() {
            if !(degree > 0.0) || !degree.is_finite() {
                return Err(GraphError::SingularDegree { vertex, degree });
            }
            inv_sqrt.push((1.0 / degree.sqrt()) as f32);
        }

        Ok(NormalizedAdjacency(conditioned.scale(&inv_sqrt, &inv_sqrt)))
    }
}
