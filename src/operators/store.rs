//! Write-once store of the discretization operators of one PDE instance.

use log::debug;
use thiserror::Error;

use super::{CsrMatrix, GraphError};
use crate::pde::{OperatorMatrix, PdeProvider};

/// Relative tolerance for the symmetry check on provider operators.
const SYMMETRY_TOL: f32 = 1e-5;

/// Errors raised while building an [`OperatorStore`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperatorError {
    /// A provider quantity disagrees with `num_dofs` / `num_vertices`.
    #[error("Inconsistent dimension for {quantity}: expected {expected}, got {actual}")]
    InconsistentDimension {
        quantity: String,
        expected: usize,
        actual: usize,
    },

    /// An operator that must be symmetric is not.
    #[error("Operator {name} is not symmetric at ({row}, {col})")]
    Asymmetric { name: String, row: usize, col: usize },

    /// Area weight negative or not finite.
    #[error("Invalid area weight {value} at vertex {vertex}")]
    InvalidAreaWeight { vertex: usize, value: f64 },

    /// Boundary indicator value other than 0 or 1.
    #[error("Boundary group {group} has non-binary flag {value} at vertex {vertex}")]
    NonBinaryFlag { group: usize, vertex: usize, value: f64 },

    /// A vertex is claimed by more than one boundary group.
    #[error("Vertex {vertex} belongs to more than one boundary group")]
    OverlappingBoundary { vertex: usize },

    /// Graph conditioning failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Which discretization operator a term is evaluated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    /// Stiffness-like operator `A`
    Stiffness,
    /// Mass-like operator `B`
    Mass,
}

/// Boundary group indicators plus the derived interior indicator.
///
/// At every vertex exactly one of {each group, interior} equals 1.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryPartition {
    groups: Vec<Vec<f32>>,
    interior: Vec<f32>,
}

impl BoundaryPartition {
    /// Build and validate a partition from 0/1 group indicators.
    pub fn new(groups: Vec<Vec<f32>>, num_vertices: usize) -> Result<Self, OperatorError> {
        for (g, flags) in groups.iter().enumerate() {
            if flags.len() != num_vertices {
                return Err(OperatorError::InconsistentDimension {
                    quantity: format!("boundary flags {}", g),
                    expected: num_vertices,
                    actual: flags.len(),
                });
            }
            if let Some((vertex, &value)) = flags
                .iter()
                .enumerate()
                .find(|(_, &v)| v != 0.0 && v != 1.0)
            {
                return Err(OperatorError::NonBinaryFlag {
                    group: g,
                    vertex,
                    value: f64::from(value),
                });
            }
        }

        let mut interior = vec![1.0f32; num_vertices];
        for flags in &groups {
            for (i, f) in flags.iter().enumerate() {
                interior[i] -= f;
            }
        }
        if let Some(vertex) = interior.iter().position(|&v| v < 0.0) {
            return Err(OperatorError::OverlappingBoundary { vertex });
        }

        Ok(Self { groups, interior })
    }

    /// Number of boundary groups.
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Indicator of boundary group `g`.
    pub fn group(&self, g: usize) -> &[f32] {
        &self.groups[g]
    }

    /// All group indicators.
    pub fn groups(&self) -> &[Vec<f32>] {
        &self.groups
    }

    /// Interior indicator `1 - Σ groups`.
    pub fn interior(&self) -> &[f32] {
        &self.interior
    }

    /// Dirichlet data `Σ_g values[g] · group_g`.
    ///
    /// # Panics
    /// Panics if `values.len() != num_groups()`.
    pub fn boundary_values(&self, values: &[f32]) -> Vec<f32> {
        assert_eq!(values.len(), self.groups.len(), "one value per boundary group");
        let mut out = vec![0.0f32; self.interior.len()];
        for (flags, &value) in self.groups.iter().zip(values) {
            for (o, f) in out.iter_mut().zip(flags) {
                *o += value * f;
            }
        }
        out
    }
}

/// Sparse operators and derived quantities of one PDE instance.
///
/// Built once from a [`PdeProvider`] and read-only afterwards. Share it as
/// `Arc<OperatorStore>`.
#[derive(Clone, Debug)]
pub struct OperatorStore {
    name: String,
    num_dofs: usize,
    num_vertices: usize,
    stiffness: CsrMatrix,
    mass: CsrMatrix,
    area_weights: Vec<f32>,
    boundary: BoundaryPartition,
    adjacency: CsrMatrix,
}

impl OperatorStore {
    /// Query the provider and convert everything to `f32` CSR form.
    ///
    /// # Errors
    /// [`OperatorError::InconsistentDimension`] if any quantity disagrees with
    /// the provider's `num_dofs` / `num_vertices`; the other variants for
    /// asymmetric operators, invalid weights or a broken boundary partition.
    pub fn build<P: PdeProvider + ?Sized>(pde: &P) -> Result<Self, OperatorError> {
        let num_dofs = pde.num_dofs();
        let num_vertices = pde.num_vertices();

        let (a, b) = pde.compute_operators();
        check_square("A", &a, num_dofs)?;
        check_square("B", &b, num_dofs)?;
        let stiffness = symmetric_csr("A", &a)?;
        let mass = symmetric_csr("B", &b)?;

        let weights = pde.weight_area();
        check_len("area weights", weights.len(), num_vertices)?;
        let mut area_weights = Vec::with_capacity(num_vertices);
        for (vertex, &value) in weights.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(OperatorError::InvalidAreaWeight { vertex, value });
            }
            area_weights.push(value as f32);
        }

        let groups: Vec<Vec<f32>> = pde
            .boundary_flags()
            .into_iter()
            .map(|g| g.into_iter().map(|v| v as f32).collect())
            .collect();
        let boundary = BoundaryPartition::new(groups, num_vertices)?;

        let adj = pde.adjacency_matrix();
        check_square("adjacency", &adj, num_vertices)?;
        let adjacency = symmetric_csr("adjacency", &adj)?;

        debug!(
            "Built operator store for {}: {} dofs, {} vertices, nnz(A)={}, nnz(B)={}, {} boundary groups",
            pde.name(),
            num_dofs,
            num_vertices,
            stiffness.nnz(),
            mass.nnz(),
            boundary.num_groups()
        );

        Ok(Self {
            name: pde.name().to_string(),
            num_dofs,
            num_vertices,
            stiffness,
            mass,
            area_weights,
            boundary,
            adjacency,
        })
    }

    /// Provider name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Degrees of freedom.
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Mesh vertices.
    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// Stiffness-like operator `A`.
    pub fn stiffness(&self) -> &CsrMatrix {
        &self.stiffness
    }

    /// Mass-like operator `B`.
    pub fn mass(&self) -> &CsrMatrix {
        &self.mass
    }

    /// Operator selected by `kind`.
    pub fn operator(&self, kind: OperatorKind) -> &CsrMatrix {
        match kind {
            OperatorKind::Stiffness => &self.stiffness,
            OperatorKind::Mass => &self.mass,
        }
    }

    /// Per-vertex quadrature weights.
    pub fn area_weights(&self) -> &[f32] {
        &self.area_weights
    }

    /// Boundary groups and interior indicator.
    pub fn boundary_partition(&self) -> &BoundaryPartition {
        &self.boundary
    }

    /// Raw mesh adjacency.
    pub fn adjacency(&self) -> &CsrMatrix {
        &self.adjacency
    }
}

fn check_len(quantity: &str, actual: usize, expected: usize) -> Result<(), OperatorError> {
    if actual != expected {
        return Err(OperatorError::InconsistentDimension {
            quantity: quantity.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_square(quantity: &str, op: &OperatorMatrix, expected: usize) -> Result<(), OperatorError> {
    check_len(&format!("{} rows", quantity), op.nrows(), expected)?;
    check_len(&format!("{} cols", quantity), op.ncols(), expected)
}

fn symmetric_csr(name: &str, op: &OperatorMatrix) -> Result<CsrMatrix, OperatorError> {
    let csr = CsrMatrix::from_operator(op);
    match csr.find_asymmetry(SYMMETRY_TOL) {
        Some((row, col)) => Err(OperatorError::Asymmetric {
            name: name.to_string(),
            row,
            col,
        }),
        None => Ok(csr),
    }
}
