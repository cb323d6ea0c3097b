//! P1 finite elements on a uniform triangulation of the unit square.
//!
//! Vertices are numbered row by row, `v = j * (n + 1) + i` for the vertex at
//! `(i h, j h)`, and each grid cell is split along its main diagonal:
//!
//! ```text
//! v01 ---- v11
//!  |  \  T1  |
//!  | T0  \   |
//! v00 ---- v10      T0 = (v00, v10, v11), T1 = (v00, v11, v01)
//! ```
//!
//! With P1 elements every vertex carries exactly one dof, so
//! `num_dofs == num_vertices` and the dof index equals the vertex index.
//!
//! Boundary groups: group 0 holds the vertical sides `x = 0` and `x = 1`
//! (corners included), group 1 the remaining vertices of `y = 0` and `y = 1`.

use faer::Mat;

use super::{OperatorMatrix, PdeProvider};

/// Structured P1 provider for the unit square.
#[derive(Clone, Debug)]
pub struct UnitSquareP1 {
    /// Number of cells per side
    n_cells: usize,
    /// Hand the operators over as dense matrices instead of triplets
    dense: bool,
}

impl UnitSquareP1 {
    /// Create a provider with `n_cells × n_cells` grid cells (at least 1).
    pub fn new(n_cells: usize) -> Self {
        Self {
            n_cells: n_cells.max(1),
            dense: false,
        }
    }

    /// Hand operators over as dense `faer` matrices.
    pub fn dense(mut self) -> Self {
        self.dense = true;
        self
    }

    /// Number of cells per side.
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Mesh width.
    pub fn h(&self) -> f64 {
        1.0 / self.n_cells as f64
    }

    /// Coordinates of vertex `v`.
    pub fn vertex_position(&self, v: usize) -> (f64, f64) {
        let np = self.n_cells + 1;
        let (i, j) = (v % np, v / np);
        (i as f64 * self.h(), j as f64 * self.h())
    }

    fn vertex(&self, i: usize, j: usize) -> usize {
        j * (self.n_cells + 1) + i
    }

    /// All triangles as vertex triples, counter-clockwise.
    fn triangles(&self) -> Vec<[usize; 3]> {
        let n = self.n_cells;
        let mut tris = Vec::with_capacity(2 * n * n);
        for j in 0..n {
            for i in 0..n {
                let v00 = self.vertex(i, j);
                let v10 = self.vertex(i + 1, j);
                let v01 = self.vertex(i, j + 1);
                let v11 = self.vertex(i + 1, j + 1);
                tris.push([v00, v10, v11]);
                tris.push([v00, v11, v01]);
            }
        }
        tris
    }

    /// Element stiffness and mass matrices and the element area.
    fn element_matrices(&self, tri: &[usize; 3]) -> (Mat<f64>, Mat<f64>, f64) {
        let p: Vec<(f64, f64)> = tri.iter().map(|&v| self.vertex_position(v)).collect();
        let (x0, y0) = p[0];
        let (x1, y1) = p[1];
        let (x2, y2) = p[2];

        let det = (x1 - x0) * (y2 - y0) - (x2 - x0) * (y1 - y0);
        let area = 0.5 * det.abs();

        // Gradients of the barycentric basis functions, scaled by 2 * area
        let b = [y1 - y2, y2 - y0, y0 - y1];
        let c = [x2 - x1, x0 - x2, x1 - x0];

        let mut k = Mat::zeros(3, 3);
        let mut m = Mat::zeros(3, 3);
        for a in 0..3 {
            for bb in 0..3 {
                k[(a, bb)] = (b[a] * b[bb] + c[a] * c[bb]) / (4.0 * area);
                m[(a, bb)] = area / 12.0 * if a == bb { 2.0 } else { 1.0 };
            }
        }
        (k, m, area)
    }

    fn pack(&self, entries: Vec<(usize, usize, f64)>) -> OperatorMatrix {
        let dim = self.num_vertices();
        if self.dense {
            let mut mat = Mat::zeros(dim, dim);
            for (r, c, v) in entries {
                mat[(r, c)] += v;
            }
            OperatorMatrix::Dense(mat)
        } else {
            OperatorMatrix::Triplets { dim, entries }
        }
    }
}

impl PdeProvider for UnitSquareP1 {
    fn name(&self) -> &str {
        "unit-square-p1"
    }

    fn num_dofs(&self) -> usize {
        self.num_vertices()
    }

    fn num_vertices(&self) -> usize {
        (self.n_cells + 1) * (self.n_cells + 1)
    }

    fn compute_operators(&self) -> (OperatorMatrix, OperatorMatrix) {
        let tris = self.triangles();
        let mut a_entries = Vec::with_capacity(9 * tris.len());
        let mut b_entries = Vec::with_capacity(9 * tris.len());

        for tri in &tris {
            let (k, m, _) = self.element_matrices(tri);
            for a in 0..3 {
                for b in 0..3 {
                    a_entries.push((tri[a], tri[b], k[(a, b)]));
                    b_entries.push((tri[a], tri[b], m[(a, b)]));
                }
            }
        }

        (self.pack(a_entries), self.pack(b_entries))
    }

    fn weight_area(&self) -> Vec<f64> {
        let mut weights = vec![0.0; self.num_vertices()];
        for tri in self.triangles() {
            let (_, _, area) = self.element_matrices(&tri);
            for &v in &tri {
                weights[v] += area / 3.0;
            }
        }
        weights
    }

    fn boundary_flags(&self) -> Vec<Vec<f64>> {
        let n = self.n_cells;
        let nv = self.num_vertices();
        let mut sides = vec![0.0; nv];
        let mut caps = vec![0.0; nv];
        for j in 0..=n {
            for i in 0..=n {
                let v = self.vertex(i, j);
                if i == 0 || i == n {
                    sides[v] = 1.0;
                } else if j == 0 || j == n {
                    caps[v] = 1.0;
                }
            }
        }
        vec![sides, caps]
    }

    fn adjacency_matrix(&self) -> OperatorMatrix {
        let mut entries = Vec::new();
        let n = self.n_cells;
        let mut link = |a: usize, b: usize| {
            entries.push((a, b, 1.0));
            entries.push((b, a, 1.0));
        };
        for j in 0..=n {
            for i in 0..=n {
                let v = self.vertex(i, j);
                if i < n {
                    link(v, self.vertex(i + 1, j));
                }
                if j < n {
                    link(v, self.vertex(i, j + 1));
                }
                if i < n && j < n {
                    link(v, self.vertex(i + 1, j + 1));
                }
            }
        }
        self.pack(entries)
    }
}
