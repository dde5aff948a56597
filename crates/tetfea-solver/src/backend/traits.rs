//! Backend trait definitions for linear solvers.
//!
//! These traits abstract over the concrete numerical library used for the
//! reduced global solve. Element-level computations remain in nalgebra
//! (small, dense matrices).

use nalgebra::{DMatrix, DVector};

/// Error type for backend operations.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendError(pub String);

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

impl From<&str> for BackendError {
    fn from(s: &str) -> Self {
        BackendError(s.to_string())
    }
}

/// Sparse matrix in COO (coordinate/triplet) format.
///
/// This is the backend-agnostic interchange format between the reduction
/// layer and any solver backend. Duplicate entries are summed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseTripletsF64 {
    pub nrows: usize,
    pub ncols: usize,
    pub row_indices: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseTripletsF64 {
    /// Empty triplet set of the given shape.
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            ..Default::default()
        }
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Append one entry.
    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        self.row_indices.push(row);
        self.col_indices.push(col);
        self.values.push(value);
    }

    /// Collect the non-zero entries of a dense matrix, row by row.
    pub fn from_dense(matrix: &DMatrix<f64>) -> Self {
        let mut triplets = Self::new(matrix.nrows(), matrix.ncols());
        for i in 0..matrix.nrows() {
            for j in 0..matrix.ncols() {
                let v = matrix[(i, j)];
                if v != 0.0 {
                    triplets.push(i, j, v);
                }
            }
        }
        triplets
    }

    /// Densify, summing duplicates.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut k = DMatrix::zeros(self.nrows, self.ncols);
        for i in 0..self.nnz() {
            k[(self.row_indices[i], self.col_indices[i])] += self.values[i];
        }
        k
    }
}

/// A reduced linear system ready for solving: K * u = F.
///
/// Produced by the constraint reducer, consumed by any `LinearSolver`
/// backend. Constrained rows and columns have already been removed.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystemData {
    /// Stiffness matrix in COO triplet format
    pub stiffness: SparseTripletsF64,
    /// Force vector
    pub force: DVector<f64>,
    /// Number of unknowns
    pub num_dofs: usize,
}

impl LinearSystemData {
    /// Check that matrix and vector shapes agree with `num_dofs`.
    pub fn check_dimensions(&self) -> Result<(), BackendError> {
        let n = self.num_dofs;
        if self.stiffness.nrows != n || self.stiffness.ncols != n || self.force.len() != n {
            return Err(BackendError(format!(
                "system shape mismatch: K is {}x{}, F has {} entries, expected {}",
                self.stiffness.nrows,
                self.stiffness.ncols,
                self.force.len(),
                n
            )));
        }
        if let Some(i) = (0..self.stiffness.nnz())
            .find(|&i| self.stiffness.row_indices[i] >= n || self.stiffness.col_indices[i] >= n)
        {
            return Err(BackendError(format!(
                "triplet {} at ({}, {}) lies outside a {}x{} system",
                i, self.stiffness.row_indices[i], self.stiffness.col_indices[i], n, n
            )));
        }
        Ok(())
    }
}

/// Solver convergence and diagnostic info.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveInfo {
    /// Number of iterations (1 for direct solvers)
    pub iterations: usize,
    /// Final residual norm (if available)
    pub residual_norm: Option<f64>,
    /// Human-readable solver name (e.g., "nalgebra-Cholesky")
    pub solver_name: String,
}

/// Trait for a linear solver backend.
///
/// Implementations solve K * u = F for a symmetric positive definite K and
/// report failure instead of returning a meaningless vector.
pub trait LinearSolver: Send + Sync {
    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    /// Solve K * u = F and return the solution vector.
    fn solve_linear(
        &self,
        system: &LinearSystemData,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError>;
}
