//! Iterative backend: Jacobi-preconditioned conjugate gradient.
//!
//! Works directly on a CSR matrix built from the COO triplets, so memory
//! grows with the number of non-zeros instead of n².

use super::traits::*;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Conjugate gradient solver for symmetric positive definite systems.
#[derive(Debug, Clone, Copy)]
pub struct ConjugateGradientBackend {
    /// Relative residual tolerance ‖r‖ / ‖F‖
    pub tolerance: f64,
    /// Iteration cap; reaching it is reported as a failure
    pub max_iterations: usize,
}

impl Default for ConjugateGradientBackend {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 10_000,
        }
    }
}

impl ConjugateGradientBackend {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }
}

fn to_csr(triplets: &SparseTripletsF64) -> Result<CsrMatrix<f64>, BackendError> {
    let coo = CooMatrix::try_from_triplets(
        triplets.nrows,
        triplets.ncols,
        triplets.row_indices.clone(),
        triplets.col_indices.clone(),
        triplets.values.clone(),
    )
    .map_err(|e| BackendError(format!("Failed to build COO matrix: {:?}", e)))?;
    Ok(CsrMatrix::from(&coo))
}

fn mat_vec(a: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        a.nrows(),
        a.row_iter().map(|row| {
            row.col_indices()
                .iter()
                .zip(row.values())
                .map(|(&j, &v)| v * x[j])
                .sum::<f64>()
        }),
    )
}

fn inverse_diagonal(a: &CsrMatrix<f64>) -> Result<DVector<f64>, BackendError> {
    let mut inv_diag = DVector::zeros(a.nrows());
    for (i, row) in a.row_iter().enumerate() {
        let d = row
            .col_indices()
            .iter()
            .zip(row.values())
            .filter(|&(&j, _)| j == i)
            .map(|(_, &v)| v)
            .sum::<f64>();
        if !(d > 0.0) {
            return Err(BackendError(format!(
                "Non-positive diagonal {:.3e} at row {}",
                d, i
            )));
        }
        inv_diag[i] = 1.0 / d;
    }
    Ok(inv_diag)
}

impl ConjugateGradientBackend {
    /// Preconditioned CG iterations for `a x = b`, `b` non-zero
    ///
    /// Returns the solution, the iteration count and the final residual norm.
    fn iterate(
        &self,
        a: &CsrMatrix<f64>,
        inv_diag: &DVector<f64>,
        b: &DVector<f64>,
    ) -> Result<(DVector<f64>, usize, f64), BackendError> {
        let b_norm = b.norm();
        let mut x = DVector::zeros(b.len());
        let mut r = b.clone();
        let mut z = r.component_mul(inv_diag);
        let mut p = z.clone();
        let mut rz = r.dot(&z);

        for iteration in 1..=self.max_iterations {
            let ap = mat_vec(a, &p);
            let pap = p.dot(&ap);
            if !(pap > 0.0) {
                return Err(BackendError(format!(
                    "Stiffness matrix is not positive definite (pAp = {:.3e} at iteration {})",
                    pap, iteration
                )));
            }

            let alpha = rz / pap;
            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &ap, 1.0);

            let r_norm = r.norm();
            if r_norm <= self.tolerance * b_norm {
                return Ok((x, iteration, r_norm));
            }

            z = r.component_mul(inv_diag);
            let rz_next = r.dot(&z);
            let beta = rz_next / rz;
            rz = rz_next;
            p = &z + &p * beta;
        }

        Err(BackendError(format!(
            "Conjugate gradient did not converge in {} iterations",
            self.max_iterations
        )))
    }
}

impl LinearSolver for ConjugateGradientBackend {
    fn name(&self) -> &str {
        "conjugate-gradient"
    }

    fn solve_linear(
        &self,
        system: &LinearSystemData,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        system.check_dimensions()?;
        let n = system.num_dofs;
        let solver_name = "nalgebra-sparse-PCG".to_string();

        if n == 0 {
            return Ok((
                DVector::zeros(0),
                SolveInfo {
                    iterations: 0,
                    residual_norm: Some(0.0),
                    solver_name,
                },
            ));
        }

        let a = to_csr(&system.stiffness)?;
        let inv_diag = inverse_diagonal(&a)?;

        let b = &system.force;
        if b.norm() == 0.0 {
            // u = 0, but a singular K must still fail as it does under Cholesky.
            // A uniform load has a component along every rigid body mode.
            let uniform = DVector::from_element(n, 1.0);
            self.iterate(&a, &inv_diag, &uniform)?;
            return Ok((
                DVector::zeros(n),
                SolveInfo {
                    iterations: 0,
                    residual_norm: Some(0.0),
                    solver_name,
                },
            ));
        }

        let (x, iterations, residual) = self.iterate(&a, &inv_diag, b)?;
        Ok((
            x,
            SolveInfo {
                iterations,
                residual_norm: Some(residual),
                solver_name,
            },
        ))
    }
}
