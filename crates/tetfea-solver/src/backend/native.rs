//! Native backend using nalgebra.
//!
//! This is the default backend. It reconstructs a dense matrix from the COO
//! triplets and solves with a Cholesky factorisation, which doubles as the
//! positive-definiteness check on the reduced stiffness.

use super::traits::*;
use nalgebra::DVector;
use nalgebra::linalg::Cholesky;

/// Pivots below this fraction of the largest diagonal entry mark the system
/// as singular (unrestrained rigid-body modes).
pub const DEFAULT_PIVOT_TOLERANCE: f64 = 1e-12;

/// Native solver backend using a dense Cholesky factorisation.
///
/// Suitable for small-to-medium problems (up to ~10,000 DOFs).
/// For larger problems use the conjugate gradient backend.
#[derive(Debug, Clone, Copy)]
pub struct NativeBackend;

impl LinearSolver for NativeBackend {
    fn name(&self) -> &str {
        "native-nalgebra"
    }

    fn solve_linear(
        &self,
        system: &LinearSystemData,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        system.check_dimensions()?;
        let n = system.num_dofs;

        if n == 0 {
            return Ok((
                DVector::zeros(0),
                SolveInfo {
                    iterations: 0,
                    residual_norm: Some(0.0),
                    solver_name: "nalgebra-Cholesky".to_string(),
                },
            ));
        }

        let k = system.stiffness.to_dense();
        let max_diag = k.diagonal().iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        if max_diag == 0.0 || !max_diag.is_finite() {
            return Err(BackendError(
                "Stiffness matrix has no positive diagonal entry".into(),
            ));
        }

        let chol = Cholesky::new(k.clone()).ok_or(BackendError(
            "Stiffness matrix is not positive definite (Cholesky failed)".into(),
        ))?;

        let l = chol.l_dirty();
        let (min_pivot, row) = (0..n)
            .map(|i| (l[(i, i)] * l[(i, i)], i))
            .fold((f64::INFINITY, 0), |acc, p| if p.0 < acc.0 { p } else { acc });
        if min_pivot < DEFAULT_PIVOT_TOLERANCE * max_diag {
            return Err(BackendError(format!(
                "Stiffness matrix is singular: pivot {:.3e} at row {} (max diagonal {:.3e})",
                min_pivot, row, max_diag
            )));
        }

        let u = chol.solve(&system.force);
        if u.iter().any(|v| !v.is_finite()) {
            return Err(BackendError("Solution contains non-finite values".into()));
        }

        let residual = (&k * &u - &system.force).norm();

        Ok((
            u,
            SolveInfo {
                iterations: 1,
                residual_norm: Some(residual),
                solver_name: "nalgebra-Cholesky".to_string(),
            },
        ))
    }
}
