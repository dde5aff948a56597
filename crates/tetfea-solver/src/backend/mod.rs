//! Numerical backend abstraction layer.
//!
//! The reduced global system is handed to a solver through the
//! [`LinearSolver`] trait, so the assembly layer never depends on a concrete
//! linear algebra package. Element-level computations stay in nalgebra
//! static matrices.
//!
//! # Backends
//!
//! - **Native** (default): dense Cholesky factorisation with nalgebra.
//!   Rejects indefinite and singular systems. Suitable for small-to-medium
//!   problems.
//! - **Conjugate gradient**: Jacobi-preconditioned CG on a CSR matrix from
//!   nalgebra-sparse, for larger meshes.
//!
//! ```text
//! Element kernel (nalgebra SMatrix, 12×12 dense)
//!         │
//!         ▼
//! Assembly + reduction (COO triplets + force vector)
//!         │
//!         ▼
//!   LinearSolver trait
//!    ┌────┴─────┐
//!    ▼          ▼
//! Native    Conjugate
//! Cholesky  Gradient
//! ```

pub mod iterative;
pub mod native;
pub mod traits;

pub use iterative::ConjugateGradientBackend;
pub use native::NativeBackend;
pub use traits::*;

/// Returns the default solver backend.
pub fn default_backend() -> Box<dyn LinearSolver> {
    Box::new(NativeBackend)
}
