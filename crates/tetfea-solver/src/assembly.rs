//! Global matrix assembly for finite element systems.
//!
//! Assembles element stiffness matrices into the global system:
//! - K: Global stiffness matrix (dense, 3N × 3N)
//! - F: Global force vector (length 3N)
//!
//! ## Assembly Process
//!
//! 1. Compute k_e for every element (optionally in parallel)
//! 2. Scatter-add each 3×3 node-pair block of k_e into K at the block
//!    position of the two nodes, in element order
//! 3. Install the force vector built by the load assembly
//! 4. Eliminate constrained DOFs (see [`crate::boundary_conditions`])
//!
//! The scatter is always sequential in element order, so the parallel mode
//! produces a matrix bit-identical to the sequential one.

use crate::backend::{LinearSolver, LinearSystemData, SparseTripletsF64};
use crate::boundary_conditions::{FixedDofs, ReducedSystem};
use crate::elements::{ElementKernel, ElementStiffness, Tet4};
use crate::error::{Result, SolverError};
use crate::mesh::{DOFS_PER_NODE, TetMesh};
use log::debug;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How per-element work is scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyMode {
    /// One element after another on the calling thread
    #[default]
    Sequential,
    /// Element computations on the rayon pool, merged in element order
    Parallel,
}

/// Element stiffness matrices in element order
pub fn element_stiffness_matrices(
    mesh: &TetMesh,
    kernel: &ElementKernel,
    mode: AssemblyMode,
) -> Vec<ElementStiffness> {
    let compute = |element: &Tet4| kernel.stiffness_matrix(&mesh.element_coords(element));
    match mode {
        AssemblyMode::Sequential => mesh.elements().iter().map(compute).collect(),
        AssemblyMode::Parallel => mesh.elements().par_iter().map(compute).collect(),
    }
}

/// Add the 3×3 node-pair blocks of `k_e` into `stiffness`
pub(crate) fn scatter_element(
    stiffness: &mut DMatrix<f64>,
    element: &Tet4,
    k_e: &ElementStiffness,
) {
    for (a, &node_a) in element.nodes.iter().enumerate() {
        for (b, &node_b) in element.nodes.iter().enumerate() {
            let mut block = stiffness
                .fixed_view_mut::<3, 3>(node_a * DOFS_PER_NODE, node_b * DOFS_PER_NODE);
            block += k_e.fixed_view::<3, 3>(a * DOFS_PER_NODE, b * DOFS_PER_NODE);
        }
    }
}

/// Global finite element system
#[derive(Debug, Clone)]
pub struct GlobalSystem {
    /// Global stiffness matrix
    pub stiffness: DMatrix<f64>,
    /// Global force vector
    pub force: DVector<f64>,
    /// Number of degrees of freedom
    pub num_dofs: usize,
}

impl GlobalSystem {
    /// Create a new empty global system
    pub fn new(num_dofs: usize) -> Self {
        Self {
            stiffness: DMatrix::zeros(num_dofs, num_dofs),
            force: DVector::zeros(num_dofs),
            num_dofs,
        }
    }

    /// Assemble the global stiffness matrix of `mesh`
    ///
    /// Degenerate elements contribute zero blocks. The force vector starts
    /// at zero.
    pub fn assemble(mesh: &TetMesh, kernel: &ElementKernel, mode: AssemblyMode) -> Self {
        let mut system = Self::new(mesh.num_dofs());

        let element_matrices = element_stiffness_matrices(mesh, kernel, mode);
        for (element, k_e) in mesh.elements().iter().zip(&element_matrices) {
            scatter_element(&mut system.stiffness, element, k_e);
        }

        debug!(
            "Assembled {}x{} stiffness from {} elements ({:?})",
            system.num_dofs,
            system.num_dofs,
            mesh.num_elements(),
            mode
        );
        system
    }

    /// Install the global force vector
    pub fn set_force(&mut self, force: DVector<f64>) -> Result<()> {
        if force.len() != self.num_dofs {
            return Err(SolverError::DimensionMismatch(format!(
                "force vector has {} entries, system has {} DOFs",
                force.len(),
                self.num_dofs
            )));
        }
        self.force = force;
        Ok(())
    }

    /// Check that the stiffness matrix is exactly symmetric
    pub fn validate(&self) -> Result<()> {
        for i in 0..self.num_dofs {
            for j in (i + 1)..self.num_dofs {
                if self.stiffness[(i, j)] != self.stiffness[(j, i)] {
                    return Err(SolverError::Assembly(format!(
                        "Stiffness matrix not symmetric at ({}, {}): {} vs {}",
                        i,
                        j,
                        self.stiffness[(i, j)],
                        self.stiffness[(j, i)]
                    )));
                }
            }
        }

        Ok(())
    }

    /// Restrict the system to the DOFs not in `fixed`
    pub fn reduce(&self, fixed: &FixedDofs) -> Result<ReducedSystem> {
        ReducedSystem::from_dense(&self.stiffness, &self.force, fixed)
    }

    /// Export the unreduced system as backend-agnostic `LinearSystemData`.
    pub fn to_linear_system_data(&self) -> LinearSystemData {
        LinearSystemData {
            stiffness: SparseTripletsF64::from_dense(&self.stiffness),
            force: self.force.clone(),
            num_dofs: self.num_dofs,
        }
    }

    /// Reduce by `fixed` and solve, returning the full displacement vector
    pub fn solve_with_backend(
        &self,
        fixed: &FixedDofs,
        backend: &dyn LinearSolver,
    ) -> Result<DVector<f64>> {
        let (u, _) = self.reduce(fixed)?.solve(backend)?;
        Ok(u)
    }
}
