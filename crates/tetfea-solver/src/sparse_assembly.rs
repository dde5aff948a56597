//! Sparse matrix assembly for larger meshes.
//!
//! Uses nalgebra-sparse for memory-efficient storage:
//! - COO (coordinate) format during assembly, one entry per element term
//! - CSR (compressed sparse row) format for reduction and solving
//!
//! Each row of K only touches the DOFs of elements sharing that node, so the
//! CSR matrix holds O(N) entries instead of 9N².

use crate::assembly::{AssemblyMode, element_stiffness_matrices};
use crate::backend::{LinearSolver, LinearSystemData, SparseTripletsF64};
use crate::boundary_conditions::{FixedDofs, ReducedSystem};
use crate::elements::{Element, ElementKernel};
use crate::error::{Result, SolverError};
use crate::mesh::TetMesh;
use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Sparse global finite element system
#[derive(Debug, Clone)]
pub struct SparseGlobalSystem {
    /// Global stiffness matrix in CSR format
    pub stiffness: CsrMatrix<f64>,
    /// Global force vector
    pub force: DVector<f64>,
    /// Number of degrees of freedom
    pub num_dofs: usize,
}

impl SparseGlobalSystem {
    /// Assemble the global stiffness matrix in sparse format
    ///
    /// Duplicate (i, j) entries from elements sharing nodes are summed
    /// during the COO to CSR conversion. Degenerate elements add no entries.
    pub fn assemble(mesh: &TetMesh, kernel: &ElementKernel, mode: AssemblyMode) -> Self {
        let num_dofs = mesh.num_dofs();
        let element_matrices = element_stiffness_matrices(mesh, kernel, mode);

        let mut coo = CooMatrix::new(num_dofs, num_dofs);
        for (element, k_e) in mesh.elements().iter().zip(&element_matrices) {
            if k_e.iter().all(|&v| v == 0.0) {
                continue;
            }
            let dof_indices = element.global_dof_indices();
            for (i_local, &i_global) in dof_indices.iter().enumerate() {
                for (j_local, &j_global) in dof_indices.iter().enumerate() {
                    coo.push(i_global, j_global, k_e[(i_local, j_local)]);
                }
            }
        }

        let stiffness = CsrMatrix::from(&coo);
        debug!(
            "Assembled sparse {}x{} stiffness with {} stored entries",
            num_dofs,
            num_dofs,
            stiffness.nnz()
        );

        Self {
            stiffness,
            force: DVector::zeros(num_dofs),
            num_dofs,
        }
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

    /// Number of stored entries in K
    pub fn nnz(&self) -> usize {
        self.stiffness.nnz()
    }

    /// Fraction of K that is stored
    pub fn density(&self) -> f64 {
        if self.num_dofs == 0 {
            return 0.0;
        }
        self.nnz() as f64 / (self.num_dofs * self.num_dofs) as f64
    }

    /// Check structural and numerical symmetry within a relative tolerance
    pub fn validate(&self) -> Result<()> {
        let transpose = self.stiffness.transpose();
        let scale = self
            .stiffness
            .values()
            .iter()
            .fold(0.0_f64, |m, v| m.max(v.abs()));

        let diff = &self.stiffness - &transpose;
        if let Some((i, j, v)) = diff
            .triplet_iter()
            .find(|&(_, _, v)| v.abs() > 1e-12 * scale)
        {
            return Err(SolverError::Assembly(format!(
                "Stiffness matrix not symmetric at ({}, {}): diff = {}",
                i, j, v
            )));
        }
        Ok(())
    }

    /// Restrict the system to the DOFs not in `fixed`
    pub fn reduce(&self, fixed: &FixedDofs) -> Result<ReducedSystem> {
        ReducedSystem::from_csr(&self.stiffness, &self.force, fixed)
    }

    /// Export the unreduced system as backend-agnostic `LinearSystemData`.
    pub fn to_linear_system_data(&self) -> LinearSystemData {
        let mut triplets = SparseTripletsF64::new(self.num_dofs, self.num_dofs);
        for (i, j, &v) in self.stiffness.triplet_iter() {
            triplets.push(i, j, v);
        }
        LinearSystemData {
            stiffness: triplets,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::GlobalSystem;
    use crate::backend::{ConjugateGradientBackend, NativeBackend};
    use crate::materials::constitutive_matrix;
    use nalgebra::Point3;

    fn kernel() -> ElementKernel {
        ElementKernel::new(constitutive_matrix(70e9, 0.33).unwrap())
    }

    /// Two stacked unit cubes, 5 tetrahedra each
    fn column_mesh() -> TetMesh {
        let mut nodes = Vec::new();
        for z in 0..3 {
            for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                nodes.push(Point3::new(x, y, z as f64));
            }
        }
        let cube = |o: usize| {
            [
                [o, o + 1, o + 3, o + 4],
                [o + 1, o + 2, o + 3, o + 6],
                [o + 1, o + 5, o + 6, o + 4],
                [o + 3, o + 7, o + 4, o + 6],
                [o + 1, o + 3, o + 4, o + 6],
            ]
        };
        let elements = cube(0).into_iter().chain(cube(4)).collect();
        TetMesh::new(nodes, elements).unwrap()
    }

    fn max_abs_diff(a: &nalgebra::DMatrix<f64>, b: &nalgebra::DMatrix<f64>) -> f64 {
        (a - b).iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    #[test]
    fn sparse_matches_dense_assembly() {
        let mesh = column_mesh();
        let k = kernel();
        let dense = GlobalSystem::assemble(&mesh, &k, AssemblyMode::Sequential);
        let sparse = SparseGlobalSystem::assemble(&mesh, &k, AssemblyMode::Sequential);

        let densified = sparse.to_linear_system_data().stiffness.to_dense();
        let scale = dense.stiffness.amax();
        assert!(max_abs_diff(&densified, &dense.stiffness) <= 1e-12 * scale);
    }

    #[test]
    fn sparse_matrix_structure() {
        let sparse =
            SparseGlobalSystem::assemble(&column_mesh(), &kernel(), AssemblyMode::Sequential);
        assert_eq!(sparse.stiffness.nrows(), 36);
        assert_eq!(sparse.stiffness.ncols(), 36);
        // Bottom and top layers never interact
        assert!(sparse.density() < 1.0);
        assert!(
            !sparse
                .stiffness
                .triplet_iter()
                .any(|(i, j, _)| i < 12 && (24..36).contains(&j))
        );
        assert!(sparse.validate().is_ok());
    }

    #[test]
    fn sparse_reduction_matches_dense_reduction() {
        let mesh = column_mesh();
        let k = kernel();
        let dense = GlobalSystem::assemble(&mesh, &k, AssemblyMode::Sequential);
        let sparse = SparseGlobalSystem::assemble(&mesh, &k, AssemblyMode::Parallel);

        let mut fixed = FixedDofs::new();
        fixed.fix_nodes(0..4);
        let rd = dense.reduce(&fixed).unwrap();
        let rs = sparse.reduce(&fixed).unwrap();

        assert_eq!(rd.free_dofs, rs.free_dofs);
        let kd = rd.system.stiffness.to_dense();
        let ks = rs.system.stiffness.to_dense();
        assert!(max_abs_diff(&kd, &ks) <= 1e-12 * kd.amax());
    }

    #[test]
    fn sparse_solve_matches_dense_solve() {
        let mesh = column_mesh();
        let k = kernel();
        let mut dense = GlobalSystem::assemble(&mesh, &k, AssemblyMode::Sequential);
        let mut sparse = SparseGlobalSystem::assemble(&mesh, &k, AssemblyMode::Sequential);

        let mut force = DVector::zeros(36);
        for node in 8..12 {
            force[3 * node] = 1.0e5;
        }
        dense.set_force(force.clone()).unwrap();
        sparse.set_force(force).unwrap();

        let mut fixed = FixedDofs::new();
        fixed.fix_nodes(0..4);

        let u_dense = dense.solve_with_backend(&fixed, &NativeBackend).unwrap();
        let u_sparse = sparse
            .solve_with_backend(&fixed, &ConjugateGradientBackend::default())
            .unwrap();

        let scale = u_dense.amax();
        assert!(scale > 0.0);
        assert!((u_dense - u_sparse).amax() <= 1e-6 * scale);
    }

    #[test]
    fn empty_mesh_gives_empty_system() {
        let mesh = TetMesh::new(vec![], vec![]).unwrap();
        let sparse = SparseGlobalSystem::assemble(&mesh, &kernel(), AssemblyMode::Sequential);
        assert_eq!(sparse.num_dofs, 0);
        assert_eq!(sparse.nnz(), 0);
        assert_eq!(sparse.density(), 0.0);
    }
}
