//! Displacement constraints and system reduction.
//!
//! Constrained DOFs are held at zero and eliminated: the reduced system keeps
//! only the rows and columns of the free DOFs, in ascending global order.
//! After the solve the reduced solution is scattered back into a full-length
//! vector with zeros at every constrained position.

use crate::backend::{LinearSolver, LinearSystemData, SolveInfo, SparseTripletsF64};
use crate::error::{Result, SolverError};
use crate::mesh::{DOFS_PER_NODE, dof_index};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use std::collections::BTreeSet;

/// Set of constrained global DOF indices (duplicates collapse)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedDofs {
    dofs: BTreeSet<usize>,
}

impl FixedDofs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain a single global DOF
    pub fn insert(&mut self, dof: usize) {
        self.dofs.insert(dof);
    }

    /// Constrain all three translations of a node
    pub fn fix_node(&mut self, node: usize) {
        for axis in 0..DOFS_PER_NODE {
            self.dofs.insert(dof_index(node, axis));
        }
    }

    /// Constrain selected axes (0 = x, 1 = y, 2 = z) of a node
    pub fn fix_node_axes(&mut self, node: usize, axes: &[usize]) {
        for &axis in axes {
            self.dofs.insert(dof_index(node, axis));
        }
    }

    /// Fully constrain every node in `nodes`
    pub fn fix_nodes(&mut self, nodes: impl IntoIterator<Item = usize>) {
        for node in nodes {
            self.fix_node(node);
        }
    }

    pub fn contains(&self, dof: usize) -> bool {
        self.dofs.contains(&dof)
    }

    pub fn len(&self) -> usize {
        self.dofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dofs.is_empty()
    }

    /// Constrained DOFs in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.dofs.iter().copied()
    }

    /// Check every index against the system size
    pub fn validate(&self, num_dofs: usize) -> Result<()> {
        match self.dofs.range(num_dofs..).next() {
            Some(&index) => Err(SolverError::DofOutOfRange { index, num_dofs }),
            None => Ok(()),
        }
    }

    /// Unconstrained DOFs in ascending order
    pub fn free_dofs(&self, num_dofs: usize) -> Vec<usize> {
        (0..num_dofs).filter(|d| !self.dofs.contains(d)).collect()
    }
}

impl FromIterator<usize> for FixedDofs {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            dofs: iter.into_iter().collect(),
        }
    }
}

/// Linear system restricted to the free DOFs
#[derive(Debug, Clone)]
pub struct ReducedSystem {
    /// Reduced K and F, ready for a backend
    pub system: LinearSystemData,
    /// Global index of each reduced row
    pub free_dofs: Vec<usize>,
    /// Size of the full system
    pub num_dofs: usize,
}

fn check_shape(nrows: usize, ncols: usize, force_len: usize) -> Result<()> {
    if nrows != ncols || force_len != nrows {
        return Err(SolverError::DimensionMismatch(format!(
            "stiffness is {}x{}, force has {} entries",
            nrows, ncols, force_len
        )));
    }
    Ok(())
}

impl ReducedSystem {
    /// Eliminate constrained DOFs from a dense global system
    pub fn from_dense(
        stiffness: &DMatrix<f64>,
        force: &DVector<f64>,
        fixed: &FixedDofs,
    ) -> Result<Self> {
        check_shape(stiffness.nrows(), stiffness.ncols(), force.len())?;
        let num_dofs = stiffness.nrows();
        fixed.validate(num_dofs)?;

        let free_dofs = fixed.free_dofs(num_dofs);
        let n = free_dofs.len();

        let mut triplets = SparseTripletsF64::new(n, n);
        for (i_red, &i_full) in free_dofs.iter().enumerate() {
            for (j_red, &j_full) in free_dofs.iter().enumerate() {
                let v = stiffness[(i_full, j_full)];
                if v != 0.0 {
                    triplets.push(i_red, j_red, v);
                }
            }
        }

        Ok(Self::with_triplets(triplets, force, free_dofs, num_dofs))
    }

    /// Eliminate constrained DOFs from a CSR global system
    pub fn from_csr(
        stiffness: &CsrMatrix<f64>,
        force: &DVector<f64>,
        fixed: &FixedDofs,
    ) -> Result<Self> {
        check_shape(stiffness.nrows(), stiffness.ncols(), force.len())?;
        let num_dofs = stiffness.nrows();
        fixed.validate(num_dofs)?;

        let free_dofs = fixed.free_dofs(num_dofs);
        let mut reduced_index = vec![None; num_dofs];
        for (i_red, &i_full) in free_dofs.iter().enumerate() {
            reduced_index[i_full] = Some(i_red);
        }

        let n = free_dofs.len();
        let mut triplets = SparseTripletsF64::new(n, n);
        for (i, j, &v) in stiffness.triplet_iter() {
            if let (Some(i_red), Some(j_red)) = (reduced_index[i], reduced_index[j]) {
                triplets.push(i_red, j_red, v);
            }
        }

        Ok(Self::with_triplets(triplets, force, free_dofs, num_dofs))
    }

    fn with_triplets(
        stiffness: SparseTripletsF64,
        force: &DVector<f64>,
        free_dofs: Vec<usize>,
        num_dofs: usize,
    ) -> Self {
        let n = free_dofs.len();
        Self {
            system: LinearSystemData {
                stiffness,
                force: DVector::from_iterator(n, free_dofs.iter().map(|&d| force[d])),
                num_dofs: n,
            },
            free_dofs,
            num_dofs,
        }
    }

    /// Number of unknowns after reduction
    pub fn num_free(&self) -> usize {
        self.free_dofs.len()
    }

    /// True when every DOF is constrained
    pub fn is_trivial(&self) -> bool {
        self.free_dofs.is_empty()
    }

    /// Restrict a full-length vector to the free DOFs
    pub fn extract(&self, full: &DVector<f64>) -> Result<DVector<f64>> {
        if full.len() != self.num_dofs {
            return Err(SolverError::DimensionMismatch(format!(
                "full vector has {} entries, system has {} DOFs",
                full.len(),
                self.num_dofs
            )));
        }
        Ok(DVector::from_iterator(
            self.num_free(),
            self.free_dofs.iter().map(|&d| full[d]),
        ))
    }

    /// Scatter a reduced solution into a full vector, zero at constrained DOFs
    pub fn expand(&self, reduced: &DVector<f64>) -> Result<DVector<f64>> {
        if reduced.len() != self.num_free() {
            return Err(SolverError::DimensionMismatch(format!(
                "reduced solution has {} entries, expected {}",
                reduced.len(),
                self.num_free()
            )));
        }
        let mut full = DVector::zeros(self.num_dofs);
        for (i_red, &i_full) in self.free_dofs.iter().enumerate() {
            full[i_full] = reduced[i_red];
        }
        Ok(full)
    }

    /// Solve the reduced system and return the full displacement vector
    ///
    /// A fully constrained system never reaches the backend.
    pub fn solve(&self, backend: &dyn LinearSolver) -> Result<(DVector<f64>, SolveInfo)> {
        if self.is_trivial() {
            return Ok((
                DVector::zeros(self.num_dofs),
                SolveInfo {
                    iterations: 0,
                    residual_norm: Some(0.0),
                    solver_name: "trivial".to_string(),
                },
            ));
        }

        let (reduced, info) = backend.solve_linear(&self.system)?;
        Ok((self.expand(&reduced)?, info))
    }
}
