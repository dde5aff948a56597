//! Finite element library for 3D solid analysis.

use crate::mesh::{DOFS_PER_NODE, dof_index};

pub mod tet4;

pub use tet4::{
    DEGENERATE_VOLUME, ElementKernel, ElementStiffness, StrainDisplacementMatrix, Tet4,
    TetGeometry,
};

/// Element interface for DOF bookkeeping
pub trait Element {
    /// Get the number of nodes for this element type
    fn num_nodes(&self) -> usize;

    /// Get the number of degrees of freedom per node
    fn dofs_per_node(&self) -> usize {
        DOFS_PER_NODE
    }

    /// Node ids in local (connectivity) order
    fn node_ids(&self) -> &[usize];

    /// Get the global DOF indices for this element
    ///
    /// # Returns
    /// Vector of global DOF indices, node by node, x/y/z within a node
    fn global_dof_indices(&self) -> Vec<usize> {
        let mut indices = Vec::with_capacity(self.num_nodes() * self.dofs_per_node());

        for &node_id in self.node_ids() {
            for local_dof in 0..self.dofs_per_node() {
                indices.push(dof_index(node_id, local_dof));
            }
        }

        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_dof_indices_simple() {
        let elem = Tet4::new([0, 1, 2, 3]);
        let indices = elem.global_dof_indices();
        assert_eq!(indices, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn global_dof_indices_offset() {
        let elem = Tet4::new([5, 10, 2, 7]);
        let indices = elem.global_dof_indices();

        // Node 5: DOFs 15, 16, 17
        // Node 10: DOFs 30, 31, 32
        assert_eq!(&indices[..6], &[15, 16, 17, 30, 31, 32]);
        assert_eq!(&indices[6..], &[6, 7, 8, 21, 22, 23]);
    }
}
