//! Tetrahedral mesh data structures.
//!
//! A mesh is the point set and 4-node connectivity handed over by the external
//! mesher. Node ids are plain indices into the node sequence and the global
//! DOF numbering is fixed to `3 * node + axis` for the lifetime of a run.

use crate::elements::Tet4;
use crate::error::{Result, SolverError};
use nalgebra::{DVector, Point3};
use serde::{Deserialize, Serialize};

/// Degrees of freedom per node (ux, uy, uz)
pub const DOFS_PER_NODE: usize = 3;

/// Global DOF index of `axis` (0 = x, 1 = y, 2 = z) at `node`
#[inline]
pub const fn dof_index(node: usize, axis: usize) -> usize {
    node * DOFS_PER_NODE + axis
}

/// Mesh as exchanged with the mesher, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    /// Node coordinates
    pub nodes: Vec<[f64; 3]>,
    /// Tetrahedra as 4 node indices
    pub elements: Vec<[usize; 4]>,
}

/// Validated tetrahedral mesh
#[derive(Debug, Clone, PartialEq)]
pub struct TetMesh {
    nodes: Vec<Point3<f64>>,
    elements: Vec<Tet4>,
}

impl TetMesh {
    /// Create a mesh, checking that every element references existing nodes
    pub fn new(nodes: Vec<Point3<f64>>, connectivity: Vec<[usize; 4]>) -> Result<Self> {
        let num_nodes = nodes.len();
        for (element, conn) in connectivity.iter().enumerate() {
            if let Some(&node) = conn.iter().find(|&&n| n >= num_nodes) {
                return Err(SolverError::InvalidConnectivity {
                    element,
                    node,
                    num_nodes,
                });
            }
        }

        Ok(Self {
            nodes,
            elements: connectivity.into_iter().map(Tet4::new).collect(),
        })
    }

    /// Node coordinates, indexed by node id
    pub fn nodes(&self) -> &[Point3<f64>] {
        &self.nodes
    }

    /// Elements in traversal order
    pub fn elements(&self) -> &[Tet4] {
        &self.elements
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Total number of degrees of freedom (3 per node)
    pub fn num_dofs(&self) -> usize {
        self.nodes.len() * DOFS_PER_NODE
    }

    /// Corner coordinates of an element, in connectivity order
    pub fn element_coords(&self, element: &Tet4) -> [Point3<f64>; 4] {
        element.nodes.map(|n| self.nodes[n])
    }

    /// Node coordinates displaced by `displacements` (length 3N)
    pub fn deformed_nodes(&self, displacements: &DVector<f64>) -> Result<Vec<Point3<f64>>> {
        if displacements.len() != self.num_dofs() {
            return Err(SolverError::DimensionMismatch(format!(
                "displacement vector has {} entries, mesh has {} DOFs",
                displacements.len(),
                self.num_dofs()
            )));
        }

        Ok(self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, p)| {
                Point3::new(
                    p.x + displacements[dof_index(i, 0)],
                    p.y + displacements[dof_index(i, 1)],
                    p.z + displacements[dof_index(i, 2)],
                )
            })
            .collect())
    }

    /// Get mesh statistics
    ///
    /// `degenerate_volume` is the threshold below which an element is
    /// counted as degenerate.
    pub fn statistics(&self, degenerate_volume: f64) -> MeshStatistics {
        let mut num_degenerate = 0;
        let mut total_volume = 0.0;
        for element in &self.elements {
            let volume = Tet4::volume(&self.element_coords(element));
            if volume < degenerate_volume {
                num_degenerate += 1;
            } else {
                total_volume += volume;
            }
        }

        let bounding_box = self.bounding_box();

        MeshStatistics {
            num_nodes: self.num_nodes(),
            num_elements: self.num_elements(),
            num_dofs: self.num_dofs(),
            num_degenerate,
            total_volume,
            bounding_box,
        }
    }

    /// Axis-aligned bounding box as (min, max), `None` for an empty mesh
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.nodes.first()?;
        let mut lo = *first;
        let mut hi = *first;
        for p in &self.nodes[1..] {
            lo = lo.inf(p);
            hi = hi.sup(p);
        }
        Some((lo, hi))
    }
}

impl TryFrom<MeshData> for TetMesh {
    type Error = SolverError;

    fn try_from(data: MeshData) -> Result<Self> {
        let nodes = data
            .nodes
            .into_iter()
            .map(|[x, y, z]| Point3::new(x, y, z))
            .collect();
        Self::new(nodes, data.elements)
    }
}

/// Mesh statistics for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct MeshStatistics {
    /// Total number of nodes
    pub num_nodes: usize,
    /// Total number of elements
    pub num_elements: usize,
    /// Total degrees of freedom
    pub num_dofs: usize,
    /// Elements below the degenerate-volume threshold
    pub num_degenerate: usize,
    /// Summed volume of non-degenerate elements
    pub total_volume: f64,
    /// Axis-aligned bounding box
    pub bounding_box: Option<(Point3<f64>, Point3<f64>)>,
}

impl MeshStatistics {
    /// Format as a human-readable string
    pub fn format(&self) -> String {
        let mut lines = vec![
            format!("Nodes: {}", self.num_nodes),
            format!("Elements: {}", self.num_elements),
            format!("DOFs: {}", self.num_dofs),
            format!("Degenerate elements: {}", self.num_degenerate),
            format!("Volume: {:.6e}", self.total_volume),
        ];

        if let Some((lo, hi)) = &self.bounding_box {
            lines.push(format!(
                "Bounding box: [{:.6}, {:.6}, {:.6}] - [{:.6}, {:.6}, {:.6}]",
                lo.x, lo.y, lo.z, hi.x, hi.y, hi.z
            ));
        }

        lines.join("\n")
    }
}
