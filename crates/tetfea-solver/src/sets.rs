//! Node sets and geometric node selection.
//!
//! Supports and loads are attached to the faces of the part at the extremes
//! of the long axis: nodes within a tolerance of the minimum coordinate are
//! clamped, nodes within the tolerance of the maximum are loaded.

use crate::mesh::TetMesh;
use std::collections::HashMap;

/// Name of the set holding the clamped face nodes
pub const FIXED_SET: &str = "FIXED";
/// Name of the set holding the loaded face nodes
pub const LOADED_SET: &str = "LOADED";

/// Coordinate axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Which end of an axis to select
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

/// Closeness test for coordinate selection
///
/// A coordinate matches a target when
/// `|value - target| <= absolute + relative * |target|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionTolerance {
    pub absolute: f64,
    pub relative: f64,
}

impl SelectionTolerance {
    /// Default absolute part
    pub const DEFAULT_ABSOLUTE: f64 = 1e-6;
    /// Default relative part
    pub const DEFAULT_RELATIVE: f64 = 1e-5;

    pub fn new(absolute: f64, relative: f64) -> Self {
        Self { absolute, relative }
    }

    /// Purely absolute tolerance
    pub fn absolute(absolute: f64) -> Self {
        Self::new(absolute, 0.0)
    }

    pub fn matches(&self, value: f64, target: f64) -> bool {
        (value - target).abs() <= self.absolute + self.relative * target.abs()
    }
}

impl Default for SelectionTolerance {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ABSOLUTE, Self::DEFAULT_RELATIVE)
    }
}

/// A named set of nodes
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSet {
    /// Set name
    pub name: String,
    /// Node ids in ascending order
    pub nodes: Vec<usize>,
}

impl NodeSet {
    pub fn new(name: impl Into<String>, nodes: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Collection of node sets by name
#[derive(Debug, Clone, Default)]
pub struct Sets {
    /// Node sets by name
    pub node_sets: HashMap<String, NodeSet>,
}

impl Sets {
    /// Create an empty sets collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node set, replacing any set with the same name
    pub fn add_node_set(&mut self, set: NodeSet) {
        self.node_sets.insert(set.name.clone(), set);
    }

    /// Get nodes from a node set by name
    pub fn get_nodes(&self, set_name: &str) -> Option<&[usize]> {
        self.node_sets.get(set_name).map(|s| s.nodes.as_slice())
    }

    /// Build the clamped and loaded face sets along `axis`
    pub fn end_faces(mesh: &TetMesh, axis: Axis, tolerance: SelectionTolerance) -> Self {
        let mut sets = Self::new();
        sets.add_node_set(NodeSet::new(
            FIXED_SET,
            nodes_at_extremum(mesh, axis, Extremum::Min, tolerance),
        ));
        sets.add_node_set(NodeSet::new(
            LOADED_SET,
            nodes_at_extremum(mesh, axis, Extremum::Max, tolerance),
        ));
        sets
    }
}

/// Nodes whose `axis` coordinate matches the mesh extreme within `tolerance`
///
/// Returns an empty list for an empty mesh.
pub fn nodes_at_extremum(
    mesh: &TetMesh,
    axis: Axis,
    extremum: Extremum,
    tolerance: SelectionTolerance,
) -> Vec<usize> {
    let a = axis.index();
    let coords = mesh.nodes().iter().map(|p| p[a]);
    let target = match extremum {
        Extremum::Min => coords.fold(f64::INFINITY, f64::min),
        Extremum::Max => coords.fold(f64::NEG_INFINITY, f64::max),
    };
    if !target.is_finite() {
        return Vec::new();
    }

    mesh.nodes()
        .iter()
        .enumerate()
        .filter(|(_, p)| tolerance.matches(p[a], target))
        .map(|(i, _)| i)
        .collect()
}
