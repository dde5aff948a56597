//! Load case declaration and global force vector assembly.
//!
//! A load type is a `+`-separated list of components (`axial`, `bending`,
//! `torsion`), case-insensitive. Every component adds its own contribution
//! to F, so a combined case is the elementwise sum of the single cases.
//! A component whose magnitude is zero is skipped without a warning; an
//! unrecognised component name aborts the run.

use crate::error::{Result, SolverError};
use crate::mesh::{TetMesh, dof_index};
use log::{info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One declared load component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadComponent {
    /// Total force along z, shared evenly by the loaded nodes
    Axial,
    /// Force along y at the loaded node closest to the target point
    Bending,
    /// Couple about z: F_x -= y·T, F_y += x·T at every loaded node
    Torsion,
}

impl LoadComponent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadComponent::Axial => "axial",
            LoadComponent::Bending => "bending",
            LoadComponent::Torsion => "torsion",
        }
    }
}

impl fmt::Display for LoadComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadComponent {
    type Err = String;

    /// Parse a trimmed, case-insensitive component name
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "axial" => Ok(LoadComponent::Axial),
            "bending" => Ok(LoadComponent::Bending),
            "torsion" => Ok(LoadComponent::Torsion),
            other => Err(other.to_string()),
        }
    }
}

/// Parsed load type, e.g. `axial+torsion`
///
/// Components keep their declared order; a repeated component is applied
/// once per occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadType {
    components: Vec<LoadComponent>,
    source: String,
}

impl LoadType {
    /// Parse a `+`-separated load type
    ///
    /// # Errors
    /// [`SolverError::UnknownLoadComponent`] naming the first bad token
    /// (after trimming and lowercasing) and the full load type.
    pub fn parse(load_type: &str) -> Result<Self> {
        let components = load_type
            .split('+')
            .map(|part| {
                part.parse::<LoadComponent>()
                    .map_err(|token| SolverError::UnknownLoadComponent {
                        token,
                        load_type: load_type.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            components,
            source: load_type.to_string(),
        })
    }

    pub fn components(&self) -> &[LoadComponent] {
        &self.components
    }

    pub fn contains(&self, component: LoadComponent) -> bool {
        self.components.contains(&component)
    }

    /// The load type as declared
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for LoadType {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Magnitude of each load component
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadMagnitudes {
    /// Total axial force [N]
    pub axial: f64,
    /// Bending force [N]
    pub bending: f64,
    /// Torsion scale [N/m], multiplied by in-plane coordinates
    pub torsion: f64,
}

impl LoadMagnitudes {
    pub fn get(&self, component: LoadComponent) -> f64 {
        match component {
            LoadComponent::Axial => self.axial,
            LoadComponent::Bending => self.bending,
            LoadComponent::Torsion => self.torsion,
        }
    }
}

/// In-plane (x, y) target for the bending load
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BendingTarget {
    pub x: f64,
    pub y: f64,
}

/// Everything needed to build F for one run
#[derive(Debug, Clone, PartialEq)]
pub struct LoadCase {
    pub load_type: LoadType,
    pub magnitudes: LoadMagnitudes,
    pub bending_target: BendingTarget,
}

impl LoadCase {
    pub fn new(
        load_type: LoadType,
        magnitudes: LoadMagnitudes,
        bending_target: BendingTarget,
    ) -> Self {
        Self {
            load_type,
            magnitudes,
            bending_target,
        }
    }
}

/// Where the bending force ended up
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BendingApplication {
    /// Loaded node that received the force
    pub node: usize,
    /// Node x coordinate
    pub x: f64,
    /// Node y coordinate
    pub y: f64,
    /// Force added along y
    pub force: f64,
}

/// Assembled force vector plus what happened while building it
#[derive(Debug, Clone, PartialEq)]
pub struct LoadAssembly {
    /// Global force vector (length 3N)
    pub force: DVector<f64>,
    /// Bending application, if a bending load was placed
    pub bending: Option<BendingApplication>,
    /// Non-fatal issues (e.g. bending with no loaded nodes)
    pub warnings: Vec<String>,
}

/// Spread `total` evenly over `loaded_nodes` along z
///
/// No-op for an empty node set.
pub fn apply_axial(force: &mut DVector<f64>, loaded_nodes: &[usize], total: f64) {
    if loaded_nodes.is_empty() {
        return;
    }
    let share = total / loaded_nodes.len() as f64;
    for &node in loaded_nodes {
        force[dof_index(node, 2)] += share;
    }
}

/// Put `magnitude` along y on the loaded node closest in the xy plane to
/// `target`
///
/// Ties go to the first node in `loaded_nodes`. Returns `None` when there
/// is no loaded node.
pub fn apply_bending(
    force: &mut DVector<f64>,
    mesh: &TetMesh,
    loaded_nodes: &[usize],
    target: BendingTarget,
    magnitude: f64,
) -> Option<BendingApplication> {
    let nodes = mesh.nodes();
    let mut closest: Option<(usize, f64)> = None;
    for &node in loaded_nodes {
        let p = &nodes[node];
        let d2 = (p.x - target.x).powi(2) + (p.y - target.y).powi(2);
        if closest.is_none_or(|(_, best)| d2 < best) {
            closest = Some((node, d2));
        }
    }

    let (node, _) = closest?;
    force[dof_index(node, 1)] += magnitude;
    Some(BendingApplication {
        node,
        x: nodes[node].x,
        y: nodes[node].y,
        force: magnitude,
    })
}

/// Add the torsion couple at every loaded node: F_x += -y·T, F_y += x·T
pub fn apply_torsion(
    force: &mut DVector<f64>,
    mesh: &TetMesh,
    loaded_nodes: &[usize],
    torque: f64,
) {
    let nodes = mesh.nodes();
    for &node in loaded_nodes {
        let p = &nodes[node];
        force[dof_index(node, 0)] += -p.y * torque;
        force[dof_index(node, 1)] += p.x * torque;
    }
}

/// Build the global force vector for `case` on `loaded_nodes`
///
/// # Errors
/// [`SolverError::Config`] if a loaded node id is not in the mesh.
pub fn assemble_force_vector(
    mesh: &TetMesh,
    loaded_nodes: &[usize],
    case: &LoadCase,
) -> Result<LoadAssembly> {
    if let Some(&node) = loaded_nodes.iter().find(|&&n| n >= mesh.num_nodes()) {
        return Err(SolverError::Config(format!(
            "loaded node {} out of range (mesh has {} nodes)",
            node,
            mesh.num_nodes()
        )));
    }

    let mut force = DVector::zeros(mesh.num_dofs());
    let mut bending = None;
    let mut warnings = Vec::new();

    for &component in case.load_type.components() {
        let magnitude = case.magnitudes.get(component);
        if magnitude == 0.0 {
            continue;
        }

        match component {
            LoadComponent::Axial => apply_axial(&mut force, loaded_nodes, magnitude),
            LoadComponent::Bending => {
                let target = case.bending_target;
                match apply_bending(&mut force, mesh, loaded_nodes, target, magnitude) {
                    Some(applied) => {
                        info!(
                            "Applied bending load of {} N at node {} (x={:.3}, y={:.3})",
                            applied.force, applied.node, applied.x, applied.y
                        );
                        bending = Some(applied);
                    }
                    None => {
                        let message =
                            "No nodes found on the loaded face to apply bending load".to_string();
                        warn!("{}", message);
                        warnings.push(message);
                    }
                }
            }
            LoadComponent::Torsion => apply_torsion(&mut force, mesh, loaded_nodes, magnitude),
        }
    }

    Ok(LoadAssembly {
        force,
        bending,
        warnings,
    })
}
