//! Job input and result output.
//!
//! A job file bundles the analysis configuration with the mesh handed over
//! by the external mesher. Results are written as a JSON report (one record
//! per node plus run summary) and, optionally, as a fixed-width nodal table.

use crate::analysis::{AnalysisConfig, AnalysisResults};
use crate::error::Result;
use crate::loads::BendingApplication;
use crate::mesh::{MeshData, TetMesh};
use crate::postprocess::ResultStatistics;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Analysis job: configuration plus mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub config: AnalysisConfig,
    pub mesh: MeshData,
}

impl Job {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// Validated mesh
    pub fn mesh(&self) -> Result<TetMesh> {
        TetMesh::try_from(self.mesh.clone())
    }
}

/// Per-node output record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeResult {
    pub node: usize,
    pub coordinates: [f64; 3],
    pub displacement: [f64; 3],
    pub deformed: [f64; 3],
    pub von_mises: f64,
    /// Elements contributing to `von_mises`
    pub stress_samples: usize,
}

/// Serializable summary of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsReport {
    pub load_type: String,
    pub num_nodes: usize,
    pub num_elements: usize,
    pub num_dofs: usize,
    pub num_free_dofs: usize,
    pub num_loaded_nodes: usize,
    pub solver: String,
    pub iterations: usize,
    pub residual_norm: Option<f64>,
    pub bending: Option<BendingApplication>,
    pub warnings: Vec<String>,
    pub statistics: ResultStatistics,
    pub nodes: Vec<NodeResult>,
}

impl ResultsReport {
    pub fn new(mesh: &TetMesh, config: &AnalysisConfig, results: &AnalysisResults) -> Self {
        let nodes = mesh
            .nodes()
            .iter()
            .zip(&results.deformed_nodes)
            .enumerate()
            .map(|(i, (p, d))| {
                let u = results.nodal_displacement(i);
                NodeResult {
                    node: i,
                    coordinates: [p.x, p.y, p.z],
                    displacement: [u.x, u.y, u.z],
                    deformed: [d.x, d.y, d.z],
                    von_mises: results.von_mises[i],
                    stress_samples: results.von_mises_counts[i],
                }
            })
            .collect();

        Self {
            load_type: config.load_type.clone(),
            num_nodes: mesh.num_nodes(),
            num_elements: mesh.num_elements(),
            num_dofs: results.num_dofs,
            num_free_dofs: results.num_free_dofs,
            num_loaded_nodes: results.num_loaded_nodes,
            solver: results.solve_info.solver_name.clone(),
            iterations: results.solve_info.iterations,
            residual_norm: results.solve_info.residual_norm,
            bending: results.bending,
            warnings: results.warnings.clone(),
            statistics: results.statistics.clone(),
            nodes,
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Pretty-printed JSON to any writer
    pub fn write_json_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json_to(&mut writer)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Write nodal displacements and von Mises stress as a fixed-width table
pub fn write_nodal_table_to<W: Write>(mut out: W, results: &AnalysisResults) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        " displacements (vx,vy,vz) and von Mises stress for all nodes"
    )?;
    writeln!(out)?;

    for (node, mises) in results.von_mises.iter().enumerate() {
        let u = results.nodal_displacement(node);
        writeln!(
            out,
            "{:10} {:13.6E} {:13.6E} {:13.6E} {:13.6E}",
            node, u.x, u.y, u.z, mises
        )?;
    }

    writeln!(out)?;
    Ok(())
}

pub fn write_nodal_table(path: &Path, results: &AnalysisResults) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_nodal_table_to(&mut writer, results)?;
    writer.flush()?;
    Ok(())
}
