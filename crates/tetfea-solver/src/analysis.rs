//! Analysis pipeline definitions and execution framework.
//!
//! One run of the linear static pipeline:
//!
//! 1. Build the constitutive matrix and element kernel from the material
//! 2. Select the clamped and loaded faces and parse the load case
//! 3. Assemble K (dense or sparse) and F
//! 4. Eliminate constrained DOFs and solve the reduced system
//! 5. Scatter the solution back and recover nodal von Mises stress
//!
//! All buffers live in the run; nothing is shared between runs.

use crate::assembly::{AssemblyMode, GlobalSystem};
use crate::backend::{ConjugateGradientBackend, LinearSolver, NativeBackend, SolveInfo};
use crate::boundary_conditions::{FixedDofs, ReducedSystem};
use crate::elements::{DEGENERATE_VOLUME, ElementKernel};
use crate::error::{Result, SolverError};
use crate::loads::{
    BendingApplication, BendingTarget, LoadCase, LoadMagnitudes, LoadType, assemble_force_vector,
};
use crate::materials::Material;
use crate::mesh::{DOFS_PER_NODE, TetMesh};
use crate::postprocess::{
    ElementResult, ResultStatistics, average_to_nodes, compute_statistics, recover_element_results,
};
use crate::sets::{Axis, FIXED_SET, LOADED_SET, SelectionTolerance, Sets};
use crate::sparse_assembly::SparseGlobalSystem;
use log::{debug, info};
use nalgebra::{DVector, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Default absolute tolerance for selecting face nodes by coordinate
pub const DEFAULT_SELECTION_TOLERANCE: f64 = SelectionTolerance::DEFAULT_ABSOLUTE;
/// Default relative tolerance, scaled by the extreme coordinate
pub const DEFAULT_SELECTION_RELATIVE_TOLERANCE: f64 = SelectionTolerance::DEFAULT_RELATIVE;

/// Global matrix storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Dense 3N × 3N matrix
    #[default]
    Dense,
    /// COO assembly, CSR storage
    Sparse,
}

/// Linear solver backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Dense Cholesky
    #[default]
    Native,
    /// Jacobi-preconditioned conjugate gradient
    ConjugateGradient,
}

impl SolverKind {
    pub fn backend(self) -> Box<dyn LinearSolver> {
        match self {
            SolverKind::Native => Box::new(NativeBackend),
            SolverKind::ConjugateGradient => Box::new(ConjugateGradientBackend::default()),
        }
    }
}

/// Analysis configuration and control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Isotropic material
    pub material: Material,
    /// `+`-separated load components, e.g. `axial+torsion`
    pub load_type: String,
    /// Magnitude per load component
    pub loads: LoadMagnitudes,
    /// In-plane target for the bending load
    pub bending_target: BendingTarget,
    /// Absolute part of the face node selection tolerance on z
    pub selection_tolerance: f64,
    /// Relative part of the selection tolerance, times |z| of the face
    pub selection_relative_tolerance: f64,
    /// Element volume below which an element is neutralised
    pub degenerate_volume: f64,
    /// Sequential or parallel element computations
    pub assembly: AssemblyMode,
    /// Dense or sparse global matrix
    pub storage: StorageMode,
    /// Linear solver backend
    pub solver: SolverKind,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            material: Material::steel(),
            load_type: "axial".to_string(),
            loads: LoadMagnitudes::default(),
            bending_target: BendingTarget::default(),
            selection_tolerance: DEFAULT_SELECTION_TOLERANCE,
            selection_relative_tolerance: DEFAULT_SELECTION_RELATIVE_TOLERANCE,
            degenerate_volume: DEGENERATE_VOLUME,
            assembly: AssemblyMode::Sequential,
            storage: StorageMode::Dense,
            solver: SolverKind::Native,
        }
    }
}

impl AnalysisConfig {
    /// Check every input before any work is done
    pub fn validate(&self) -> Result<()> {
        self.material.validate()?;
        LoadType::parse(&self.load_type)?;

        if !(self.selection_tolerance > 0.0 && self.selection_tolerance.is_finite()) {
            return Err(SolverError::Config(format!(
                "selection_tolerance must be positive and finite (got {})",
                self.selection_tolerance
            )));
        }
        if !(self.selection_relative_tolerance >= 0.0
            && self.selection_relative_tolerance.is_finite())
        {
            return Err(SolverError::Config(format!(
                "selection_relative_tolerance must be non-negative and finite (got {})",
                self.selection_relative_tolerance
            )));
        }
        if !(self.degenerate_volume >= 0.0 && self.degenerate_volume.is_finite()) {
            return Err(SolverError::Config(format!(
                "degenerate_volume must be non-negative and finite (got {})",
                self.degenerate_volume
            )));
        }
        let magnitudes = [self.loads.axial, self.loads.bending, self.loads.torsion];
        let targets = [self.bending_target.x, self.bending_target.y];
        if magnitudes.iter().chain(&targets).any(|v| !v.is_finite()) {
            return Err(SolverError::Config(
                "load magnitudes and bending target must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything one run needs, built up front
#[derive(Debug, Clone)]
pub struct AnalysisContext<'a> {
    /// Mesh from the external mesher
    pub mesh: &'a TetMesh,
    /// Element computations sharing one constitutive matrix
    pub kernel: ElementKernel,
    /// Parsed load declaration
    pub load_case: LoadCase,
    /// Nodes receiving loads
    pub loaded_nodes: Vec<usize>,
    /// Constrained DOFs
    pub fixed_dofs: FixedDofs,
}

impl<'a> AnalysisContext<'a> {
    /// Context with explicit loaded nodes and constraints
    pub fn new(
        mesh: &'a TetMesh,
        kernel: ElementKernel,
        load_case: LoadCase,
        loaded_nodes: Vec<usize>,
        fixed_dofs: FixedDofs,
    ) -> Self {
        Self {
            mesh,
            kernel,
            load_case,
            loaded_nodes,
            fixed_dofs,
        }
    }

    /// Shaft load case: clamp the minimum-z face, load the maximum-z face
    pub fn from_config(mesh: &'a TetMesh, config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;

        let constitutive = config.material.constitutive_matrix()?;
        let kernel = ElementKernel::with_degenerate_volume(constitutive, config.degenerate_volume);
        let load_case = LoadCase::new(
            LoadType::parse(&config.load_type)?,
            config.loads,
            config.bending_target,
        );

        let tolerance = SelectionTolerance::new(
            config.selection_tolerance,
            config.selection_relative_tolerance,
        );
        let sets = Sets::end_faces(mesh, Axis::Z, tolerance);
        let loaded_nodes = sets.get_nodes(LOADED_SET).unwrap_or_default().to_vec();
        let mut fixed_dofs = FixedDofs::new();
        fixed_dofs.fix_nodes(sets.get_nodes(FIXED_SET).unwrap_or_default().iter().copied());

        debug!(
            "Selected {} loaded nodes and {} clamped DOFs",
            loaded_nodes.len(),
            fixed_dofs.len()
        );

        Ok(Self::new(mesh, kernel, load_case, loaded_nodes, fixed_dofs))
    }
}

/// Analysis results and statistics
#[derive(Debug, Clone)]
pub struct AnalysisResults {
    /// Full displacement vector (length 3N, zero at constrained DOFs)
    pub displacements: DVector<f64>,
    /// Nodal von Mises stress (length N)
    pub von_mises: Vec<f64>,
    /// Elements averaged into each nodal value (length N, 0 for orphan nodes)
    pub von_mises_counts: Vec<usize>,
    /// Node coordinates plus displacement
    pub deformed_nodes: Vec<Point3<f64>>,
    /// Per-element recovery, `None` for degenerate elements
    pub element_results: Vec<Option<ElementResult>>,
    /// Number of degrees of freedom before reduction
    pub num_dofs: usize,
    /// Number of equations solved
    pub num_free_dofs: usize,
    /// Number of loaded nodes
    pub num_loaded_nodes: usize,
    /// Where the bending load went, if any
    pub bending: Option<BendingApplication>,
    /// Non-fatal issues raised during the run
    pub warnings: Vec<String>,
    /// Solver diagnostics
    pub solve_info: SolveInfo,
    /// Summary statistics
    pub statistics: ResultStatistics,
}

impl AnalysisResults {
    /// Displacement vector of one node
    pub fn nodal_displacement(&self, node: usize) -> Vector3<f64> {
        Vector3::from_iterator(
            self.displacements
                .rows(node * DOFS_PER_NODE, DOFS_PER_NODE)
                .iter()
                .copied(),
        )
    }

    /// Number of constrained DOFs
    pub fn num_fixed_dofs(&self) -> usize {
        self.num_dofs - self.num_free_dofs
    }
}

/// Main analysis pipeline orchestrator
pub struct AnalysisPipeline {
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    /// Create a new analysis pipeline with the given configuration
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run with the configured solver backend
    pub fn run(&self, mesh: &TetMesh) -> Result<AnalysisResults> {
        let backend = self.config.solver.backend();
        self.run_with_backend(mesh, backend.as_ref())
    }

    /// Run the shaft load case with an explicit solver backend
    pub fn run_with_backend(
        &self,
        mesh: &TetMesh,
        backend: &dyn LinearSolver,
    ) -> Result<AnalysisResults> {
        let context = AnalysisContext::from_config(mesh, &self.config)?;
        self.run_context(&context, backend)
    }

    /// Run a prepared context
    pub fn run_context(
        &self,
        context: &AnalysisContext<'_>,
        backend: &dyn LinearSolver,
    ) -> Result<AnalysisResults> {
        let mesh = context.mesh;
        let mode = self.config.assembly;

        info!(
            "Mesh: {} nodes, {} tetra elements",
            mesh.num_nodes(),
            mesh.num_elements()
        );

        let loads = assemble_force_vector(mesh, &context.loaded_nodes, &context.load_case)?;

        info!("Assembling global stiffness matrix ({:?}, {:?})", self.config.storage, mode);
        let reduced = self.assemble_and_reduce(context, loads.force)?;

        info!("System size before BC: {} DOFs", reduced.num_dofs);
        info!("System size after BC: {} DOFs", reduced.num_free());

        info!("Solving system with {}", backend.name());
        let (displacements, solve_info) = reduced.solve(backend)?;
        debug!(
            "Solver {} finished in {} iteration(s), residual {:?}",
            solve_info.solver_name, solve_info.iterations, solve_info.residual_norm
        );

        info!("Computing von Mises stress");
        let element_results = recover_element_results(mesh, &context.kernel, &displacements, mode)?;
        let field = average_to_nodes(mesh, &element_results);
        let statistics = compute_statistics(&field.values, &element_results, &displacements);
        let deformed_nodes = mesh.deformed_nodes(&displacements)?;

        info!(
            "Max displacement {:.6e} m, von Mises range [{:.6e}, {:.6e}] Pa",
            statistics.max_displacement, statistics.mises_min, statistics.mises_max
        );

        Ok(AnalysisResults {
            num_dofs: reduced.num_dofs,
            num_free_dofs: reduced.num_free(),
            num_loaded_nodes: context.loaded_nodes.len(),
            displacements,
            von_mises: field.values,
            von_mises_counts: field.counts,
            deformed_nodes,
            element_results,
            bending: loads.bending,
            warnings: loads.warnings,
            solve_info,
            statistics,
        })
    }

    fn assemble_and_reduce(
        &self,
        context: &AnalysisContext<'_>,
        force: DVector<f64>,
    ) -> Result<ReducedSystem> {
        let mode = self.config.assembly;
        match self.config.storage {
            StorageMode::Dense => {
                let mut system = GlobalSystem::assemble(context.mesh, &context.kernel, mode);
                system.set_force(force)?;
                system.validate()?;
                system.reduce(&context.fixed_dofs)
            }
            StorageMode::Sparse => {
                let mut system = SparseGlobalSystem::assemble(context.mesh, &context.kernel, mode);
                system.set_force(force)?;
                system.validate()?;
                system.reduce(&context.fixed_dofs)
            }
        }
    }
}
