//! Static linear-elastic finite element analysis on 4-node tetrahedra.
//!
//! The crate takes a tetrahedral mesh from an external mesher, builds the
//! global stiffness system, eliminates the clamped DOFs, solves through a
//! pluggable [`LinearSolver`] backend and recovers nodal von Mises stress.
//!
//! ```no_run
//! use tetfea_solver::{AnalysisConfig, AnalysisPipeline, TetMesh};
//! # fn mesh() -> TetMesh { unimplemented!() }
//!
//! let mesh: TetMesh = mesh();
//! let results = AnalysisPipeline::new(AnalysisConfig::default()).run(&mesh)?;
//! println!("max von Mises: {:.3e}", results.statistics.mises_max);
//! # Ok::<(), tetfea_solver::SolverError>(())
//! ```

pub mod analysis;
pub mod assembly;
pub mod backend;
pub mod boundary_conditions;
pub mod elements;
pub mod error;
pub mod loads;
pub mod materials;
pub mod mesh;
pub mod postprocess;
pub mod report;
pub mod sets;
pub mod sparse_assembly;

pub use analysis::{
    AnalysisConfig, AnalysisContext, AnalysisPipeline, AnalysisResults, SolverKind, StorageMode,
};
pub use assembly::{AssemblyMode, GlobalSystem};
pub use backend::{
    BackendError, ConjugateGradientBackend, LinearSolver, LinearSystemData, NativeBackend,
    SolveInfo, SparseTripletsF64, default_backend,
};
pub use boundary_conditions::{FixedDofs, ReducedSystem};
pub use elements::{DEGENERATE_VOLUME, Element, ElementKernel, Tet4};
pub use error::{Result, SolverError};
pub use loads::{
    BendingApplication, BendingTarget, LoadAssembly, LoadCase, LoadComponent, LoadMagnitudes,
    LoadType, assemble_force_vector,
};
pub use materials::{ConstitutiveMatrix, Material, constitutive_matrix};
pub use mesh::{DOFS_PER_NODE, MeshData, MeshStatistics, TetMesh, dof_index};
pub use postprocess::{
    ElementResult, NodalStressField, ResultStatistics, StrainState, StressState,
    compute_effective_strain, compute_mises_stress, recover_nodal_von_mises,
};
pub use report::{Job, ResultsReport};
pub use sets::{Axis, Extremum, NodeSet, SelectionTolerance, Sets, nodes_at_extremum};
pub use sparse_assembly::SparseGlobalSystem;
