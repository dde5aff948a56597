// Post-processing: stress recovery from a displacement solution
// Element stresses are recomputed with the same B routine used for assembly
// and averaged onto the nodes as von Mises equivalent stress

use crate::assembly::AssemblyMode;
use crate::elements::{ElementKernel, Tet4};
use crate::error::{Result, SolverError};
use crate::mesh::{DOFS_PER_NODE, TetMesh};
use nalgebra::{DVector, Vector6};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Stress tensor components of an element
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StressState {
    pub sxx: f64,
    pub syy: f64,
    pub szz: f64,
    pub sxy: f64,
    pub syz: f64,
    pub sxz: f64,
}

impl StressState {
    /// From a Voigt vector [σxx, σyy, σzz, τxy, τyz, τzx]
    pub fn from_voigt(v: &Vector6<f64>) -> Self {
        Self {
            sxx: v[0],
            syy: v[1],
            szz: v[2],
            sxy: v[3],
            syz: v[4],
            sxz: v[5],
        }
    }
}

/// Strain tensor components of an element (engineering shear)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrainState {
    pub exx: f64,
    pub eyy: f64,
    pub ezz: f64,
    pub exy: f64,
    pub eyz: f64,
    pub exz: f64,
}

impl StrainState {
    /// From a Voigt vector [εxx, εyy, εzz, γxy, γyz, γzx]
    pub fn from_voigt(v: &Vector6<f64>) -> Self {
        Self {
            exx: v[0],
            eyy: v[1],
            ezz: v[2],
            exy: v[3],
            eyz: v[4],
            exz: v[5],
        }
    }
}

/// Recovered results for one non-degenerate element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementResult {
    pub element: usize,
    pub volume: f64,
    pub stress: StressState,
    pub strain: StrainState,
    /// von Mises equivalent stress
    pub mises: f64,
    /// Total effective strain
    pub eeq: f64,
}

/// Nodal average of element von Mises stress
#[derive(Debug, Clone, PartialEq)]
pub struct NodalStressField {
    /// Averaged von Mises stress per node
    pub values: Vec<f64>,
    /// Number of non-degenerate elements that contributed to each node
    pub counts: Vec<usize>,
}

/// Statistical summary of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultStatistics {
    pub mises_min: f64,
    pub mises_max: f64,
    pub mises_mean: f64,
    pub eeq_min: f64,
    pub eeq_max: f64,
    pub eeq_mean: f64,
    /// Largest nodal displacement magnitude
    pub max_displacement: f64,
    /// Node where it occurs
    pub max_displacement_node: Option<usize>,
}

/// Compute von Mises equivalent stress from stress tensor components
///
/// Formula: σ_v = sqrt(0.5 * ((σ_xx - σ_yy)² + (σ_yy - σ_zz)² + (σ_zz - σ_xx)²)
///                    + 3 * (τ_xy² + τ_yz² + τ_xz²))
///
/// # Example
/// ```
/// use tetfea_solver::postprocess::{StressState, compute_mises_stress};
///
/// let stress = StressState {
///     sxx: 100.0, syy: 50.0, szz: 30.0,
///     sxy: 10.0, syz: 3.0, sxz: 5.0,
/// };
/// let mises = compute_mises_stress(&stress);
/// assert!(mises > 0.0);
/// ```
pub fn compute_mises_stress(stress: &StressState) -> f64 {
    let s = stress;
    let term1 = 0.5
        * ((s.sxx - s.syy).powi(2) + (s.syy - s.szz).powi(2) + (s.szz - s.sxx).powi(2));
    let term2 = 3.0 * (s.sxy.powi(2) + s.syz.powi(2) + s.sxz.powi(2));
    (term1 + term2).sqrt()
}

/// Compute total effective strain from strain components
///
/// Shear components are engineering strains (γ = 2ε), so the shear term
/// carries 3/4 instead of 3:
///
/// Formula: ε_eff = (2/3) * sqrt(0.5 * ((ε_xx - ε_yy)² + (ε_yy - ε_zz)² + (ε_zz - ε_xx)²)
///                              + 0.75 * (γ_xy² + γ_yz² + γ_xz²))
pub fn compute_effective_strain(strain: &StrainState) -> f64 {
    let e = strain;
    let term1 = 0.5
        * ((e.exx - e.eyy).powi(2) + (e.eyy - e.ezz).powi(2) + (e.ezz - e.exx).powi(2));
    let term2 = 0.75 * (e.exy.powi(2) + e.eyz.powi(2) + e.exz.powi(2));
    (2.0 / 3.0) * (term1 + term2).sqrt()
}

fn element_result(
    mesh: &TetMesh,
    kernel: &ElementKernel,
    index: usize,
    element: &Tet4,
    displacements: &DVector<f64>,
) -> Option<ElementResult> {
    let coords = mesh.element_coords(element);
    let geometry = kernel.geometry(&coords)?;
    let u_e = element.gather_displacements(displacements);
    let strain = kernel.strain(&coords, &u_e)?;
    let stress = kernel.constitutive() * strain;

    let stress = StressState::from_voigt(&stress);
    let strain = StrainState::from_voigt(&strain);
    Some(ElementResult {
        element: index,
        volume: geometry.volume,
        mises: compute_mises_stress(&stress),
        eeq: compute_effective_strain(&strain),
        stress,
        strain,
    })
}

/// Recover stress and strain for every element
///
/// Degenerate elements yield `None` at their position.
///
/// # Errors
/// Fails if `displacements` does not have 3N entries.
pub fn recover_element_results(
    mesh: &TetMesh,
    kernel: &ElementKernel,
    displacements: &DVector<f64>,
    mode: AssemblyMode,
) -> Result<Vec<Option<ElementResult>>> {
    if displacements.len() != mesh.num_dofs() {
        return Err(SolverError::DimensionMismatch(format!(
            "displacement vector has {} entries, mesh has {} DOFs",
            displacements.len(),
            mesh.num_dofs()
        )));
    }

    let compute = |(i, e): (usize, &Tet4)| element_result(mesh, kernel, i, e, displacements);
    Ok(match mode {
        AssemblyMode::Sequential => mesh.elements().iter().enumerate().map(compute).collect(),
        AssemblyMode::Parallel => mesh.elements().par_iter().enumerate().map(compute).collect(),
    })
}

/// Average element von Mises stress onto the nodes
///
/// Each non-degenerate element adds its value to its four nodes. Nodes no
/// element contributed to stay at zero.
pub fn average_to_nodes(
    mesh: &TetMesh,
    element_results: &[Option<ElementResult>],
) -> NodalStressField {
    let mut values = vec![0.0; mesh.num_nodes()];
    let mut counts = vec![0usize; mesh.num_nodes()];

    for (element, result) in mesh.elements().iter().zip(element_results) {
        let Some(result) = result else { continue };
        for &node in &element.nodes {
            values[node] += result.mises;
            counts[node] += 1;
        }
    }

    for (value, &count) in values.iter_mut().zip(&counts) {
        if count > 0 {
            *value /= count as f64;
        }
    }

    NodalStressField { values, counts }
}

/// Nodal von Mises stress for a displacement solution
pub fn recover_nodal_von_mises(
    mesh: &TetMesh,
    kernel: &ElementKernel,
    displacements: &DVector<f64>,
    mode: AssemblyMode,
) -> Result<NodalStressField> {
    let element_results = recover_element_results(mesh, kernel, displacements, mode)?;
    Ok(average_to_nodes(mesh, &element_results))
}

/// Compute result statistics
///
/// Stress and strain ranges cover the nodal field and the non-degenerate
/// elements respectively; all values are 0.0 for empty inputs.
pub fn compute_statistics(
    nodal_mises: &[f64],
    element_results: &[Option<ElementResult>],
    displacements: &DVector<f64>,
) -> ResultStatistics {
    let (mises_min, mises_max, mises_mean) = min_max_mean(nodal_mises.iter().copied());
    let (eeq_min, eeq_max, eeq_mean) =
        min_max_mean(element_results.iter().flatten().map(|r| r.eeq));

    let mut max_displacement = 0.0;
    let mut max_displacement_node = None;
    for (node, u) in displacements.as_slice().chunks_exact(DOFS_PER_NODE).enumerate() {
        let magnitude = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
        if max_displacement_node.is_none() || magnitude > max_displacement {
            max_displacement = magnitude;
            max_displacement_node = Some(node);
        }
    }

    ResultStatistics {
        mises_min,
        mises_max,
        mises_mean,
        eeq_min,
        eeq_max,
        eeq_mean,
        max_displacement,
        max_displacement_node,
    }
}

fn min_max_mean(values: impl Iterator<Item = f64>) -> (f64, f64, f64) {
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for v in values {
        count += 1;
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }
    if count == 0 {
        return (0.0, 0.0, 0.0);
    }
    (min, max, sum / count as f64)
}

/// Write element results to a text file
///
/// One row per non-degenerate element followed by minimum, maximum and
/// mean lines.
pub fn write_results<P: AsRef<Path>>(
    filepath: P,
    element_results: &[Option<ElementResult>],
    stats: &ResultStatistics,
) -> Result<()> {
    let mut file = BufWriter::new(File::create(filepath.as_ref())?);

    writeln!(file, "     Elem.          Volume            MISES              EEQ")?;
    for r in element_results.iter().flatten() {
        writeln!(
            file,
            "{:10}   {:16.4e} {:16.4e} {:16.4e}",
            r.element, r.volume, r.mises, r.eeq
        )?;
    }

    writeln!(file)?;
    writeln!(
        file,
        "     Minimum                    {:16.4e} {:16.4e}",
        stats.mises_min, stats.eeq_min
    )?;
    writeln!(
        file,
        "     Maximum                    {:16.4e} {:16.4e}",
        stats.mises_max, stats.eeq_max
    )?;
    writeln!(
        file,
        "     Mean (arith.)              {:16.4e} {:16.4e}",
        stats.mises_mean, stats.eeq_mean
    )?;
    writeln!(file)?;
    file.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::constitutive_matrix;
    use nalgebra::Point3;

    fn zero_stress() -> StressState {
        StressState {
            sxx: 0.0, syy: 0.0, szz: 0.0,
            sxy: 0.0, syz: 0.0, sxz: 0.0,
        }
    }

    fn kernel() -> ElementKernel {
        ElementKernel::new(constitutive_matrix(2.0e11, 0.3).unwrap())
    }

    /// Two tets sharing face (1, 2, 3) plus one collinear sliver
    fn mesh_with_sliver() -> TetMesh {
        TetMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(3.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2, 3], [1, 4, 2, 3], [0, 1, 5, 6]],
        )
        .unwrap()
    }

    /// u = (1e-3 x, 0, 0) at every node
    fn stretch(mesh: &TetMesh) -> DVector<f64> {
        let mut u = DVector::zeros(mesh.num_dofs());
        for (i, p) in mesh.nodes().iter().enumerate() {
            u[3 * i] = 1e-3 * p.x;
        }
        u
    }

    #[test]
    fn test_compute_mises_stress_zero() {
        assert_eq!(compute_mises_stress(&zero_stress()), 0.0);
    }

    #[test]
    fn test_compute_mises_stress_uniaxial() {
        // Uniaxial tension: σ_xx = 100 MPa, others = 0
        // Mises = |σ_xx| = 100 MPa
        let stress = StressState {
            sxx: 100.0,
            ..zero_stress()
        };
        let mises = compute_mises_stress(&stress);
        assert!((mises - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_compute_mises_stress_pure_shear() {
        // Pure shear: τ_yz = 100 MPa, normals = 0
        // Mises = sqrt(3) * τ_yz ≈ 173.2 MPa
        let stress = StressState {
            syz: 100.0,
            ..zero_stress()
        };
        let mises = compute_mises_stress(&stress);
        let expected = (3.0_f64).sqrt() * 100.0;
        assert!((mises - expected).abs() < 1e-10);
    }

    #[test]
    fn test_compute_mises_stress_general() {
        let stress = StressState {
            sxx: 100.0, syy: 50.0, szz: 30.0,
            sxy: 10.0, syz: 3.0, sxz: 5.0,
        };
        // term1 = 0.5 * (2500 + 400 + 4900) = 3900
        // term2 = 3 * (100 + 9 + 25) = 402
        let expected = (3900.0 + 402.0_f64).sqrt();
        assert!((compute_mises_stress(&stress) - expected).abs() < 1e-10);
    }

    #[test]
    fn test_hydrostatic_stress_has_no_mises() {
        let stress = StressState {
            sxx: -5.0e6,
            syy: -5.0e6,
            szz: -5.0e6,
            ..zero_stress()
        };
        assert_eq!(compute_mises_stress(&stress), 0.0);
    }

    #[test]
    fn test_from_voigt_order() {
        let v = Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let s = StressState::from_voigt(&v);
        assert_eq!((s.sxy, s.syz, s.sxz), (4.0, 5.0, 6.0));
    }

    #[test]
    fn test_compute_effective_strain_uniaxial() {
        let strain = StrainState::from_voigt(&Vector6::new(0.001, 0.0, 0.0, 0.0, 0.0, 0.0));
        let expected = (2.0 / 3.0) * (1e-6_f64).sqrt();
        assert!((compute_effective_strain(&strain) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_compute_effective_strain_pure_shear() {
        // γxy = 2e-3 is a tensor shear of 1e-3: ε_eq = sqrt(2/3 · 2 · ε_xy²) = γ / √3
        let gamma = 2.0e-3;
        let strain = StrainState::from_voigt(&Vector6::new(0.0, 0.0, 0.0, gamma, 0.0, 0.0));
        let expected = gamma / 3.0_f64.sqrt();
        let eeq = compute_effective_strain(&strain);
        assert!((eeq - expected).abs() < 1e-15, "eeq {} expected {}", eeq, expected);
    }

    #[test]
    fn test_shear_mises_is_three_g_times_effective_strain() {
        // Isochoric strain: σ_vm = 3 G ε_eq
        let material = crate::materials::Material::steel();
        let d = material.constitutive_matrix().unwrap();
        let voigt = Vector6::new(0.0, 0.0, 0.0, 1.0e-4, -3.0e-4, 2.0e-4);

        let mises = compute_mises_stress(&StressState::from_voigt(&(d * voigt)));
        let eeq = compute_effective_strain(&StrainState::from_voigt(&voigt));
        let expected = 3.0 * material.shear_modulus() * eeq;
        assert!((mises - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_rigid_translation_gives_zero_stress() {
        let mesh = mesh_with_sliver();
        let mut u = DVector::zeros(mesh.num_dofs());
        for i in 0..mesh.num_nodes() {
            u[3 * i] = 0.3;
            u[3 * i + 2] = -0.1;
        }
        let field =
            recover_nodal_von_mises(&mesh, &kernel(), &u, AssemblyMode::Sequential).unwrap();
        for v in field.values {
            assert!(v.abs() < 1e-3, "rigid translation produced stress {}", v);
        }
    }

    #[test]
    fn test_uniform_strain_gives_uniform_nodal_stress() {
        let mesh = mesh_with_sliver();
        let k = kernel();
        let field =
            recover_nodal_von_mises(&mesh, &k, &stretch(&mesh), AssemblyMode::Sequential).unwrap();

        let stress = k.constitutive() * Vector6::new(1e-3, 0.0, 0.0, 0.0, 0.0, 0.0);
        let expected = compute_mises_stress(&StressState::from_voigt(&stress));
        for node in 0..5 {
            assert!(
                (field.values[node] - expected).abs() <= 1e-9 * expected,
                "node {}: {} vs {}",
                node,
                field.values[node],
                expected
            );
        }
    }

    #[test]
    fn test_degenerate_element_excluded_from_average() {
        let mesh = mesh_with_sliver();
        let u = stretch(&mesh);
        let field =
            recover_nodal_von_mises(&mesh, &kernel(), &u, AssemblyMode::Sequential).unwrap();

        assert_eq!(field.counts, vec![1, 2, 2, 2, 1, 0, 0]);
        // Nodes only touched by the sliver keep zero, not NaN
        assert_eq!(field.values[5], 0.0);
        assert_eq!(field.values[6], 0.0);
    }

    #[test]
    fn test_element_results_mark_degenerate() {
        let mesh = mesh_with_sliver();
        let u = stretch(&mesh);
        let results =
            recover_element_results(&mesh, &kernel(), &u, AssemblyMode::Sequential).unwrap();
        assert!(results[0].is_some());
        assert!(results[1].is_some());
        assert!(results[2].is_none());
        assert!((results[0].as_ref().unwrap().strain.exx - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn test_parallel_recovery_is_bit_identical() {
        let mesh = mesh_with_sliver();
        let k = kernel();
        let mut u = stretch(&mesh);
        u[4] = 2e-4;
        u[14] = -3e-4;
        let seq = recover_nodal_von_mises(&mesh, &k, &u, AssemblyMode::Sequential).unwrap();
        let par = recover_nodal_von_mises(&mesh, &k, &u, AssemblyMode::Parallel).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_rejects_wrong_displacement_length() {
        let mesh = mesh_with_sliver();
        let u = DVector::zeros(mesh.num_dofs() - 1);
        assert!(recover_nodal_von_mises(&mesh, &kernel(), &u, AssemblyMode::Sequential).is_err());
    }

    #[test]
    fn test_compute_statistics() {
        let mut u = DVector::zeros(9);
        u[3] = 3.0;
        u[4] = 4.0;
        u[8] = 1.0;
        let stats = compute_statistics(&[100.0, 200.0, 150.0], &[], &u);
        assert_eq!(stats.mises_min, 100.0);
        assert_eq!(stats.mises_max, 200.0);
        assert_eq!(stats.mises_mean, 150.0);
        assert_eq!(stats.eeq_max, 0.0);
        assert_eq!(stats.max_displacement, 5.0);
        assert_eq!(stats.max_displacement_node, Some(1));
    }

    #[test]
    fn test_compute_statistics_empty() {
        let stats = compute_statistics(&[], &[], &DVector::zeros(0));
        assert_eq!(stats.mises_min, 0.0);
        assert_eq!(stats.mises_max, 0.0);
        assert_eq!(stats.mises_mean, 0.0);
        assert_eq!(stats.max_displacement_node, None);
    }

    #[test]
    fn test_write_results() {
        let mesh = mesh_with_sliver();
        let u = stretch(&mesh);
        let results =
            recover_element_results(&mesh, &kernel(), &u, AssemblyMode::Sequential).unwrap();
        let field = average_to_nodes(&mesh, &results);
        let stats = compute_statistics(&field.values, &results, &u);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("elements.txt");
        write_results(&path, &results, &stats).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("     Elem."));
        assert!(text.contains("Mean (arith.)"));
        // Header, two element rows, blank, three summary lines, blank
        assert_eq!(text.lines().count(), 8);
    }
}
