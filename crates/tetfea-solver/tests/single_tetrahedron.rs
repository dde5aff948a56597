//! End-to-end solve on a single tetrahedron with hand-picked constraints.
//!
//! Node 0 is pinned, node 1 slides along x, node 2 slides along y and node 3
//! is free. That removes exactly the six rigid body modes.

mod common;

use nalgebra::{DVector, Point3};
use tetfea_solver::postprocess::{average_to_nodes, recover_element_results};
use tetfea_solver::{
    AssemblyMode, ElementKernel, FixedDofs, GlobalSystem, NativeBackend, ReducedSystem,
    TetMesh, constitutive_matrix,
};

const FIXED: [usize; 7] = [0, 1, 2, 4, 5, 6, 8];
const LOADED_DOF: usize = 11;

fn kernel(e: f64, nu: f64) -> ElementKernel {
    ElementKernel::new(constitutive_matrix(e, nu).unwrap())
}

fn reduced_system(mesh: &TetMesh, kernel: &ElementKernel) -> ReducedSystem {
    let mut system = GlobalSystem::assemble(mesh, kernel, AssemblyMode::Sequential);
    let mut f = DVector::zeros(mesh.num_dofs());
    f[LOADED_DOF] = 1.0;
    system.set_force(f).unwrap();
    system.validate().unwrap();
    system.reduce(&FIXED.into_iter().collect::<FixedDofs>()).unwrap()
}

#[test]
fn constraints_leave_five_free_dofs() {
    let mesh = common::unit_tet();
    let reduced = reduced_system(&mesh, &kernel(1.0, 0.3));

    assert_eq!(reduced.num_dofs, 12);
    assert_eq!(reduced.free_dofs, vec![3, 7, 9, 10, 11]);
    assert_eq!(reduced.system.force.len(), 5);
    assert_eq!(reduced.system.force[4], 1.0);
}

#[test]
fn reduced_stiffness_is_positive_definite() {
    let mesh = common::unit_tet();
    let reduced = reduced_system(&mesh, &kernel(1.0, 0.3));

    let k = reduced.system.stiffness.to_dense();
    assert_eq!(k, k.transpose());
    assert!(
        k.clone().cholesky().is_some(),
        "reduced K should admit a Cholesky factorisation"
    );
}

#[test]
fn tip_moves_along_applied_force() {
    let mesh = common::unit_tet();
    let kernel = kernel(1.0, 0.3);
    let reduced = reduced_system(&mesh, &kernel);

    let (u, info) = reduced.solve(&NativeBackend).unwrap();

    assert_eq!(u.len(), 12);
    assert!(u[LOADED_DOF].is_finite());
    assert!(u[LOADED_DOF] > 0.0, "u_z at node 3 = {}", u[LOADED_DOF]);
    for dof in FIXED {
        assert_eq!(u[dof], 0.0, "constrained DOF {} moved", dof);
    }

    let residual = info.residual_norm.unwrap();
    assert!(residual < 1e-10, "residual {}", residual);
}

#[test]
fn steel_tet_under_unit_load() {
    // E = 200 GPa, ν = 0.3, 1 N along z at node 3
    let mesh = common::unit_tet();
    let kernel = kernel(2.0e11, 0.3);
    let reduced = reduced_system(&mesh, &kernel);

    let k = reduced.system.stiffness.to_dense();
    assert!(k.clone().cholesky().is_some());

    let (u, info) = reduced.solve(&NativeBackend).unwrap();
    assert!(u[LOADED_DOF].is_finite());
    assert!(u[LOADED_DOF] > 0.0);
    // Compliance of order 1 / (E h) for a unit edge
    assert!(u[LOADED_DOF] < 1.0e-9, "u_z {}", u[LOADED_DOF]);

    let f = reduced.system.force.clone();
    let residual = &k * reduced.extract(&u).unwrap() - &f;
    assert!(residual.amax() < 1e-9, "residual {}", residual.amax());
    assert!(info.residual_norm.unwrap() < 1e-9);
}

#[test]
fn solution_satisfies_free_rows_of_full_system() {
    let mesh = common::unit_tet();
    let kernel = kernel(210e9, 0.3);
    let system = GlobalSystem::assemble(&mesh, &kernel, AssemblyMode::Sequential);

    let mut f = DVector::zeros(12);
    f[LOADED_DOF] = 1.0e3;
    let mut loaded = system.clone();
    loaded.set_force(f.clone()).unwrap();

    let fixed: FixedDofs = FIXED.into_iter().collect();
    let u = loaded.solve_with_backend(&fixed, &NativeBackend).unwrap();

    let r = &system.stiffness * &u - &f;
    for dof in fixed.free_dofs(12) {
        assert!(
            r[dof].abs() < 1e-9 * f.amax(),
            "free DOF {} unbalanced by {}",
            dof,
            r[dof]
        );
    }
}

#[test]
fn stress_is_uniform_over_a_constant_strain_tet() {
    let mesh = common::unit_tet();
    let kernel = kernel(1.0, 0.25);
    let (u, _) = reduced_system(&mesh, &kernel).solve(&NativeBackend).unwrap();

    let results = recover_element_results(&mesh, &kernel, &u, AssemblyMode::Sequential).unwrap();
    let element = results[0].as_ref().unwrap();
    assert!(element.mises > 0.0);

    let field = average_to_nodes(&mesh, &results);
    assert_eq!(field.counts, vec![1, 1, 1, 1]);
    for value in &field.values {
        assert_eq!(*value, element.mises);
    }
}

#[test]
fn scaling_the_tetrahedron_scales_compliance() {
    // K scales with the edge length, so u = F / K scales with 1 / h
    let kernel = kernel(1.0, 0.3);
    let small = common::unit_tet();
    let large = TetMesh::new(
        small.nodes().iter().map(|p| Point3::from(p.coords * 2.0)).collect(),
        vec![[0, 1, 2, 3]],
    )
    .unwrap();

    let (u_small, _) = reduced_system(&small, &kernel).solve(&NativeBackend).unwrap();
    let (u_large, _) = reduced_system(&large, &kernel).solve(&NativeBackend).unwrap();

    common::assert_relative_eq(
        u_large[LOADED_DOF],
        u_small[LOADED_DOF] / 2.0,
        1e-10,
        "tip displacement",
    );
}
