//! Structured tetrahedral meshes for integration tests.

#![allow(dead_code)]

use nalgebra::Point3;
use tetfea_solver::TetMesh;

/// Axis orders of the six tetrahedra in a Kuhn-split cell
const KUHN: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// Box of `cells` hexahedra starting at `origin`, each split into six
/// tetrahedra along its main diagonal
///
/// Every cell uses the same split, so neighbouring faces match.
pub fn box_mesh(origin: [f64; 3], size: [f64; 3], cells: [usize; 3]) -> TetMesh {
    let [nx, ny, nz] = cells;
    let id = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);

    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                nodes.push(Point3::new(
                    origin[0] + size[0] * i as f64 / nx as f64,
                    origin[1] + size[1] * j as f64 / ny as f64,
                    origin[2] + size[2] * k as f64 / nz as f64,
                ));
            }
        }
    }

    let mut elements = Vec::with_capacity(6 * nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                for order in KUHN {
                    let mut corner = [i, j, k];
                    let mut tet = [id(i, j, k), 0, 0, 0];
                    for (slot, &axis) in order.iter().enumerate() {
                        corner[axis] += 1;
                        tet[slot + 1] = id(corner[0], corner[1], corner[2]);
                    }
                    elements.push(tet);
                }
            }
        }
    }

    TetMesh::new(nodes, elements).expect("structured mesh is valid")
}

/// Square shaft centred on the z axis, clamped face at z = 0
pub fn square_shaft(width: f64, length: f64, cells_xy: usize, cells_z: usize) -> TetMesh {
    box_mesh(
        [-width / 2.0, -width / 2.0, 0.0],
        [width, width, length],
        [cells_xy, cells_xy, cells_z],
    )
}

/// Tetrahedron at the origin with unit legs along the axes
pub fn unit_tet() -> TetMesh {
    TetMesh::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ],
        vec![[0, 1, 2, 3]],
    )
    .expect("unit tetrahedron is valid")
}

/// Index of the node closest to `p`
pub fn node_near(mesh: &TetMesh, p: [f64; 3]) -> usize {
    let target = Point3::new(p[0], p[1], p[2]);
    mesh.nodes()
        .iter()
        .enumerate()
        .min_by(|a, b| {
            nalgebra::distance(a.1, &target).total_cmp(&nalgebra::distance(b.1, &target))
        })
        .map(|(i, _)| i)
        .expect("mesh has nodes")
}

pub fn assert_relative_eq(actual: f64, expected: f64, tol: f64, what: &str) {
    let scale = expected.abs().max(f64::MIN_POSITIVE);
    assert!(
        (actual - expected).abs() <= tol * scale,
        "{}: got {}, expected {} (tol {})",
        what,
        actual,
        expected,
        tol
    );
}
