//! 4-node linear tetrahedron (constant strain tetrahedron)
//!
//! The shape functions are linear, so their gradients are constant over the
//! element and a single evaluation gives the exact stiffness:
//!
//! ```text
//!   K_e = V · Bᵀ · D · B
//! ```
//!
//! Assembly and stress recovery both obtain B from
//! [`Tet4::strain_displacement_matrix`], so the strain used to report stress
//! is always the strain the stiffness was built from.

use crate::elements::Element;
use crate::materials::ConstitutiveMatrix;
use crate::mesh::dof_index;
use nalgebra::{DVector, Matrix4, Point3, SMatrix, SVector, Vector3, Vector6};

/// Volume below which a tetrahedron is treated as degenerate
pub const DEGENERATE_VOLUME: f64 = 1e-12;

/// 6×12 strain-displacement matrix
pub type StrainDisplacementMatrix = SMatrix<f64, 6, 12>;

/// 12×12 element stiffness matrix
pub type ElementStiffness = SMatrix<f64, 12, 12>;

/// Tet4: 4-node tetrahedral element
///
/// Node ordering follows the mesher's connectivity; local DOFs are
/// `[u1, v1, w1, u2, v2, w2, ..., u4, v4, w4]`.
///
/// ```text
///            4
///           /|\
///          / | \
///         /  |  \
///        1---|---3
///         \  |  /
///          \ | /
///           \|/
///            2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tet4 {
    /// Node ids (4 corner nodes)
    pub nodes: [usize; 4],
}

/// Geometric quantities of one non-degenerate tetrahedron
#[derive(Debug, Clone, PartialEq)]
pub struct TetGeometry {
    /// det([1 x y z]) / 6; negative for inverted node order
    pub signed_volume: f64,
    /// |signed_volume|
    pub volume: f64,
    /// Constant gradient of each linear shape function
    pub gradients: [Vector3<f64>; 4],
}

impl Tet4 {
    /// Create a new Tet4 element
    pub fn new(nodes: [usize; 4]) -> Self {
        Self { nodes }
    }

    /// 4×4 matrix with rows `[1, x_i, y_i, z_i]`
    pub fn coordinate_matrix(coords: &[Point3<f64>; 4]) -> Matrix4<f64> {
        Matrix4::from_fn(|i, j| if j == 0 { 1.0 } else { coords[i][j - 1] })
    }

    /// Signed volume from the determinant of the coordinate matrix
    pub fn signed_volume(coords: &[Point3<f64>; 4]) -> f64 {
        Self::coordinate_matrix(coords).determinant() / 6.0
    }

    /// Unsigned element volume
    pub fn volume(coords: &[Point3<f64>; 4]) -> f64 {
        Self::signed_volume(coords).abs()
    }

    /// Volume and shape function gradients
    ///
    /// Column `i` of the inverse coordinate matrix holds the coefficients of
    /// N_i = c0 + c1·x + c2·y + c3·z, so rows 1..4 of that column are ∇N_i.
    ///
    /// Returns `None` when the volume is below `degenerate_volume` or the
    /// coordinate matrix cannot be inverted.
    pub fn geometry(coords: &[Point3<f64>; 4], degenerate_volume: f64) -> Option<TetGeometry> {
        let a = Self::coordinate_matrix(coords);
        let signed_volume = a.determinant() / 6.0;
        let volume = signed_volume.abs();

        if !(volume >= degenerate_volume) {
            return None;
        }

        let a_inv = a.try_inverse()?;
        let gradients =
            std::array::from_fn(|i| Vector3::new(a_inv[(1, i)], a_inv[(2, i)], a_inv[(3, i)]));

        Some(TetGeometry {
            signed_volume,
            volume,
            gradients,
        })
    }

    /// Compute strain-displacement matrix (B-matrix) from shape function gradients
    ///
    /// Strain components (Voigt notation):
    /// {ε} = [εxx, εyy, εzz, γxy, γyz, γzx]ᵀ
    ///
    /// For each node i:
    /// B = [dN_i/dx    0         0     ]
    ///     [0          dN_i/dy   0     ]
    ///     [0          0         dN_i/dz]
    ///     [dN_i/dy    dN_i/dx   0     ]
    ///     [0          dN_i/dz   dN_i/dy]
    ///     [dN_i/dz    0         dN_i/dx]
    pub fn strain_displacement_matrix(gradients: &[Vector3<f64>; 4]) -> StrainDisplacementMatrix {
        let mut b = StrainDisplacementMatrix::zeros();

        for (i, grad) in gradients.iter().enumerate() {
            let (dn_dx, dn_dy, dn_dz) = (grad.x, grad.y, grad.z);
            let col = i * 3;

            // εxx = du/dx
            b[(0, col)] = dn_dx;

            // εyy = dv/dy
            b[(1, col + 1)] = dn_dy;

            // εzz = dw/dz
            b[(2, col + 2)] = dn_dz;

            // γxy = du/dy + dv/dx
            b[(3, col)] = dn_dy;
            b[(3, col + 1)] = dn_dx;

            // γyz = dv/dz + dw/dy
            b[(4, col + 1)] = dn_dz;
            b[(4, col + 2)] = dn_dy;

            // γzx = dw/dx + du/dz
            b[(5, col)] = dn_dz;
            b[(5, col + 2)] = dn_dx;
        }

        b
    }

    /// Gather the 12 local displacement components from the global vector
    pub fn gather_displacements(&self, displacements: &DVector<f64>) -> SVector<f64, 12> {
        SVector::<f64, 12>::from_fn(|k, _| {
            let node = self.nodes[k / 3];
            displacements[dof_index(node, k % 3)]
        })
    }
}

impl Element for Tet4 {
    fn num_nodes(&self) -> usize {
        4
    }

    fn node_ids(&self) -> &[usize] {
        &self.nodes
    }
}

/// Element computations sharing one constitutive matrix
///
/// Built once per analysis run and used read-only (and from several threads
/// in parallel assembly) by every element computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementKernel {
    constitutive: ConstitutiveMatrix,
    degenerate_volume: f64,
}

impl ElementKernel {
    /// Kernel with the default degenerate-volume threshold
    pub fn new(constitutive: ConstitutiveMatrix) -> Self {
        Self::with_degenerate_volume(constitutive, DEGENERATE_VOLUME)
    }

    pub fn with_degenerate_volume(
        constitutive: ConstitutiveMatrix,
        degenerate_volume: f64,
    ) -> Self {
        Self {
            constitutive,
            degenerate_volume,
        }
    }

    pub fn constitutive(&self) -> &ConstitutiveMatrix {
        &self.constitutive
    }

    pub fn degenerate_volume(&self) -> f64 {
        self.degenerate_volume
    }

    /// Geometry of a tetrahedron, `None` if degenerate
    pub fn geometry(&self, coords: &[Point3<f64>; 4]) -> Option<TetGeometry> {
        Tet4::geometry(coords, self.degenerate_volume)
    }

    /// Element stiffness matrix K_e = V · Bᵀ · D · B
    ///
    /// A degenerate element yields the zero matrix.
    pub fn stiffness_matrix(&self, coords: &[Point3<f64>; 4]) -> ElementStiffness {
        let Some(geometry) = self.geometry(coords) else {
            return ElementStiffness::zeros();
        };

        let b = Tet4::strain_displacement_matrix(&geometry.gradients);
        let k = (b.transpose() * self.constitutive * b) * geometry.volume;
        // Exact symmetry, so the assembled K is bitwise symmetric too
        (k + k.transpose()) * 0.5
    }

    /// Engineering strain for the local displacements, `None` if degenerate
    pub fn strain(
        &self,
        coords: &[Point3<f64>; 4],
        element_displacements: &SVector<f64, 12>,
    ) -> Option<Vector6<f64>> {
        let geometry = self.geometry(coords)?;
        let b = Tet4::strain_displacement_matrix(&geometry.gradients);
        Some(b * element_displacements)
    }

    /// Stress [σxx, σyy, σzz, τxy, τyz, τzx], `None` if degenerate
    pub fn stress(
        &self,
        coords: &[Point3<f64>; 4],
        element_displacements: &SVector<f64, 12>,
    ) -> Option<Vector6<f64>> {
        self.strain(coords, element_displacements)
            .map(|strain| self.constitutive * strain)
    }
}
