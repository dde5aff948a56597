//! Material properties and the isotropic constitutive law.

use crate::error::{Result, SolverError};
use nalgebra::Matrix6;
use serde::{Deserialize, Serialize};

/// 6×6 stress-strain matrix in Voigt order (xx, yy, zz, xy, yz, zx).
///
/// Shear rows act on engineering shear strains (γ = 2ε).
pub type ConstitutiveMatrix = Matrix6<f64>;

/// Isotropic linear elastic material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Material name
    #[serde(default = "Material::default_name")]
    pub name: String,
    /// Young's modulus (E) [Pa]
    pub elastic_modulus: f64,
    /// Poisson's ratio (ν) [-]
    pub poissons_ratio: f64,
}

impl Material {
    /// Create a validated material
    ///
    /// # Errors
    /// Returns [`SolverError::InvalidMaterial`] if E is not a positive finite
    /// number or ν lies outside the open interval (-1, 0.5).
    pub fn new(name: impl Into<String>, elastic_modulus: f64, poissons_ratio: f64) -> Result<Self> {
        let material = Self {
            name: name.into(),
            elastic_modulus,
            poissons_ratio,
        };
        material.validate()?;
        Ok(material)
    }

    /// Structural steel (E = 200 GPa, ν = 0.3)
    pub fn steel() -> Self {
        Self {
            name: "STEEL".to_string(),
            elastic_modulus: 2.0e11,
            poissons_ratio: 0.3,
        }
    }

    fn default_name() -> String {
        "MATERIAL".to_string()
    }

    /// Check the elastic constants
    ///
    /// Deserialized materials bypass [`Material::new`], so the constitutive
    /// matrix is only ever built after this check.
    pub fn validate(&self) -> Result<()> {
        let e = self.elastic_modulus;
        let nu = self.poissons_ratio;

        if !e.is_finite() || e <= 0.0 {
            return Err(SolverError::InvalidMaterial(format!(
                "{}: Young's modulus must be positive and finite (got {})",
                self.name, e
            )));
        }
        if !nu.is_finite() || nu <= -1.0 || nu >= 0.5 {
            return Err(SolverError::InvalidMaterial(format!(
                "{}: Poisson's ratio must lie in (-1, 0.5) (got {})",
                self.name, nu
            )));
        }
        Ok(())
    }

    /// Get the shear modulus (G) from E and ν
    pub fn shear_modulus(&self) -> f64 {
        self.elastic_modulus / (2.0 * (1.0 + self.poissons_ratio))
    }

    /// Get the bulk modulus (K) from E and ν
    pub fn bulk_modulus(&self) -> f64 {
        self.elastic_modulus / (3.0 * (1.0 - 2.0 * self.poissons_ratio))
    }

    /// Constitutive matrix for this material
    pub fn constitutive_matrix(&self) -> Result<ConstitutiveMatrix> {
        self.validate()?;
        constitutive_matrix(self.elastic_modulus, self.poissons_ratio)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::steel()
    }
}

/// Compute the 3D isotropic constitutive matrix (D-matrix)
///
/// ```text
///       [1-ν   ν     ν     0       0       0    ]
///       [ν     1-ν   ν     0       0       0    ]
///   E   [ν     ν     1-ν   0       0       0    ]
/// ───── [0     0     0   (1-2ν)/2  0       0    ]
/// (1+ν)(1-2ν)
///       [0     0     0     0     (1-2ν)/2  0    ]
///       [0     0     0     0       0     (1-2ν)/2]
/// ```
///
/// # Errors
/// Fails when the scaling factor or any entry is not finite, which happens
/// as ν approaches 0.5 or -1.
pub fn constitutive_matrix(
    elastic_modulus: f64,
    poissons_ratio: f64,
) -> Result<ConstitutiveMatrix> {
    let e = elastic_modulus;
    let nu = poissons_ratio;

    if !(e > 0.0) {
        return Err(SolverError::InvalidMaterial(format!(
            "Young's modulus must be positive (got {})",
            e
        )));
    }

    let denominator = (1.0 + nu) * (1.0 - 2.0 * nu);
    let factor = e / denominator;
    if denominator <= 0.0 || !factor.is_finite() {
        return Err(SolverError::InvalidMaterial(format!(
            "constitutive scaling factor diverges for E = {}, nu = {}",
            e, nu
        )));
    }

    let c11 = factor * (1.0 - nu);
    let c12 = factor * nu;
    let c44 = factor * (1.0 - 2.0 * nu) / 2.0;

    #[rustfmt::skip]
    let d = Matrix6::new(
        c11, c12, c12, 0.0, 0.0, 0.0,
        c12, c11, c12, 0.0, 0.0, 0.0,
        c12, c12, c11, 0.0, 0.0, 0.0,
        0.0, 0.0, 0.0, c44, 0.0, 0.0,
        0.0, 0.0, 0.0, 0.0, c44, 0.0,
        0.0, 0.0, 0.0, 0.0, 0.0, c44,
    );

    if d.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::InvalidMaterial(format!(
            "constitutive matrix is not finite for E = {}, nu = {}",
            e, nu
        )));
    }

    Ok(d)
}
