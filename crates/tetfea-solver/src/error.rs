//! Error types for tetfea-solver

use crate::backend::BackendError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolverError>;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Invalid material: {0}")]
    InvalidMaterial(String),

    #[error("Invalid load component '{token}' in load type '{load_type}'")]
    UnknownLoadComponent { token: String, load_type: String },

    #[error("Fixed DOF index {index} out of range (num_dofs {num_dofs})")]
    DofOutOfRange { index: usize, num_dofs: usize },

    #[error("Element {element} references node {node}, but the mesh has {num_nodes} nodes")]
    InvalidConnectivity {
        element: usize,
        node: usize,
        num_nodes: usize,
    },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Assembly error: {0}")]
    Assembly(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Linear solver failed: {0}")]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
