//! Error types for cwe-graph

use std::path::PathBuf;
use thiserror::Error;

/// Graph stage error type
#[derive(Debug, Error)]
pub enum GraphError {
    /// Input document does not exist
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Input document is not a `{"Weaknesses": [...]}` object
    #[error("Invalid input document {}: {reason}", .path.display())]
    InvalidInput { path: PathBuf, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// cwe-common error
    #[error(transparent)]
    Common(#[from] cwe_common::Error),
}

/// Result type for the graph stage
pub type GraphResult<T> = Result<T, GraphError>;
