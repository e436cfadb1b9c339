//! Error types for the spatial acceleration crate.

use thiserror::Error;

/// Errors that can occur while building, querying or persisting kd-trees.
#[derive(Error, Debug)]
pub enum SpatialError {
    /// A construction parameter is out of range.
    #[error("invalid kd-tree configuration: {0}")]
    InvalidConfig(String),

    /// A ray was constructed with a degenerate direction or range.
    #[error("degenerate ray: {0}")]
    DegenerateRay(String),

    /// An I/O failure while saving or loading a tree.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted tree failed structural validation.
    #[error("corrupt kd-tree stream: {0}")]
    Corrupt(String),
}

/// Result type for spatial operations.
pub type Result<T> = std::result::Result<T, SpatialError>;
