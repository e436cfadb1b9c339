//! Scene graph error type.

use raycore_spatial::SpatialError;
use thiserror::Error;

/// Errors raised by scene graph operations.
#[derive(Debug, Error)]
pub enum SceneError {
    /// A node key does not refer to a live node in this scene.
    #[error("node key is not present in the scene")]
    InvalidNode,

    /// A reparent would make a node its own ancestor.
    #[error("reparenting would create a cycle")]
    CycleDetected,

    /// The root node cannot be moved or removed.
    #[error("the root node cannot be detached or reparented")]
    RootImmutable,

    /// A node transform has no inverse, so rays cannot be mapped into its
    /// local space.
    #[error("transform is singular and cannot be inverted")]
    SingularTransform,

    /// An underlying spatial index operation failed.
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

/// Convenience result alias for scene graph operations.
pub type Result<T> = std::result::Result<T, SceneError>;
