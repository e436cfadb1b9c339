#![warn(missing_docs)]

//! Scene graph for the raycore engine.
//!
//! A [`World`] owns a tree of named nodes, each carrying a local transform
//! and optionally a primitive. Structural edits invalidate a shared
//! kd-tree accelerator through a [`ChangeSignal`]; the accelerator is
//! rebuilt lazily by the next query, so a burst of edits costs one rebuild.
//! Queries map the root-space ray into each candidate primitive's local
//! space, run the precise test there, and report the result back in root
//! space.

mod error;
mod node;
mod signal;
mod world;

pub use error::{Result, SceneError};
pub use node::{Node, NodeContent, NodeKey};
pub use signal::ChangeSignal;
pub use world::{SceneIntersection, World};
