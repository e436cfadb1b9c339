#![warn(missing_docs)]

//! Kd-tree spatial acceleration for the raycore ray-tracing engine.
//!
//! Builds balanced space-subdivision indexes over `(id, bounding volume)`
//! items and answers ray-traversal and point-containment queries, delegating
//! leaf-level decisions to an injected [`LeafTest3`] / [`LeafTest2`]
//! implementation. Construction uses a surface-area-heuristic cost model
//! with split candidates taken from item bound edges.
//!
//! # Architecture
//!
//! - [`Ray`] - ray with precomputed slab-test state and a maximum distance
//! - [`Aabb3`] / [`Aabb2`] / [`BoundingSphere`] - cheap enclosing volumes
//! - [`KdTree3`] - 3D index with first-hit ray traversal and containment
//! - [`KdTree2`] - 2D index with containment queries
//! - [`KdTree3::save`] / [`KdTree3::load`] - binary persistence with
//!   structural validation
//!
//! Trees are immutable after construction; queries are read-only and safe
//! to run concurrently. Scene mutation is handled one level up by a
//! wholesale rebuild.

mod bounds;
mod error;
mod io;
mod kd2;
mod kd3;
mod ray;
mod tree;

pub use bounds::{Aabb2, Aabb3, BoundingSphere, BoundingVolume, Item, Item2};
pub use error::{Result, SpatialError};
pub use kd2::{BoundsLeafTest2, KdTree2, LeafTest2};
pub use kd3::{BoundsLeafTest, KdTree3, LeafTest3};
pub use ray::Ray;
pub use tree::{Axis, KdNode, KdTreeConfig};
