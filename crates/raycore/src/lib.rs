#![warn(missing_docs)]

//! Spatial acceleration and ray-intersection engine facade for raycore.
//!
//! Re-exports the engine's building blocks: math types, kd-tree spatial
//! indices, analytic primitives, boolean solids and the scene graph.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use raycore::{BooleanSolid, Node, Point3, Ray, Sphere, Vec3, World};
//!
//! // A biconvex lens: the intersection of two offset spheres.
//! let lens = BooleanSolid::intersect(
//!     Sphere::new(Point3::new(-0.5, 0.0, 0.0), 1.0),
//!     Sphere::new(Point3::new(0.5, 0.0, 0.0), 1.0),
//! );
//!
//! let mut world = World::new();
//! let root = world.root();
//! world.attach(root, Node::primitive("lens", Arc::new(lens))).unwrap();
//!
//! let ray = Ray::new(Point3::new(-5.0, 0.0, 0.0), Vec3::x()).unwrap();
//! let hit = world.hit(&ray).unwrap().expect("the lens sits on the ray");
//! assert!((hit.t - 4.5).abs() < 1e-9);
//! ```

pub use raycore_csg;
pub use raycore_math;
pub use raycore_primitives;
pub use raycore_scenegraph;
pub use raycore_spatial;

pub use raycore_csg::{BooleanOperation, BooleanSolid};
pub use raycore_math::{Point2, Point3, Tolerance, Transform, Vec2, Vec3};
pub use raycore_primitives::{BoxShape, Intersection, IntersectionIter, Primitive, Sphere};
pub use raycore_scenegraph::{
    ChangeSignal, Node, NodeContent, NodeKey, SceneError, SceneIntersection, World,
};
pub use raycore_spatial::{
    Aabb2, Aabb3, BoundingSphere, BoundingVolume, Item, Item2, KdTree2, KdTree3, KdTreeConfig,
    Ray, SpatialError,
};
