#![warn(missing_docs)]

//! Intersectable primitive contract for the raycore engine.
//!
//! A [`Primitive`] is anything that can report a bounding box, decide
//! point containment, and enumerate every crossing of a ray with its
//! surface in distance order. The scene graph consumes primitives through
//! this trait; the CSG layer composes two of them by merging their
//! intersection streams.
//!
//! Two analytic shapes are provided: [`Sphere`] and [`BoxShape`]. Both
//! describe closed solids, so their event streams alternate strictly
//! between entering and exiting crossings.

mod box_shape;
mod sphere;

pub use box_shape::BoxShape;
pub use sphere::Sphere;

use raycore_math::{Point3, Vec3};
use raycore_spatial::{Aabb3, Ray};

/// A single crossing of a ray with a primitive's surface.
///
/// Normals are unit length and point out of the solid, regardless of the
/// crossing direction; `exiting` records the direction instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Distance along the ray, in `[0, max_distance]`.
    pub t: f64,
    /// The crossing point.
    pub point: Point3,
    /// Outward unit surface normal at the crossing point.
    pub normal: Vec3,
    /// True when the ray leaves the solid at this crossing, false when it
    /// enters. A ray starting inside a solid reports an exiting crossing
    /// first, which is how callers discover they began inside.
    pub exiting: bool,
}

/// Boxed ordered stream of surface crossings for one ray.
pub type IntersectionIter<'a> = Box<dyn Iterator<Item = Intersection> + 'a>;

/// An intersectable solid.
///
/// Implementations must yield crossings in strictly increasing `t`, limited
/// to `[0, ray.max_distance]`, and must suppress tangential grazes that do
/// not actually cross the surface. Streams are per-call state, so one
/// primitive may serve any number of concurrent queries.
pub trait Primitive: Send + Sync + std::fmt::Debug {
    /// Conservative axis-aligned bounding box of the solid, in the
    /// primitive's own coordinate space.
    fn bounding_box(&self) -> Aabb3;

    /// Whether `point` lies inside the solid (surface included).
    fn contains(&self, point: &Point3) -> bool;

    /// All crossings of `ray` with the surface, nearest first.
    fn intersections<'a>(&'a self, ray: &'a Ray) -> IntersectionIter<'a>;

    /// The nearest crossing, if any.
    fn hit(&self, ray: &Ray) -> Option<Intersection> {
        self.intersections(ray).next()
    }
}
