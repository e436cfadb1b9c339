//! Analytic sphere solid.

use crate::{Intersection, IntersectionIter, Primitive};
use raycore_math::{Point3, Vec3};
use raycore_spatial::{Aabb3, Ray};

/// A solid sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Sphere centre.
    pub center: Point3,
    /// Sphere radius; must be positive.
    pub radius: f64,
}

impl Sphere {
    /// Create a sphere from centre and radius.
    pub fn new(center: Point3, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl Primitive for Sphere {
    fn bounding_box(&self) -> Aabb3 {
        let r = self.radius;
        Aabb3::new(
            Point3::new(self.center.x - r, self.center.y - r, self.center.z - r),
            Point3::new(self.center.x + r, self.center.y + r, self.center.z + r),
        )
    }

    fn contains(&self, point: &Point3) -> bool {
        (point - self.center).norm_squared() <= self.radius * self.radius
    }

    fn intersections<'a>(&'a self, ray: &'a Ray) -> IntersectionIter<'a> {
        // Quadratic |oc + t*d|^2 = r^2 with unit d, so the leading
        // coefficient is 1.
        let oc = ray.origin - self.center;
        let b = oc.dot(ray.direction.as_ref());
        let c = oc.norm_squared() - self.radius * self.radius;
        let disc = b * b - c;

        // Tangential grazes (disc == 0) never cross the surface.
        if disc <= 0.0 {
            return Box::new(std::iter::empty());
        }

        let sqrt_disc = disc.sqrt();
        let roots = [(-b - sqrt_disc, false), (-b + sqrt_disc, true)];

        let events: Vec<Intersection> = roots
            .into_iter()
            .filter(|&(t, _)| t >= 0.0 && t <= ray.max_distance)
            .map(|(t, exiting)| {
                let point = ray.at(t);
                Intersection {
                    t,
                    point,
                    normal: (point - self.center) / self.radius,
                    exiting,
                }
            })
            .collect();
        Box::new(events.into_iter())
    }
}
