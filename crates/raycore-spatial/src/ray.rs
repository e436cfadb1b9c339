//! Ray representation and ray-volume rejection tests.

use crate::bounds::{Aabb3, BoundingSphere, BoundingVolume};
use crate::error::{Result, SpatialError};
use raycore_math::{Dir3, Point3, Vec3};

/// A ray in 3D space with a maximum traversal distance.
///
/// Directions are stored normalized, so the parameter `t` of any
/// intersection is a metric distance along the ray. Reciprocal direction
/// components and their signs are precomputed for the slab test.
#[derive(Debug, Clone)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Unit direction of the ray.
    pub direction: Dir3,
    /// Maximum distance along the ray that is considered; hits beyond this
    /// are ignored. Defaults to infinity.
    pub max_distance: f64,
    inv_direction: Vec3,
    sign: [usize; 3],
}

impl Ray {
    /// Create a ray with unlimited range.
    ///
    /// Fails with [`SpatialError::DegenerateRay`] if the direction has zero
    /// or non-finite length.
    pub fn new(origin: Point3, direction: Vec3) -> Result<Self> {
        Self::with_max_distance(origin, direction, f64::INFINITY)
    }

    /// Create a ray with an explicit maximum distance.
    ///
    /// `max_distance` must be non-negative; the direction must have a
    /// finite, non-zero length.
    pub fn with_max_distance(origin: Point3, direction: Vec3, max_distance: f64) -> Result<Self> {
        let norm = direction.norm();
        if norm == 0.0 || !norm.is_finite() {
            return Err(SpatialError::DegenerateRay(format!(
                "direction {direction:?} cannot be normalized"
            )));
        }
        if max_distance < 0.0 || max_distance.is_nan() {
            return Err(SpatialError::DegenerateRay(format!(
                "max_distance {max_distance} is not a distance"
            )));
        }
        let dir = Dir3::new_unchecked(direction / norm);
        let inv = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        let sign = [
            usize::from(inv.x < 0.0),
            usize::from(inv.y < 0.0),
            usize::from(inv.z < 0.0),
        ];
        Ok(Self {
            origin,
            direction: dir,
            max_distance,
            inv_direction: inv,
            sign,
        })
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction.as_ref()
    }

    /// Direction component along an axis index (0 = X, 1 = Y, 2 = Z).
    #[inline]
    pub fn direction_axis(&self, axis: usize) -> f64 {
        self.direction.as_ref()[axis]
    }

    /// Origin component along an axis index.
    #[inline]
    pub fn origin_axis(&self, axis: usize) -> f64 {
        self.origin[axis]
    }

    /// Test ray-AABB intersection using the slab method.
    ///
    /// Returns `Some((t_min, t_max))` with the clamped entry and exit
    /// parameters, or `None` if the box is missed, behind the origin, or
    /// entirely beyond `max_distance`.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> Option<(f64, f64)> {
        if aabb.is_empty() {
            return None;
        }
        let bounds = [aabb.min, aabb.max];

        let tx1 = (bounds[self.sign[0]].x - self.origin.x) * self.inv_direction.x;
        let tx2 = (bounds[1 - self.sign[0]].x - self.origin.x) * self.inv_direction.x;

        let mut t_min = tx1;
        let mut t_max = tx2;

        let ty1 = (bounds[self.sign[1]].y - self.origin.y) * self.inv_direction.y;
        let ty2 = (bounds[1 - self.sign[1]].y - self.origin.y) * self.inv_direction.y;

        t_min = t_min.max(ty1);
        t_max = t_max.min(ty2);

        let tz1 = (bounds[self.sign[2]].z - self.origin.z) * self.inv_direction.z;
        let tz2 = (bounds[1 - self.sign[2]].z - self.origin.z) * self.inv_direction.z;

        t_min = t_min.max(tz1);
        t_max = t_max.min(tz2);

        if t_max >= t_min && t_max >= 0.0 && t_min <= self.max_distance {
            Some((t_min.max(0.0), t_max.min(self.max_distance)))
        } else {
            None
        }
    }

    /// Test ray-sphere intersection.
    ///
    /// Returns `Some((t_min, t_max))` clamped to `[0, max_distance]`, or
    /// `None` if the sphere is missed or entirely outside that interval.
    #[inline]
    pub fn intersect_sphere(&self, sphere: &BoundingSphere) -> Option<(f64, f64)> {
        let oc = self.origin - sphere.center;
        // Unit direction, so the quadratic's leading coefficient is 1.
        let b = oc.dot(self.direction.as_ref());
        let c = oc.norm_squared() - sphere.radius * sphere.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t0 = -b - sqrt_disc;
        let t1 = -b + sqrt_disc;
        if t1 < 0.0 || t0 > self.max_distance {
            return None;
        }
        Some((t0.max(0.0), t1.min(self.max_distance)))
    }

    /// Test intersection against either kind of bounding volume.
    #[inline]
    pub fn intersect_volume(&self, volume: &BoundingVolume) -> Option<(f64, f64)> {
        match volume {
            BoundingVolume::Box(b) => self.intersect_aabb(b),
            BoundingVolume::Sphere(s) => self.intersect_sphere(s),
        }
    }
}
