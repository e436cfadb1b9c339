//! Axis-aligned bounding boxes and bounding spheres.
//!
//! These are the cheap enclosing volumes the kd-tree partitions and the
//! traversal rejects against before any precise primitive test runs.

use raycore_math::{Point2, Point3, Transform};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// True if this AABB encloses no space at all.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Expand this AABB to include another AABB.
    pub fn include(&mut self, other: &Aabb3) {
        if other.is_empty() {
            return;
        }
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Union of two AABBs.
    pub fn union(&self, other: &Aabb3) -> Aabb3 {
        let mut out = *self;
        out.include(other);
        out
    }

    /// Test whether a point lies inside the box (faces count as inside).
    pub fn contains_point(&self, p: &Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Surface area of the box. Zero for an empty box.
    pub fn surface_area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let dx = self.max.x - self.min.x;
        let dy = self.max.y - self.min.y;
        let dz = self.max.z - self.min.z;
        2.0 * (dx * dy + dy * dz + dz * dx)
    }

    /// Expand the box by `margin` in all directions.
    pub fn expand(&mut self, margin: f64) {
        self.min.x -= margin;
        self.min.y -= margin;
        self.min.z -= margin;
        self.max.x += margin;
        self.max.y += margin;
        self.max.z += margin;
    }

    /// Coordinate of the minimum corner along an axis index (0 = X, 1 = Y, 2 = Z).
    pub fn min_axis(&self, axis: usize) -> f64 {
        self.min[axis]
    }

    /// Coordinate of the maximum corner along an axis index.
    pub fn max_axis(&self, axis: usize) -> f64 {
        self.max[axis]
    }

    /// Axis-aligned box enclosing this box mapped through an affine transform.
    ///
    /// Maps all eight corners and re-bounds; conservative for any affine map.
    pub fn transform(&self, t: &Transform) -> Aabb3 {
        if self.is_empty() {
            return *self;
        }
        let mut out = Aabb3::empty();
        for &x in &[self.min.x, self.max.x] {
            for &y in &[self.min.y, self.max.y] {
                for &z in &[self.min.z, self.max.z] {
                    out.include_point(&t.apply_point(&Point3::new(x, y, z)));
                }
            }
        }
        out
    }
}

/// Axis-aligned bounding box in 2D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb2 {
    /// Minimum corner.
    pub min: Point2,
    /// Maximum corner.
    pub max: Point2,
}

impl Aabb2 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point2, max: Point2) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::INFINITY, f64::INFINITY),
            max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// True if this AABB encloses no space at all.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point2) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Expand this AABB to include another AABB.
    pub fn include(&mut self, other: &Aabb2) {
        if other.is_empty() {
            return;
        }
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Test whether a point lies inside the box (edges count as inside).
    pub fn contains_point(&self, p: &Point2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Half-perimeter of the box, the 2D analogue of surface area.
    pub fn half_perimeter(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.max.x - self.min.x) + (self.max.y - self.min.y)
    }

    /// Coordinate of the minimum corner along an axis index (0 = X, 1 = Y).
    pub fn min_axis(&self, axis: usize) -> f64 {
        self.min[axis]
    }

    /// Coordinate of the maximum corner along an axis index.
    pub fn max_axis(&self, axis: usize) -> f64 {
        self.max[axis]
    }
}

/// A bounding sphere in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Sphere centre.
    pub center: Point3,
    /// Sphere radius.
    pub radius: f64,
}

impl BoundingSphere {
    /// Create a bounding sphere.
    pub fn new(center: Point3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Test whether a point lies inside the sphere (surface counts as inside).
    pub fn contains_point(&self, p: &Point3) -> bool {
        (p - self.center).norm_squared() <= self.radius * self.radius
    }

    /// The tightest AABB enclosing this sphere.
    pub fn aabb(&self) -> Aabb3 {
        let r = self.radius;
        Aabb3::new(
            Point3::new(self.center.x - r, self.center.y - r, self.center.z - r),
            Point3::new(self.center.x + r, self.center.y + r, self.center.z + r),
        )
    }
}

/// A bounding volume attached to an indexed item: box or sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundingVolume {
    /// Axis-aligned box.
    Box(Aabb3),
    /// Sphere.
    Sphere(BoundingSphere),
}

impl BoundingVolume {
    /// The tightest AABB enclosing this volume. Split candidates and leaf
    /// regions are always derived from this box.
    pub fn aabb(&self) -> Aabb3 {
        match self {
            Self::Box(b) => *b,
            Self::Sphere(s) => s.aabb(),
        }
    }

    /// Test whether a point lies inside the volume.
    pub fn contains_point(&self, p: &Point3) -> bool {
        match self {
            Self::Box(b) => b.contains_point(p),
            Self::Sphere(s) => s.contains_point(p),
        }
    }
}

/// An `(id, bounding volume)` pair submitted to a 3D kd-tree build.
///
/// Ids are caller-assigned and must be unique within one build; the index
/// never owns the geometry behind them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Item {
    /// Caller-assigned identifier.
    pub id: u32,
    /// Bounding volume of the item.
    pub bounds: BoundingVolume,
}

impl Item {
    /// Create an item.
    pub fn new(id: u32, bounds: BoundingVolume) -> Self {
        Self { id, bounds }
    }
}

/// An `(id, bounding box)` pair submitted to a 2D kd-tree build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Item2 {
    /// Caller-assigned identifier.
    pub id: u32,
    /// Bounding box of the item.
    pub bounds: Aabb2,
}

impl Item2 {
    /// Create an item.
    pub fn new(id: u32, bounds: Aabb2) -> Self {
        Self { id, bounds }
    }
}
