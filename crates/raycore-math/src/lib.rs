#![warn(missing_docs)]

//! Math types for the raycore ray-tracing engine.
//!
//! Thin wrappers around nalgebra providing the point, vector and affine
//! transform types shared by the spatial index, scene graph and primitives.
//! All geometry is double precision.

use nalgebra::{Matrix4, Unit, Vector2, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A 4x4 affine transformation between coordinate spaces.
///
/// Scene nodes carry one `Transform` each; the scene graph composes them
/// into node-to-root and root-to-node matrices. Rays are mapped into a
/// primitive's local space with [`Transform::apply_point`] /
/// [`Transform::apply_vector`], and surface normals back out with
/// [`Transform::apply_normal`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying column-major 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translate(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotate_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(1, 1)] = c;
        m[(1, 2)] = -s;
        m[(2, 1)] = s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotate_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 2)] = s;
        m[(2, 0)] = -s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotate_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Compose two transforms. `a.then(&b)` applies `b` first, then `a`.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point (applies rotation, scale and translation).
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (translation is ignored).
    pub fn apply_vector(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Transform a surface normal (inverse transpose of the upper-left 3x3).
    ///
    /// The result is not re-normalized; callers renormalize once after
    /// mapping the normal back to world space.
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        let m3 = self.matrix.fixed_view::<3, 3>(0, 0);
        match m3.try_inverse() {
            Some(inv) => inv.transpose() * n,
            // Degenerate transform, leave the normal unchanged
            None => *n,
        }
    }

    /// Inverse of this transform, if the matrix is invertible.
    pub fn try_inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tolerance constants for geometric comparisons along a ray.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance.
    pub distance: f64,
    /// Offset used to nudge launch points off a surface, avoiding
    /// self-intersection when a secondary ray is spawned from a hit.
    pub surface_offset: f64,
}

impl Tolerance {
    /// Default tolerances for scene-scale geometry.
    pub const DEFAULT: Self = Self {
        distance: 1e-9,
        surface_offset: 1e-9,
    };

    /// Check whether two ray distances are effectively equal.
    pub fn distances_equal(&self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.distance
    }

    /// Check whether a scalar is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.distance
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn identity_leaves_points_alone() {
        let t = Transform::identity();
        let p = Point3::new(1.0, -2.0, 3.5);
        assert!((t.apply_point(&p) - p).norm() < 1e-12);
    }

    #[test]
    fn translate_moves_points_not_vectors() {
        let t = Transform::translate(10.0, 0.0, -5.0);
        let p = t.apply_point(&Point3::origin());
        assert!((p.x - 10.0).abs() < 1e-12);
        assert!((p.z + 5.0).abs() < 1e-12);

        let v = t.apply_vector(&Vec3::new(1.0, 0.0, 0.0));
        assert!((v - Vec3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn rotate_z_quarter_turn() {
        let t = Transform::rotate_z(PI / 2.0);
        let p = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn then_applies_right_operand_first() {
        // translate then scale: (0,0,0) -> (1,0,0) -> (2,0,0)
        let composed = Transform::scale(2.0, 2.0, 2.0).then(&Transform::translate(1.0, 0.0, 0.0));
        let p = composed.apply_point(&Point3::origin());
        assert!((p.x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_round_trips() {
        let t = Transform::rotate_y(0.7).then(&Transform::translate(1.0, 2.0, 3.0));
        let inv = t.try_inverse().unwrap();
        let p = Point3::new(5.0, -6.0, 7.0);
        let back = inv.apply_point(&t.apply_point(&p));
        assert!((back - p).norm() < 1e-10);
    }

    #[test]
    fn normals_transform_with_inverse_transpose() {
        // Under a non-uniform scale a plane normal must not simply scale.
        let t = Transform::scale(2.0, 1.0, 1.0);
        // Plane x + y = c has normal (1, 1, 0); after scaling x by 2 the
        // plane becomes x/2 + y = c with normal (0.5, 1, 0).
        let n = t.apply_normal(&Vec3::new(1.0, 1.0, 0.0));
        let expected = Vec3::new(0.5, 1.0, 0.0);
        assert!((n.normalize() - expected.normalize()).norm() < 1e-12);
    }

    #[test]
    fn tolerance_compares_distances() {
        let tol = Tolerance::DEFAULT;
        assert!(tol.distances_equal(4.5, 4.5 + 1e-12));
        assert!(!tol.distances_equal(4.5, 4.6));
        assert!(tol.is_zero(-1e-12));
    }
}
