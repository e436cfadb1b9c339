//! Analytic axis-aligned box solid.

use crate::{Intersection, IntersectionIter, Primitive};
use raycore_math::{Point3, Vec3};
use raycore_spatial::{Aabb3, Ray};

/// A solid axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxShape {
    bounds: Aabb3,
}

impl BoxShape {
    /// Create a box from min and max corners. Each min component must be
    /// strictly below its max counterpart for the box to describe a solid.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self {
            bounds: Aabb3::new(min, max),
        }
    }

    /// Create a cube of side `size` centred on `center`.
    pub fn centered_cube(center: Point3, size: f64) -> Self {
        let h = size / 2.0;
        Self::new(
            Point3::new(center.x - h, center.y - h, center.z - h),
            Point3::new(center.x + h, center.y + h, center.z + h),
        )
    }

    /// The box extents.
    pub fn bounds(&self) -> &Aabb3 {
        &self.bounds
    }

    /// Unclipped slab intersection: entry and exit parameters plus the axis
    /// index on which each occurs. `None` when the ray misses or merely
    /// grazes a face.
    fn slab_interval(&self, ray: &Ray) -> Option<(f64, usize, f64, usize)> {
        let mut t_near = f64::NEG_INFINITY;
        let mut t_far = f64::INFINITY;
        let mut near_axis = 0;
        let mut far_axis = 0;

        for axis in 0..3 {
            let origin = ray.origin_axis(axis);
            let dir = ray.direction_axis(axis);
            let min = self.bounds.min_axis(axis);
            let max = self.bounds.max_axis(axis);

            if dir == 0.0 {
                if origin < min || origin > max {
                    return None;
                }
                continue;
            }

            let mut t0 = (min - origin) / dir;
            let mut t1 = (max - origin) / dir;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            if t0 > t_near {
                t_near = t0;
                near_axis = axis;
            }
            if t1 < t_far {
                t_far = t1;
                far_axis = axis;
            }
        }

        // Equal parameters mean the ray only touches an edge or face.
        if t_near < t_far {
            Some((t_near, near_axis, t_far, far_axis))
        } else {
            None
        }
    }
}

fn axis_normal(axis: usize, positive: bool) -> Vec3 {
    let mut n = Vec3::zeros();
    n[axis] = if positive { 1.0 } else { -1.0 };
    n
}

impl Primitive for BoxShape {
    fn bounding_box(&self) -> Aabb3 {
        self.bounds
    }

    fn contains(&self, point: &Point3) -> bool {
        self.bounds.contains_point(point)
    }

    fn intersections<'a>(&'a self, ray: &'a Ray) -> IntersectionIter<'a> {
        let Some((t_near, near_axis, t_far, far_axis)) = self.slab_interval(ray) else {
            return Box::new(std::iter::empty());
        };

        let mut events = Vec::with_capacity(2);
        if t_near >= 0.0 && t_near <= ray.max_distance {
            // Entry face normal opposes the ray on the entry axis.
            events.push(Intersection {
                t: t_near,
                point: ray.at(t_near),
                normal: axis_normal(near_axis, ray.direction_axis(near_axis) < 0.0),
                exiting: false,
            });
        }
        if t_far >= 0.0 && t_far <= ray.max_distance {
            events.push(Intersection {
                t: t_far,
                point: ray.at(t_far),
                normal: axis_normal(far_axis, ray.direction_axis(far_axis) > 0.0),
                exiting: true,
            });
        }
        Box::new(events.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube() -> BoxShape {
        BoxShape::centered_cube(Point3::origin(), 1.0)
    }

    #[test]
    fn entry_and_exit_faces() {
        let cube = unit_cube();
        let ray = Ray::new(Point3::new(-5.0, 0.0, 0.0), Vec3::x()).unwrap();
        let events: Vec<_> = cube.intersections(&ray).collect();
        assert_eq!(events.len(), 2);

        assert!((events[0].t - 4.5).abs() < 1e-10);
        assert!(!events[0].exiting);
        assert!((events[0].normal - Vec3::new(-1.0, 0.0, 0.0)).norm() < 1e-12);

        assert!((events[1].t - 5.5).abs() < 1e-10);
        assert!(events[1].exiting);
        assert!((events[1].normal - Vec3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn origin_inside_reports_exit_only() {
        let cube = unit_cube();
        let ray = Ray::new(Point3::origin(), Vec3::z()).unwrap();
        let events: Vec<_> = cube.intersections(&ray).collect();
        assert_eq!(events.len(), 1);
        assert!(events[0].exiting);
        assert!((events[0].t - 0.5).abs() < 1e-10);
        assert!((events[0].normal - Vec3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn grazing_edge_yields_nothing() {
        let cube = unit_cube();
        // Ray running along the top face plane.
        let graze = Ray::new(Point3::new(-5.0, 0.5, 0.0), Vec3::x()).unwrap();
        assert_eq!(cube.intersections(&graze).count(), 0);
    }

    #[test]
    fn parallel_ray_outside_slab_misses() {
        let cube = unit_cube();
        let ray = Ray::new(Point3::new(-5.0, 2.0, 0.0), Vec3::x()).unwrap();
        assert_eq!(cube.intersections(&ray).count(), 0);
    }

    #[test]
    fn diagonal_ray_picks_correct_faces() {
        let cube = BoxShape::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let ray = Ray::new(Point3::new(-1.0, 0.5, 0.5), Vec3::new(1.0, 0.1, 0.0)).unwrap();
        let events: Vec<_> = cube.intersections(&ray).collect();
        assert_eq!(events.len(), 2);
        assert!((events[0].normal - Vec3::new(-1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!(!events[0].exiting && events[1].exiting);
    }

    #[test]
    fn containment_includes_faces() {
        let cube = unit_cube();
        assert!(cube.contains(&Point3::new(0.5, 0.0, 0.0)));
        assert!(cube.contains(&Point3::origin()));
        assert!(!cube.contains(&Point3::new(0.51, 0.0, 0.0)));
    }
}
