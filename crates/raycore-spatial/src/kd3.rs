//! 3D kd-tree: SAH construction, first-hit ray traversal and point queries.

use crate::bounds::{Aabb3, Item};
use crate::error::Result;
use crate::ray::Ray;
use crate::tree::{build_root, BuildItem, KdNode, KdTreeConfig};
use raycore_math::Point3;

/// Leaf-level geometry tests injected into 3D tree queries.
///
/// The tree stores opaque item ids only; the owner of the real geometry
/// implements this trait to bridge candidate ids back to precise tests.
pub trait LeafTest3 {
    /// Report whether any of the candidate `items` is hit by `ray` at a
    /// distance of at most `max_range`. The first leaf whose test succeeds
    /// ends the traversal, so the reported hit must be the nearest among
    /// the candidates.
    ///
    /// Traversal passes each leaf the far bound of its own clipped ray
    /// interval as `max_range`. A candidate whose real geometry lies
    /// beyond it must not succeed here: the item reaches the later cell
    /// that covers its hit through its other leaf registrations, and a
    /// nearer item may still be waiting in between.
    fn leaf_trace(&self, items: &[u32], ray: &Ray, max_range: f64) -> bool;

    /// Append to `hits` every candidate id whose geometry contains `point`.
    fn leaf_contains(&self, items: &[u32], point: &Point3, hits: &mut Vec<u32>);
}

/// Leaf test that treats each item's bounding volume as the authoritative
/// geometry. Used when the coarse volumes are the real shapes, and as the
/// brute-force reference in tests.
#[derive(Debug)]
pub struct BoundsLeafTest<'a> {
    items: &'a [Item],
}

impl<'a> BoundsLeafTest<'a> {
    /// Wrap the item list a tree was built from. Item ids must index into
    /// the slice.
    pub fn new(items: &'a [Item]) -> Self {
        Self { items }
    }
}

impl LeafTest3 for BoundsLeafTest<'_> {
    fn leaf_trace(&self, items: &[u32], ray: &Ray, max_range: f64) -> bool {
        items.iter().any(|&id| {
            ray.intersect_volume(&self.items[id as usize].bounds)
                .is_some_and(|(t0, _)| t0 <= max_range)
        })
    }

    fn leaf_contains(&self, items: &[u32], point: &Point3, hits: &mut Vec<u32>) {
        for &id in items {
            if self.items[id as usize].bounds.contains_point(point) {
                hits.push(id);
            }
        }
    }
}

/// A 3D kd-tree over `(id, bounding volume)` items.
///
/// Built wholesale from an item list; there is no incremental insertion or
/// removal. Once built the tree is immutable, so read-only queries may run
/// from any number of threads concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct KdTree3 {
    pub(crate) root: KdNode,
    pub(crate) bounds: Aabb3,
    pub(crate) item_count: u32,
}

impl KdTree3 {
    /// Build a tree from `items` with the given configuration.
    ///
    /// Zero items produce a single empty leaf with empty bounds; queries
    /// against it simply report no hits.
    pub fn build(items: &[Item], config: &KdTreeConfig) -> Result<Self> {
        config.validate()?;

        let mut bounds = Aabb3::empty();
        let build_items: Vec<BuildItem<3>> = items
            .iter()
            .map(|item| {
                let aabb = item.bounds.aabb();
                bounds.include(&aabb);
                BuildItem {
                    id: item.id,
                    min: [aabb.min.x, aabb.min.y, aabb.min.z],
                    max: [aabb.max.x, aabb.max.y, aabb.max.z],
                }
            })
            .collect();

        let region = (
            [bounds.min.x, bounds.min.y, bounds.min.z],
            [bounds.max.x, bounds.max.y, bounds.max.z],
        );
        let root = build_root(build_items, region, config);

        Ok(Self {
            root,
            bounds,
            item_count: items.len() as u32,
        })
    }

    /// Union bounding box of all items the tree was built from.
    pub fn bounds(&self) -> &Aabb3 {
        &self.bounds
    }

    /// Number of items submitted to the build.
    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    /// March `ray` through the tree front to back, handing each leaf's
    /// candidates to `tester`, and stop at the first leaf that reports a
    /// hit. Returns whether any leaf reported one.
    ///
    /// Because leaves are visited in ray order and each leaf may only
    /// succeed within its own interval, the first success is the nearest
    /// hit along the ray. `max_range` further restricts the ray's own
    /// `max_distance`.
    pub fn trace<T: LeafTest3>(&self, ray: &Ray, max_range: f64, tester: &T) -> bool {
        let Some((t_min, t_max)) = ray.intersect_aabb(&self.bounds) else {
            return false;
        };
        let t_max = t_max.min(max_range);
        if t_max < t_min {
            return false;
        }
        Self::trace_node(&self.root, ray, t_min, t_max, tester)
    }

    fn trace_node<T: LeafTest3>(
        node: &KdNode,
        ray: &Ray,
        t_min: f64,
        t_max: f64,
        tester: &T,
    ) -> bool {
        match node {
            KdNode::Leaf { items } => {
                // The leaf is bounded by its own interval end: a candidate
                // with loose bounds may be registered here while its real
                // surface lies cells away, and a nearer item can still be
                // waiting in between.
                !items.is_empty() && tester.leaf_trace(items, ray, t_max)
            }
            KdNode::Interior {
                axis,
                split,
                lower,
                upper,
            } => {
                let a = axis.index();
                let origin = ray.origin_axis(a);
                let dir = ray.direction_axis(a);

                // Near child is the one containing the ray origin; on the
                // plane itself the direction sign breaks the tie.
                let lower_first = origin < *split || (origin == *split && dir <= 0.0);
                let (near, far) = if lower_first {
                    (lower, upper)
                } else {
                    (upper, lower)
                };

                if dir == 0.0 {
                    // Parallel to the plane: the ray never leaves the near side.
                    return Self::trace_child(near, ray, t_min, t_max, tester);
                }

                let t_split = (split - origin) / dir;
                if t_split > t_max || t_split <= 0.0 {
                    Self::trace_child(near, ray, t_min, t_max, tester)
                } else if t_split < t_min {
                    Self::trace_child(far, ray, t_min, t_max, tester)
                } else {
                    Self::trace_child(near, ray, t_min, t_split, tester)
                        || Self::trace_child(far, ray, t_split, t_max, tester)
                }
            }
        }
    }

    fn trace_child<T: LeafTest3>(
        child: &Option<Box<KdNode>>,
        ray: &Ray,
        t_min: f64,
        t_max: f64,
        tester: &T,
    ) -> bool {
        child
            .as_deref()
            .is_some_and(|node| Self::trace_node(node, ray, t_min, t_max, tester))
    }

    /// Collect the ids of every item whose precise geometry contains
    /// `point`, in ascending id order.
    ///
    /// Every node whose region contains the point is visited; an item that
    /// straddles a split plane is reported once.
    pub fn items_containing<T: LeafTest3>(&self, point: &Point3, tester: &T) -> Vec<u32> {
        let mut hits = Vec::new();
        if self.bounds.contains_point(point) {
            Self::contains_node(&self.root, point, tester, &mut hits);
            hits.sort_unstable();
            hits.dedup();
        }
        hits
    }

    /// Whether any item's precise geometry contains `point`.
    pub fn contains<T: LeafTest3>(&self, point: &Point3, tester: &T) -> bool {
        !self.items_containing(point, tester).is_empty()
    }

    fn contains_node<T: LeafTest3>(
        node: &KdNode,
        point: &Point3,
        tester: &T,
        hits: &mut Vec<u32>,
    ) {
        match node {
            KdNode::Leaf { items } => {
                if !items.is_empty() {
                    tester.leaf_contains(items, point, hits);
                }
            }
            KdNode::Interior {
                axis,
                split,
                lower,
                upper,
            } => {
                let v = point[axis.index()];
                if v <= *split {
                    if let Some(node) = lower {
                        Self::contains_node(node, point, tester, hits);
                    }
                }
                if v >= *split {
                    if let Some(node) = upper {
                        Self::contains_node(node, point, tester, hits);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::{BoundingSphere, BoundingVolume};
    use raycore_math::Vec3;

    fn box_item(id: u32, min: [f64; 3], max: [f64; 3]) -> Item {
        Item::new(
            id,
            BoundingVolume::Box(Aabb3::new(
                Point3::new(min[0], min[1], min[2]),
                Point3::new(max[0], max[1], max[2]),
            )),
        )
    }

    /// A grid of separated unit boxes along X.
    fn row_of_boxes(count: u32) -> Vec<Item> {
        (0..count)
            .map(|i| {
                let x = i as f64 * 3.0;
                box_item(i, [x, 0.0, 0.0], [x + 1.0, 1.0, 1.0])
            })
            .collect()
    }

    #[test]
    fn empty_build_is_well_defined() {
        let tree = KdTree3::build(&[], &KdTreeConfig::default()).unwrap();
        assert!(tree.bounds().is_empty());
        assert_eq!(tree.item_count(), 0);

        let tester = BoundsLeafTest::new(&[]);
        let ray = Ray::new(Point3::origin(), Vec3::x()).unwrap();
        assert!(!tree.trace(&ray, f64::INFINITY, &tester));
        assert!(tree.items_containing(&Point3::origin(), &tester).is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = KdTreeConfig {
            min_items: 0,
            ..KdTreeConfig::default()
        };
        assert!(KdTree3::build(&[], &bad).is_err());
    }

    #[test]
    fn trace_matches_brute_force() {
        let items = row_of_boxes(32);
        let tree = KdTree3::build(&items, &KdTreeConfig::default()).unwrap();
        let tester = BoundsLeafTest::new(&items);

        // Rays down the row, across it, and missing everything.
        let along = Ray::new(Point3::new(-2.0, 0.5, 0.5), Vec3::x()).unwrap();
        assert!(tree.trace(&along, f64::INFINITY, &tester));

        let across = Ray::new(Point3::new(30.5, 0.5, -4.0), Vec3::z()).unwrap();
        assert!(tree.trace(&across, f64::INFINITY, &tester));

        let gap = Ray::new(Point3::new(1.5, 0.5, -4.0), Vec3::z()).unwrap();
        assert!(!tree.trace(&gap, f64::INFINITY, &tester));

        let above = Ray::new(Point3::new(-2.0, 5.0, 0.5), Vec3::x()).unwrap();
        assert!(!tree.trace(&above, f64::INFINITY, &tester));
    }

    #[test]
    fn trace_respects_max_range() {
        let items = row_of_boxes(8);
        let tree = KdTree3::build(&items, &KdTreeConfig::default()).unwrap();
        let tester = BoundsLeafTest::new(&items);

        let ray = Ray::new(Point3::new(-2.0, 0.5, 0.5), Vec3::x()).unwrap();
        assert!(tree.trace(&ray, 10.0, &tester));
        assert!(!tree.trace(&ray, 1.0, &tester));
    }

    #[test]
    fn reverse_ray_traverses_back_to_front() {
        let items = row_of_boxes(8);
        let tree = KdTree3::build(&items, &KdTreeConfig::default()).unwrap();
        let tester = BoundsLeafTest::new(&items);

        let ray = Ray::new(Point3::new(30.0, 0.5, 0.5), -Vec3::x()).unwrap();
        assert!(tree.trace(&ray, f64::INFINITY, &tester));
    }

    #[test]
    fn containment_matches_brute_force() {
        let mut items = row_of_boxes(16);
        // One large box overlapping the first few cells.
        items.push(box_item(100, [0.0, 0.0, 0.0], [7.0, 1.0, 1.0]));
        let tree = KdTree3::build(&items, &KdTreeConfig::default()).unwrap();

        // BoundsLeafTest indexes by id; give id 100 a slot.
        let mut lookup = vec![box_item(0, [0.0; 3], [0.0; 3]); 101];
        for item in &items {
            lookup[item.id as usize] = *item;
        }
        let tester = BoundsLeafTest::new(&lookup);

        for item in &items {
            let aabb = item.bounds.aabb();
            let inside = Point3::new(
                (aabb.min.x + aabb.max.x) / 2.0,
                0.5,
                0.5,
            );
            let brute: Vec<u32> = items
                .iter()
                .filter(|it| it.bounds.contains_point(&inside))
                .map(|it| it.id)
                .collect();
            let mut expected = brute;
            expected.sort_unstable();
            assert_eq!(tree.items_containing(&inside, &tester), expected);
        }

        assert!(tree
            .items_containing(&Point3::new(-5.0, 0.5, 0.5), &tester)
            .is_empty());
    }

    /// Tester whose real geometry per id is tighter than the bounds the
    /// tree was built from, recording the nearest surface it sees.
    struct TightGeometry<'a> {
        solids: &'a [Aabb3],
        nearest: std::cell::RefCell<Option<f64>>,
    }

    impl LeafTest3 for TightGeometry<'_> {
        fn leaf_trace(&self, items: &[u32], ray: &Ray, max_range: f64) -> bool {
            for &id in items {
                if let Some((t0, _)) = ray.intersect_aabb(&self.solids[id as usize]) {
                    let mut nearest = self.nearest.borrow_mut();
                    if nearest.map_or(true, |t| t0 < t) {
                        *nearest = Some(t0);
                    }
                }
            }
            self.nearest.borrow().is_some_and(|t| t <= max_range)
        }

        fn leaf_contains(&self, items: &[u32], point: &Point3, hits: &mut Vec<u32>) {
            for &id in items {
                if self.solids[id as usize].contains_point(point) {
                    hits.push(id);
                }
            }
        }
    }

    #[test]
    fn loose_bounds_cannot_end_the_march_early() {
        // Item 0 advertises bounds spanning the whole row but its real
        // surface sits at the far end; item 1 is a small box in between.
        // A leaf visited before item 1's cell sees item 0, records the
        // far surface, and must not stop the march there.
        let solids = [
            Aabb3::new(Point3::new(30.0, -1.0, -1.0), Point3::new(40.0, 1.0, 1.0)),
            Aabb3::new(Point3::new(10.0, -1.0, -1.0), Point3::new(11.0, 1.0, 1.0)),
            Aabb3::new(Point3::new(0.0, 4.0, -1.0), Point3::new(1.0, 6.0, 1.0)),
            Aabb3::new(Point3::new(2.0, 4.0, -1.0), Point3::new(3.0, 6.0, 1.0)),
        ];
        let mut items: Vec<Item> = solids
            .iter()
            .enumerate()
            .map(|(id, solid)| Item::new(id as u32, BoundingVolume::Box(*solid)))
            .collect();
        items[0] = Item::new(
            0,
            BoundingVolume::Box(Aabb3::new(
                Point3::new(0.0, -1.0, -1.0),
                Point3::new(40.0, 1.0, 1.0),
            )),
        );

        // A zero traversal cost makes the builder split between the items.
        let config = KdTreeConfig {
            hit_cost: 0.0,
            ..KdTreeConfig::default()
        };
        let tree = KdTree3::build(&items, &config).unwrap();

        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Vec3::x()).unwrap();
        let tester = TightGeometry {
            solids: &solids,
            nearest: std::cell::RefCell::new(None),
        };
        assert!(tree.trace(&ray, f64::INFINITY, &tester));
        let nearest = tester.nearest.into_inner().unwrap();
        assert!((nearest - 20.0).abs() < 1e-9, "got t = {nearest}");
    }

    #[test]
    fn determinism_across_rebuilds() {
        let items = row_of_boxes(64);
        let config = KdTreeConfig::default();
        let a = KdTree3::build(&items, &config).unwrap();
        let b = KdTree3::build(&items, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sphere_volumes_are_supported() {
        let items: Vec<Item> = (0..8)
            .map(|i| {
                Item::new(
                    i,
                    BoundingVolume::Sphere(BoundingSphere::new(
                        Point3::new(i as f64 * 4.0, 0.0, 0.0),
                        1.0,
                    )),
                )
            })
            .collect();
        let tree = KdTree3::build(&items, &KdTreeConfig::default()).unwrap();
        let tester = BoundsLeafTest::new(&items);

        let hit = Ray::new(Point3::new(12.0, 0.0, -5.0), Vec3::z()).unwrap();
        assert!(tree.trace(&hit, f64::INFINITY, &tester));

        let miss = Ray::new(Point3::new(2.0, 0.0, -5.0), Vec3::z()).unwrap();
        assert!(!tree.trace(&miss, f64::INFINITY, &tester));

        assert_eq!(
            tree.items_containing(&Point3::new(4.2, 0.0, 0.0), &tester),
            vec![1]
        );
    }
}
