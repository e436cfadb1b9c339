//! 2D kd-tree: SAH construction and point containment queries.
//!
//! The 2D variant serves flat lookups (parameter-space and importance maps);
//! it answers containment only, there is no ray traversal.

use crate::bounds::{Aabb2, Item2};
use crate::error::Result;
use crate::tree::{build_root, BuildItem, KdNode, KdTreeConfig};
use raycore_math::Point2;

/// Leaf-level containment test injected into 2D tree queries.
pub trait LeafTest2 {
    /// Append to `hits` every candidate id whose geometry contains `point`.
    fn leaf_contains(&self, items: &[u32], point: &Point2, hits: &mut Vec<u32>);
}

/// Leaf test that treats each item's bounding box as the authoritative
/// geometry.
#[derive(Debug)]
pub struct BoundsLeafTest2<'a> {
    items: &'a [Item2],
}

impl<'a> BoundsLeafTest2<'a> {
    /// Wrap the item list a tree was built from. Item ids must index into
    /// the slice.
    pub fn new(items: &'a [Item2]) -> Self {
        Self { items }
    }
}

impl LeafTest2 for BoundsLeafTest2<'_> {
    fn leaf_contains(&self, items: &[u32], point: &Point2, hits: &mut Vec<u32>) {
        for &id in items {
            if self.items[id as usize].bounds.contains_point(point) {
                hits.push(id);
            }
        }
    }
}

/// A 2D kd-tree over `(id, bounding box)` items.
///
/// Same construction heuristic as [`crate::KdTree3`], with hit probability
/// taken from the half-perimeter ratio of child regions.
#[derive(Debug, Clone, PartialEq)]
pub struct KdTree2 {
    pub(crate) root: KdNode,
    pub(crate) bounds: Aabb2,
    pub(crate) item_count: u32,
}

impl KdTree2 {
    /// Build a tree from `items` with the given configuration.
    pub fn build(items: &[Item2], config: &KdTreeConfig) -> Result<Self> {
        config.validate()?;

        let mut bounds = Aabb2::empty();
        let build_items: Vec<BuildItem<2>> = items
            .iter()
            .map(|item| {
                bounds.include(&item.bounds);
                BuildItem {
                    id: item.id,
                    min: [item.bounds.min.x, item.bounds.min.y],
                    max: [item.bounds.max.x, item.bounds.max.y],
                }
            })
            .collect();

        let region = ([bounds.min.x, bounds.min.y], [bounds.max.x, bounds.max.y]);
        let root = build_root(build_items, region, config);

        Ok(Self {
            root,
            bounds,
            item_count: items.len() as u32,
        })
    }

    /// Union bounding box of all items the tree was built from.
    pub fn bounds(&self) -> &Aabb2 {
        &self.bounds
    }

    /// Number of items submitted to the build.
    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    /// Collect the ids of every item whose precise geometry contains
    /// `point`, in ascending id order.
    pub fn items_containing<T: LeafTest2>(&self, point: &Point2, tester: &T) -> Vec<u32> {
        let mut hits = Vec::new();
        if self.bounds.contains_point(point) {
            Self::contains_node(&self.root, point, tester, &mut hits);
            hits.sort_unstable();
            hits.dedup();
        }
        hits
    }

    /// Whether any item's precise geometry contains `point`.
    pub fn contains<T: LeafTest2>(&self, point: &Point2, tester: &T) -> bool {
        !self.items_containing(point, tester).is_empty()
    }

    fn contains_node<T: LeafTest2>(
        node: &KdNode,
        point: &Point2,
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

    fn cell(id: u32, min: (f64, f64), max: (f64, f64)) -> Item2 {
        Item2::new(
            id,
            Aabb2::new(Point2::new(min.0, min.1), Point2::new(max.0, max.1)),
        )
    }

    fn grid(side: u32) -> Vec<Item2> {
        let mut items = Vec::new();
        for row in 0..side {
            for col in 0..side {
                let id = row * side + col;
                let x = col as f64 * 2.0;
                let y = row as f64 * 2.0;
                items.push(cell(id, (x, y), (x + 1.0, y + 1.0)));
            }
        }
        items
    }

    #[test]
    fn empty_build_is_well_defined() {
        let tree = KdTree2::build(&[], &KdTreeConfig::default()).unwrap();
        assert!(tree.bounds().is_empty());
        let tester = BoundsLeafTest2::new(&[]);
        assert!(tree
            .items_containing(&Point2::new(0.0, 0.0), &tester)
            .is_empty());
    }

    #[test]
    fn containment_matches_brute_force() {
        let items = grid(8);
        let tree = KdTree2::build(&items, &KdTreeConfig::default()).unwrap();
        let tester = BoundsLeafTest2::new(&items);

        for item in &items {
            let p = Point2::new(
                (item.bounds.min.x + item.bounds.max.x) / 2.0,
                (item.bounds.min.y + item.bounds.max.y) / 2.0,
            );
            assert_eq!(tree.items_containing(&p, &tester), vec![item.id]);
        }

        // Points in the gaps between cells match nothing.
        assert!(tree
            .items_containing(&Point2::new(1.5, 1.5), &tester)
            .is_empty());
    }

    #[test]
    fn overlapping_items_all_reported() {
        let mut items = grid(4);
        items.push(cell(100, (0.0, 0.0), (7.0, 7.0)));
        let mut lookup = vec![cell(0, (0.0, 0.0), (0.0, 0.0)); 101];
        for item in &items {
            lookup[item.id as usize] = *item;
        }
        let tree = KdTree2::build(&items, &KdTreeConfig::default()).unwrap();
        let tester = BoundsLeafTest2::new(&lookup);

        assert_eq!(
            tree.items_containing(&Point2::new(2.5, 2.5), &tester),
            vec![5, 100]
        );
    }

    #[test]
    fn shared_boundary_point_reports_both_items_once() {
        // A point on the shared edge of two abutting rectangles belongs to
        // both, and each is reported exactly once however the tree split.
        let items = vec![
            cell(0, (0.0, 0.0), (1.0, 1.0)),
            cell(1, (1.0, 0.0), (2.0, 1.0)),
        ];
        let config = KdTreeConfig {
            min_items: 1,
            max_depth: 4,
            hit_cost: 0.0,
            empty_bonus: 0.0,
        };
        let tree = KdTree2::build(&items, &config).unwrap();
        let tester = BoundsLeafTest2::new(&items);
        assert_eq!(
            tree.items_containing(&Point2::new(1.0, 0.5), &tester),
            vec![0, 1]
        );
    }

    #[test]
    fn determinism_across_rebuilds() {
        let items = grid(10);
        let config = KdTreeConfig::default();
        assert_eq!(
            KdTree2::build(&items, &config).unwrap(),
            KdTree2::build(&items, &config).unwrap()
        );
    }
}
