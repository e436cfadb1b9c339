//! Kd-tree node representation and SAH construction.
//!
//! The build is shared between the 2D and 3D trees through a const-generic
//! dimension parameter; only the region measure (surface area vs
//! half-perimeter) differs. Construction follows the surface-area-heuristic
//! cost model: candidate splits are taken from item bound edges, swept in
//! sorted order with running below/above counts, and a split is only taken
//! when its expected cost beats testing every item in a flat leaf.

use crate::error::{Result, SpatialError};

/// A splitting axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis (3D trees only).
    Z,
}

impl Axis {
    /// Numeric index of the axis (X = 0, Y = 1, Z = 2).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Axis from a numeric index. Panics on an index above 2; construction
    /// code only produces indices below the tree dimension.
    pub(crate) fn from_index(index: usize) -> Self {
        match index {
            0 => Self::X,
            1 => Self::Y,
            2 => Self::Z,
            _ => unreachable!("axis index out of range"),
        }
    }
}

/// Construction parameters for a kd-tree build.
#[derive(Debug, Clone)]
pub struct KdTreeConfig {
    /// Maximum tree depth. `0` selects the automatic limit
    /// `⌈8 + 1.3·log2(N)⌉` for `N` items.
    pub max_depth: usize,
    /// Node item count at or below which a leaf is always emitted.
    pub min_items: usize,
    /// Fixed cost of traversing one additional interior node, in units of
    /// one leaf-level item test.
    pub hit_cost: f64,
    /// Cost discount applied to splits that carve off empty space,
    /// in `[0, 1]`.
    pub empty_bonus: f64,
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 0,
            min_items: 1,
            hit_cost: 20.0,
            empty_bonus: 0.2,
        }
    }
}

impl KdTreeConfig {
    /// Check the parameters for internal consistency.
    ///
    /// `build` runs this itself; callers that store a config for later use
    /// can reject bad values up front.
    pub fn validate(&self) -> Result<()> {
        if self.min_items < 1 {
            return Err(SpatialError::InvalidConfig(format!(
                "min_items must be at least 1, got {}",
                self.min_items
            )));
        }
        if !self.hit_cost.is_finite() || self.hit_cost < 0.0 {
            return Err(SpatialError::InvalidConfig(format!(
                "hit_cost must be a non-negative finite value, got {}",
                self.hit_cost
            )));
        }
        if !self.empty_bonus.is_finite() || !(0.0..=1.0).contains(&self.empty_bonus) {
            return Err(SpatialError::InvalidConfig(format!(
                "empty_bonus must lie in [0, 1], got {}",
                self.empty_bonus
            )));
        }
        Ok(())
    }

    /// Effective depth limit for `n` items.
    pub(crate) fn depth_limit(&self, n: usize) -> usize {
        if self.max_depth > 0 {
            self.max_depth
        } else if n == 0 {
            0
        } else {
            (8.0 + 1.3 * (n as f64).log2()).ceil() as usize
        }
    }
}

/// A kd-tree node: an interior split or a leaf of candidate item ids.
///
/// An interior node may have one empty side when the split carved off empty
/// space, but never both.
#[derive(Debug, Clone, PartialEq)]
pub enum KdNode {
    /// Interior node splitting space on an axis-aligned plane.
    Interior {
        /// Splitting axis.
        axis: Axis,
        /// Split plane position along the axis.
        split: f64,
        /// Child covering coordinates below the split.
        lower: Option<Box<KdNode>>,
        /// Child covering coordinates above the split.
        upper: Option<Box<KdNode>>,
    },
    /// Leaf node holding candidate item ids, in build submission order.
    Leaf {
        /// Candidate item ids whose bounds overlap this region.
        items: Vec<u32>,
    },
}

/// Per-item data consumed by the build: caller id plus bound extents per axis.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuildItem<const D: usize> {
    pub(crate) id: u32,
    pub(crate) min: [f64; D],
    pub(crate) max: [f64; D],
}

/// An axis-aligned build region given as `(min, max)` per-axis extents.
pub(crate) type Region<const D: usize> = ([f64; D], [f64; D]);

/// Region measure the hit probability is proportional to: surface area in
/// 3D, half-perimeter in 2D.
fn measure<const D: usize>(region: &Region<D>) -> f64 {
    let (min, max) = region;
    match D {
        2 => (max[0] - min[0]) + (max[1] - min[1]),
        3 => {
            let dx = max[0] - min[0];
            let dy = max[1] - min[1];
            let dz = max[2] - min[2];
            2.0 * (dx * dy + dy * dz + dz * dx)
        }
        _ => unreachable!("kd-trees are 2D or 3D"),
    }
}

fn split_region<const D: usize>(region: &Region<D>, axis: usize, at: f64) -> (Region<D>, Region<D>) {
    let mut lower = *region;
    let mut upper = *region;
    lower.1[axis] = at;
    upper.0[axis] = at;
    (lower, upper)
}

/// Build the root node over `items` covering `bounds`.
pub(crate) fn build_root<const D: usize>(
    items: Vec<BuildItem<D>>,
    bounds: Region<D>,
    config: &KdTreeConfig,
) -> KdNode {
    let depth = config.depth_limit(items.len());
    log::debug!(
        "building {}D kd-tree: {} items, depth limit {}",
        D,
        items.len(),
        depth
    );
    build_node(items, bounds, depth, config)
}

fn build_node<const D: usize>(
    items: Vec<BuildItem<D>>,
    bounds: Region<D>,
    depth_remaining: usize,
    config: &KdTreeConfig,
) -> KdNode {
    if items.len() <= config.min_items || depth_remaining == 0 {
        return leaf(items);
    }

    let parent_measure = measure(&bounds);
    if parent_measure <= 0.0 || !parent_measure.is_finite() {
        return leaf(items);
    }

    // Cost of stopping here: one precise test per item.
    let leaf_cost = items.len() as f64;

    let Some((_, axis, split)) = best_split(&items, &bounds, parent_measure, config, leaf_cost)
    else {
        return leaf(items);
    };

    // Items touching the plane from either side go to both children, so no
    // hit can be missed whichever side the traversal descends first.
    let lower_items: Vec<BuildItem<D>> = items
        .iter()
        .filter(|it| it.min[axis] <= split)
        .copied()
        .collect();
    let upper_items: Vec<BuildItem<D>> = items
        .into_iter()
        .filter(|it| it.max[axis] >= split)
        .collect();

    let (lower_region, upper_region) = split_region(&bounds, axis, split);
    let lower = build_child(lower_items, lower_region, depth_remaining - 1, config);
    let upper = build_child(upper_items, upper_region, depth_remaining - 1, config);

    KdNode::Interior {
        axis: Axis::from_index(axis),
        split,
        lower,
        upper,
    }
}

fn build_child<const D: usize>(
    items: Vec<BuildItem<D>>,
    region: Region<D>,
    depth_remaining: usize,
    config: &KdTreeConfig,
) -> Option<Box<KdNode>> {
    if items.is_empty() {
        None
    } else {
        Some(Box::new(build_node(items, region, depth_remaining, config)))
    }
}

fn leaf<const D: usize>(items: Vec<BuildItem<D>>) -> KdNode {
    KdNode::Leaf {
        items: items.into_iter().map(|it| it.id).collect(),
    }
}

/// Evaluate every edge-derived candidate split and return the cheapest one
/// that strictly beats `leaf_cost`, as `(cost, axis, position)`.
fn best_split<const D: usize>(
    items: &[BuildItem<D>],
    bounds: &Region<D>,
    parent_measure: f64,
    config: &KdTreeConfig,
    leaf_cost: f64,
) -> Option<(f64, usize, f64)> {
    let n = items.len();
    let mut best: Option<(f64, usize, f64)> = None;

    for axis in 0..D {
        let (lo, hi) = (bounds.0[axis], bounds.1[axis]);
        if hi - lo <= 0.0 {
            continue;
        }

        let mut lowers: Vec<f64> = items.iter().map(|it| it.min[axis]).collect();
        let mut uppers: Vec<f64> = items.iter().map(|it| it.max[axis]).collect();
        lowers.sort_unstable_by(f64::total_cmp);
        uppers.sort_unstable_by(f64::total_cmp);

        // Candidate planes are item bound edges strictly inside the node;
        // an edge on the node boundary cannot separate anything.
        let mut candidates: Vec<f64> = lowers
            .iter()
            .chain(uppers.iter())
            .copied()
            .filter(|&e| e > lo && e < hi)
            .collect();
        candidates.sort_unstable_by(f64::total_cmp);
        candidates.dedup();

        // Sweep candidates in ascending order, maintaining the number of
        // lower edges at or below the plane and upper edges below it.
        let mut i_low = 0;
        let mut i_up = 0;
        for &s in &candidates {
            while i_low < n && lowers[i_low] <= s {
                i_low += 1;
            }
            while i_up < n && uppers[i_up] < s {
                i_up += 1;
            }
            let n_lower = i_low;
            let n_upper = n - i_up;

            let (lower_region, upper_region) = split_region(bounds, axis, s);
            let p_lower = measure(&lower_region) / parent_measure;
            let p_upper = measure(&upper_region) / parent_measure;

            let mut cost =
                config.hit_cost + p_lower * n_lower as f64 + p_upper * n_upper as f64;
            if n_lower == 0 || n_upper == 0 {
                cost *= 1.0 - config.empty_bonus;
            }

            if cost < best.map_or(leaf_cost, |(c, _, _)| c.min(leaf_cost)) {
                best = Some((cost, axis, s));
            }
        }
    }

    best.filter(|&(cost, _, _)| cost < leaf_cost)
}
