//! The scene world: node hierarchy, change tracking and lazy acceleration.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use raycore_math::{Point3, Tolerance, Transform, Vec3};
use raycore_primitives::Primitive;
use raycore_spatial::{Aabb3, BoundingVolume, Item, KdTree3, KdTreeConfig, LeafTest3, Ray};
use slotmap::SlotMap;

use crate::error::{Result, SceneError};
use crate::node::{Node, NodeContent, NodeKey};
use crate::signal::ChangeSignal;

/// A ray's nearest crossing with scene geometry, in root space.
#[derive(Debug, Clone)]
pub struct SceneIntersection {
    /// The node whose primitive was hit.
    pub node: NodeKey,
    /// Distance from the ray origin to the crossing, in root space.
    pub t: f64,
    /// The crossing point in root space.
    pub point: Point3,
    /// Outward unit surface normal in root space.
    pub normal: Vec3,
    /// Whether the ray leaves the solid at this crossing.
    pub exiting: bool,
    /// `point` nudged just below the surface, for spawning transmitted rays.
    pub inside_point: Point3,
    /// `point` nudged just above the surface, for spawning reflected rays.
    pub outside_point: Point3,
    /// Transform from root space into the hit primitive's local space.
    pub to_local: Transform,
    /// Transform from the hit primitive's local space back to root space.
    pub to_world: Transform,
}

/// Snapshot of one primitive node taken at accelerator build time.
struct SceneEntry {
    key: NodeKey,
    primitive: Arc<dyn Primitive>,
    to_root: Transform,
    from_root: Transform,
}

/// The built spatial accelerator: a kd-tree over root-space bounding boxes
/// plus the per-node data its item ids index into.
struct Accelerator {
    tree: KdTree3,
    entries: Vec<SceneEntry>,
}

/// A tree of nodes with a lazily rebuilt spatial accelerator.
///
/// Structural edits (`attach`, `detach`, `reparent`, `set_transform`) take
/// `&mut self` and mark the accelerator stale. Queries (`hit`, `contains`)
/// take `&self`, rebuild the accelerator at most once per invalidation, and
/// may run from many threads concurrently.
pub struct World {
    nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,
    config: KdTreeConfig,
    tolerance: Tolerance,
    dirty: AtomicBool,
    accel: RwLock<Option<Accelerator>>,
    rebuilds: AtomicUsize,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("nodes", &self.nodes.len())
            .field("dirty", &self.dirty.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// An empty world holding only a root group node.
    pub fn new() -> Self {
        Self::with_valid_config(KdTreeConfig::default())
    }

    /// An empty world whose accelerator uses `config`. Invalid parameters
    /// are rejected here rather than surfacing on the first query.
    pub fn with_config(config: KdTreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: KdTreeConfig) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::group("root"));
        Self {
            nodes,
            root,
            config,
            tolerance: Tolerance::DEFAULT,
            dirty: AtomicBool::new(true),
            accel: RwLock::new(None),
            rebuilds: AtomicUsize::new(0),
        }
    }

    /// The root node key.
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Look up a node.
    pub fn node(&self, key: NodeKey) -> Result<&Node> {
        self.nodes.get(key).ok_or(SceneError::InvalidNode)
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut Node> {
        self.nodes.get_mut(key).ok_or(SceneError::InvalidNode)
    }

    /// Attach a free-standing node under `parent` and return its key.
    pub fn attach(&mut self, parent: NodeKey, node: Node) -> Result<NodeKey> {
        if node.transform.try_inverse().is_none() {
            return Err(SceneError::SingularTransform);
        }
        self.node(parent)?;
        let key = self.nodes.insert(node);
        self.node_mut(key)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(key);
        self.refresh_transforms(key)?;
        self.signal(ChangeSignal::Geometry);
        Ok(key)
    }

    /// Remove a node and its entire subtree. The root cannot be detached.
    pub fn detach(&mut self, key: NodeKey) -> Result<()> {
        if key == self.root {
            return Err(SceneError::RootImmutable);
        }
        let parent = self.node(key)?.parent.ok_or(SceneError::InvalidNode)?;
        self.node_mut(parent)?.children.retain(|&c| c != key);

        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.remove(k) {
                stack.extend(node.children);
            }
        }
        self.signal(ChangeSignal::Geometry);
        Ok(())
    }

    /// Move a node (with its subtree) under a new parent.
    ///
    /// Fails if the new parent lies inside the node's own subtree, which
    /// would disconnect the subtree from the root.
    pub fn reparent(&mut self, key: NodeKey, new_parent: NodeKey) -> Result<()> {
        if key == self.root {
            return Err(SceneError::RootImmutable);
        }
        self.node(key)?;

        let mut cursor = Some(new_parent);
        while let Some(k) = cursor {
            if k == key {
                return Err(SceneError::CycleDetected);
            }
            cursor = self.node(k)?.parent;
        }

        let old_parent = self.node(key)?.parent.ok_or(SceneError::InvalidNode)?;
        self.node_mut(old_parent)?.children.retain(|&c| c != key);
        self.node_mut(new_parent)?.children.push(key);
        self.node_mut(key)?.parent = Some(new_parent);

        self.refresh_transforms(key)?;
        self.signal(ChangeSignal::Geometry);
        Ok(())
    }

    /// Replace a node's local transform.
    pub fn set_transform(&mut self, key: NodeKey, transform: Transform) -> Result<()> {
        if transform.try_inverse().is_none() {
            return Err(SceneError::SingularTransform);
        }
        self.node_mut(key)?.transform = transform;
        self.refresh_transforms(key)?;
        self.signal(ChangeSignal::Geometry);
        Ok(())
    }

    /// Recompute the composed transforms of `start` and everything below it.
    fn refresh_transforms(&mut self, start: NodeKey) -> Result<()> {
        let mut stack = vec![start];
        while let Some(key) = stack.pop() {
            let parent_to_root = match self.node(key)?.parent {
                Some(p) => self.node(p)?.to_root.clone(),
                None => Transform::identity(),
            };
            let node = self.node_mut(key)?;
            node.to_root = parent_to_root.then(&node.transform);
            node.from_root = node
                .to_root
                .try_inverse()
                .ok_or(SceneError::SingularTransform)?;
            stack.extend(node.children.iter().copied());
        }
        Ok(())
    }

    /// Report a change to the world.
    ///
    /// Geometry changes mark the accelerator stale; it is rebuilt by the
    /// next query. Material changes leave it untouched. Structural edit
    /// methods signal automatically; this entry point exists for changes
    /// the world cannot see itself.
    pub fn signal(&self, change: ChangeSignal) {
        if change == ChangeSignal::Geometry {
            self.dirty.store(true, Ordering::Release);
        }
    }

    /// How many times the accelerator has been built. Intended for
    /// instrumentation; queries between two identical counts shared one
    /// build.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// Build the accelerator now instead of on the next query.
    ///
    /// A no-op when the accelerator is already current, unless `force` is
    /// set.
    pub fn rebuild(&self, force: bool) -> Result<()> {
        let mut guard = self.accel.write().unwrap_or_else(PoisonError::into_inner);
        if !force && guard.is_some() && !self.dirty.load(Ordering::Acquire) {
            return Ok(());
        }
        self.dirty.store(false, Ordering::Release);
        *guard = Some(self.build_accelerator()?);
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn with_accelerator<R>(&self, f: impl FnOnce(&Accelerator) -> R) -> Result<R> {
        if !self.dirty.load(Ordering::Acquire) {
            let guard = self.accel.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(accel) = guard.as_ref() {
                return Ok(f(accel));
            }
        }

        let mut guard = self.accel.write().unwrap_or_else(PoisonError::into_inner);
        // Clear the flag before building so a change signalled while the
        // build runs forces another rebuild instead of being lost.
        if self.dirty.swap(false, Ordering::AcqRel) {
            guard.take();
        }
        let accel = if let Some(accel) = guard.take() {
            guard.insert(accel)
        } else {
            let built = self.build_accelerator()?;
            self.rebuilds.fetch_add(1, Ordering::Relaxed);
            guard.insert(built)
        };
        Ok(f(accel))
    }

    fn build_accelerator(&self) -> Result<Accelerator> {
        let mut entries = Vec::new();
        let mut items = Vec::new();
        for (key, node) in &self.nodes {
            if let NodeContent::Primitive(primitive) = &node.content {
                let bounds = primitive.bounding_box().transform(&node.to_root);
                items.push(Item::new(entries.len() as u32, BoundingVolume::Box(bounds)));
                entries.push(SceneEntry {
                    key,
                    primitive: Arc::clone(primitive),
                    to_root: node.to_root.clone(),
                    from_root: node.from_root.clone(),
                });
            }
        }
        log::debug!("rebuilding scene accelerator over {} primitives", items.len());
        let tree = KdTree3::build(&items, &self.config)?;
        Ok(Accelerator { tree, entries })
    }

    /// The nearest crossing of `ray` with any primitive in the scene.
    ///
    /// The ray is given in root space; it is mapped into each candidate
    /// primitive's local space for the precise test and the result mapped
    /// back out. Respects the ray's `max_distance`.
    pub fn hit(&self, ray: &Ray) -> Result<Option<SceneIntersection>> {
        self.with_accelerator(|accel| {
            let tester = WorldLeafTest {
                entries: &accel.entries,
                tolerance: self.tolerance,
                best: RefCell::new(None),
            };
            accel.tree.trace(ray, ray.max_distance, &tester);
            tester.best.into_inner()
        })
    }

    /// Every primitive node whose solid contains `point` (root space).
    pub fn contains(&self, point: &Point3) -> Result<Vec<NodeKey>> {
        self.with_accelerator(|accel| {
            let tester = WorldLeafTest {
                entries: &accel.entries,
                tolerance: self.tolerance,
                best: RefCell::new(None),
            };
            accel
                .tree
                .items_containing(point, &tester)
                .into_iter()
                .map(|id| accel.entries[id as usize].key)
                .collect()
        })
    }

    /// Keys of every node carrying a primitive, in storage order.
    pub fn primitives(&self) -> Vec<NodeKey> {
        self.nodes
            .iter()
            .filter(|(_, node)| matches!(node.content, NodeContent::Primitive(_)))
            .map(|(key, _)| key)
            .collect()
    }

    /// Keys of every observer node, in storage order.
    pub fn observers(&self) -> Vec<NodeKey> {
        self.nodes
            .iter()
            .filter(|(_, node)| matches!(node.content, NodeContent::Observer))
            .map(|(key, _)| key)
            .collect()
    }

    /// Root-space bounding box of the node's subtree. Empty when the
    /// subtree holds no primitives.
    pub fn node_bounding_box(&self, key: NodeKey) -> Result<Aabb3> {
        self.node(key)?;
        let mut bounds = Aabb3::empty();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            let node = self.node(k)?;
            if let NodeContent::Primitive(primitive) = &node.content {
                bounds.include(&primitive.bounding_box().transform(&node.to_root));
            }
            stack.extend(node.children.iter().copied());
        }
        Ok(bounds)
    }
}

/// Leaf test bridging kd-tree item ids to precise primitive tests.
///
/// Candidate rays are mapped into each primitive's local space through the
/// snapshot transforms; crossing distances are compared in root space so
/// non-uniform scales cannot reorder hits.
struct WorldLeafTest<'a> {
    entries: &'a [SceneEntry],
    tolerance: Tolerance,
    best: RefCell<Option<SceneIntersection>>,
}

impl WorldLeafTest<'_> {
    fn test_entry(&self, entry: &SceneEntry, ray: &Ray) {
        let local_origin = entry.from_root.apply_point(&ray.origin);
        let local_dir = entry.from_root.apply_vector(ray.direction.as_ref());
        // A singular transform cannot reach this point, but a denormal
        // scale could still collapse the direction.
        let Ok(local_ray) = Ray::new(local_origin, local_dir) else {
            return;
        };
        let Some(event) = entry.primitive.hit(&local_ray) else {
            return;
        };

        let point = entry.to_root.apply_point(&event.point);
        let t = (point - ray.origin).norm();
        if t > ray.max_distance {
            return;
        }

        let mut best = self.best.borrow_mut();
        if best.as_ref().map_or(true, |b| t < b.t) {
            let normal = entry.to_root.apply_normal(&event.normal).normalize();
            let offset = self.tolerance.surface_offset;
            *best = Some(SceneIntersection {
                node: entry.key,
                t,
                point,
                normal,
                exiting: event.exiting,
                inside_point: point - normal * offset,
                outside_point: point + normal * offset,
                to_local: entry.from_root.clone(),
                to_world: entry.to_root.clone(),
            });
        }
    }
}

impl LeafTest3 for WorldLeafTest<'_> {
    fn leaf_trace(&self, items: &[u32], ray: &Ray, max_range: f64) -> bool {
        for &id in items {
            self.test_entry(&self.entries[id as usize], ray);
        }
        // Only a hit inside the current cell can end the traversal; a
        // farther hit stays recorded and competes in later cells.
        self.best
            .borrow()
            .as_ref()
            .is_some_and(|best| best.t <= max_range)
    }

    fn leaf_contains(&self, items: &[u32], point: &Point3, hits: &mut Vec<u32>) {
        for &id in items {
            let entry = &self.entries[id as usize];
            let local = entry.from_root.apply_point(point);
            if entry.primitive.contains(&local) {
                hits.push(id);
            }
        }
    }
}
