//! Scene node storage.

use std::sync::Arc;

use raycore_math::Transform;
use raycore_primitives::Primitive;
use slotmap::new_key_type;

new_key_type! {
    /// Stable key for a node within a [`World`](crate::World).
    ///
    /// Keys remain valid while other nodes are attached or detached and
    /// become invalid only when their own node is removed.
    pub struct NodeKey;
}

/// What a scene node holds.
#[derive(Debug)]
pub enum NodeContent {
    /// A pure grouping node; contributes only its transform.
    Group,
    /// A solid surface that participates in ray queries.
    Primitive(Arc<dyn Primitive>),
    /// A non-geometric endpoint such as a camera or detector. Observers
    /// are positioned by the graph but never intersected.
    Observer,
}

/// One node of the scene graph.
///
/// Nodes are created free-standing and wired into a hierarchy with
/// [`World::attach`](crate::World::attach). The node's `transform` maps its
/// local space into its parent's space; the world keeps the composed
/// node-to-root and root-to-node transforms up to date.
#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) transform: Transform,
    pub(crate) content: NodeContent,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) to_root: Transform,
    pub(crate) from_root: Transform,
}

impl Node {
    fn with_content(name: &str, content: NodeContent) -> Self {
        Self {
            name: name.to_owned(),
            transform: Transform::identity(),
            content,
            parent: None,
            children: Vec::new(),
            to_root: Transform::identity(),
            from_root: Transform::identity(),
        }
    }

    /// A grouping node.
    pub fn group(name: &str) -> Self {
        Self::with_content(name, NodeContent::Group)
    }

    /// A node carrying a solid primitive.
    pub fn primitive(name: &str, primitive: Arc<dyn Primitive>) -> Self {
        Self::with_content(name, NodeContent::Primitive(primitive))
    }

    /// An observer node.
    pub fn observer(name: &str) -> Self {
        Self::with_content(name, NodeContent::Observer)
    }

    /// Set the local transform before attaching.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local transform relative to the parent node.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Composed transform from this node's space to root space.
    pub fn to_root(&self) -> &Transform {
        &self.to_root
    }

    /// Composed transform from root space to this node's space.
    pub fn from_root(&self) -> &Transform {
        &self.from_root
    }

    /// Parent key, `None` for the root.
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Child keys in attachment order.
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// The node's content.
    pub fn content(&self) -> &NodeContent {
        &self.content
    }
}
