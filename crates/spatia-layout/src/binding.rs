#![forbid(unsafe_code)]

//! Host scene-graph boundary.
//!
//! The engine never owns host nodes. A host implements [`NodeBinding`] to
//! expose topology, transforms and geometry, and receives computed states
//! through [`NodeBinding::commit`]. Internally every host node is mapped to
//! a dense [`NodeKey`] that indexes the engine's side tables.

use std::fmt::Debug;
use std::hash::Hash;

use spatia_core::{Box3, Quat, Vec3};

use crate::state::NodeState;

/// Dense slot id of a node inside one `SpatialSystem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub(crate) u32);

impl NodeKey {
    /// Slot index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Local transform snapshot of a host node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    /// Position relative to the parent.
    pub position: Vec3,
    /// Orientation relative to the parent.
    pub orientation: Quat,
    /// Scale relative to the parent.
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            orientation: Quat::identity(),
            scale: Vec3::repeat(1.0),
        }
    }
}

impl NodeTransform {
    /// Builder: set position.
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Builder: set orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    /// Builder: set scale.
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }
}

/// Computed placement handed back to the host once per frame.
#[derive(Debug)]
pub struct NodeUpdate<'a, N> {
    /// Smoothed state to render this frame.
    pub current: &'a NodeState,
    /// State the node is transitioning toward.
    pub target: &'a NodeState,
    /// Smoothed opacity.
    pub opacity: f64,
    /// Parent the node should be attached to, if it differs from the host's.
    pub parent: Option<N>,
    /// The node was flagged for removal from its parent.
    pub detach: bool,
}

/// Capabilities the engine needs from a host scene graph.
pub trait NodeBinding {
    /// Host node handle.
    type Node: Copy + Eq + Hash + Debug;

    /// Whether `node` is a live node of this scene.
    fn contains(&self, node: Self::Node) -> bool {
        let _ = node;
        true
    }

    /// Current parent.
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    /// Ordered children, appended to `out`.
    fn children(&self, node: Self::Node, out: &mut Vec<Self::Node>);

    /// Local transform.
    fn transform(&self, node: Self::Node) -> NodeTransform;

    /// Bounds of geometry owned directly by `node`, in its local space.
    fn intrinsic_bounds(&self, node: Self::Node) -> Box3 {
        let _ = node;
        Box3::empty()
    }

    /// Receive the computed states of an adaptive node.
    fn commit(&mut self, node: Self::Node, update: &NodeUpdate<'_, Self::Node>) {
        let _ = (node, update);
    }
}
