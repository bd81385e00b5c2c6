#![forbid(unsafe_code)]

//! A minimal in-memory scene graph.
//!
//! [`SceneGraph`] implements [`NodeBinding`] over plain vectors. Hosts with
//! their own scene graph implement the trait directly; this one backs tests,
//! benchmarks and headless tools. Committed updates are written back into
//! the node transforms, so repeated frames see the engine's own output.

use spatia_core::{Box3, Quat, Vec3};

use crate::binding::{NodeBinding, NodeTransform, NodeUpdate};

/// Handle of a node in a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneNode(u32);

#[derive(Debug, Clone, Default)]
struct SceneEntry {
    parent: Option<SceneNode>,
    children: Vec<SceneNode>,
    transform: NodeTransform,
    bounds: Option<Box3>,
    opacity: f64,
    commits: u64,
}

/// Vector-backed scene graph.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    entries: Vec<SceneEntry>,
    apply_commits: bool,
}

impl SceneGraph {
    /// Empty scene that writes committed current states back into nodes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            apply_commits: true,
        }
    }

    /// Builder: whether commits overwrite node transforms.
    #[must_use]
    pub fn with_apply_commits(mut self, apply: bool) -> Self {
        self.apply_commits = apply;
        self
    }

    /// Add a root node.
    pub fn add_node(&mut self) -> SceneNode {
        let id = SceneNode(self.entries.len() as u32);
        self.entries.push(SceneEntry {
            opacity: 1.0,
            ..SceneEntry::default()
        });
        id
    }

    /// Add a node under `parent`.
    pub fn add_child(&mut self, parent: SceneNode) -> SceneNode {
        let id = self.add_node();
        self.set_parent(id, Some(parent));
        id
    }

    /// Re-attach `node` (appended last among its new siblings).
    pub fn set_parent(&mut self, node: SceneNode, parent: Option<SceneNode>) {
        if let Some(old) = self.entry(node).and_then(|e| e.parent) {
            if let Some(e) = self.entry_mut(old) {
                e.children.retain(|c| *c != node);
            }
        }
        if let Some(p) = parent {
            if let Some(e) = self.entry_mut(p) {
                e.children.push(node);
            }
        }
        if let Some(e) = self.entry_mut(node) {
            e.parent = parent;
        }
    }

    /// Replace the local transform.
    pub fn set_transform(&mut self, node: SceneNode, transform: NodeTransform) {
        if let Some(e) = self.entry_mut(node) {
            e.transform = transform;
        }
    }

    /// Set local position.
    pub fn set_position(&mut self, node: SceneNode, position: Vec3) {
        if let Some(e) = self.entry_mut(node) {
            e.transform.position = position;
        }
    }

    /// Set local orientation.
    pub fn set_orientation(&mut self, node: SceneNode, orientation: Quat) {
        if let Some(e) = self.entry_mut(node) {
            e.transform.orientation = orientation;
        }
    }

    /// Set local scale.
    pub fn set_scale(&mut self, node: SceneNode, scale: Vec3) {
        if let Some(e) = self.entry_mut(node) {
            e.transform.scale = scale;
        }
    }

    /// Attach geometry bounds (local space).
    pub fn set_intrinsic_bounds(&mut self, node: SceneNode, bounds: Box3) {
        if let Some(e) = self.entry_mut(node) {
            e.bounds = Some(bounds);
        }
    }

    /// Last committed opacity (1.0 if never committed).
    #[must_use]
    pub fn opacity(&self, node: SceneNode) -> f64 {
        self.entry(node).map_or(1.0, |e| e.opacity)
    }

    /// Number of commits received by `node`.
    #[must_use]
    pub fn commit_count(&self, node: SceneNode) -> u64 {
        self.entry(node).map_or(0, |e| e.commits)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scene has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, node: SceneNode) -> Option<&SceneEntry> {
        self.entries.get(node.0 as usize)
    }

    fn entry_mut(&mut self, node: SceneNode) -> Option<&mut SceneEntry> {
        self.entries.get_mut(node.0 as usize)
    }
}

impl NodeBinding for SceneGraph {
    type Node = SceneNode;

    fn contains(&self, node: SceneNode) -> bool {
        self.entry(node).is_some()
    }

    fn parent(&self, node: SceneNode) -> Option<SceneNode> {
        self.entry(node).and_then(|e| e.parent)
    }

    fn children(&self, node: SceneNode, out: &mut Vec<SceneNode>) {
        if let Some(e) = self.entry(node) {
            out.extend_from_slice(&e.children);
        }
    }

    fn transform(&self, node: SceneNode) -> NodeTransform {
        self.entry(node).map(|e| e.transform).unwrap_or_default()
    }

    fn intrinsic_bounds(&self, node: SceneNode) -> Box3 {
        self.entry(node)
            .and_then(|e| e.bounds)
            .unwrap_or_else(Box3::empty)
    }

    fn commit(&mut self, node: SceneNode, update: &NodeUpdate<'_, SceneNode>) {
        let apply = self.apply_commits;
        if apply && update.parent != self.parent(node) {
            self.set_parent(node, update.parent);
        }
        if let Some(e) = self.entry_mut(node) {
            e.commits += 1;
            e.opacity = update.opacity;
            if apply {
                e.transform = NodeTransform {
                    position: *update.current.local_position(),
                    orientation: *update.current.local_orientation(),
                    scale: *update.current.local_scale(),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reparenting_moves_child_lists() {
        let mut scene = SceneGraph::new();
        let a = scene.add_node();
        let b = scene.add_node();
        let c = scene.add_child(a);
        scene.set_parent(c, Some(b));
        let mut out = Vec::new();
        scene.children(a, &mut out);
        assert!(out.is_empty());
        scene.children(b, &mut out);
        assert_eq!(out, vec![c]);
        assert_eq!(scene.parent(c), Some(b));
    }

    #[test]
    fn unknown_nodes_have_defaults() {
        let scene = SceneGraph::new();
        let ghost = SceneNode(9);
        assert!(!scene.contains(ghost));
        assert_eq!(scene.transform(ghost), NodeTransform::default());
        assert!(scene.intrinsic_bounds(ghost).is_empty());
    }
}
