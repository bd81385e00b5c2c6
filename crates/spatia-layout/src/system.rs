#![forbid(unsafe_code)]

//! Per-frame driver.
//!
//! [`SpatialSystem`] owns the side tables that map host nodes to metrics and
//! adapters, the shared view, the memoization cache and the optimizer. The
//! host calls [`SpatialSystem::update`] once per frame:
//!
//! ```text
//! update(dt)
//!   ├─ bump frame, invalidate_all, refresh view
//!   ├─ snapshot occluders (previous targets)
//!   ├─ for each adaptive node: update_node
//!   │     ├─ host parent first
//!   │     ├─ inner bounds (recursive, non-context children)
//!   │     ├─ optimize every layout, select, stage, advance transitions
//!   │     └─ current / target states under the active parent
//!   ├─ occlusion pass (current and target)
//!   └─ binding.commit(node, update) for each adaptive node
//! ```
//!
//! # Invariants
//!
//! 1. A node is recomputed at most once per cache generation.
//! 2. A parent is always computed before its children.
//! 3. Metrics reads between frames never advance the optimizer or the
//!    transitions.
//!
//! # Failure Modes
//!
//! - Unknown host nodes and cyclic parent assignments return `Err`.
//! - Degenerate geometry is never an error: divisors are epsilon-guarded and
//!   unfit candidates rank last.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use spatia_core::geometry::compose;
use spatia_core::{Box3, LayoutFrustum, Mat4, MemoStats, MemoizationCache, Vec2};
use tracing::{debug, info_span, trace, warn};

use crate::adapter::{ParentOverride, SpatialAdapter};
use crate::binding::{NodeBinding, NodeKey, NodeUpdate};
use crate::config::{SpatialConfig, resolve_transition};
use crate::error::{LayoutError, Result};
use crate::metrics::{Occluder, Placement, PlacementFrame, SpatialMetrics, occlusion_against};
use crate::optimizer::{Evaluator, SearchSpace, SpatialOptimizer};
use crate::solution::LayoutSolution;
use crate::state::{NodeState, ViewState};

/// Adaptive layout engine bound to one host scene.
#[derive(Debug)]
pub struct SpatialSystem<B: NodeBinding> {
    binding: B,
    keys: FxHashMap<B::Node, NodeKey>,
    nodes: Vec<B::Node>,
    metrics: Vec<SpatialMetrics>,
    adapters: Vec<Option<SpatialAdapter>>,
    view: Arc<ViewState>,
    view_node: Option<B::Node>,
    view_pose: Mat4,
    frustum: LayoutFrustum,
    resolution: Vec2,
    cache: MemoizationCache,
    config: SpatialConfig,
    optimizer: SpatialOptimizer,
    occluders: Vec<Occluder>,
    visiting: FxHashSet<NodeKey>,
    stepping: bool,
    delta_time: f64,
    elapsed: f64,
    frame: u64,
}

impl<B: NodeBinding> SpatialSystem<B> {
    /// System with the default configuration.
    #[must_use]
    pub fn new(binding: B) -> Self {
        Self::build(binding, SpatialConfig::default())
    }

    /// System with a validated configuration.
    pub fn with_config(binding: B, config: SpatialConfig) -> Result<Self> {
        Ok(Self::build(binding, config.validated()?))
    }

    fn build(binding: B, config: SpatialConfig) -> Self {
        let view = ViewState::default();
        Self {
            binding,
            keys: FxHashMap::default(),
            nodes: Vec::new(),
            metrics: Vec::new(),
            adapters: Vec::new(),
            view_node: None,
            view_pose: *view.pose(),
            frustum: view.frustum().clone(),
            resolution: *view.resolution(),
            view: Arc::new(view),
            cache: MemoizationCache::new(),
            optimizer: SpatialOptimizer::new(config.optimize.seed),
            config,
            occluders: Vec::new(),
            visiting: FxHashSet::default(),
            stepping: false,
            delta_time: 0.0,
            elapsed: 0.0,
            frame: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn binding(&self) -> &B {
        &self.binding
    }

    /// Mutable host scene. Every cached value is invalidated.
    pub fn binding_mut(&mut self) -> &mut B {
        self.cache.invalidate_all();
        &mut self.binding
    }

    #[must_use]
    pub fn config(&self) -> &SpatialConfig {
        &self.config
    }

    /// Shared view of the last refresh.
    #[must_use]
    pub fn view(&self) -> &Arc<ViewState> {
        &self.view
    }

    /// Number of completed [`update`](Self::update) calls.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[must_use]
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Hit/miss statistics of the bounds cache.
    #[must_use]
    pub fn cache_stats(&self) -> MemoStats {
        self.cache.stats()
    }

    // -----------------------------------------------------------------------
    // View
    // -----------------------------------------------------------------------

    /// Set the viewer's field of view.
    pub fn set_view_frustum(&mut self, frustum: LayoutFrustum) {
        self.frustum = frustum;
        self.refresh_view();
    }

    /// Set the output resolution in pixels.
    pub fn set_view_resolution(&mut self, resolution: Vec2) {
        self.resolution = resolution;
        self.refresh_view();
    }

    /// Follow a host node as the viewer (`None` uses the explicit pose).
    pub fn set_view_node(&mut self, node: Option<B::Node>) -> Result<()> {
        if let Some(node) = node {
            self.key(node)?;
        }
        self.view_node = node;
        self.refresh_view();
        Ok(())
    }

    /// Set the viewer's world pose (used when no view node is set).
    pub fn set_view_pose(&mut self, pose: Mat4) {
        self.view_pose = pose;
        self.refresh_view();
    }

    fn refresh_view(&mut self) {
        let pose = match self.view_node {
            Some(node) => self.host_world(node),
            None => self.view_pose,
        };
        self.view = Arc::new(ViewState::new(pose, self.frustum.clone(), self.resolution));
        self.cache.invalidate_all();
    }

    /// World matrix of a host node from the host's own transforms.
    fn host_world(&self, node: B::Node) -> Mat4 {
        let mut world = Mat4::identity();
        let mut cursor = Some(node);
        let mut depth = 0;
        while let Some(n) = cursor {
            let t = self.binding.transform(n);
            world = compose(&t.position, &t.orientation, &t.scale) * world;
            cursor = self.binding.parent(n);
            depth += 1;
            if depth > self.nodes.len() + 64 {
                warn!(node = ?node, "host parent chain does not terminate");
                break;
            }
        }
        world
    }

    // -----------------------------------------------------------------------
    // Keys
    // -----------------------------------------------------------------------

    /// Slot of `node`, created on first reference.
    pub fn key(&mut self, node: B::Node) -> Result<NodeKey> {
        if let Some(key) = self.keys.get(&node) {
            return Ok(*key);
        }
        if !self.binding.contains(node) {
            return Err(LayoutError::unknown_node(node));
        }
        let key = NodeKey(self.nodes.len() as u32);
        self.keys.insert(node, key);
        self.nodes.push(node);
        self.metrics
            .push(SpatialMetrics::new(key, Arc::clone(&self.view)));
        self.adapters.push(None);
        trace!(node = ?node, key = key.0, "node registered");
        Ok(key)
    }

    /// Host node of a slot.
    pub fn node(&self, key: NodeKey) -> Result<B::Node> {
        self.nodes
            .get(key.index())
            .copied()
            .ok_or(LayoutError::UnknownKey { key })
    }

    fn host_parent(&mut self, key: NodeKey) -> Result<Option<NodeKey>> {
        let node = self.nodes[key.index()];
        self.binding
            .parent(node)
            .map(|parent| self.key(parent))
            .transpose()
    }

    /// Parent a node is laid out under, following adapter overrides.
    fn effective_parent(&mut self, key: NodeKey) -> Result<Option<NodeKey>> {
        let host = self.host_parent(key)?;
        Ok(match self.adapters[key.index()].as_ref() {
            Some(adapter) => adapter.layout_parent(adapter.active_layout(), host),
            None => host,
        })
    }

    // -----------------------------------------------------------------------
    // Metrics and adapters
    // -----------------------------------------------------------------------

    /// Up-to-date metrics of `node`.
    pub fn metrics(&mut self, node: B::Node) -> Result<&SpatialMetrics> {
        let key = self.key(node)?;
        self.update_node(key)?;
        Ok(&self.metrics[key.index()])
    }

    /// Adapter of `node`, created on first access. Creating an adapter makes
    /// the node adaptive and a bounding context.
    pub fn adapter(&mut self, node: B::Node) -> Result<&mut SpatialAdapter> {
        let key = self.key(node)?;
        let i = key.index();
        if self.adapters[i].is_none() {
            self.update_node(key)?;
            let placement = Placement::of(self.metrics[i].raw());
            self.adapters[i] = Some(SpatialAdapter::new(key, &placement));
            self.metrics[i].set_adaptive(true);
            self.cache.invalidate_all();
            debug!(node = ?node, "adapter created");
        }
        self.adapters[i]
            .as_mut()
            .ok_or(LayoutError::UnknownKey { key })
    }

    /// Adapter of `node` if it has one.
    #[must_use]
    pub fn find_adapter(&self, node: B::Node) -> Option<&SpatialAdapter> {
        let key = self.keys.get(&node)?;
        self.adapters[key.index()].as_ref()
    }

    /// Remove the adapter of `node`, returning it.
    pub fn remove_adapter(&mut self, node: B::Node) -> Result<Option<SpatialAdapter>> {
        let key = self.key(node)?;
        let removed = self.adapters[key.index()].take();
        if removed.is_some() {
            self.metrics[key.index()].set_adaptive(false);
            self.cache.invalidate_all();
        }
        Ok(removed)
    }

    /// Exclude (or include) `node` from its parent's inner bounds.
    pub fn set_bounding_context(&mut self, node: B::Node, flag: bool) -> Result<()> {
        let key = self.key(node)?;
        self.metrics[key.index()].set_bounding_context(flag);
        self.cache.invalidate_all();
        Ok(())
    }

    /// Mark `node`, its descendants and its ancestors dirty.
    pub fn invalidate(&mut self, node: B::Node) -> Result<()> {
        let key = self.key(node)?;
        let mut stack = vec![node];
        let mut children = Vec::new();
        while let Some(n) = stack.pop() {
            let k = self.key(n)?;
            self.metrics[k.index()].mark_dirty();
            children.clear();
            self.binding.children(n, &mut children);
            stack.extend(children.iter().copied());
        }
        let mut cursor = self.host_parent(key)?;
        while let Some(k) = cursor {
            if k == key {
                break;
            }
            self.metrics[k.index()].mark_dirty();
            cursor = self.host_parent(k)?;
        }
        Ok(())
    }

    /// Lay `node` out under `parent` (`None` returns to the host parent).
    ///
    /// Fails if `parent` is `node` or one of its descendants.
    pub fn set_target_parent(&mut self, node: B::Node, parent: Option<B::Node>) -> Result<()> {
        let key = self.key(node)?;
        let parent_key = parent.map(|p| self.key(p)).transpose()?;
        if let Some(start) = parent_key
            && self.reaches(start, key)?
        {
            return Err(LayoutError::cyclic(node, parent));
        }
        let adapter = self.adapter(node)?;
        adapter.set_parent_override(parent_key.map_or(ParentOverride::Keep, ParentOverride::Reparent));
        self.cache.invalidate_all();
        Ok(())
    }

    /// Lay `node` out under `parent` while layout `index` of its adapter is
    /// active (`None` defers to the adapter's parent).
    ///
    /// Fails if `parent` is `node` or one of its descendants.
    pub fn set_layout_parent(
        &mut self,
        node: B::Node,
        index: usize,
        parent: Option<B::Node>,
    ) -> Result<()> {
        let key = self.key(node)?;
        let parent_key = parent.map(|p| self.key(p)).transpose()?;
        if let Some(start) = parent_key
            && self.reaches(start, key)?
        {
            return Err(LayoutError::cyclic(node, parent));
        }
        let layout = self
            .adapter(node)?
            .layout_mut(index)
            .ok_or_else(|| LayoutError::unknown_layout(node, index))?;
        layout.set_target_parent(parent_key);
        self.cache.invalidate_all();
        Ok(())
    }

    /// Whether walking effective parents up from `start` reaches `key`.
    fn reaches(&mut self, start: NodeKey, key: NodeKey) -> Result<bool> {
        let mut cursor = Some(start);
        let mut steps = 0;
        while let Some(k) = cursor {
            if k == key {
                return Ok(true);
            }
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
            cursor = self.effective_parent(k)?;
        }
        Ok(false)
    }

    /// Flag `node` for removal: it fades out and is laid out in world space.
    pub fn detach(&mut self, node: B::Node) -> Result<()> {
        self.adapter(node)?.set_parent_override(ParentOverride::Detach);
        self.cache.invalidate_all();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    /// Advance one frame: optimize, transition and commit every adaptive
    /// node.
    pub fn update(&mut self, delta_time: f64, elapsed: f64) -> Result<()> {
        let _span = info_span!("spatial_update", frame = self.frame + 1).entered();
        self.frame += 1;
        self.delta_time = delta_time.max(0.0);
        self.elapsed = elapsed;
        self.refresh_view();

        let adaptive: Vec<NodeKey> = self
            .adapters
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_some())
            .map(|(i, _)| NodeKey(i as u32))
            .collect();

        self.occluders = adaptive
            .iter()
            .map(|k| Occluder::of(*k, self.metrics[k.index()].target()))
            .collect();

        self.stepping = true;
        let stepped = adaptive.iter().try_for_each(|k| self.update_node(*k));
        self.stepping = false;
        stepped?;

        self.occlusion_pass(&adaptive);
        self.commit(&adaptive);

        trace!(
            adaptive = adaptive.len(),
            generation = self.cache.generation(),
            "frame complete"
        );
        Ok(())
    }

    fn occlusion_pass(&mut self, adaptive: &[NodeKey]) {
        let current: Vec<Occluder> = adaptive
            .iter()
            .map(|k| Occluder::of(*k, self.metrics[k.index()].current()))
            .collect();
        let target: Vec<Occluder> = adaptive
            .iter()
            .map(|k| Occluder::of(*k, self.metrics[k.index()].target()))
            .collect();
        for (n, key) in adaptive.iter().enumerate() {
            let (occluding, occluded) = occlusion_against(&current[n], &current);
            let (t_occluding, t_occluded) = occlusion_against(&target[n], &target);
            let (cur, tgt) = self.metrics[key.index()].states_mut();
            cur.set_occlusion(occluding, occluded);
            tgt.set_occlusion(t_occluding, t_occluded);
        }
    }

    fn commit(&mut self, adaptive: &[NodeKey]) {
        for key in adaptive {
            let i = key.index();
            let Some(adapter) = self.adapters[i].as_ref() else {
                continue;
            };
            let metrics = &self.metrics[i];
            let update = NodeUpdate {
                current: metrics.current(),
                target: metrics.target(),
                opacity: *adapter.opacity().current(),
                parent: adapter.resolved_parent().map(|p| self.nodes[p.index()]),
                detach: adapter.is_detached(),
            };
            self.binding.commit(self.nodes[i], &update);
        }
    }

    // -----------------------------------------------------------------------
    // Node update
    // -----------------------------------------------------------------------

    fn update_node(&mut self, key: NodeKey) -> Result<()> {
        let i = key.index();
        if i >= self.metrics.len() {
            return Err(LayoutError::UnknownKey { key });
        }
        if !self.metrics[i].is_dirty(&self.cache) {
            return Ok(());
        }
        if !self.visiting.insert(key) {
            let node = self.nodes[i];
            return Err(LayoutError::cyclic(node, node));
        }
        let result = self.compute_node(key);
        self.visiting.remove(&key);
        result
    }

    fn compute_node(&mut self, key: NodeKey) -> Result<()> {
        let i = key.index();
        let node = self.nodes[i];
        let host_parent = self.host_parent(key)?;
        if let Some(parent) = host_parent {
            self.update_node(parent)?;
        }
        let inner = self.inner_bounds(key, 0)?;
        let transform = self.binding.transform(node);
        let view = Arc::clone(&self.view);
        let (raw_world, current_world, target_world) = match host_parent {
            Some(parent) => {
                let m = &self.metrics[parent.index()];
                (
                    *m.raw().world_matrix(),
                    *m.current().world_matrix(),
                    *m.target().world_matrix(),
                )
            }
            None => (Mat4::identity(), Mat4::identity(), Mat4::identity()),
        };
        let raw = NodeState::new(host_parent, &transform, raw_world, Arc::clone(&view), inner);

        let Some(mut adapter) = self.adapters[i].take() else {
            let current =
                NodeState::new(host_parent, &transform, current_world, Arc::clone(&view), inner);
            let target = NodeState::new(host_parent, &transform, target_world, view, inner);
            self.metrics[i].store(&self.cache, raw, current, target);
            return Ok(());
        };
        let result = self.drive_adapter(key, &mut adapter, raw, host_parent, inner);
        self.adapters[i] = Some(adapter);
        result
    }

    /// Intrinsic bounds united with every non-context child's inner bounds,
    /// in the node's local space.
    fn inner_bounds(&mut self, key: NodeKey, depth: usize) -> Result<Box3> {
        let i = key.index();
        if let Some(inner) = self.metrics[i].inner.get(&self.cache) {
            return Ok(*inner);
        }
        let node = self.nodes[i];
        if depth > self.nodes.len() {
            return Err(LayoutError::cyclic(node, node));
        }
        let binding = &self.binding;
        let mut bounds = *self.metrics[i]
            .intrinsic
            .get_or_compute(&self.cache, || binding.intrinsic_bounds(node));

        let mut children = Vec::new();
        self.binding.children(node, &mut children);
        for child in children {
            let child_key = self.key(child)?;
            if self.metrics[child_key.index()].is_bounding_context() {
                continue;
            }
            let child_inner = self.inner_bounds(child_key, depth + 1)?;
            if child_inner.is_empty() {
                continue;
            }
            let t = self.binding.transform(child);
            let local = compose(&t.position, &t.orientation, &t.scale);
            bounds = bounds.union(&child_inner.transformed(&local));
        }

        let bounds = bounds.inflate_degenerate(self.config.epsilon.meters);
        self.metrics[i].inner.set(&self.cache, bounds);
        Ok(bounds)
    }

    fn drive_adapter(
        &mut self,
        key: NodeKey,
        adapter: &mut SpatialAdapter,
        raw: NodeState,
        host_parent: Option<NodeKey>,
        inner: Box3,
    ) -> Result<()> {
        if self.stepping {
            self.step_adapter(key, adapter, host_parent, inner)?;
        }

        let mut parent = adapter.layout_parent(adapter.active_layout(), host_parent);
        if let Some(p) = parent
            && self.reaches(p, key)?
        {
            warn!(key = ?key, parent = ?p, "cyclic layout parent, keeping host parent");
            parent = host_parent;
        }
        if let Some(parent) = parent {
            self.update_node(parent)?;
        }
        let (current_world, target_world) = match parent {
            Some(p) => {
                let m = &self.metrics[p.index()];
                (*m.current().world_matrix(), *m.target().world_matrix())
            }
            None => (Mat4::identity(), Mat4::identity()),
        };
        let eps = self.config.epsilon.meters;
        let view = Arc::clone(&self.view);
        let target = PlacementFrame::new(parent, target_world, inner, Arc::clone(&view), eps)
            .state_for(&adapter.target_placement());
        let current = PlacementFrame::new(parent, current_world, inner, view, eps)
            .state_for(&adapter.current_placement());
        adapter.set_resolved_parent(parent);
        self.metrics[key.index()].store(&self.cache, raw, current, target);
        Ok(())
    }

    /// Optimize every layout, pick the active one and advance transitions.
    fn step_adapter(
        &mut self,
        key: NodeKey,
        adapter: &mut SpatialAdapter,
        host_parent: Option<NodeKey>,
        inner: Box3,
    ) -> Result<()> {
        let mut parents: SmallVec<[Option<NodeKey>; 4]> = (0..adapter.layouts().len())
            .map(|l| adapter.layout_parent(Some(l), host_parent))
            .collect();
        let mut skipped: SmallVec<[bool; 4]> = SmallVec::from_elem(false, parents.len());
        for (l, parent) in parents.iter_mut().enumerate() {
            if let Some(p) = *parent
                && self.reaches(p, key)?
            {
                warn!(key = ?key, layout = l, parent = ?p, "cyclic layout parent, layout skipped");
                skipped[l] = true;
                *parent = None;
            }
        }
        for parent in parents.iter().flatten() {
            self.update_node(*parent)?;
        }

        let target = adapter.target_placement();
        let adapter_options = *adapter.optimize_options();
        let epsilon = self.config.epsilon;
        let view = Arc::clone(&self.view);
        for (l, parent) in parents.iter().enumerate() {
            if skipped[l] {
                adapter.layouts_mut()[l].solutions.clear();
                continue;
            }
            let parent_state = parent.map(|p| self.metrics[p.index()].target());
            let parent_world = parent_state.map_or_else(Mat4::identity, |s| *s.world_matrix());
            let frame = PlacementFrame::new(*parent, parent_world, inner, Arc::clone(&view), epsilon.meters);
            let layout = &mut adapter.layouts_mut()[l];
            let config = layout
                .optimize_options()
                .or(&adapter_options)
                .resolve(&self.config.optimize);
            let reference =
                LayoutSolution::new(target.orientation, target.bounds, config.step_size_start);
            let evaluator = Evaluator {
                key,
                frame: &frame,
                parent: parent_state,
                occluders: &self.occluders,
                epsilon: &epsilon,
            };
            let space = SearchSpace {
                reference: &reference,
                view: &view,
            };
            self.optimizer
                .update_layout(layout, &evaluator, &space, &config);
        }

        let tolerance = adapter_options
            .relative_tolerance
            .unwrap_or(self.config.optimize.relative_tolerance);
        adapter.select_layout(self.frame, tolerance);
        adapter.stage_active();
        let opacity = if adapter.is_detached() { 0.0 } else { 1.0 };
        adapter.opacity_mut().set_target(opacity);

        let transition = {
            let adapter_layer = adapter.transition_options();
            match adapter.active() {
                Some(layout) => resolve_transition(
                    &[layout.transition_options(), adapter_layer],
                    &self.config.transition,
                ),
                None => resolve_transition(&[adapter_layer], &self.config.transition),
            }
        };
        adapter.advance(self.delta_time, &transition, self.frame);
        Ok(())
    }
}
