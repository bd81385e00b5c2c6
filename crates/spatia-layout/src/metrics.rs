#![forbid(unsafe_code)]

//! Hierarchical spatial metrics.
//!
//! One [`SpatialMetrics`] entry exists per referenced node. It holds the
//! node's intrinsic and inner bounds and three [`NodeState`]s:
//!
//! - **raw**: exactly what the host binding reports.
//! - **target**: where the node should end up; for adaptive nodes this is the
//!   adapter's target placement, for others the raw local transform under
//!   the parent's target.
//! - **current**: what to render this frame; the adapter's smoothed
//!   placement, or the raw local transform under the parent's current.
//!
//! Entries are stamped with the [`MemoizationCache`] generation of the frame
//! they were computed in. A stale entry is recomputed by the system before it
//! is read.
//!
//! # Placement
//!
//! A [`Placement`] is an orientation plus a box whose center is in world
//! space and whose size runs along the oriented axes, in meters. The
//! [`PlacementFrame`] converts placements into local transforms:
//!
//! ```text
//! world_scale       = size / inner_size          (guarded)
//! local_orientation = parent_orientation^-1 * orientation
//! local_scale[i]    = world_scale[i] / |parent_linear * (local_orientation * e_i)|
//! local_position    = parent_world^-1 * center - L * inner_center
//! ```
//!
//! Empty inner bounds behave as a unit box centered at the origin.

use std::sync::Arc;

use spatia_core::geometry::{compose, decompose, guard_divisor};
use spatia_core::{Box3, Cached, Mat4, MemoizationCache, Point, Quat, Rect2, Vec3};

use crate::binding::{NodeKey, NodeTransform};
use crate::state::{NodeState, ViewState};

/// Factor applied to `epsilon.meters` when guarding scale divisors.
pub const DIVISOR_GUARD_FACTOR: f64 = 10.0;

// ===========================================================================
// Placement
// ===========================================================================

/// Orientation plus oriented world box of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// World orientation.
    pub orientation: Quat,
    /// Center in world space, size along the oriented axes (meters).
    pub bounds: Box3,
}

impl Placement {
    /// Placement currently occupied by `state`.
    #[must_use]
    pub fn of(state: &NodeState) -> Self {
        let inner = effective_inner(state.layout_bounds());
        let center = state.world_matrix().transform_point(&inner.center());
        let size = state.world_scale().abs().component_mul(&inner.size());
        Self {
            orientation: state.world_orientation(),
            bounds: Box3::from_center_size(center, size),
        }
    }
}

/// Inner bounds used for scaling: empty bounds act as a unit box.
pub(crate) fn effective_inner(inner: &Box3) -> Box3 {
    if inner.is_empty() {
        Box3::unit()
    } else {
        *inner
    }
}

/// Everything needed to turn a [`Placement`] into a [`NodeState`].
#[derive(Debug, Clone)]
pub struct PlacementFrame {
    parent: Option<NodeKey>,
    parent_world: Mat4,
    parent_world_inverse: Mat4,
    parent_orientation: Quat,
    inner: Box3,
    view: Arc<ViewState>,
    epsilon: f64,
}

impl PlacementFrame {
    /// Frame under `parent_world` for a node with the given inner bounds.
    #[must_use]
    pub fn new(
        parent: Option<NodeKey>,
        parent_world: Mat4,
        inner: Box3,
        view: Arc<ViewState>,
        epsilon_meters: f64,
    ) -> Self {
        let (_, parent_orientation, _) = decompose(&parent_world);
        Self {
            parent,
            parent_world_inverse: parent_world.try_inverse().unwrap_or_else(Mat4::identity),
            parent_world,
            parent_orientation,
            inner,
            view,
            epsilon: epsilon_meters,
        }
    }

    /// Parent slot the produced states report.
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Inner bounds of the node (local space).
    #[must_use]
    pub fn inner(&self) -> &Box3 {
        &self.inner
    }

    /// Shared view.
    #[must_use]
    pub fn view(&self) -> &Arc<ViewState> {
        &self.view
    }

    /// Local transform that realizes `placement`.
    #[must_use]
    pub fn local_transform(&self, placement: &Placement) -> NodeTransform {
        let eps = self.epsilon;
        let inner = effective_inner(&self.inner);
        let inner_size = inner.size().map(|v| guard_divisor(v, eps, DIVISOR_GUARD_FACTOR));
        let size = if placement.bounds.is_empty() {
            inner_size
        } else {
            placement.bounds.size()
        };
        let world_scale = size.component_div(&inner_size);

        let orientation = self.parent_orientation.inverse() * placement.orientation;
        let parent_linear = self.parent_world.fixed_view::<3, 3>(0, 0).into_owned();
        let mut scale = Vec3::zeros();
        for i in 0..3 {
            let axis = parent_linear * (orientation * Vec3::ith(i, 1.0));
            let len = guard_divisor(axis.norm(), eps, DIVISOR_GUARD_FACTOR);
            scale[i] = world_scale[i] / len;
        }

        let linear = compose(&Vec3::zeros(), &orientation, &scale);
        let center = if placement.bounds.is_empty() {
            Point::origin()
        } else {
            placement.bounds.center()
        };
        let local_center = self.parent_world_inverse.transform_point(&center);
        let offset = linear.transform_point(&inner.center());
        NodeTransform {
            position: local_center.coords - offset.coords,
            orientation,
            scale,
        }
    }

    /// State of the node at `placement`.
    #[must_use]
    pub fn state_for(&self, placement: &Placement) -> NodeState {
        NodeState::new(
            self.parent,
            &self.local_transform(placement),
            self.parent_world,
            Arc::clone(&self.view),
            self.inner,
        )
    }
}

// ===========================================================================
// Occlusion
// ===========================================================================

/// Visual footprint of an adaptive node, used by the occlusion pass and the
/// occlusion objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occluder {
    /// Node the footprint belongs to.
    pub key: NodeKey,
    /// Visual rectangle (pixels).
    pub rect: Rect2,
    /// Depth of the nearest point (meters).
    pub near: f64,
}

impl Occluder {
    /// Footprint of `state`.
    #[must_use]
    pub fn of(key: NodeKey, state: &NodeState) -> Self {
        let vb = state.visual_bounds();
        Self {
            key,
            rect: Rect2::from_box_xy(vb),
            near: vb.min.z,
        }
    }

    /// Percent of this footprint's diagonal covered by `other`.
    #[must_use]
    pub fn overlap_percent(&self, other: &Occluder) -> f64 {
        let own = self.rect.diagonal();
        if own <= 0.0 {
            return 0.0;
        }
        self.rect
            .intersection_opt(&other.rect)
            .map_or(0.0, |r| r.diagonal() / own * 100.0)
    }
}

/// Accumulate `(occluding, occluded)` percentages of `this` against
/// `others`, skipping entries with the same key.
#[must_use]
pub fn occlusion_against(this: &Occluder, others: &[Occluder]) -> (f64, f64) {
    let mut occluding = 0.0;
    let mut occluded = 0.0;
    for other in others.iter().filter(|o| o.key != this.key) {
        let p = this.overlap_percent(other);
        if p <= 0.0 {
            continue;
        }
        if this.near < other.near {
            occluding += p;
        } else {
            occluded += p;
        }
    }
    (occluding, occluded)
}

// ===========================================================================
// SpatialMetrics
// ===========================================================================

/// Spatial metrics of one node.
#[derive(Debug, Clone)]
pub struct SpatialMetrics {
    key: NodeKey,
    bounding_context: bool,
    adaptive: bool,
    pub(crate) intrinsic: Cached<Box3>,
    pub(crate) inner: Cached<Box3>,
    raw: NodeState,
    current: NodeState,
    target: NodeState,
    stamp: u64,
}

impl SpatialMetrics {
    pub(crate) fn new(key: NodeKey, view: Arc<ViewState>) -> Self {
        let state = NodeState::new(
            None,
            &NodeTransform::default(),
            Mat4::identity(),
            view,
            Box3::empty(),
        );
        Self {
            key,
            bounding_context: false,
            adaptive: false,
            intrinsic: Cached::new(),
            inner: Cached::new(),
            raw: state.clone(),
            current: state.clone(),
            target: state,
            stamp: 0,
        }
    }

    /// Slot of the node.
    #[must_use]
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Whether the node is excluded from its parent's inner bounds.
    #[must_use]
    pub fn is_bounding_context(&self) -> bool {
        self.bounding_context || self.adaptive
    }

    /// Whether the node was explicitly marked as a bounding context.
    #[must_use]
    pub fn is_explicit_bounding_context(&self) -> bool {
        self.bounding_context
    }

    /// Whether the node has an adapter.
    #[must_use]
    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// Bounds of the node's own geometry (local space).
    #[must_use]
    pub fn intrinsic_bounds(&self) -> Box3 {
        self.intrinsic.peek().copied().unwrap_or_else(Box3::empty)
    }

    /// Intrinsic bounds united with non-context children (local space).
    #[must_use]
    pub fn inner_bounds(&self) -> Box3 {
        self.inner.peek().copied().unwrap_or_else(Box3::empty)
    }

    /// Center of the inner bounds (zero when empty).
    #[must_use]
    pub fn inner_center(&self) -> Point {
        self.inner_bounds().center()
    }

    /// Size of the inner bounds (zero when empty).
    #[must_use]
    pub fn inner_size(&self) -> Vec3 {
        self.inner_bounds().size()
    }

    /// State as reported by the host.
    #[must_use]
    pub fn raw(&self) -> &NodeState {
        &self.raw
    }

    /// Smoothed state for rendering.
    #[must_use]
    pub fn current(&self) -> &NodeState {
        &self.current
    }

    /// State the node is moving toward.
    #[must_use]
    pub fn target(&self) -> &NodeState {
        &self.target
    }

    /// Whether the entry must be recomputed before reading.
    #[must_use]
    pub fn is_dirty(&self, cache: &MemoizationCache) -> bool {
        self.stamp != cache.generation()
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.stamp = 0;
        self.inner.invalidate();
        self.intrinsic.invalidate();
    }

    pub(crate) fn set_bounding_context(&mut self, flag: bool) {
        self.bounding_context = flag;
    }

    pub(crate) fn set_adaptive(&mut self, flag: bool) {
        self.adaptive = flag;
    }

    pub(crate) fn store(
        &mut self,
        cache: &MemoizationCache,
        raw: NodeState,
        current: NodeState,
        target: NodeState,
    ) {
        self.raw = raw;
        self.current = current;
        self.target = target;
        self.stamp = cache.generation();
    }

    pub(crate) fn states_mut(&mut self) -> (&mut NodeState, &mut NodeState) {
        (&mut self.current, &mut self.target)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use spatia_core::Vec2;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-10;

    fn view() -> Arc<ViewState> {
        Arc::new(ViewState::default())
    }

    fn approx(a: &Vec3, b: &Vec3) -> bool {
        (a - b).norm() < 1e-9
    }

    #[test]
    fn unparented_empty_node_takes_target_box() {
        let frame = PlacementFrame::new(None, Mat4::identity(), Box3::empty(), view(), EPS);
        let placement = Placement {
            orientation: Quat::identity(),
            bounds: Box3::from_center_size(Point::new(1.0, 2.0, 0.0), Vec3::new(4.0, 5.0, 6.0)),
        };
        let t = frame.local_transform(&placement);
        assert!(approx(&t.position, &Vec3::new(1.0, 2.0, 0.0)));
        assert!(approx(&t.scale, &Vec3::new(4.0, 5.0, 6.0)));
    }

    #[test]
    fn parent_scale_is_divided_out_along_rotated_axes() {
        let parent = compose(
            &Vec3::new(10.0, 0.0, 0.0),
            &Quat::identity(),
            &Vec3::new(1.0, 2.0, 2.0),
        );
        let inner = Box3::from_center_size(Point::origin(), Vec3::repeat(2.0));
        let frame = PlacementFrame::new(None, parent, inner, view(), EPS);
        let placement = Placement {
            orientation: Quat::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2),
            bounds: Box3::unit(),
        };
        let state = frame.state_for(&placement);
        assert!(approx(state.local_scale(), &Vec3::new(0.25, 0.25, 0.5)));
        assert!(approx(&state.world_scale(), &Vec3::repeat(0.5)));
        assert!(approx(&state.world_position(), &Vec3::zeros()));
    }

    #[test]
    fn placement_round_trips() {
        let parent = compose(
            &Vec3::new(1.0, -2.0, 0.5),
            &Quat::from_euler_angles(0.1, 0.7, -0.3),
            &Vec3::repeat(2.0),
        );
        let inner = Box3::from_center_size(Point::new(0.5, 0.0, 0.0), Vec3::new(1.0, 2.0, 0.5));
        let frame = PlacementFrame::new(None, parent, inner, view(), EPS);
        let placement = Placement {
            orientation: Quat::from_euler_angles(-0.4, 0.2, 1.0),
            bounds: Box3::from_center_size(Point::new(3.0, 1.0, -4.0), Vec3::new(0.6, 0.9, 0.3)),
        };
        let back = Placement::of(&frame.state_for(&placement));
        assert!(back.orientation.angle_to(&placement.orientation) < 1e-6);
        assert!(approx(&back.bounds.center().coords, &placement.bounds.center().coords));
        assert!(approx(&back.bounds.size(), &placement.bounds.size()));
    }

    #[test]
    fn zero_inner_axis_is_guarded() {
        let inner = Box3::new(Point::new(-1.0, -1.0, 0.0), Point::new(1.0, 1.0, 0.0));
        let frame = PlacementFrame::new(None, Mat4::identity(), inner, view(), EPS);
        let placement = Placement {
            orientation: Quat::identity(),
            bounds: Box3::from_center_size(Point::origin(), Vec3::new(2.0, 2.0, 1.0)),
        };
        let t = frame.local_transform(&placement);
        assert!(t.scale.iter().all(|s| s.is_finite()));
        assert!((t.scale.z - 1.0 / (EPS * DIVISOR_GUARD_FACTOR)).abs() < 1.0);
    }

    #[test]
    fn occlusion_splits_by_depth() {
        let rect = |x0: f64, x1: f64| Rect2::new(Vec2::new(x0, 0.0), Vec2::new(x1, 10.0));
        let near = Occluder {
            key: NodeKey(0),
            rect: rect(0.0, 10.0),
            near: 1.0,
        };
        let far = Occluder {
            key: NodeKey(1),
            rect: rect(5.0, 15.0),
            near: 2.0,
        };
        let all = [near, far];
        let (occluding, occluded) = occlusion_against(&near, &all);
        assert!(occluding > 0.0 && occluded == 0.0);
        let (occluding, occluded) = occlusion_against(&far, &all);
        assert!(occluded > 0.0 && occluding == 0.0);
        let expected = (5.0_f64.powi(2) + 10.0_f64.powi(2)).sqrt()
            / (10.0_f64.powi(2) + 10.0_f64.powi(2)).sqrt()
            * 100.0;
        assert!((occluded - expected).abs() < 1e-9);
    }
}
