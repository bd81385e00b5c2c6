#![forbid(unsafe_code)]

//! Per-node control object for adaptive placement.
//!
//! A [`SpatialAdapter`] turns a node into an adaptive node. It owns the
//! node's candidate [`SpatialLayout`]s and three transitionables that hold
//! where the node is (current), where it is going (target), and how the
//! target is smoothed:
//!
//! ```text
//!   layouts --optimize--> best solution --stage--> targets
//!                                                    |
//!                       evaluate -> sync -> apply    v
//!   orientation / bounds / opacity  <------------- commit
//! ```
//!
//! Bounds are world-space: the center is a world point and the size runs
//! along the node's oriented axes, in meters.
//!
//! # Invariants
//!
//! 1. Transitions advance at most once per frame.
//! 2. `previous_layout` is kept for exactly one frame after a switch.

use std::cmp::Ordering;

use smallvec::SmallVec;
use spatia_core::{
    Box3, Quat, SyncGroup, TransitionConfig, TransitionOptions, Transitionable,
};
use tracing::debug;

use crate::binding::NodeKey;
use crate::config::OptimizeOptions;
use crate::layout::SpatialLayout;
use crate::metrics::Placement;
use crate::optimizer::{ToleranceBand, compare_solutions};

/// Where an adaptive node should be attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ParentOverride {
    /// Keep the host parent (or the active layout's parent).
    #[default]
    Keep,
    /// Flagged for removal: fade out and lay out in world space.
    Detach,
    /// Lay out under another node.
    Reparent(NodeKey),
}

/// Adaptive layout state of one node.
#[derive(Debug)]
pub struct SpatialAdapter {
    key: NodeKey,
    orientation: Transitionable<Quat>,
    bounds: Transitionable<Box3>,
    opacity: Transitionable<f64>,
    parent: ParentOverride,
    resolved_parent: Option<NodeKey>,
    layouts: Vec<SpatialLayout>,
    active_layout: Option<usize>,
    previous_layout: Option<usize>,
    switch_frame: u64,
    transition: TransitionOptions,
    optimize: OptimizeOptions,
    fade_on_layout_change: bool,
    sync: bool,
    last_frame: u64,
}

impl SpatialAdapter {
    pub(crate) fn new(key: NodeKey, placement: &Placement) -> Self {
        Self {
            key,
            orientation: Transitionable::new(placement.orientation),
            bounds: Transitionable::new(placement.bounds),
            opacity: Transitionable::new(1.0),
            parent: ParentOverride::Keep,
            resolved_parent: None,
            layouts: Vec::new(),
            active_layout: None,
            previous_layout: None,
            switch_frame: 0,
            transition: TransitionOptions::default(),
            optimize: OptimizeOptions::default(),
            fade_on_layout_change: false,
            sync: true,
            last_frame: 0,
        }
    }

    #[must_use]
    pub fn key(&self) -> NodeKey {
        self.key
    }

    // -----------------------------------------------------------------------
    // Transitionables
    // -----------------------------------------------------------------------

    /// World orientation.
    #[must_use]
    pub fn orientation(&self) -> &Transitionable<Quat> {
        &self.orientation
    }

    pub fn orientation_mut(&mut self) -> &mut Transitionable<Quat> {
        &mut self.orientation
    }

    /// World bounds (center in world space, size along the oriented axes).
    #[must_use]
    pub fn bounds(&self) -> &Transitionable<Box3> {
        &self.bounds
    }

    pub fn bounds_mut(&mut self) -> &mut Transitionable<Box3> {
        &mut self.bounds
    }

    #[must_use]
    pub fn opacity(&self) -> &Transitionable<f64> {
        &self.opacity
    }

    pub fn opacity_mut(&mut self) -> &mut Transitionable<f64> {
        &mut self.opacity
    }

    /// Current placement (what is rendered).
    #[must_use]
    pub fn current_placement(&self) -> Placement {
        Placement {
            orientation: *self.orientation.current(),
            bounds: *self.bounds.current(),
        }
    }

    /// Target placement (where the node is going).
    #[must_use]
    pub fn target_placement(&self) -> Placement {
        Placement {
            orientation: *self.orientation.target(),
            bounds: *self.bounds.target(),
        }
    }

    // -----------------------------------------------------------------------
    // Parent
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn parent_override(&self) -> ParentOverride {
        self.parent
    }

    pub(crate) fn set_parent_override(&mut self, parent: ParentOverride) {
        self.parent = parent;
    }

    /// Parent the node was laid out under in the last update.
    #[must_use]
    pub fn resolved_parent(&self) -> Option<NodeKey> {
        self.resolved_parent
    }

    pub(crate) fn set_resolved_parent(&mut self, parent: Option<NodeKey>) {
        self.resolved_parent = parent;
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.parent == ParentOverride::Detach
    }

    /// Parent a layout is evaluated under, given the host parent.
    #[must_use]
    pub fn layout_parent(&self, layout: Option<usize>, host: Option<NodeKey>) -> Option<NodeKey> {
        match self.parent {
            ParentOverride::Detach => None,
            ParentOverride::Reparent(key) => layout
                .and_then(|i| self.layouts.get(i))
                .and_then(SpatialLayout::target_parent)
                .or(Some(key)),
            ParentOverride::Keep => layout
                .and_then(|i| self.layouts.get(i))
                .and_then(SpatialLayout::target_parent)
                .or(host),
        }
    }

    // -----------------------------------------------------------------------
    // Layouts
    // -----------------------------------------------------------------------

    /// Append an empty layout and return it for configuration.
    pub fn create_layout(&mut self) -> &mut SpatialLayout {
        let index = self.add_layout(SpatialLayout::new());
        &mut self.layouts[index]
    }

    /// Append a layout; returns its index.
    pub fn add_layout(&mut self, layout: SpatialLayout) -> usize {
        self.layouts.push(layout);
        self.layouts.len() - 1
    }

    /// Layouts in declared order.
    #[must_use]
    pub fn layouts(&self) -> &[SpatialLayout] {
        &self.layouts
    }

    pub fn layout_mut(&mut self, index: usize) -> Option<&mut SpatialLayout> {
        self.layouts.get_mut(index)
    }

    pub(crate) fn layouts_mut(&mut self) -> &mut [SpatialLayout] {
        &mut self.layouts
    }

    /// Index of the layout currently driving the targets.
    #[must_use]
    pub fn active_layout(&self) -> Option<usize> {
        self.active_layout
    }

    /// Layout that was active before the last switch (kept for one frame).
    #[must_use]
    pub fn previous_layout(&self) -> Option<usize> {
        self.previous_layout
    }

    #[must_use]
    pub fn active(&self) -> Option<&SpatialLayout> {
        self.active_layout.and_then(|i| self.layouts.get(i))
    }

    // -----------------------------------------------------------------------
    // Options
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn transition_options(&self) -> &TransitionOptions {
        &self.transition
    }

    pub fn transition_options_mut(&mut self) -> &mut TransitionOptions {
        &mut self.transition
    }

    #[must_use]
    pub fn optimize_options(&self) -> &OptimizeOptions {
        &self.optimize
    }

    pub fn optimize_options_mut(&mut self) -> &mut OptimizeOptions {
        &mut self.optimize
    }

    #[must_use]
    pub fn fade_on_layout_change(&self) -> bool {
        self.fade_on_layout_change
    }

    /// Fade in from transparent whenever the active layout changes.
    pub fn set_fade_on_layout_change(&mut self, fade: bool) {
        self.fade_on_layout_change = fade;
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.sync
    }

    /// Commit orientation, bounds and opacity together (on by default).
    pub fn set_synced(&mut self, sync: bool) {
        self.sync = sync;
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    /// Pick the layout whose best solution ranks best across all layouts.
    ///
    /// Layouts are ordered by total violation first; equal violations fall
    /// back to the tolerance-banded ranking of their best solutions (bands of
    /// relative width `tolerance`). The active layout is kept unless another
    /// ranks strictly better, and remaining ties go to declaration order.
    /// Returns `true` on a switch.
    pub(crate) fn select_layout(&mut self, frame: u64, tolerance: f64) -> bool {
        if self.previous_layout.is_some() && self.switch_frame < frame {
            self.previous_layout = None;
        }
        if self.layouts.is_empty() {
            self.active_layout = None;
            return false;
        }
        let width = self
            .layouts
            .iter()
            .map(|l| l.objectives().len())
            .max()
            .unwrap_or(0);
        let bands: SmallVec<[ToleranceBand; 8]> = (0..width)
            .map(|_| ToleranceBand {
                best: None,
                tolerance,
            })
            .collect();
        let mut chosen = self
            .active_layout
            .filter(|a| *a < self.layouts.len())
            .unwrap_or(0);
        for (l, layout) in self.layouts.iter().enumerate() {
            if rank_layouts(layout, &self.layouts[chosen], &bands) == Ordering::Less {
                chosen = l;
            }
        }
        if self.active_layout == Some(chosen) {
            return false;
        }
        debug!(
            key = ?self.key,
            from = ?self.active_layout,
            to = chosen,
            layout = self.layouts[chosen].name().unwrap_or(""),
            violation = self.layouts[chosen].violation(),
            "layout switch"
        );
        self.previous_layout = self.active_layout;
        self.switch_frame = frame;
        self.active_layout = Some(chosen);
        if self.fade_on_layout_change && self.previous_layout.is_some() {
            self.opacity.jump_to(0.0);
            self.opacity.set_target(1.0);
            self.opacity.request_commit();
        }
        true
    }

    /// Write the active layout's best solution into the targets.
    pub(crate) fn stage_active(&mut self) {
        let Some(best) = self.active().and_then(SpatialLayout::best_solution) else {
            return;
        };
        let (orientation, bounds) = (best.orientation, best.bounds);
        self.orientation.set_target(orientation);
        self.bounds.set_target(bounds);
    }

    /// Advance every transitionable by `delta_time` (once per frame).
    pub(crate) fn advance(&mut self, delta_time: f64, base: &TransitionConfig, frame: u64) {
        if self.last_frame == frame {
            return;
        }
        self.last_frame = frame;
        self.orientation.evaluate(delta_time, base);
        self.bounds.evaluate(delta_time, base);
        self.opacity.evaluate(delta_time, base);
        if self.sync {
            SyncGroup::new()
                .with(&mut self.orientation)
                .with(&mut self.bounds)
                .with(&mut self.opacity)
                .update();
        }
        self.orientation.apply(delta_time, base);
        self.bounds.apply(delta_time, base);
        self.opacity.apply(delta_time, base);
    }
}

/// Order two layouts by violation, then by their best solutions. `Less`
/// means `a` ranks better. Layouts without a population rank last.
fn rank_layouts(a: &SpatialLayout, b: &SpatialLayout, bands: &[ToleranceBand]) -> Ordering {
    a.violation()
        .total_cmp(&b.violation())
        .then_with(|| match (a.best_solution(), b.best_solution()) {
            (Some(x), Some(y)) => compare_solutions(x, y, bands),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectives::VisualMaximizeObjective;
    use crate::solution::{LayoutSolution, Scores};
    use spatia_core::{Point, TransitionStatus, Vec3};

    fn adapter() -> SpatialAdapter {
        SpatialAdapter::new(
            NodeKey(3),
            &Placement {
                orientation: Quat::identity(),
                bounds: Box3::unit(),
            },
        )
    }

    fn scored_layout(score: f64) -> SpatialLayout {
        let mut layout = SpatialLayout::new().with_objective(VisualMaximizeObjective);
        let mut s = LayoutSolution::new(
            Quat::identity(),
            Box3::from_center_size(Point::new(score, 0.0, 0.0), Vec3::repeat(1.0)),
            0.5,
        );
        s.set_scores(Scores::from_slice(&[score]));
        layout.solutions.push(s);
        layout
    }

    #[test]
    fn least_violation_wins_and_ties_keep_the_active_layout() {
        let mut a = adapter();
        a.add_layout(scored_layout(-2.0));
        a.add_layout(scored_layout(-1.0));
        assert!(a.select_layout(1, 0.0));
        assert_eq!(a.active_layout(), Some(1));

        a.layouts[0].solutions[0].set_scores(Scores::from_slice(&[-1.0]));
        assert!(!a.select_layout(2, 0.0));
        assert_eq!(a.active_layout(), Some(1));
    }

    #[test]
    fn fitter_layout_wins_once_all_constraints_hold() {
        let mut a = adapter();
        a.add_layout(scored_layout(0.2));
        a.add_layout(scored_layout(1.0));
        assert!(a.select_layout(1, 0.001));
        assert_eq!(a.active_layout(), Some(1));
    }

    #[test]
    fn equal_layouts_do_not_displace_the_active_one() {
        let mut a = adapter();
        a.add_layout(scored_layout(0.5));
        a.add_layout(scored_layout(0.2));
        assert!(a.select_layout(1, 0.001));
        assert_eq!(a.active_layout(), Some(0));

        // Equal scores: the active layout stays even though it is declared later.
        a.layouts[1].solutions[0].set_scores(Scores::from_slice(&[0.5]));
        a.active_layout = Some(1);
        assert!(!a.select_layout(2, 0.001));
        assert_eq!(a.active_layout(), Some(1));
    }

    #[test]
    fn empty_layouts_rank_last() {
        let mut a = adapter();
        a.add_layout(SpatialLayout::new());
        a.add_layout(scored_layout(-5.0));
        assert!(a.select_layout(1, 0.001));
        assert_eq!(a.active_layout(), Some(1));
    }

    #[test]
    fn previous_layout_lasts_one_frame() {
        let mut a = adapter();
        a.add_layout(scored_layout(-2.0));
        a.add_layout(scored_layout(-3.0));
        a.select_layout(1, 0.0);
        a.layouts[1].solutions[0].set_scores(Scores::from_slice(&[0.0]));
        assert!(a.select_layout(2, 0.0));
        assert_eq!(a.previous_layout(), Some(0));
        a.select_layout(3, 0.0);
        assert_eq!(a.previous_layout(), None);
    }

    #[test]
    fn switching_with_fade_restarts_opacity() {
        let mut a = adapter();
        a.set_fade_on_layout_change(true);
        a.add_layout(scored_layout(-2.0));
        a.add_layout(scored_layout(-3.0));
        a.select_layout(1, 0.0);
        a.layouts[1].solutions[0].set_scores(Scores::from_slice(&[0.0]));
        a.select_layout(2, 0.0);
        assert_eq!(*a.opacity().current(), 0.0);
        assert_eq!(*a.opacity().target(), 1.0);
        let config = TransitionConfig::default();
        a.advance(0.1, &config, 2);
        assert!(a.opacity().is_transitioning());
    }

    #[test]
    fn staging_only_touches_targets() {
        let mut a = adapter();
        a.add_layout(scored_layout(-1.0));
        a.select_layout(1, 0.0);
        a.stage_active();
        assert_eq!(a.bounds().target().center(), Point::new(-1.0, 0.0, 0.0));
        assert_eq!(*a.bounds().current(), Box3::unit());
    }

    #[test]
    fn advance_runs_once_per_frame_and_syncs() {
        let mut a = adapter();
        let config = TransitionConfig {
            delay: 0.0,
            debounce: 0.0,
            ..TransitionConfig::default()
        };
        a.bounds_mut()
            .set_target(Box3::from_center_size(Point::new(3.0, 0.0, 0.0), Vec3::repeat(1.0)));
        a.opacity_mut().set_target(0.5);
        a.opacity_mut().options_mut().debounce = Some(100.0);
        a.advance(0.1, &config, 1);
        assert_eq!(a.bounds().status(), TransitionStatus::Committing);
        assert_eq!(a.opacity().status(), TransitionStatus::Committing);
        let before = *a.bounds().current();
        a.advance(0.1, &config, 1);
        assert_eq!(*a.bounds().current(), before);
    }

    #[test]
    fn layout_parent_resolution() {
        let mut a = adapter();
        let mut layout = SpatialLayout::new();
        layout.set_target_parent(Some(NodeKey(9)));
        a.add_layout(layout);
        a.add_layout(SpatialLayout::new());
        let host = Some(NodeKey(1));
        assert_eq!(a.layout_parent(Some(0), host), Some(NodeKey(9)));
        assert_eq!(a.layout_parent(Some(1), host), host);
        a.set_parent_override(ParentOverride::Reparent(NodeKey(5)));
        assert_eq!(a.layout_parent(Some(1), host), Some(NodeKey(5)));
        a.set_parent_override(ParentOverride::Detach);
        assert_eq!(a.layout_parent(Some(0), host), None);
    }
}
