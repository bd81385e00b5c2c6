#![forbid(unsafe_code)]

//! Bounds objectives in layout space and in visual space.

use spatia_core::{Mat4, Vec3};

use super::spec::{BoundsSpec, Measure};
use super::{EvaluationContext, Objective, Unit};
use crate::error::Result;
use crate::metrics::effective_inner;

const SPATIAL_UNITS: &[Unit] = &[Unit::Meters, Unit::Percent];
const VISUAL_PLANAR_UNITS: &[Unit] = &[Unit::Pixels, Unit::Degrees, Unit::Percent];
const VISUAL_DEPTH_UNITS: &[Unit] = &[Unit::Meters];

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// Bounds of the node in its layout parent's layout frame, in meters.
///
/// `Percent` measures are relative to the parent's layout size on the same
/// axis (its diagonal for the diagonal field), or to one meter when the node
/// has no layout parent. The layout frame is centered, so `Percent(50.0)` on
/// the right edge is the parent's right edge.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialBoundsObjective {
    spec: BoundsSpec,
}

impl SpatialBoundsObjective {
    pub fn new(spec: BoundsSpec) -> Result<Self> {
        spec.check_units([SPATIAL_UNITS; 3], SPATIAL_UNITS, "spatial_bounds")?;
        Ok(Self { spec })
    }

    #[must_use]
    pub fn spec(&self) -> &BoundsSpec {
        &self.spec
    }
}

impl Objective for SpatialBoundsObjective {
    fn name(&self) -> &'static str {
        "spatial_bounds"
    }

    fn evaluate(&self, cx: &EvaluationContext<'_>) -> f64 {
        let state = cx.state;
        let (frame, reference): (Mat4, Vec3) = match cx.parent {
            Some(parent) if !parent.layout_bounds().is_empty() => (
                parent.layout_from_world() * state.world_matrix(),
                parent.layout_space_bounds().size(),
            ),
            Some(parent) => (
                parent.layout_from_world() * state.world_matrix(),
                Vec3::repeat(1.0),
            ),
            None => (*state.world_matrix(), Vec3::repeat(1.0)),
        };
        let bounds = effective_inner(state.layout_bounds()).transformed(&frame);
        let resolve = |axis: usize, m: Measure| match m {
            Measure::Percent(p) => {
                let size = if axis < 3 { reference[axis] } else { reference.norm() };
                p / 100.0 * size
            }
            other => other.value(),
        };
        let accuracy = [cx.accuracy.meters; 4];
        self.spec.score(&bounds, &accuracy, &resolve)
    }
}

// ---------------------------------------------------------------------------
// Visual
// ---------------------------------------------------------------------------

/// Bounds of the node as seen by the viewer.
///
/// x/y accept pixels, degrees from forward, or percent of the resolution
/// (origin at the view center, +y up). z is depth in meters. The raw score
/// is attenuated by how far the node leaves the viewport or crosses the near
/// plane:
///
/// ```text
/// penalty = (overflow_x / res_x + overflow_y / res_y + behind_near / near)^2
/// score   = raw - (|raw| + 1) * penalty
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VisualBoundsObjective {
    spec: BoundsSpec,
}

impl VisualBoundsObjective {
    pub fn new(spec: BoundsSpec) -> Result<Self> {
        spec.check_units(
            [VISUAL_PLANAR_UNITS, VISUAL_PLANAR_UNITS, VISUAL_DEPTH_UNITS],
            VISUAL_PLANAR_UNITS,
            "visual_bounds",
        )?;
        Ok(Self { spec })
    }

    #[must_use]
    pub fn spec(&self) -> &BoundsSpec {
        &self.spec
    }
}

/// Squared out-of-view term for `cx.state`.
#[must_use]
pub fn out_of_view_penalty(cx: &EvaluationContext<'_>) -> f64 {
    let view = cx.view();
    let vb = cx.state.visual_bounds();
    let res = view.resolution();
    let half = res * 0.5;
    let overflow_x = (vb.max.x - half.x).max(0.0) + (-half.x - vb.min.x).max(0.0);
    let overflow_y = (vb.max.y - half.y).max(0.0) + (-half.y - vb.min.y).max(0.0);
    let near = view.frustum().near().max(cx.epsilon.meters);
    let behind = (near - vb.min.z).max(0.0);
    let term = overflow_x / res.x.max(cx.epsilon.pixels)
        + overflow_y / res.y.max(cx.epsilon.pixels)
        + behind / near;
    term * term
}

impl Objective for VisualBoundsObjective {
    fn name(&self) -> &'static str {
        "visual_bounds"
    }

    fn evaluate(&self, cx: &EvaluationContext<'_>) -> f64 {
        let view = cx.view();
        let res = *view.resolution();
        let ppd = view.pixels_per_degree();
        let resolve = |axis: usize, m: Measure| match (axis, m) {
            (0, Measure::Degrees(d)) => view.degrees_to_pixels_x(d),
            (1, Measure::Degrees(d)) => view.degrees_to_pixels_y(d),
            (_, Measure::Degrees(d)) => d * (ppd.x + ppd.y) * 0.5,
            (0, Measure::Percent(p)) => p / 100.0 * res.x,
            (1, Measure::Percent(p)) => p / 100.0 * res.y,
            (_, Measure::Percent(p)) => p / 100.0 * res.norm(),
            (_, other) => other.value(),
        };
        let px = cx.accuracy.pixels;
        let accuracy = [px, px, cx.accuracy.meters, px];
        let raw = self.spec.score(cx.state.visual_bounds(), &accuracy, &resolve);
        raw - (raw.abs() + 1.0) * out_of_view_penalty(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LayoutError;
    use crate::objectives::spec::{Edge, NumberSpec, Vec3Spec};
    use crate::objectives::test_support::{cube, score, score_with};

    fn meters(v: f64) -> NumberSpec {
        NumberSpec::exact(Measure::Meters(v))
    }

    #[test]
    fn spatial_edges_without_parent_are_world_meters() {
        let node = cube(Vec3::new(2.0, 0.0, 0.0), Vec3::repeat(1.0));
        let at = SpatialBoundsObjective::new(BoundsSpec::default().with_edge(Edge::Left, meters(1.5)))
            .unwrap();
        assert!(score(&at, &node).abs() < 1e-12);
        let off = SpatialBoundsObjective::new(BoundsSpec::default().with_edge(Edge::Left, meters(0.0)))
            .unwrap();
        assert!((score(&off, &node) + 1.5).abs() < 1e-12);
    }

    #[test]
    fn spatial_percent_is_relative_to_parent_layout() {
        let parent = cube(Vec3::zeros(), Vec3::repeat(4.0));
        let child = cube(Vec3::new(1.0, 0.0, 0.0), Vec3::repeat(1.0));
        let objective = SpatialBoundsObjective::new(
            BoundsSpec::default().with_edge(Edge::Right, NumberSpec::exact(Measure::Percent(50.0))),
        )
        .unwrap();
        let s = score_with(&objective, &child, Some(&parent), &[]);
        assert!((s + 0.5).abs() < 1e-9);
    }

    #[test]
    fn spatial_rejects_pixels() {
        let err = SpatialBoundsObjective::new(
            BoundsSpec::default().with_edge(Edge::Top, NumberSpec::exact(Measure::Pixels(3.0))),
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidUnit { field: "top", .. }));
    }

    #[test]
    fn visual_rejects_planar_units_on_depth() {
        let spec = BoundsSpec::default().with_edge(Edge::Front, NumberSpec::exact(Measure::Pixels(1.0)));
        assert!(VisualBoundsObjective::new(spec).is_err());
    }

    #[test]
    fn visual_percent_edges_use_resolution() {
        let node = cube(Vec3::new(0.0, 0.0, -5.0), Vec3::repeat(1.0));
        let objective = VisualBoundsObjective::new(
            BoundsSpec::default().with_edge(Edge::Right, NumberSpec::exact(Measure::Percent(50.0))),
        )
        .unwrap();
        let right = 0.5 / 4.5 * 500.0;
        assert!((score(&objective, &node) + (500.0 - right)).abs() < 1e-6);
    }

    #[test]
    fn visual_center_on_axis_scores_zero() {
        let node = cube(Vec3::new(0.0, 0.0, -5.0), Vec3::repeat(1.0));
        let objective = VisualBoundsObjective::new(BoundsSpec::default().with_center(
            Vec3Spec::default()
                .with_x(NumberSpec::exact(Measure::Pixels(0.0)))
                .with_y(NumberSpec::exact(Measure::Degrees(0.0))),
        ))
        .unwrap();
        assert!(score(&objective, &node).abs() < 1e-9);
    }

    #[test]
    fn off_screen_nodes_are_penalized() {
        let spec = BoundsSpec::default()
            .with_size(Vec3Spec::default().with_x(NumberSpec::at_least(Measure::Pixels(0.0))));
        let objective = VisualBoundsObjective::new(spec).unwrap();
        let visible = cube(Vec3::new(0.0, 0.0, -5.0), Vec3::repeat(1.0));
        let aside = cube(Vec3::new(20.0, 0.0, -5.0), Vec3::repeat(1.0));
        let behind = cube(Vec3::new(0.0, 0.0, 5.0), Vec3::repeat(1.0));
        assert_eq!(score(&objective, &visible), 0.0);
        assert!(score(&objective, &aside) < 0.0);
        assert!(score(&objective, &behind) < 0.0);
        assert!(score(&objective, &behind).is_finite());
    }
}
