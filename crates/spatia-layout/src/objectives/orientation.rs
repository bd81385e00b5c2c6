#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use spatia_core::Quat;

use super::spec::QuaternionSpec;
use super::{EvaluationContext, Objective};
use crate::error::Result;

/// Frame an orientation is measured in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationFrame {
    /// Relative to the layout parent's world orientation (world if none).
    #[default]
    Parent,
    /// World orientation.
    World,
    /// Relative to the viewer.
    View,
}

/// Orientation of the node relative to a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationObjective {
    frame: OrientationFrame,
    spec: QuaternionSpec,
}

impl OrientationObjective {
    pub fn new(frame: OrientationFrame, spec: QuaternionSpec) -> Result<Self> {
        spec.check_units("orientation")?;
        Ok(Self { frame, spec })
    }

    /// Face the viewer: identity relative to the view.
    #[must_use]
    pub fn facing_view() -> Self {
        Self {
            frame: OrientationFrame::View,
            spec: QuaternionSpec::Exact(Quat::identity()),
        }
    }

    #[must_use]
    pub fn frame(&self) -> OrientationFrame {
        self.frame
    }
}

impl Objective for OrientationObjective {
    fn name(&self) -> &'static str {
        "orientation"
    }

    fn evaluate(&self, cx: &EvaluationContext<'_>) -> f64 {
        let world = cx.state.world_orientation();
        let relative = match (self.frame, cx.parent) {
            (OrientationFrame::Parent, Some(parent)) => parent.world_orientation().inverse() * world,
            (OrientationFrame::Parent | OrientationFrame::World, _) => world,
            (OrientationFrame::View, _) => cx.view().orientation().inverse() * world,
        };
        self.spec.score(&relative, cx.accuracy.degrees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectives::spec::{Measure, NumberSpec, Vec3Spec};
    use crate::objectives::test_support::{cube, score, score_with};
    use crate::state::NodeState;
    use nalgebra::Vector3;
    use spatia_core::Vec3;

    fn rotated(degrees: f64) -> NodeState {
        let mut s = cube(Vec3::new(0.0, 0.0, -2.0), Vec3::repeat(1.0));
        s.set_local_orientation(Quat::from_axis_angle(
            &Vector3::y_axis(),
            degrees.to_radians(),
        ));
        s
    }

    #[test]
    fn facing_view_scores_angle() {
        let objective = OrientationObjective::facing_view();
        assert!(score(&objective, &rotated(0.0)).abs() < 1e-6);
        assert!((score(&objective, &rotated(40.0)) + 40.0).abs() < 1e-6);
    }

    #[test]
    fn parent_frame_cancels_parent_rotation() {
        let parent = rotated(30.0);
        let child = rotated(30.0);
        let objective =
            OrientationObjective::new(OrientationFrame::Parent, QuaternionSpec::Exact(Quat::identity()))
                .unwrap();
        assert!(score_with(&objective, &child, Some(&parent), &[]).abs() < 1e-6);
        assert!((score(&objective, &child) + 30.0).abs() < 1e-6);
    }

    #[test]
    fn euler_specs_must_be_degrees() {
        let spec = QuaternionSpec::Euler(
            Vec3Spec::default().with_x(NumberSpec::exact(Measure::Meters(1.0))),
        );
        assert!(OrientationObjective::new(OrientationFrame::World, spec).is_err());
    }
}
