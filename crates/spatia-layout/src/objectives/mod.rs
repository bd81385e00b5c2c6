#![forbid(unsafe_code)]

//! Scoring functions that rank candidate placements.
//!
//! An [`Objective`] maps a candidate [`NodeState`] to a score where higher is
//! better. Constraints use the same interface: a negative score means the
//! constraint is violated, and the optimizer ranks violators by that objective
//! alone (see [`compare_solutions`](crate::optimizer::compare_solutions)).
//!
//! Most objectives are configured with the specs in [`spec`]: numbers,
//! vectors, quaternions and bounds, each scored by its distance outside the
//! accepted range minus a per-unit accuracy dead-zone.
//!
//! # Invariants
//!
//! 1. `evaluate` is a pure function of the context; the optimizer calls it
//!    many times per frame.
//! 2. Scores are finite. A non-finite score is a bug in the objective and
//!    trips a debug assertion in [`ObjectiveSlot`](crate::layout::ObjectiveSlot).

pub mod aspect;
pub mod bounds;
pub mod occlusion;
pub mod orientation;
pub mod overlap;
pub mod spec;
pub mod visual;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::binding::NodeKey;
use crate::config::EpsilonConfig;
use crate::metrics::Occluder;
use crate::state::{NodeState, ViewState};

pub use aspect::{AspectMode, AspectObjective};
pub use bounds::{SpatialBoundsObjective, VisualBoundsObjective};
pub use occlusion::OcclusionObjective;
pub use orientation::{OrientationFrame, OrientationObjective};
pub use overlap::ViewOverlapObjective;
pub use spec::{BoundsSpec, Measure, NumberSpec, QuaternionSpec, Vec3Spec};
pub use visual::{MagnetizeObjective, VisualMaximizeObjective};

/// Unit tag of a [`Measure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Meters,
    Percent,
    Pixels,
    Degrees,
}

/// Dead-zones below which a distance counts as satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Accuracy {
    /// Spatial accuracy (meters).
    pub meters: f64,
    /// Visual accuracy (pixels).
    pub pixels: f64,
    /// Angular accuracy (degrees).
    pub degrees: f64,
    /// Relative accuracy (fraction; applied to percent and ratio scores).
    pub relative: f64,
}

impl Default for Accuracy {
    fn default() -> Self {
        Self {
            meters: 0.001,
            pixels: 1.0,
            degrees: 0.1,
            relative: 0.01,
        }
    }
}

impl Accuracy {
    /// Dead-zone for a value measured in `unit`.
    #[must_use]
    pub fn for_unit(&self, unit: Unit) -> f64 {
        match unit {
            Unit::Meters => self.meters,
            Unit::Pixels => self.pixels,
            Unit::Degrees => self.degrees,
            Unit::Percent => self.relative * 100.0,
        }
    }
}

/// Everything an objective may look at while scoring one candidate.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Node being laid out.
    pub key: NodeKey,
    /// Candidate state of the node.
    pub state: &'a NodeState,
    /// Target state of the layout parent, if any.
    pub parent: Option<&'a NodeState>,
    /// Dead-zones of the layout being optimized.
    pub accuracy: &'a Accuracy,
    /// Visual footprints of the adaptive nodes from the previous frame.
    pub occluders: &'a [Occluder],
    /// Degeneracy thresholds.
    pub epsilon: &'a EpsilonConfig,
}

impl EvaluationContext<'_> {
    /// The view the candidate is seen from.
    #[must_use]
    pub fn view(&self) -> &ViewState {
        self.state.view()
    }
}

/// A scoring function over candidate states. Higher is better.
pub trait Objective: fmt::Debug {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Score `cx.state`.
    fn evaluate(&self, cx: &EvaluationContext<'_>) -> f64;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use spatia_core::{Box3, LayoutFrustum, Mat4, Point, Vec2, Vec3};

    use super::*;
    use crate::binding::NodeTransform;

    pub fn square_view() -> Arc<ViewState> {
        Arc::new(ViewState::new(
            Mat4::identity(),
            LayoutFrustum::from_fov(90.0, 90.0, 0.1, 100.0),
            Vec2::new(1000.0, 1000.0),
        ))
    }

    /// Unit cube node at `position` with `scale`, no parent.
    pub fn cube(position: Vec3, scale: Vec3) -> NodeState {
        NodeState::new(
            None,
            &NodeTransform::default()
                .with_position(position)
                .with_scale(scale),
            Mat4::identity(),
            square_view(),
            Box3::from_center_size(Point::origin(), Vec3::repeat(1.0)),
        )
    }

    pub fn score(objective: &dyn Objective, state: &NodeState) -> f64 {
        score_with(objective, state, None, &[])
    }

    pub fn score_with(
        objective: &dyn Objective,
        state: &NodeState,
        parent: Option<&NodeState>,
        occluders: &[Occluder],
    ) -> f64 {
        let accuracy = Accuracy {
            meters: 0.0,
            pixels: 0.0,
            degrees: 0.0,
            relative: 0.0,
        };
        let epsilon = EpsilonConfig::default();
        objective.evaluate(&EvaluationContext {
            key: NodeKey(0),
            state,
            parent,
            accuracy: &accuracy,
            occluders,
            epsilon: &epsilon,
        })
    }
}
