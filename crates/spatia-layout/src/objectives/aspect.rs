#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use super::{EvaluationContext, Objective};

/// Axes whose proportions are preserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectMode {
    #[default]
    Xyz,
    Xy,
}

/// Keeps the node's inner bounds at their natural aspect ratio.
///
/// The placement scales the inner bounds by a world scale per axis; the
/// aspect is preserved when those scales agree. Scored as
/// `-max(0, max_scale / min_scale - 1 - accuracy.relative)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AspectObjective {
    mode: AspectMode,
}

impl AspectObjective {
    #[must_use]
    pub fn new(mode: AspectMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub fn mode(&self) -> AspectMode {
        self.mode
    }
}

impl Objective for AspectObjective {
    fn name(&self) -> &'static str {
        "aspect"
    }

    fn evaluate(&self, cx: &EvaluationContext<'_>) -> f64 {
        let scale = cx.state.world_scale().abs();
        let axes = match self.mode {
            AspectMode::Xyz => 3,
            AspectMode::Xy => 2,
        };
        let (lo, hi) = scale
            .iter()
            .take(axes)
            .fold((f64::INFINITY, 0.0_f64), |(lo, hi), &s| (lo.min(s), hi.max(s)));
        let ratio = hi / lo.max(cx.epsilon.meters);
        -(ratio - 1.0 - cx.accuracy.relative).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectives::test_support::{cube, score};
    use spatia_core::Vec3;

    #[test]
    fn uniform_scale_is_satisfied() {
        let node = cube(Vec3::zeros(), Vec3::repeat(3.0));
        assert_eq!(score(&AspectObjective::default(), &node), 0.0);
    }

    #[test]
    fn stretched_scale_is_penalized_by_ratio() {
        let node = cube(Vec3::zeros(), Vec3::new(1.0, 2.0, 1.0));
        assert!((score(&AspectObjective::new(AspectMode::Xyz), &node) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn planar_mode_ignores_depth() {
        let node = cube(Vec3::zeros(), Vec3::new(2.0, 2.0, 0.5));
        assert!(score(&AspectObjective::new(AspectMode::Xy), &node).abs() < 1e-9);
        assert!(score(&AspectObjective::new(AspectMode::Xyz), &node) < -2.9);
    }
}
