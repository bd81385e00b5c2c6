#![forbid(unsafe_code)]

use super::spec::{Measure, NumberSpec};
use super::{EvaluationContext, Objective, Unit};
use crate::error::Result;

/// Percent of the node's angular extent that lies inside the view frustum.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewOverlapObjective {
    spec: NumberSpec,
}

impl ViewOverlapObjective {
    pub fn new(spec: NumberSpec) -> Result<Self> {
        spec.check_units(&[Unit::Percent], "view_overlap", "overlap")?;
        Ok(Self { spec })
    }

    /// Keep at least `percent` of the node in view.
    #[must_use]
    pub fn at_least(percent: f64) -> Self {
        Self {
            spec: NumberSpec::at_least(Measure::Percent(percent)),
        }
    }
}

impl Objective for ViewOverlapObjective {
    fn name(&self) -> &'static str {
        "view_overlap"
    }

    fn evaluate(&self, cx: &EvaluationContext<'_>) -> f64 {
        let percent = cx
            .state
            .visual_frustum()
            .overlap_percent(cx.view().frustum());
        self.spec
            .score(percent, cx.accuracy.for_unit(Unit::Percent), &|m| m.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectives::test_support::{cube, score};
    use spatia_core::Vec3;

    #[test]
    fn inside_view_is_fully_overlapping() {
        let node = cube(Vec3::new(0.0, 0.0, -5.0), Vec3::repeat(1.0));
        assert_eq!(score(&ViewOverlapObjective::at_least(90.0), &node), 0.0);
    }

    #[test]
    fn outside_view_misses_by_the_requested_percent() {
        let node = cube(Vec3::new(20.0, 0.0, -5.0), Vec3::repeat(1.0));
        assert_eq!(score(&ViewOverlapObjective::at_least(50.0), &node), -50.0);
    }

    #[test]
    fn only_percent_is_accepted() {
        assert!(ViewOverlapObjective::new(NumberSpec::exact(Measure::Degrees(3.0))).is_err());
    }
}
