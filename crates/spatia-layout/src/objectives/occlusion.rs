#![forbid(unsafe_code)]

use crate::metrics::Occluder;

use super::{EvaluationContext, Objective};

/// Keeps the node clear of other adaptive nodes on screen.
///
/// Scored as minus the summed overlap percent between the candidate's visual
/// rectangle and every other occluder of the frame snapshot, regardless of
/// which one is nearer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OcclusionObjective;

impl Objective for OcclusionObjective {
    fn name(&self) -> &'static str {
        "occlusion"
    }

    fn evaluate(&self, cx: &EvaluationContext<'_>) -> f64 {
        let me = Occluder::of(cx.key, cx.state);
        let total: f64 = cx
            .occluders
            .iter()
            .filter(|o| o.key != cx.key)
            .map(|o| me.overlap_percent(o))
            .sum();
        -(total - cx.accuracy.relative * 100.0).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::NodeKey;
    use crate::objectives::test_support::{cube, score_with};
    use spatia_core::Vec3;

    #[test]
    fn overlap_with_others_is_penalized_and_self_is_ignored() {
        let node = cube(Vec3::new(0.0, 0.0, -5.0), Vec3::repeat(1.0));
        let own = Occluder::of(NodeKey(0), &node);
        assert_eq!(score_with(&OcclusionObjective, &node, None, &[own]), 0.0);

        let other = Occluder {
            key: NodeKey(1),
            ..own
        };
        let s = score_with(&OcclusionObjective, &node, None, &[own, other]);
        assert!((s + 100.0).abs() < 1e-9);
    }
}
