#![forbid(unsafe_code)]

//! Objectives on how large and how central the node appears.

use spatia_core::frustum::angular_distance;

use super::{EvaluationContext, Objective};

/// Grows the node on screen.
///
/// Scored as the diagonal of the visual rectangle clipped to the viewport,
/// over the viewport diagonal; 1.0 fills the view.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VisualMaximizeObjective;

impl Objective for VisualMaximizeObjective {
    fn name(&self) -> &'static str {
        "visual_maximize"
    }

    fn evaluate(&self, cx: &EvaluationContext<'_>) -> f64 {
        let viewport = cx.view().viewport();
        let diagonal = viewport.diagonal();
        if diagonal <= cx.epsilon.pixels {
            return 0.0;
        }
        cx.state
            .visual_rect()
            .intersection_opt(&viewport)
            .map_or(0.0, |r| r.diagonal() / diagonal)
    }
}

/// Pulls the node toward the center of the view.
///
/// Scored as minus the angle (degrees) between the node's layout center and
/// the view center, beyond a dead-zone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MagnetizeObjective {
    dead_zone_degrees: f64,
}

impl MagnetizeObjective {
    /// `dead_zone_degrees` widens the layout's angular accuracy.
    #[must_use]
    pub fn new(dead_zone_degrees: f64) -> Self {
        Self {
            dead_zone_degrees: dead_zone_degrees.max(0.0),
        }
    }

    #[must_use]
    pub fn dead_zone_degrees(&self) -> f64 {
        self.dead_zone_degrees
    }
}

impl Objective for MagnetizeObjective {
    fn name(&self) -> &'static str {
        "magnetize"
    }

    fn evaluate(&self, cx: &EvaluationContext<'_>) -> f64 {
        let direction = cx.state.view_direction_degrees();
        let center = cx.view().frustum().center_degrees();
        let angle = angular_distance(&direction, &center);
        let dead = self.dead_zone_degrees.max(cx.accuracy.degrees);
        -(angle - dead).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectives::test_support::{cube, score};
    use spatia_core::Vec3;

    #[test]
    fn maximize_prefers_closer_nodes() {
        let far = cube(Vec3::new(0.0, 0.0, -5.0), Vec3::repeat(1.0));
        let near = cube(Vec3::new(0.0, 0.0, -2.0), Vec3::repeat(1.0));
        let objective = VisualMaximizeObjective;
        let f = score(&objective, &far);
        assert!((f - 1.0 / 9.0).abs() < 1e-6);
        assert!(score(&objective, &near) > f);
    }

    #[test]
    fn maximize_is_capped_by_the_viewport() {
        let huge = cube(Vec3::new(0.0, 0.0, -2.0), Vec3::repeat(50.0));
        assert!(score(&VisualMaximizeObjective, &huge) <= 1.0 + 1e-12);
    }

    #[test]
    fn magnetize_scores_angle_from_center() {
        let centered = cube(Vec3::new(0.0, 0.0, -5.0), Vec3::repeat(1.0));
        let aside = cube(Vec3::new(5.0, 0.0, -5.0), Vec3::repeat(1.0));
        let objective = MagnetizeObjective::default();
        assert!(score(&objective, &centered).abs() < 1e-9);
        assert!((score(&objective, &aside) + 45.0).abs() < 1e-6);
        assert!((score(&MagnetizeObjective::new(5.0), &aside) + 40.0).abs() < 1e-6);
    }
}
