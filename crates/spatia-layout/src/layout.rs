#![forbid(unsafe_code)]

//! Candidate layouts: ordered objectives plus a solution population.
//!
//! A [`SpatialLayout`] belongs to one adapter. Objectives are listed in
//! priority order; earlier slots dominate the ranking unless candidates are
//! within the slot's tolerance band. The population is owned by the layout
//! and carried across frames by the optimizer.

use spatia_core::TransitionOptions;
use tracing::warn;

use crate::binding::NodeKey;
use crate::config::OptimizeOptions;
use crate::objectives::{Accuracy, EvaluationContext, Objective};
use crate::solution::LayoutSolution;

// ---------------------------------------------------------------------------
// ObjectiveSlot
// ---------------------------------------------------------------------------

/// One objective of a layout with its ranking state.
#[derive(Debug)]
pub struct ObjectiveSlot {
    objective: Box<dyn Objective>,
    relative_tolerance: Option<f64>,
    best_score: Option<f64>,
}

impl ObjectiveSlot {
    fn new(objective: Box<dyn Objective>) -> Self {
        Self {
            objective,
            relative_tolerance: None,
            best_score: None,
        }
    }

    #[must_use]
    pub fn objective(&self) -> &dyn Objective {
        self.objective.as_ref()
    }

    /// Tolerance band override (`None` uses `optimize.relative_tolerance`).
    #[must_use]
    pub fn relative_tolerance(&self) -> Option<f64> {
        self.relative_tolerance
    }

    pub fn set_relative_tolerance(&mut self, tolerance: f64) -> &mut Self {
        self.relative_tolerance = Some(tolerance.max(0.0));
        self
    }

    /// Smoothed best score observed across frames.
    #[must_use]
    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    /// Score a candidate. Non-finite scores map to negative infinity.
    pub fn evaluate(&self, cx: &EvaluationContext<'_>) -> f64 {
        let score = self.objective.evaluate(cx);
        debug_assert!(
            score.is_finite(),
            "objective `{}` returned a non-finite score: {score}",
            self.objective.name()
        );
        if score.is_finite() {
            score
        } else {
            warn!(
                objective = self.objective.name(),
                score, "non-finite objective score"
            );
            f64::NEG_INFINITY
        }
    }

    /// Fold the population best of this frame into the smoothed best.
    pub(crate) fn observe_best(&mut self, score: f64, smoothing: f64) {
        if !score.is_finite() {
            return;
        }
        self.best_score = Some(match self.best_score {
            None => score,
            Some(best) => best + (score - best) * smoothing,
        });
    }

    pub(crate) fn reset(&mut self) {
        self.best_score = None;
    }
}

// ---------------------------------------------------------------------------
// SpatialLayout
// ---------------------------------------------------------------------------

/// A named set of objectives and the population searching for them.
#[derive(Debug, Default)]
pub struct SpatialLayout {
    name: Option<String>,
    objectives: Vec<ObjectiveSlot>,
    parent: Option<NodeKey>,
    accuracy: Accuracy,
    optimize: OptimizeOptions,
    transition: TransitionOptions,
    pub(crate) solutions: Vec<LayoutSolution>,
}

impl SpatialLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: label used in logs.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: append an objective.
    #[must_use]
    pub fn with_objective(mut self, objective: impl Objective + 'static) -> Self {
        self.add_objective(objective);
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Append an objective at the lowest priority.
    pub fn add_objective(&mut self, objective: impl Objective + 'static) -> &mut ObjectiveSlot {
        self.add_boxed_objective(Box::new(objective))
    }

    /// Append a boxed objective at the lowest priority.
    pub fn add_boxed_objective(&mut self, objective: Box<dyn Objective>) -> &mut ObjectiveSlot {
        self.objectives.push(ObjectiveSlot::new(objective));
        self.reset();
        let last = self.objectives.len() - 1;
        &mut self.objectives[last]
    }

    /// Objectives in priority order.
    #[must_use]
    pub fn objectives(&self) -> &[ObjectiveSlot] {
        &self.objectives
    }

    pub(crate) fn objectives_mut(&mut self) -> &mut [ObjectiveSlot] {
        &mut self.objectives
    }

    /// Parent the node is laid out under while this layout is active
    /// (`None` keeps the adapter's parent).
    #[must_use]
    pub fn target_parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn set_target_parent(&mut self, parent: Option<NodeKey>) {
        self.parent = parent;
    }

    #[must_use]
    pub fn accuracy(&self) -> &Accuracy {
        &self.accuracy
    }

    pub fn accuracy_mut(&mut self) -> &mut Accuracy {
        &mut self.accuracy
    }

    #[must_use]
    pub fn optimize_options(&self) -> &OptimizeOptions {
        &self.optimize
    }

    pub fn optimize_options_mut(&mut self) -> &mut OptimizeOptions {
        &mut self.optimize
    }

    #[must_use]
    pub fn transition_options(&self) -> &TransitionOptions {
        &self.transition
    }

    pub fn transition_options_mut(&mut self) -> &mut TransitionOptions {
        &mut self.transition
    }

    /// Population, best first.
    #[must_use]
    pub fn solutions(&self) -> &[LayoutSolution] {
        &self.solutions
    }

    /// Best solution of the population.
    #[must_use]
    pub fn best_solution(&self) -> Option<&LayoutSolution> {
        self.solutions.first()
    }

    /// Sum of the negative scores of the best solution (0 when every
    /// constraint holds, infinite when any score is not finite).
    #[must_use]
    pub fn violation(&self) -> f64 {
        self.best_solution().map_or(f64::INFINITY, LayoutSolution::violation)
    }

    /// Drop the population and the smoothed best scores.
    pub fn reset(&mut self) {
        self.solutions.clear();
        self.objectives.iter_mut().for_each(ObjectiveSlot::reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectives::{AspectObjective, VisualMaximizeObjective};

    #[test]
    fn objectives_keep_declared_order() {
        let mut layout = SpatialLayout::new()
            .with_name("hud")
            .with_objective(AspectObjective::default());
        layout
            .add_objective(VisualMaximizeObjective)
            .set_relative_tolerance(0.2);
        let names: Vec<_> = layout
            .objectives()
            .iter()
            .map(|s| s.objective().name())
            .collect();
        assert_eq!(names, ["aspect", "visual_maximize"]);
        assert_eq!(layout.objectives()[1].relative_tolerance(), Some(0.2));
        assert_eq!(layout.name(), Some("hud"));
    }

    #[test]
    fn best_score_takes_first_observation_then_smooths() {
        let mut layout = SpatialLayout::new().with_objective(VisualMaximizeObjective);
        let slot = &mut layout.objectives_mut()[0];
        slot.observe_best(10.0, 0.1);
        assert_eq!(slot.best_score(), Some(10.0));
        slot.observe_best(20.0, 0.1);
        assert!((slot.best_score().unwrap() - 11.0).abs() < 1e-12);
        slot.observe_best(f64::NAN, 0.1);
        assert!((slot.best_score().unwrap() - 11.0).abs() < 1e-12);
    }

    #[test]
    fn empty_layout_is_maximally_violated() {
        assert_eq!(SpatialLayout::new().violation(), f64::INFINITY);
    }
}
