#![forbid(unsafe_code)]

//! Population search over placements (directional-pulse bat algorithm).
//!
//! Each frame the optimizer carries every layout's population forward by a
//! bounded number of sweeps. A sweep visits each solution once and proposes
//! one candidate for it:
//!
//! - **Pulse** (probability `pulse_rate`): move a random fraction of the way
//!   toward the population best; if that helps, also toward a random solution
//!   that already ranks better. Directed exploitation.
//! - **Mutation** otherwise: a roulette-selected [`MutationKind`] with a
//!   Levy or Gaussian step scaled by the strategy's adaptive step size.
//!   Undirected exploration.
//!
//! A candidate replaces its solution only if it ranks strictly better, so
//! the population best never gets worse while objectives and targets are
//! static.
//!
//! # Ranking
//!
//! [`compare_scores`] is lexicographic over objectives with tolerance bands:
//!
//! ```text
//! best_i  = max(best_score_i, a_i, b_i)
//! floor_i = best_i - |best_i| * tolerance_i
//! out(s)  = s < floor_i || s < 0
//! ```
//!
//! If either score is out of band and they differ, objective `i` decides.
//! Otherwise the next objective is examined; when every objective is in band
//! the lowest-priority objective decides. Solutions with any non-finite score
//! rank last.
//!
//! The band makes the relation non-transitive, so populations are ranked
//! with an insertion sort, which never panics on inconsistent orderings.
//!
//! # Failure Modes
//!
//! - Non-finite scores are mapped to negative infinity by
//!   [`ObjectiveSlot::evaluate`](crate::layout::ObjectiveSlot::evaluate); such
//!   solutions sink to the end of the population.
//! - A solution stuck at the minimum step size far from the best is restarted
//!   at random with probability `stale_restart_rate`.

use std::cmp::Ordering;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;
use spatia_core::{Box3, Point, Quat, Vec3};
use tracing::{debug, trace};

use crate::binding::NodeKey;
use crate::config::{EpsilonConfig, OptimizeConfig, StepDistribution};
use crate::layout::{ObjectiveSlot, SpatialLayout};
use crate::metrics::{Occluder, PlacementFrame};
use crate::objectives::EvaluationContext;
use crate::solution::{LayoutSolution, MutationKind, Scores};
use crate::state::{NodeState, ViewState};

/// Levy exponent.
pub const LEVY_BETA: f64 = 1.5;
/// Mantegna's sigma for [`LEVY_BETA`].
pub const LEVY_SIGMA: f64 = 0.696_574_502_557_696_5;
/// Magnitude cap of a single Levy sample.
pub const LEVY_CLAMP: f64 = 10.0;

/// Smallest relative size a random restart may pick.
const RANDOM_SIZE_MIN: f64 = 0.5;
/// Largest relative size a random restart may pick.
const RANDOM_SIZE_MAX: f64 = 2.0;
/// Depth span (meters past the near plane) random restarts are placed in.
const RANDOM_DEPTH_SPAN: f64 = 10.0;

// ===========================================================================
// Ranking
// ===========================================================================

/// Ranking state of one objective.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ToleranceBand {
    /// Smoothed best score seen so far, if any.
    pub best: Option<f64>,
    /// Relative width of the band.
    pub tolerance: f64,
}

/// Bands of every objective of `layout`, in priority order.
#[must_use]
pub fn bands(layout: &SpatialLayout, config: &OptimizeConfig) -> SmallVec<[ToleranceBand; 8]> {
    layout
        .objectives()
        .iter()
        .map(|slot: &ObjectiveSlot| ToleranceBand {
            best: slot.best_score(),
            tolerance: slot
                .relative_tolerance()
                .unwrap_or(config.relative_tolerance),
        })
        .collect()
}

/// Compare two score vectors. `Less` means `a` ranks better.
#[must_use]
pub fn compare_scores(a: &[f64], b: &[f64], bands: &[ToleranceBand]) -> Ordering {
    let a_fit = a.iter().all(|s| s.is_finite());
    let b_fit = b.iter().all(|s| s.is_finite());
    match (a_fit, b_fit) {
        (false, false) => return Ordering::Equal,
        (false, true) => return Ordering::Greater,
        (true, false) => return Ordering::Less,
        (true, true) => {}
    }
    let n = a.len().min(b.len());
    if n == 0 {
        return Ordering::Equal;
    }
    for i in 0..n {
        let (sa, sb) = (a[i], b[i]);
        let band = bands.get(i).copied().unwrap_or_default();
        let best = band.best.map_or(sa.max(sb), |best| best.max(sa).max(sb));
        let floor = best - best.abs() * band.tolerance;
        let out = |s: f64| s < floor || s < 0.0;
        if (out(sa) || out(sb)) && sa != sb {
            return sb.total_cmp(&sa);
        }
    }
    b[n - 1].total_cmp(&a[n - 1])
}

/// Compare two solutions of the same layout. `Less` means `a` ranks better.
#[must_use]
pub fn compare_solutions(
    a: &LayoutSolution,
    b: &LayoutSolution,
    bands: &[ToleranceBand],
) -> Ordering {
    compare_scores(a.scores(), b.scores(), bands)
}

/// Stable insertion sort, best first.
pub fn rank_solutions(solutions: &mut [LayoutSolution], bands: &[ToleranceBand]) {
    for i in 1..solutions.len() {
        let mut j = i;
        while j > 0 && compare_solutions(&solutions[j], &solutions[j - 1], bands) == Ordering::Less {
            solutions.swap(j, j - 1);
            j -= 1;
        }
    }
}

// ===========================================================================
// Evaluation
// ===========================================================================

/// Scores placements of one node for one layout.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    pub key: NodeKey,
    pub frame: &'a PlacementFrame,
    pub parent: Option<&'a NodeState>,
    pub occluders: &'a [Occluder],
    pub epsilon: &'a EpsilonConfig,
}

impl Evaluator<'_> {
    /// Score `solution` against the objectives of `layout`.
    pub fn evaluate(&self, layout: &SpatialLayout, solution: &mut LayoutSolution) {
        let state = self.frame.state_for(&solution.placement());
        let cx = EvaluationContext {
            key: self.key,
            state: &state,
            parent: self.parent,
            accuracy: layout.accuracy(),
            occluders: self.occluders,
            epsilon: self.epsilon,
        };
        let scores: Scores = layout.objectives().iter().map(|slot| slot.evaluate(&cx)).collect();
        solution.set_scores(scores);
    }
}

/// Where random solutions are drawn from.
#[derive(Debug, Clone, Copy)]
pub struct SearchSpace<'a> {
    /// Placement used for orientation and reference size.
    pub reference: &'a LayoutSolution,
    /// Viewer pose and field of view.
    pub view: &'a ViewState,
}

// ===========================================================================
// SpatialOptimizer
// ===========================================================================

/// Seeded population optimizer shared by every layout of a system.
#[derive(Debug, Clone)]
pub struct SpatialOptimizer {
    rng: SmallRng,
}

impl SpatialOptimizer {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Advance the population of `layout` by one frame.
    ///
    /// `space.reference` is the adapter's current target placement; it seeds
    /// an empty population and sizes random restarts.
    pub fn update_layout(
        &mut self,
        layout: &mut SpatialLayout,
        evaluator: &Evaluator<'_>,
        space: &SearchSpace<'_>,
        config: &OptimizeConfig,
    ) {
        if layout.objectives().is_empty() {
            layout.solutions.clear();
            return;
        }
        let swarm = config.swarm_size.max(1);
        let mut solutions = std::mem::take(&mut layout.solutions);

        for solution in &mut solutions {
            evaluator.evaluate(layout, solution);
        }
        if solutions.is_empty() {
            let mut seed = space.reference.clone();
            evaluator.evaluate(layout, &mut seed);
            solutions.push(seed);
        }
        while solutions.len() < swarm {
            let mut s = self.random_solution(space, evaluator.epsilon, config);
            evaluator.evaluate(layout, &mut s);
            solutions.push(s);
        }

        let bands = bands(layout, config);
        rank_solutions(&mut solutions, &bands);
        solutions.truncate(swarm);

        for sweep in 0..config.iterations_per_frame {
            for i in 0..solutions.len() {
                self.step(&mut solutions, i, layout, evaluator, space, config, &bands);
            }
            rank_solutions(&mut solutions, &bands);
            trace!(
                sweep,
                best = ?solutions.first().map(LayoutSolution::scores),
                "optimizer sweep"
            );
        }

        if let Some(best) = solutions.first() {
            let smoothing = config.best_score_smoothing;
            for (slot, score) in layout.objectives_mut().iter_mut().zip(best.scores()) {
                slot.observe_best(*score, smoothing);
            }
        }
        layout.solutions = solutions;
    }

    #[allow(clippy::too_many_arguments)]
    fn step(
        &mut self,
        solutions: &mut [LayoutSolution],
        i: usize,
        layout: &SpatialLayout,
        evaluator: &Evaluator<'_>,
        space: &SearchSpace<'_>,
        config: &OptimizeConfig,
        bands: &[ToleranceBand],
    ) {
        if self.rng.random::<f64>() < config.pulse_rate {
            self.pulse(solutions, i, layout, evaluator, config, bands);
        } else {
            self.mutate(solutions, i, layout, evaluator, space, config, bands);
        }
    }

    fn pulse_fraction(&mut self, config: &OptimizeConfig) -> f64 {
        let span = (config.pulse_frequency_max - config.pulse_frequency_min).max(0.0);
        config.pulse_frequency_min + span * self.rng.random::<f64>()
    }

    fn pulse(
        &mut self,
        solutions: &mut [LayoutSolution],
        i: usize,
        layout: &SpatialLayout,
        evaluator: &Evaluator<'_>,
        config: &OptimizeConfig,
        bands: &[ToleranceBand],
    ) {
        if i == 0 {
            return;
        }
        let t = self.pulse_fraction(config);
        let mut candidate = solutions[i].moved_toward(&solutions[0], t);
        evaluator.evaluate(layout, &mut candidate);
        if compare_solutions(&candidate, &solutions[i], bands) != Ordering::Less {
            return;
        }
        let j = self.rng.random_range(0..solutions.len());
        if j != i && compare_solutions(&solutions[j], &solutions[i], bands) == Ordering::Less {
            let t = self.pulse_fraction(config);
            let mut further = candidate.moved_toward(&solutions[j], t);
            evaluator.evaluate(layout, &mut further);
            if compare_solutions(&further, &candidate, bands) == Ordering::Less {
                candidate = further;
            }
        }
        solutions[i] = candidate;
    }

    #[allow(clippy::too_many_arguments)]
    fn mutate(
        &mut self,
        solutions: &mut [LayoutSolution],
        i: usize,
        layout: &SpatialLayout,
        evaluator: &Evaluator<'_>,
        space: &SearchSpace<'_>,
        config: &OptimizeConfig,
        bands: &[ToleranceBand],
    ) {
        let k = self.pick_strategy(&solutions[i], config.success_rate_min);
        let strategy = solutions[i].strategies[k];
        let amount = self.sample_step(config.step_distribution) * strategy.step_size;
        let mut candidate = solutions[i].mutated(strategy.kind, amount, &mut self.rng);
        evaluator.evaluate(layout, &mut candidate);

        let alpha = 1.0 / config.success_rate_window.max(1) as f64;
        let accepted = compare_solutions(&candidate, &solutions[i], bands) == Ordering::Less;
        if accepted {
            solutions[i] = candidate;
        }
        let s = &mut solutions[i].strategies[k];
        if accepted {
            s.success_rate += (1.0 - s.success_rate) * alpha;
            s.step_size = (s.step_size * config.diversification_factor).min(config.step_size_max);
            return;
        }
        s.success_rate -= s.success_rate * alpha;
        s.step_size = (s.step_size * config.intensification_factor()).max(config.step_size_min);

        let stale = s.step_size <= config.step_size_min
            && i != 0
            && solutions[i].relative_difference(&solutions[0]) > config.relative_tolerance
            && self.rng.random::<f64>() < config.stale_restart_rate;
        if stale {
            debug!(key = ?evaluator.key, solution = i, "stale restart");
            let mut fresh = self.random_solution(space, evaluator.epsilon, config);
            evaluator.evaluate(layout, &mut fresh);
            solutions[i] = fresh;
        }
    }

    /// Roulette selection over success rates floored at `floor`.
    fn pick_strategy(&mut self, solution: &LayoutSolution, floor: f64) -> usize {
        let weight = |rate: f64| rate.max(floor).max(f64::MIN_POSITIVE);
        let total: f64 = solution.strategies.iter().map(|s| weight(s.success_rate)).sum();
        let mut roll = self.rng.random::<f64>() * total;
        for (k, s) in solution.strategies.iter().enumerate() {
            roll -= weight(s.success_rate);
            if roll <= 0.0 {
                return k;
            }
        }
        MutationKind::COUNT - 1
    }

    /// Signed step sample from `distribution`.
    pub fn sample_step(&mut self, distribution: StepDistribution) -> f64 {
        match distribution {
            StepDistribution::Levy => self.levy(),
            StepDistribution::Gaussian => self.gaussian(),
            StepDistribution::Mixed => {
                if self.rng.random::<bool>() {
                    self.levy()
                } else {
                    self.gaussian()
                }
            }
        }
    }

    // Box-Muller.
    fn gaussian(&mut self) -> f64 {
        let u1 = 1.0 - self.rng.random::<f64>();
        let u2 = self.rng.random::<f64>();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    // Mantegna's algorithm.
    fn levy(&mut self) -> f64 {
        let u = self.gaussian() * LEVY_SIGMA;
        let v = self.gaussian().abs().max(f64::MIN_POSITIVE);
        (u / v.powf(1.0 / LEVY_BETA)).clamp(-LEVY_CLAMP, LEVY_CLAMP)
    }

    /// Random placement inside the view, sized relative to the reference.
    pub fn random_solution(
        &mut self,
        space: &SearchSpace<'_>,
        epsilon: &EpsilonConfig,
        config: &OptimizeConfig,
    ) -> LayoutSolution {
        let frustum = space.view.frustum();
        let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;
        let h = lerp(frustum.left(), frustum.right(), self.rng.random::<f64>()).to_radians();
        let v = lerp(frustum.bottom(), frustum.top(), self.rng.random::<f64>()).to_radians();
        let direction = Vec3::new(h.tan(), v.tan(), -1.0).normalize();
        let near = frustum.near().max(epsilon.meters);
        let far = frustum.far().min(near + RANDOM_DEPTH_SPAN).max(near);
        let distance = lerp(near, far, self.rng.random::<f64>());
        let center = space
            .view
            .pose()
            .transform_point(&Point::from(direction * distance));

        let reference = space.reference.bounds.size();
        let reference = if reference.iter().all(|s| *s > epsilon.meters) {
            reference
        } else {
            Vec3::repeat(1.0)
        };
        let factor = lerp(
            RANDOM_SIZE_MIN.ln(),
            RANDOM_SIZE_MAX.ln(),
            self.rng.random::<f64>(),
        )
        .exp();
        let orientation: Quat = space.reference.orientation;
        LayoutSolution::new(
            orientation,
            Box3::from_center_size(center, reference * factor),
            config.step_size_start,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
