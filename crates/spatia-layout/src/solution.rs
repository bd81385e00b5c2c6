#![forbid(unsafe_code)]

//! Candidate placements and the mutation strategies that perturb them.
//!
//! A [`LayoutSolution`] is an orientation plus a box (world center, size
//! along the oriented axes). Every solution carries its own table of
//! [`MutationStrategy`] records, one per [`MutationKind`], whose step sizes
//! and success rates adapt as the solution is refined.
//!
//! # Invariants
//!
//! 1. Mutations never produce empty or inverted bounds: every extent stays at
//!    or above [`MIN_EXTENT`].
//! 2. Translational steps are relative to the bounds diagonal, so the same
//!    step size means the same relative move at any scale.

use rand::Rng;
use smallvec::SmallVec;
use spatia_core::transition::slerp;
use spatia_core::{Box3, Point, Quat, RelativeDifference, Vec3};

use crate::metrics::Placement;

/// Smallest extent (meters) a mutation can shrink an axis to.
pub const MIN_EXTENT: f64 = 1e-6;

/// Per-objective scores, in priority order.
pub type Scores = SmallVec<[f64; 8]>;

// ---------------------------------------------------------------------------
// MutationKind
// ---------------------------------------------------------------------------

/// The 28 ways a solution can be perturbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Rotate about a random axis.
    Rotate,
    CenterX,
    CenterY,
    CenterZ,
    SizeX,
    SizeY,
    SizeZ,
    /// Uniform scale about the center.
    SizeXyz,
    MinX,
    MinY,
    MinZ,
    MaxX,
    MaxY,
    MaxZ,
    /// Move the min edge and rescale the other axes to keep proportions.
    AspectMinX,
    AspectMinY,
    AspectMinZ,
    AspectMaxX,
    AspectMaxY,
    AspectMaxZ,
    /// Uniform scale about the corner opposite to the named one
    /// (bits `xyz`, 0 = min, 1 = max).
    Corner000,
    Corner001,
    Corner010,
    Corner011,
    Corner100,
    Corner101,
    Corner110,
    Corner111,
}

impl MutationKind {
    pub const COUNT: usize = 28;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Rotate,
        Self::CenterX,
        Self::CenterY,
        Self::CenterZ,
        Self::SizeX,
        Self::SizeY,
        Self::SizeZ,
        Self::SizeXyz,
        Self::MinX,
        Self::MinY,
        Self::MinZ,
        Self::MaxX,
        Self::MaxY,
        Self::MaxZ,
        Self::AspectMinX,
        Self::AspectMinY,
        Self::AspectMinZ,
        Self::AspectMaxX,
        Self::AspectMaxY,
        Self::AspectMaxZ,
        Self::Corner000,
        Self::Corner001,
        Self::Corner010,
        Self::Corner011,
        Self::Corner100,
        Self::Corner101,
        Self::Corner110,
        Self::Corner111,
    ];
}

/// Adaptive state of one mutation kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutationStrategy {
    pub kind: MutationKind,
    pub step_size: f64,
    pub success_rate: f64,
}

impl MutationStrategy {
    /// Fresh table with every strategy at `step_size`.
    #[must_use]
    pub fn table(step_size: f64) -> [Self; MutationKind::COUNT] {
        MutationKind::ALL.map(|kind| Self {
            kind,
            step_size,
            success_rate: 0.5,
        })
    }
}

// ---------------------------------------------------------------------------
// LayoutSolution
// ---------------------------------------------------------------------------

/// One candidate placement.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSolution {
    pub orientation: Quat,
    pub bounds: Box3,
    pub(crate) scores: Scores,
    pub(crate) best_scores: Scores,
    pub(crate) strategies: [MutationStrategy; MutationKind::COUNT],
}

impl LayoutSolution {
    /// Unscored solution with fresh strategies.
    #[must_use]
    pub fn new(orientation: Quat, bounds: Box3, step_size: f64) -> Self {
        Self {
            orientation,
            bounds,
            scores: Scores::new(),
            best_scores: Scores::new(),
            strategies: MutationStrategy::table(step_size),
        }
    }

    /// Placement described by the solution.
    #[must_use]
    pub fn placement(&self) -> Placement {
        Placement {
            orientation: self.orientation,
            bounds: self.bounds,
        }
    }

    /// Scores from the last evaluation, in priority order.
    #[must_use]
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Highest score each objective has reached on this solution.
    #[must_use]
    pub fn best_scores(&self) -> &[f64] {
        &self.best_scores
    }

    #[must_use]
    pub fn strategies(&self) -> &[MutationStrategy; MutationKind::COUNT] {
        &self.strategies
    }

    /// Whether every score is finite.
    #[must_use]
    pub fn is_fit(&self) -> bool {
        self.scores.iter().all(|s| s.is_finite())
    }

    /// Sum of negative scores (infinite if any score is not finite).
    #[must_use]
    pub fn violation(&self) -> f64 {
        if !self.is_fit() {
            return f64::INFINITY;
        }
        self.scores.iter().filter(|s| **s < 0.0).map(|s| -s).sum()
    }

    pub(crate) fn set_scores(&mut self, scores: Scores) {
        if self.best_scores.len() != scores.len() {
            self.best_scores = scores.clone();
        } else {
            for (best, s) in self.best_scores.iter_mut().zip(&scores) {
                if *s > *best || !best.is_finite() {
                    *best = *s;
                }
            }
        }
        self.scores = scores;
    }

    /// Larger of the orientation and bounds relative differences.
    #[must_use]
    pub fn relative_difference(&self, other: &Self) -> f64 {
        self.orientation
            .relative_difference(&other.orientation)
            .max(self.bounds.relative_difference(&other.bounds))
    }

    /// Placement moved a fraction `t` of the way toward `other`. Scores and
    /// strategies stay those of `self`.
    #[must_use]
    pub fn moved_toward(&self, other: &Self, t: f64) -> Self {
        Self {
            orientation: slerp(&self.orientation, &other.orientation, t),
            bounds: self.bounds.lerp(&other.bounds, t),
            ..self.clone()
        }
    }

    /// Placement perturbed by `kind`.
    ///
    /// `amount` is a signed step in units of the bounds diagonal (radians for
    /// rotation; log-scale for sizes).
    #[must_use]
    pub fn mutated<R: Rng + ?Sized>(&self, kind: MutationKind, amount: f64, rng: &mut R) -> Self {
        let mut next = self.clone();
        let diagonal = self.bounds.diagonal().max(MIN_EXTENT);
        let delta = amount * diagonal;
        let b = self.bounds;
        next.bounds = match kind {
            MutationKind::Rotate => {
                let axis = random_axis(rng);
                next.orientation = Quat::from_scaled_axis(axis * amount) * self.orientation;
                b
            }
            MutationKind::CenterX => b.translated(&(Vec3::x() * delta)),
            MutationKind::CenterY => b.translated(&(Vec3::y() * delta)),
            MutationKind::CenterZ => b.translated(&(Vec3::z() * delta)),
            MutationKind::SizeX => scale_axes(&b, &Vec3::new(amount.exp(), 1.0, 1.0)),
            MutationKind::SizeY => scale_axes(&b, &Vec3::new(1.0, amount.exp(), 1.0)),
            MutationKind::SizeZ => scale_axes(&b, &Vec3::new(1.0, 1.0, amount.exp())),
            MutationKind::SizeXyz => scale_axes(&b, &Vec3::repeat(amount.exp())),
            MutationKind::MinX => move_edge(&b, 0, false, delta),
            MutationKind::MinY => move_edge(&b, 1, false, delta),
            MutationKind::MinZ => move_edge(&b, 2, false, delta),
            MutationKind::MaxX => move_edge(&b, 0, true, delta),
            MutationKind::MaxY => move_edge(&b, 1, true, delta),
            MutationKind::MaxZ => move_edge(&b, 2, true, delta),
            MutationKind::AspectMinX => move_edge_keep_aspect(&b, 0, false, delta),
            MutationKind::AspectMinY => move_edge_keep_aspect(&b, 1, false, delta),
            MutationKind::AspectMinZ => move_edge_keep_aspect(&b, 2, false, delta),
            MutationKind::AspectMaxX => move_edge_keep_aspect(&b, 0, true, delta),
            MutationKind::AspectMaxY => move_edge_keep_aspect(&b, 1, true, delta),
            MutationKind::AspectMaxZ => move_edge_keep_aspect(&b, 2, true, delta),
            MutationKind::Corner000 => scale_about_opposite(&b, 0b000, amount),
            MutationKind::Corner001 => scale_about_opposite(&b, 0b001, amount),
            MutationKind::Corner010 => scale_about_opposite(&b, 0b010, amount),
            MutationKind::Corner011 => scale_about_opposite(&b, 0b011, amount),
            MutationKind::Corner100 => scale_about_opposite(&b, 0b100, amount),
            MutationKind::Corner101 => scale_about_opposite(&b, 0b101, amount),
            MutationKind::Corner110 => scale_about_opposite(&b, 0b110, amount),
            MutationKind::Corner111 => scale_about_opposite(&b, 0b111, amount),
        };
        next
    }
}

fn random_axis<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    // Uniform on the sphere.
    let z: f64 = rng.random::<f64>() * 2.0 - 1.0;
    let phi: f64 = rng.random::<f64>() * std::f64::consts::TAU;
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

fn clamp_extent(size: &Vec3) -> Vec3 {
    size.map(|s| if s.is_finite() { s.max(MIN_EXTENT) } else { MIN_EXTENT })
}

fn scale_axes(b: &Box3, factors: &Vec3) -> Box3 {
    Box3::from_center_size(b.center(), clamp_extent(&b.size().component_mul(factors)))
}

fn move_edge(b: &Box3, axis: usize, max_side: bool, delta: f64) -> Box3 {
    let mut out = *b;
    if max_side {
        out.max[axis] = (b.max[axis] + delta).max(b.min[axis] + MIN_EXTENT);
    } else {
        out.min[axis] = (b.min[axis] + delta).min(b.max[axis] - MIN_EXTENT);
    }
    out
}

fn move_edge_keep_aspect(b: &Box3, axis: usize, max_side: bool, delta: f64) -> Box3 {
    let moved = move_edge(b, axis, max_side, delta);
    let before = b.size()[axis].max(MIN_EXTENT);
    let factor = moved.size()[axis] / before;
    let center = b.center();
    let size = b.size();
    let mut out = moved;
    for i in (0..3).filter(|i| *i != axis) {
        let half = (size[i] * factor).max(MIN_EXTENT) * 0.5;
        out.min[i] = center[i] - half;
        out.max[i] = center[i] + half;
    }
    out
}

fn scale_about_opposite(b: &Box3, corner: usize, amount: f64) -> Box3 {
    let corners = b.corners();
    let pivot = corners[7 - corner];
    let factor = amount.exp();
    let size = b.size();
    if size.iter().any(|s| *s * factor < MIN_EXTENT) {
        return *b;
    }
    let scaled = |p: &Point| pivot + (p - pivot) * factor;
    Box3::from_points(&[scaled(&b.min), scaled(&b.max)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn solution() -> LayoutSolution {
        LayoutSolution::new(
            Quat::identity(),
            Box3::from_center_size(Point::new(1.0, 2.0, 3.0), Vec3::new(2.0, 4.0, 1.0)),
            0.5,
        )
    }

    #[test]
    fn there_are_twenty_eight_distinct_kinds() {
        let kinds: rustc_hash::FxHashSet<_> = MutationKind::ALL.iter().collect();
        assert_eq!(kinds.len(), 28);
        assert_eq!(solution().strategies().len(), 28);
    }

    #[test]
    fn every_mutation_changes_the_solution_and_keeps_bounds_valid() {
        let mut rng = SmallRng::seed_from_u64(7);
        let base = solution();
        for kind in MutationKind::ALL {
            for amount in [-5.0, -0.3, 0.3, 5.0] {
                let next = base.mutated(kind, amount, &mut rng);
                assert!(!next.bounds.is_empty(), "{kind:?} {amount}");
                assert!(next.bounds.is_finite(), "{kind:?} {amount}");
                assert!(next.bounds.size().min() >= MIN_EXTENT * 0.999, "{kind:?} {amount}");
            }
            let next = base.mutated(kind, 0.3, &mut rng);
            assert_ne!(next, base, "{kind:?}");
        }
    }

    #[test]
    fn corner_mutation_pins_the_opposite_corner() {
        let mut rng = SmallRng::seed_from_u64(1);
        let base = solution();
        let next = base.mutated(MutationKind::Corner111, 0.5, &mut rng);
        assert!((next.bounds.min - base.bounds.min).norm() < 1e-12);
        let ratio = next.bounds.size().component_div(&base.bounds.size());
        assert!((ratio.x - 0.5_f64.exp()).abs() < 1e-12);
        assert!((ratio.y - ratio.z).abs() < 1e-12);
    }

    #[test]
    fn aspect_mutation_keeps_proportions() {
        let mut rng = SmallRng::seed_from_u64(1);
        let base = solution();
        let next = base.mutated(MutationKind::AspectMaxX, 0.1, &mut rng);
        let before = base.bounds.size();
        let after = next.bounds.size();
        assert!((after.y / after.x - before.y / before.x).abs() < 1e-9);
        assert!((after.z / after.x - before.z / before.x).abs() < 1e-9);
        assert_eq!(next.bounds.min.x, base.bounds.min.x);
    }

    #[test]
    fn moving_toward_reaches_the_other_solution() {
        let a = solution();
        let mut b = solution();
        b.orientation = Quat::from_euler_angles(0.0, 1.0, 0.0);
        b.bounds = b.bounds.translated(&Vec3::new(4.0, 0.0, 0.0));
        let end = a.moved_toward(&b, 1.0);
        assert!(end.relative_difference(&b) < 1e-6);
        assert_eq!(a.moved_toward(&b, 0.0).bounds, a.bounds);
    }

    #[test]
    fn violation_sums_negative_scores() {
        let mut s = solution();
        s.set_scores(Scores::from_slice(&[-1.0, 2.0, -0.5]));
        assert_eq!(s.violation(), 1.5);
        s.set_scores(Scores::from_slice(&[0.0, 3.0, f64::NAN]));
        assert_eq!(s.violation(), f64::INFINITY);
        assert_eq!(s.best_scores()[1], 3.0);
    }
}
