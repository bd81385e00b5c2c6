#![forbid(unsafe_code)]

//! Declarative target specs and their scoring.
//!
//! A spec describes the accepted values of a measured quantity. Scoring is
//! the negated distance outside the accepted set, after subtracting the
//! accuracy dead-zone:
//!
//! ```text
//! Exact(m)          -max(|v - m| - accuracy, 0)
//! Range { gt, lt }  -max(distance outside (gt, lt) - accuracy, 0)
//! AnyOf(specs)      max over specs
//! Vec3Spec          -sqrt(sum of squared per-axis scores)
//! BoundsSpec        sum of per-edge scores
//! ```
//!
//! Measures carry a [`Unit`]. Each objective resolves measures into the unit
//! it measures in and rejects units it cannot resolve at construction.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use spatia_core::{Quat, Vec3};

use super::Unit;
use crate::error::{LayoutError, Result};

// ---------------------------------------------------------------------------
// Measure
// ---------------------------------------------------------------------------

/// A number with a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Meters(f64),
    Percent(f64),
    Pixels(f64),
    Degrees(f64),
}

impl Measure {
    #[must_use]
    pub fn unit(self) -> Unit {
        match self {
            Self::Meters(_) => Unit::Meters,
            Self::Percent(_) => Unit::Percent,
            Self::Pixels(_) => Unit::Pixels,
            Self::Degrees(_) => Unit::Degrees,
        }
    }

    #[must_use]
    pub fn value(self) -> f64 {
        match self {
            Self::Meters(v) | Self::Percent(v) | Self::Pixels(v) | Self::Degrees(v) => v,
        }
    }
}

fn check_unit(unit: Unit, allowed: &[Unit], objective: &'static str, field: &'static str) -> Result<()> {
    if allowed.contains(&unit) {
        Ok(())
    } else {
        Err(LayoutError::InvalidUnit {
            objective,
            field,
            unit,
        })
    }
}

// ---------------------------------------------------------------------------
// NumberSpec
// ---------------------------------------------------------------------------

/// Accepted values of a scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberSpec {
    /// Exactly this value.
    Exact(Measure),
    /// Strictly above `gt` and below `lt`; a missing side is unbounded.
    Range {
        gt: Option<Measure>,
        lt: Option<Measure>,
    },
    /// Any of the alternatives; the best-scoring one counts.
    AnyOf(Vec<NumberSpec>),
}

impl NumberSpec {
    #[must_use]
    pub fn exact(value: Measure) -> Self {
        Self::Exact(value)
    }

    #[must_use]
    pub fn at_least(value: Measure) -> Self {
        Self::Range {
            gt: Some(value),
            lt: None,
        }
    }

    #[must_use]
    pub fn at_most(value: Measure) -> Self {
        Self::Range {
            gt: None,
            lt: Some(value),
        }
    }

    #[must_use]
    pub fn between(low: Measure, high: Measure) -> Self {
        Self::Range {
            gt: Some(low),
            lt: Some(high),
        }
    }

    #[must_use]
    pub fn any_of(specs: impl IntoIterator<Item = NumberSpec>) -> Self {
        Self::AnyOf(specs.into_iter().collect())
    }

    /// Every unit this number spec mentions.
    #[must_use]
    pub fn units(&self) -> SmallVec<[Unit; 4]> {
        let mut out = SmallVec::new();
        self.collect_units(&mut out);
        out
    }

    fn collect_units(&self, out: &mut SmallVec<[Unit; 4]>) {
        match self {
            Self::Exact(m) => out.push(m.unit()),
            Self::Range { gt, lt } => out.extend(gt.iter().chain(lt.iter()).map(|m| m.unit())),
            Self::AnyOf(specs) => specs.iter().for_each(|s| s.collect_units(out)),
        }
    }

    /// Fail with [`LayoutError::InvalidUnit`] if a unit is not in `allowed`.
    pub fn check_units(
        &self,
        allowed: &[Unit],
        objective: &'static str,
        field: &'static str,
    ) -> Result<()> {
        self.units()
            .into_iter()
            .try_for_each(|u| check_unit(u, allowed, objective, field))
    }

    /// Score `value` against the accepted values.
    ///
    /// `resolve` converts a measure into the unit `value` is measured in and
    /// `accuracy` is the dead-zone in that unit.
    #[must_use]
    pub fn score(&self, value: f64, accuracy: f64, resolve: &dyn Fn(Measure) -> f64) -> f64 {
        match self {
            Self::Exact(m) => -((value - resolve(*m)).abs() - accuracy).max(0.0),
            Self::Range { gt, lt } => {
                let low = gt.map(resolve);
                let high = lt.map(resolve);
                let distance = match (low, high) {
                    (Some(lo), _) if value < lo => lo - value,
                    (_, Some(hi)) if value > hi => value - hi,
                    _ => 0.0,
                };
                -(distance - accuracy).max(0.0)
            }
            Self::AnyOf(specs) => specs
                .iter()
                .map(|s| s.score(value, accuracy, resolve))
                .reduce(f64::max)
                .unwrap_or(0.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Vec3Spec
// ---------------------------------------------------------------------------

/// Per-axis specs; unset axes are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vec3Spec {
    pub x: Option<NumberSpec>,
    pub y: Option<NumberSpec>,
    pub z: Option<NumberSpec>,
}

impl Vec3Spec {
    /// Same spec on every axis.
    #[must_use]
    pub fn uniform(spec: NumberSpec) -> Self {
        Self {
            x: Some(spec.clone()),
            y: Some(spec.clone()),
            z: Some(spec),
        }
    }

    #[must_use]
    pub fn with_x(mut self, spec: NumberSpec) -> Self {
        self.x = Some(spec);
        self
    }

    #[must_use]
    pub fn with_y(mut self, spec: NumberSpec) -> Self {
        self.y = Some(spec);
        self
    }

    #[must_use]
    pub fn with_z(mut self, spec: NumberSpec) -> Self {
        self.z = Some(spec);
        self
    }

    /// Axis specs in x, y, z order.
    pub fn axes(&self) -> [Option<&NumberSpec>; 3] {
        [self.x.as_ref(), self.y.as_ref(), self.z.as_ref()]
    }

    /// Root-sum-square of per-axis scores.
    ///
    /// `accuracy[i]` and `resolve(axis, measure)` are per axis.
    #[must_use]
    pub fn score(
        &self,
        value: &Vec3,
        accuracy: &Vec3,
        resolve: &dyn Fn(usize, Measure) -> f64,
    ) -> f64 {
        let sum: f64 = self
            .axes()
            .iter()
            .enumerate()
            .filter_map(|(i, spec)| {
                spec.map(|s| s.score(value[i], accuracy[i], &|m| resolve(i, m)).powi(2))
            })
            .sum();
        -sum.sqrt()
    }
}

// ---------------------------------------------------------------------------
// QuaternionSpec
// ---------------------------------------------------------------------------

/// Accepted orientations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuaternionSpec {
    /// Exactly this orientation; scored by the angle to it in degrees.
    Exact(Quat),
    /// Euler angles (degrees, roll/pitch/yaw about x/y/z).
    Euler(Vec3Spec),
}

impl QuaternionSpec {
    /// Fail if an Euler spec uses a unit other than degrees.
    pub fn check_units(&self, objective: &'static str) -> Result<()> {
        match self {
            Self::Exact(_) => Ok(()),
            Self::Euler(spec) => spec
                .axes()
                .iter()
                .flatten()
                .try_for_each(|s| s.check_units(&[Unit::Degrees], objective, "euler")),
        }
    }

    /// Score `value`; `accuracy` is in degrees.
    #[must_use]
    pub fn score(&self, value: &Quat, accuracy: f64) -> f64 {
        match self {
            Self::Exact(target) => -(value.angle_to(target).to_degrees() - accuracy).max(0.0),
            Self::Euler(spec) => {
                let (roll, pitch, yaw) = value.euler_angles();
                let angles = Vec3::new(roll, pitch, yaw).map(f64::to_degrees);
                spec.score(&angles, &Vec3::repeat(accuracy), &|_, m| m.value())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BoundsSpec
// ---------------------------------------------------------------------------

/// Specs on the edges and extent of a box.
///
/// Edges map to axes as left/right = x, bottom/top = y, back/front = z.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsSpec {
    pub left: Option<NumberSpec>,
    pub right: Option<NumberSpec>,
    pub bottom: Option<NumberSpec>,
    pub top: Option<NumberSpec>,
    pub back: Option<NumberSpec>,
    pub front: Option<NumberSpec>,
    pub center: Option<Vec3Spec>,
    pub size: Option<Vec3Spec>,
    pub diagonal: Option<NumberSpec>,
}

/// One edge of a [`BoundsSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Left,
    Right,
    Bottom,
    Top,
    Back,
    Front,
}

impl Edge {
    pub const ALL: [Self; 6] = [
        Self::Left,
        Self::Right,
        Self::Bottom,
        Self::Top,
        Self::Back,
        Self::Front,
    ];

    /// Axis index the edge lies on.
    #[must_use]
    pub fn axis(self) -> usize {
        match self {
            Self::Left | Self::Right => 0,
            Self::Bottom | Self::Top => 1,
            Self::Back | Self::Front => 2,
        }
    }

    /// Whether the edge is the maximum side of its axis.
    #[must_use]
    pub fn is_max(self) -> bool {
        matches!(self, Self::Right | Self::Top | Self::Front)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::Top => "top",
            Self::Back => "back",
            Self::Front => "front",
        }
    }
}

impl BoundsSpec {
    #[must_use]
    pub fn with_edge(mut self, edge: Edge, spec: NumberSpec) -> Self {
        *self.edge_mut(edge) = Some(spec);
        self
    }

    #[must_use]
    pub fn with_center(mut self, spec: Vec3Spec) -> Self {
        self.center = Some(spec);
        self
    }

    #[must_use]
    pub fn with_size(mut self, spec: Vec3Spec) -> Self {
        self.size = Some(spec);
        self
    }

    #[must_use]
    pub fn with_diagonal(mut self, spec: NumberSpec) -> Self {
        self.diagonal = Some(spec);
        self
    }

    /// Spec of one edge.
    #[must_use]
    pub fn edge(&self, edge: Edge) -> Option<&NumberSpec> {
        match edge {
            Edge::Left => self.left.as_ref(),
            Edge::Right => self.right.as_ref(),
            Edge::Bottom => self.bottom.as_ref(),
            Edge::Top => self.top.as_ref(),
            Edge::Back => self.back.as_ref(),
            Edge::Front => self.front.as_ref(),
        }
    }

    fn edge_mut(&mut self, edge: Edge) -> &mut Option<NumberSpec> {
        match edge {
            Edge::Left => &mut self.left,
            Edge::Right => &mut self.right,
            Edge::Bottom => &mut self.bottom,
            Edge::Top => &mut self.top,
            Edge::Back => &mut self.back,
            Edge::Front => &mut self.front,
        }
    }

    /// Check every field against the units allowed on each axis and for the
    /// diagonal.
    pub fn check_units(
        &self,
        axis_units: [&[Unit]; 3],
        diagonal_units: &[Unit],
        objective: &'static str,
    ) -> Result<()> {
        for edge in Edge::ALL {
            if let Some(spec) = self.edge(edge) {
                spec.check_units(axis_units[edge.axis()], objective, edge.name())?;
            }
        }
        for (field, vec) in [("center", &self.center), ("size", &self.size)] {
            if let Some(vec) = vec {
                for (i, spec) in vec.axes().iter().enumerate() {
                    if let Some(spec) = spec {
                        spec.check_units(axis_units[i], objective, field)?;
                    }
                }
            }
        }
        if let Some(spec) = &self.diagonal {
            spec.check_units(diagonal_units, objective, "diagonal")?;
        }
        Ok(())
    }

    /// Sum of per-field scores of `value`.
    ///
    /// `resolve(axis, measure)` converts a measure on an axis (3 = diagonal)
    /// and `accuracy[axis]` is the dead-zone on that axis.
    #[must_use]
    pub fn score(
        &self,
        value: &spatia_core::Box3,
        accuracy: &[f64; 4],
        resolve: &dyn Fn(usize, Measure) -> f64,
    ) -> f64 {
        let mut total = 0.0;
        for edge in Edge::ALL {
            if let Some(spec) = self.edge(edge) {
                let axis = edge.axis();
                let v = if edge.is_max() {
                    value.max[axis]
                } else {
                    value.min[axis]
                };
                total += spec.score(v, accuracy[axis], &|m| resolve(axis, m));
            }
        }
        let axis_accuracy = Vec3::new(accuracy[0], accuracy[1], accuracy[2]);
        if let Some(spec) = &self.center {
            total += spec.score(&value.center().coords, &axis_accuracy, resolve);
        }
        if let Some(spec) = &self.size {
            total += spec.score(&value.size(), &axis_accuracy, resolve);
        }
        if let Some(spec) = &self.diagonal {
            total += spec.score(value.diagonal(), accuracy[3], &|m| resolve(3, m));
        }
        total
    }
}
