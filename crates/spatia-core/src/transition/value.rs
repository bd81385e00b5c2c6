#![forbid(unsafe_code)]

//! Value types a [`Transitionable`](super::Transitionable) can drive.

use crate::difference::RelativeDifference;
use crate::geometry::{Box3, Quat, Vec3};

/// An interpolable value.
///
/// `blend` adds the partial change `lerp(from, to, alpha) - from` on top of
/// `self`; for rotations the partial change is applied as a left-multiplied
/// delta rotation.
pub trait Transitional: Clone + RelativeDifference {
    /// Interpolate from `self` toward `to` by `alpha` in `[0, 1]`.
    #[must_use]
    fn lerp_to(&self, to: &Self, alpha: f64) -> Self;

    /// Add the partial change from `from` toward `to` onto `self`.
    #[must_use]
    fn blend(&self, from: &Self, to: &Self, alpha: f64) -> Self;
}

impl Transitional for f64 {
    fn lerp_to(&self, to: &Self, alpha: f64) -> Self {
        self + (to - self) * alpha
    }

    fn blend(&self, from: &Self, to: &Self, alpha: f64) -> Self {
        self + (to - from) * alpha
    }
}

impl Transitional for Vec3 {
    fn lerp_to(&self, to: &Self, alpha: f64) -> Self {
        self + (to - self) * alpha
    }

    fn blend(&self, from: &Self, to: &Self, alpha: f64) -> Self {
        self + (to - from) * alpha
    }
}

/// Shortest-arc rotation from `from` toward `to`.
///
/// Unlike `UnitQuaternion::slerp`, this never panics on half-turns.
#[must_use]
pub fn slerp(from: &Quat, to: &Quat, alpha: f64) -> Quat {
    let delta = from.inverse() * to;
    from * Quat::from_scaled_axis(delta.scaled_axis() * alpha)
}

impl Transitional for Quat {
    fn lerp_to(&self, to: &Self, alpha: f64) -> Self {
        slerp(self, to, alpha)
    }

    fn blend(&self, from: &Self, to: &Self, alpha: f64) -> Self {
        let partial = slerp(from, to, alpha) * from.inverse();
        partial * self
    }
}

impl Transitional for Box3 {
    fn lerp_to(&self, to: &Self, alpha: f64) -> Self {
        if self.is_empty() || to.is_empty() {
            return if alpha >= 1.0 { *to } else { *self };
        }
        self.lerp(to, alpha)
    }

    fn blend(&self, from: &Self, to: &Self, alpha: f64) -> Self {
        if self.is_empty() || from.is_empty() || to.is_empty() {
            return self.lerp_to(to, alpha);
        }
        Box3::new(
            self.min + (to.min - from.min) * alpha,
            self.max + (to.max - from.max) * alpha,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use nalgebra::Vector3;
    use std::f64::consts::PI;

    #[test]
    fn scalar_blend_adds_delta() {
        assert_eq!(5.0_f64.blend(&0.0, &2.0, 0.5), 6.0);
        assert_eq!(5.0_f64.lerp_to(&7.0, 0.5), 6.0);
    }

    #[test]
    fn half_turn_slerp_does_not_panic() {
        let a = Quat::identity();
        let b = Quat::from_axis_angle(&Vector3::y_axis(), PI);
        let mid = slerp(&a, &b, 0.5);
        assert!((mid.angle() - PI / 2.0).abs() < 1e-9);
        assert!(slerp(&a, &b, 1.0).angle_to(&b) < 1e-6);
    }

    #[test]
    fn quaternion_blend_from_identity_is_target() {
        let from = Quat::identity();
        let to = Quat::from_axis_angle(&Vector3::x_axis(), 0.4);
        let acc = Quat::from_axis_angle(&Vector3::z_axis(), 0.2);
        let out = from.blend(&from, &to, 1.0);
        assert!(out.angle_to(&to) < 1e-6);
        assert!(acc.blend(&to, &to, 0.7).angle_to(&acc) < 1e-6);
    }

    #[test]
    fn empty_box_snaps_at_completion() {
        let full = Box3::from_center_size(Point::origin(), Vec3::repeat(1.0));
        assert!(Box3::empty().lerp_to(&full, 0.5).is_empty());
        assert_eq!(Box3::empty().lerp_to(&full, 1.0), full);
    }
}
