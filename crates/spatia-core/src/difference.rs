#![forbid(unsafe_code)]

//! Unitless relative-difference measures.
//!
//! The transition engine compares values of different types against a single
//! `threshold`. Each type implements [`RelativeDifference`] so that the
//! comparison is scale-free:
//!
//! | Type | Measure |
//! |------|---------|
//! | `f64` | `|a - b| / avg(|a|, |b|)` |
//! | `Vector3` | `distance / avg(|a|, |b|)` |
//! | `Box3` | `avg(corner distances) / avg(size magnitudes)` |
//! | `UnitQuaternion` | `angle between / pi`, in `[0, 1]` |
//!
//! # Invariants
//!
//! 1. The result is zero iff the values are equal.
//! 2. The result is never negative and never NaN.
//! 3. A zero denominator with a non-zero numerator yields `+inf`.

use crate::geometry::{Box3, Quat, Vec3};

/// A scale-free, non-negative distance between two values of the same type.
pub trait RelativeDifference {
    /// Relative difference between `self` and `other`.
    fn relative_difference(&self, other: &Self) -> f64;
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if numerator == 0.0 {
        0.0
    } else if denominator > 0.0 {
        numerator / denominator
    } else {
        f64::INFINITY
    }
}

impl RelativeDifference for f64 {
    fn relative_difference(&self, other: &Self) -> f64 {
        if self == other {
            return 0.0;
        }
        ratio((self - other).abs(), (self.abs() + other.abs()) * 0.5)
    }
}

impl RelativeDifference for Vec3 {
    fn relative_difference(&self, other: &Self) -> f64 {
        if self == other {
            return 0.0;
        }
        ratio((self - other).norm(), (self.norm() + other.norm()) * 0.5)
    }
}

impl RelativeDifference for Quat {
    fn relative_difference(&self, other: &Self) -> f64 {
        if self == other {
            return 0.0;
        }
        let angle = self.angle_to(other);
        if angle.is_nan() {
            return 0.0;
        }
        (angle / std::f64::consts::PI).clamp(0.0, 1.0)
    }
}

impl RelativeDifference for Box3 {
    fn relative_difference(&self, other: &Self) -> f64 {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return 0.0,
            (true, false) | (false, true) => return f64::INFINITY,
            (false, false) => {}
        }
        if self == other {
            return 0.0;
        }
        let corners = ((self.min - other.min).norm() + (self.max - other.max).norm()) * 0.5;
        let sizes = (self.size().norm() + other.size().norm()) * 0.5;
        ratio(corners, sizes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use nalgebra::Vector3;

    #[test]
    fn scalar_difference() {
        assert_eq!(1.0_f64.relative_difference(&1.0), 0.0);
        assert!((1.0_f64.relative_difference(&3.0) - 1.0).abs() < 1e-12);
        assert_eq!(0.0_f64.relative_difference(&0.0), 0.0);
        assert!(0.0_f64.relative_difference(&2.0).is_finite());
    }

    #[test]
    fn vector_difference_is_symmetric() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(a.relative_difference(&b), b.relative_difference(&a));
        assert!((a.relative_difference(&b) - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn quaternion_difference_bounded() {
        let a = Quat::identity();
        let b = Quat::from_axis_angle(&Vector3::y_axis(), std::f64::consts::PI);
        assert!((a.relative_difference(&b) - 1.0).abs() < 1e-9);
        assert_eq!(a.relative_difference(&a), 0.0);
    }

    #[test]
    fn box_difference() {
        let a = Box3::from_center_size(Point::origin(), Vec3::repeat(2.0));
        let b = a.translated(&Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(a.relative_difference(&a), 0.0);
        let d = a.relative_difference(&b);
        assert!(d > 0.0 && d.is_finite());
        assert_eq!(Box3::empty().relative_difference(&Box3::empty()), 0.0);
    }
}
