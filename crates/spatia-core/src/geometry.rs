#![forbid(unsafe_code)]

//! Geometric primitives layered over `nalgebra`.
//!
//! `nalgebra` supplies vectors, points, quaternions and matrices. This module
//! adds the pieces it does not have: an axis-aligned [`Box3`], a planar
//! [`Rect2`] used for screen-space overlap, transform compose/decompose
//! helpers, and epsilon guards for divisors.
//!
//! # Invariants
//!
//! 1. An empty box has `min = +inf` and `max = -inf` on every axis, so
//!    `union` with any box returns the other box unchanged.
//! 2. `center()` and `size()` of an empty box are zero.
//! 3. `transformed()` of an empty box is empty.
//!
//! # Failure Modes
//!
//! - Non-finite inputs propagate; callers are expected to guard divisors with
//!   [`guard_divisor`] before building scale factors.

use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, UnitQuaternion, Vector2, Vector3};

/// Convenience alias for the vector type used throughout the workspace.
pub type Vec3 = Vector3<f64>;
/// Convenience alias for 2D vectors (pixels, degrees).
pub type Vec2 = Vector2<f64>;
/// Convenience alias for world-space points.
pub type Point = Point3<f64>;
/// Convenience alias for orientations.
pub type Quat = UnitQuaternion<f64>;
/// Convenience alias for homogeneous transforms.
pub type Mat4 = Matrix4<f64>;

// ---------------------------------------------------------------------------
// Box3
// ---------------------------------------------------------------------------

/// Axis-aligned 3D bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box3 {
    /// Minimum corner.
    pub min: Point,
    /// Maximum corner.
    pub max: Point,
}

impl Default for Box3 {
    fn default() -> Self {
        Self::empty()
    }
}

impl Box3 {
    /// Create a box from its corners. No reordering is performed.
    #[inline]
    #[must_use]
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// The empty box (identity for [`union`](Self::union)).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Box centered at `center` with full extents `size`.
    #[must_use]
    pub fn from_center_size(center: Point, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Smallest box containing every point.
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.expand_by_point(p);
        }
        b
    }

    /// Unit cube centered at the origin.
    #[must_use]
    pub fn unit() -> Self {
        Self::from_center_size(Point::origin(), Vec3::repeat(1.0))
    }

    /// True if the box contains no points.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    /// Center of the box (origin when empty).
    #[must_use]
    pub fn center(&self) -> Point {
        if self.is_empty() {
            Point::origin()
        } else {
            nalgebra::center(&self.min, &self.max)
        }
    }

    /// Full extents (zero when empty).
    #[must_use]
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::zeros()
        } else {
            self.max - self.min
        }
    }

    /// Length of the main diagonal.
    #[inline]
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.size().norm()
    }

    /// Grow the box to contain `p`.
    pub fn expand_by_point(&mut self, p: &Point) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Smallest box containing both boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Overlapping region (empty if disjoint).
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            min: self.min.sup(&other.min),
            max: self.max.inf(&other.max),
        }
    }

    /// True if `p` lies inside or on the boundary.
    #[must_use]
    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Box moved by `offset`.
    #[must_use]
    pub fn translated(&self, offset: &Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// The eight corners, ordered by the bit pattern `xyz` (min = 0, max = 1).
    #[must_use]
    pub fn corners(&self) -> [Point; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point::new(a.x, a.y, a.z),
            Point::new(a.x, a.y, b.z),
            Point::new(a.x, b.y, a.z),
            Point::new(a.x, b.y, b.z),
            Point::new(b.x, a.y, a.z),
            Point::new(b.x, a.y, b.z),
            Point::new(b.x, b.y, a.z),
            Point::new(b.x, b.y, b.z),
        ]
    }

    /// Axis-aligned bounds of this box after applying `m`.
    #[must_use]
    pub fn transformed(&self, m: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::empty();
        for c in &self.corners() {
            out.expand_by_point(&m.transform_point(c));
        }
        out
    }

    /// Inflate every axis whose extent is at or below `epsilon` to
    /// `epsilon * 1000`, keeping the center fixed.
    #[must_use]
    pub fn inflate_degenerate(&self, epsilon: f64) -> Self {
        if self.is_empty() {
            return *self;
        }
        let center = self.center();
        let mut size = self.size();
        for i in 0..3 {
            if size[i] <= epsilon {
                size[i] = epsilon * 1000.0;
            }
        }
        Self::from_center_size(center, size)
    }

    /// Component-wise lerp of both corners.
    #[must_use]
    pub fn lerp(&self, other: &Self, alpha: f64) -> Self {
        Self {
            min: self.min + (other.min - self.min) * alpha,
            max: self.max + (other.max - self.max) * alpha,
        }
    }

    /// True if every corner coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Rect2
// ---------------------------------------------------------------------------

/// Planar axis-aligned rectangle in floating point units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect2 {
    /// Minimum corner.
    pub min: Vec2,
    /// Maximum corner.
    pub max: Vec2,
}

impl Rect2 {
    /// Create a rectangle from its corners.
    #[inline]
    #[must_use]
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// X/Y footprint of a box.
    #[must_use]
    pub fn from_box_xy(b: &Box3) -> Self {
        Self {
            min: Vec2::new(b.min.x, b.min.y),
            max: Vec2::new(b.max.x, b.max.y),
        }
    }

    /// True if the rectangle has no area.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    /// Extents (zero when empty).
    #[must_use]
    pub fn size(&self) -> Vec2 {
        if self.is_empty() {
            Vec2::zeros()
        } else {
            self.max - self.min
        }
    }

    /// Diagonal length.
    #[inline]
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.size().norm()
    }

    /// Intersection, or `None` if the rectangles don't overlap.
    #[must_use]
    pub fn intersection_opt(&self, other: &Self) -> Option<Self> {
        let r = Self {
            min: self.min.sup(&other.min),
            max: self.max.inf(&other.max),
        };
        if r.is_empty() { None } else { Some(r) }
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

/// Build `T * R * S`.
#[must_use]
pub fn compose(position: &Vec3, orientation: &Quat, scale: &Vec3) -> Mat4 {
    Mat4::new_translation(position)
        * orientation.to_homogeneous()
        * Mat4::new_nonuniform_scaling(scale)
}

/// Split an affine matrix into translation, rotation and scale.
///
/// Shear is discarded: the rotation is the closest orthonormal frame to the
/// normalized basis columns. A negative determinant flips the x scale.
#[must_use]
pub fn decompose(m: &Mat4) -> (Vec3, Quat, Vec3) {
    let position = Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    let linear: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let mut scale = Vec3::new(
        linear.column(0).norm(),
        linear.column(1).norm(),
        linear.column(2).norm(),
    );
    if linear.determinant() < 0.0 {
        scale.x = -scale.x;
    }
    let mut basis = linear;
    for i in 0..3 {
        let s = if scale[i].abs() > f64::MIN_POSITIVE {
            scale[i]
        } else {
            1.0
        };
        basis.set_column(i, &(linear.column(i) / s));
    }
    let rotation = Rotation3::from_matrix(&basis);
    (position, UnitQuaternion::from_rotation_matrix(&rotation), scale)
}

/// Replace a magnitude at or below `epsilon` with `sign * epsilon * factor`.
///
/// Zero is treated as positive.
#[inline]
#[must_use]
pub fn guard_divisor(value: f64, epsilon: f64, factor: f64) -> f64 {
    if value.abs() <= epsilon {
        if value.is_sign_negative() && value != 0.0 {
            -epsilon * factor
        } else {
            epsilon * factor
        }
    } else {
        value
    }
}

/// [`guard_divisor`] applied per component.
#[must_use]
pub fn guard_vector(v: &Vec3, epsilon: f64, factor: f64) -> Vec3 {
    v.map(|c| guard_divisor(c, epsilon, factor))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn approx(a: &Vec3, b: &Vec3) -> bool {
        (a - b).norm() < 1e-9
    }

    #[test]
    fn empty_box_is_union_identity() {
        let b = Box3::from_center_size(Point::new(1.0, 2.0, 3.0), Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(Box3::empty().union(&b), b);
        assert!(Box3::empty().is_empty());
        assert_eq!(Box3::empty().size(), Vec3::zeros());
        assert_eq!(Box3::empty().center(), Point::origin());
    }

    #[test]
    fn from_center_size_round_trips() {
        let b = Box3::from_center_size(Point::new(1.0, 2.0, 0.0), Vec3::new(4.0, 5.0, 6.0));
        assert!(approx(&b.center().coords, &Vec3::new(1.0, 2.0, 0.0)));
        assert!(approx(&b.size(), &Vec3::new(4.0, 5.0, 6.0)));
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let a = Box3::from_center_size(Point::origin(), Vec3::repeat(1.0));
        let b = Box3::from_center_size(Point::new(5.0, 0.0, 0.0), Vec3::repeat(1.0));
        assert!(a.intersection(&b).is_empty());
    }

    #[test]
    fn transformed_box_covers_rotated_corners() {
        let b = Box3::from_center_size(Point::origin(), Vec3::new(2.0, 1.0, 1.0));
        let rot = Quat::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let m = compose(&Vec3::zeros(), &rot, &Vec3::repeat(1.0));
        let t = b.transformed(&m);
        assert!(approx(&t.size(), &Vec3::new(1.0, 2.0, 1.0)));
    }

    #[test]
    fn inflate_degenerate_axes_only() {
        let b = Box3::from_center_size(Point::origin(), Vec3::new(2.0, 0.0, 1.0));
        let inflated = b.inflate_degenerate(1e-10);
        assert!((inflated.size().y - 1e-7).abs() < 1e-15);
        assert_eq!(inflated.size().x, 2.0);
    }

    #[test]
    fn compose_decompose_round_trip() {
        let pos = Vec3::new(1.0, -2.0, 3.0);
        let rot = Quat::from_euler_angles(0.3, -0.2, 1.1);
        let scale = Vec3::new(2.0, 0.5, 3.0);
        let (p, r, s) = decompose(&compose(&pos, &rot, &scale));
        assert!(approx(&p, &pos));
        assert!(approx(&s, &scale));
        assert!(r.angle_to(&rot) < 1e-6);
    }

    #[test]
    fn guard_divisor_keeps_sign() {
        assert_eq!(guard_divisor(0.0, 1e-10, 10.0), 1e-9);
        assert_eq!(guard_divisor(-1e-12, 1e-10, 10.0), -1e-9);
        assert_eq!(guard_divisor(0.5, 1e-10, 10.0), 0.5);
    }

    #[test]
    fn rect_intersection() {
        let a = Rect2::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let b = Rect2::new(Vec2::new(5.0, 5.0), Vec2::new(20.0, 20.0));
        let i = a.intersection_opt(&b).unwrap();
        assert_eq!(i.size(), Vec2::new(5.0, 5.0));
        let c = Rect2::new(Vec2::new(11.0, 0.0), Vec2::new(12.0, 1.0));
        assert!(a.intersection_opt(&c).is_none());
    }
}
