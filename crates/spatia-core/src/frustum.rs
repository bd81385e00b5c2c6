#![forbid(unsafe_code)]

//! Angular description of a perspective view volume.
//!
//! A [`LayoutFrustum`] stores four angular edges (degrees, measured from the
//! forward axis: `left`/`bottom` are usually negative) and linear `near`/`far`
//! planes (meters). It is used both for the viewer's field of view and for the
//! angular footprint of a node as seen from the viewer.
//!
//! Angular distances combine horizontal and vertical components with the
//! spherical Pythagorean theorem (`cos c = cos a * cos b`) rather than the
//! planar one, so diagonals stay correct for wide fields of view.
//!
//! # Invariants
//!
//! 1. The perspective matrix is cached and dropped by every edge setter.
//! 2. `overlap_percent` is in `[0, 100]` and relative to `self`'s angular area.
//! 3. Angles never come out NaN; `acos` inputs are clamped to `[-1, 1]`.

use nalgebra::Vector2;

use crate::geometry::{Mat4, Point, Vec2};
use crate::memo::Memo;

/// One of the four angular corners of a frustum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumCorner {
    /// Left/bottom.
    LeftBottom,
    /// Left/top.
    LeftTop,
    /// Right/bottom.
    RightBottom,
    /// Right/top.
    RightTop,
}

impl FrustumCorner {
    /// All corners.
    pub const ALL: [Self; 4] = [
        Self::LeftBottom,
        Self::LeftTop,
        Self::RightBottom,
        Self::RightTop,
    ];
}

/// Angular distance between two directions given as (horizontal, vertical)
/// degree pairs.
#[must_use]
pub fn angular_distance(a: &Vec2, b: &Vec2) -> f64 {
    spherical_hypot(a.x - b.x, a.y - b.y)
}

/// Spherical Pythagorean combination of two angular legs, in degrees.
#[must_use]
pub fn spherical_hypot(a_degrees: f64, b_degrees: f64) -> f64 {
    let c = a_degrees.to_radians().cos() * b_degrees.to_radians().cos();
    c.clamp(-1.0, 1.0).acos().to_degrees()
}

/// A perspective view volume in angular and linear units.
#[derive(Debug, Clone)]
pub struct LayoutFrustum {
    left: f64,
    right: f64,
    bottom: f64,
    top: f64,
    near: f64,
    far: f64,
    perspective: Memo<Mat4>,
}

impl Default for LayoutFrustum {
    fn default() -> Self {
        Self::new(-45.0, 45.0, -30.0, 30.0, 0.01, 100.0)
    }
}

impl PartialEq for LayoutFrustum {
    fn eq(&self, other: &Self) -> bool {
        self.left == other.left
            && self.right == other.right
            && self.bottom == other.bottom
            && self.top == other.top
            && self.near == other.near
            && self.far == other.far
    }
}

impl LayoutFrustum {
    /// Create a frustum from its angular edges (degrees) and planes (meters).
    #[must_use]
    pub fn new(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
            near,
            far,
            perspective: Memo::new(),
        }
    }

    /// Symmetric frustum from full horizontal and vertical fields of view.
    #[must_use]
    pub fn from_fov(horizontal: f64, vertical: f64, near: f64, far: f64) -> Self {
        Self::new(
            -horizontal * 0.5,
            horizontal * 0.5,
            -vertical * 0.5,
            vertical * 0.5,
            near,
            far,
        )
    }

    /// Tightest frustum containing view-space points (viewer looks down -Z).
    ///
    /// Returns `None` when `points` is empty.
    #[must_use]
    pub fn from_view_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut it = points.into_iter().peekable();
        it.peek()?;
        let mut f = Self::new(
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        );
        for p in it {
            let depth = -p.z;
            let h = p.x.atan2(depth).to_degrees();
            let v = p.y.atan2(depth).to_degrees();
            f.left = f.left.min(h);
            f.right = f.right.max(h);
            f.bottom = f.bottom.min(v);
            f.top = f.top.max(v);
            f.near = f.near.min(depth);
            f.far = f.far.max(depth);
        }
        Some(f)
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Left edge in degrees.
    #[inline]
    #[must_use]
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Right edge in degrees.
    #[inline]
    #[must_use]
    pub fn right(&self) -> f64 {
        self.right
    }

    /// Bottom edge in degrees.
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    /// Top edge in degrees.
    #[inline]
    #[must_use]
    pub fn top(&self) -> f64 {
        self.top
    }

    /// Near plane in meters.
    #[inline]
    #[must_use]
    pub fn near(&self) -> f64 {
        self.near
    }

    /// Far plane in meters.
    #[inline]
    #[must_use]
    pub fn far(&self) -> f64 {
        self.far
    }

    /// Set the left edge (degrees).
    pub fn set_left(&mut self, degrees: f64) {
        self.left = degrees;
        self.perspective.invalidate();
    }

    /// Set the right edge (degrees).
    pub fn set_right(&mut self, degrees: f64) {
        self.right = degrees;
        self.perspective.invalidate();
    }

    /// Set the bottom edge (degrees).
    pub fn set_bottom(&mut self, degrees: f64) {
        self.bottom = degrees;
        self.perspective.invalidate();
    }

    /// Set the top edge (degrees).
    pub fn set_top(&mut self, degrees: f64) {
        self.top = degrees;
        self.perspective.invalidate();
    }

    /// Set the near plane (meters).
    pub fn set_near(&mut self, meters: f64) {
        self.near = meters;
        self.perspective.invalidate();
    }

    /// Set the far plane (meters).
    pub fn set_far(&mut self, meters: f64) {
        self.far = meters;
        self.perspective.invalidate();
    }

    // -----------------------------------------------------------------------
    // Angular metrics
    // -----------------------------------------------------------------------

    /// Angular width and height in degrees.
    #[must_use]
    pub fn size_degrees(&self) -> Vec2 {
        Vec2::new(self.right - self.left, self.top - self.bottom)
    }

    /// Angular center (horizontal, vertical) in degrees.
    #[must_use]
    pub fn center_degrees(&self) -> Vec2 {
        Vec2::new(
            (self.left + self.right) * 0.5,
            (self.bottom + self.top) * 0.5,
        )
    }

    /// Spherical diagonal in degrees.
    #[must_use]
    pub fn diagonal_degrees(&self) -> f64 {
        let size = self.size_degrees();
        spherical_hypot(size.x, size.y)
    }

    /// Angular position of a corner.
    #[must_use]
    pub fn corner(&self, corner: FrustumCorner) -> Vec2 {
        match corner {
            FrustumCorner::LeftBottom => Vector2::new(self.left, self.bottom),
            FrustumCorner::LeftTop => Vector2::new(self.left, self.top),
            FrustumCorner::RightBottom => Vector2::new(self.right, self.bottom),
            FrustumCorner::RightTop => Vector2::new(self.right, self.top),
        }
    }

    /// Angular distance from `direction` to the center.
    #[must_use]
    pub fn angle_to_center(&self, direction: &Vec2) -> f64 {
        angular_distance(direction, &self.center_degrees())
    }

    /// Angular distance from `direction` to one corner.
    #[must_use]
    pub fn angle_to_corner(&self, direction: &Vec2, corner: FrustumCorner) -> f64 {
        angular_distance(direction, &self.corner(corner))
    }

    /// Angular distance from `direction` to the nearest point of the frustum
    /// (zero when inside).
    #[must_use]
    pub fn angle_to_closest_point(&self, direction: &Vec2) -> f64 {
        let clamped = Vec2::new(
            direction.x.clamp(self.left.min(self.right), self.right.max(self.left)),
            direction.y.clamp(self.bottom.min(self.top), self.top.max(self.bottom)),
        );
        angular_distance(direction, &clamped)
    }

    /// Angular distance from `direction` to the farthest corner.
    #[must_use]
    pub fn angle_to_farthest_point(&self, direction: &Vec2) -> f64 {
        FrustumCorner::ALL
            .iter()
            .map(|c| self.angle_to_corner(direction, *c))
            .fold(0.0, f64::max)
    }

    /// Whether an angular direction lies inside the edges.
    #[must_use]
    pub fn contains_direction(&self, direction: &Vec2) -> bool {
        direction.x >= self.left
            && direction.x <= self.right
            && direction.y >= self.bottom
            && direction.y <= self.top
    }

    // -----------------------------------------------------------------------
    // Linear metrics
    // -----------------------------------------------------------------------

    /// Distance between the near and far planes.
    #[must_use]
    pub fn depth(&self) -> f64 {
        self.far - self.near
    }

    /// Distance from the viewer to the middle of the volume.
    #[must_use]
    pub fn distance(&self) -> f64 {
        (self.near + self.far) * 0.5
    }

    /// Percent (0–100) of this frustum's angular area that `other` covers.
    #[must_use]
    pub fn overlap_percent(&self, other: &Self) -> f64 {
        let own = self.size_degrees();
        let own_area = own.x.max(0.0) * own.y.max(0.0);
        if own_area <= 0.0 {
            return 0.0;
        }
        let w = self.right.min(other.right) - self.left.max(other.left);
        let h = self.top.min(other.top) - self.bottom.max(other.bottom);
        if w <= 0.0 || h <= 0.0 {
            return 0.0;
        }
        (w * h / own_area * 100.0).clamp(0.0, 100.0)
    }

    /// Off-center perspective projection matching the angular edges.
    ///
    /// Cached until the next edge mutation.
    #[must_use]
    pub fn perspective(&self) -> &Mat4 {
        self.perspective.get_or_init(|| {
            let n = self.near;
            let f = self.far;
            let l = n * self.left.to_radians().tan();
            let r = n * self.right.to_radians().tan();
            let b = n * self.bottom.to_radians().tan();
            let t = n * self.top.to_radians().tan();
            Mat4::new(
                2.0 * n / (r - l),
                0.0,
                (r + l) / (r - l),
                0.0,
                0.0,
                2.0 * n / (t - b),
                (t + b) / (t - b),
                0.0,
                0.0,
                0.0,
                -(f + n) / (f - n),
                -2.0 * f * n / (f - n),
                0.0,
                0.0,
                -1.0,
                0.0,
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
