#![forbid(unsafe_code)]

//! Easing curves for transition progress.
//!
//! Every curve maps `[0, 1]` onto `[0, 1]` with `f(0) = 0` and `f(1) = 1`.
//! Inputs outside the unit interval are clamped first.

use serde::{Deserialize, Serialize};

/// A named easing curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Constant speed.
    Linear,
    /// `t^2`.
    QuadIn,
    /// Mirror of `QuadIn`.
    QuadOut,
    /// Quadratic ease in, then out.
    #[default]
    QuadInOut,
    /// `t^3`.
    CubicIn,
    /// Mirror of `CubicIn`.
    CubicOut,
    /// Cubic ease in, then out.
    CubicInOut,
    /// `t^4`.
    QuartIn,
    /// Mirror of `QuartIn`.
    QuartOut,
    /// Quartic ease in, then out.
    QuartInOut,
    /// Quarter sine wave.
    SineIn,
    /// Mirror of `SineIn`.
    SineOut,
    /// Half cosine wave.
    SineInOut,
    /// `2^(10(t-1))`.
    ExpoIn,
    /// Mirror of `ExpoIn`.
    ExpoOut,
    /// Exponential ease in, then out.
    ExpoInOut,
}

impl Easing {
    /// Every curve, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Linear,
        Self::QuadIn,
        Self::QuadOut,
        Self::QuadInOut,
        Self::CubicIn,
        Self::CubicOut,
        Self::CubicInOut,
        Self::QuartIn,
        Self::QuartOut,
        Self::QuartInOut,
        Self::SineIn,
        Self::SineOut,
        Self::SineInOut,
        Self::ExpoIn,
        Self::ExpoOut,
        Self::ExpoInOut,
    ];

    /// Evaluate the curve at `t`.
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        use std::f64::consts::FRAC_PI_2;

        let t = if t.is_nan() { 1.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Self::Linear => t,
            Self::QuadIn => power_in(t, 2),
            Self::QuadOut => power_out(t, 2),
            Self::QuadInOut => power_in_out(t, 2),
            Self::CubicIn => power_in(t, 3),
            Self::CubicOut => power_out(t, 3),
            Self::CubicInOut => power_in_out(t, 3),
            Self::QuartIn => power_in(t, 4),
            Self::QuartOut => power_out(t, 4),
            Self::QuartInOut => power_in_out(t, 4),
            Self::SineIn => 1.0 - (t * FRAC_PI_2).cos(),
            Self::SineOut => (t * FRAC_PI_2).sin(),
            Self::SineInOut => 0.5 * (1.0 - (t * std::f64::consts::PI).cos()),
            Self::ExpoIn => expo_in(t),
            Self::ExpoOut => 1.0 - expo_in(1.0 - t),
            Self::ExpoInOut => {
                if t < 0.5 {
                    0.5 * expo_in(2.0 * t)
                } else {
                    1.0 - 0.5 * expo_in(2.0 - 2.0 * t)
                }
            }
        }
    }
}

fn power_in(t: f64, n: i32) -> f64 {
    t.powi(n)
}

fn power_out(t: f64, n: i32) -> f64 {
    1.0 - (1.0 - t).powi(n)
}

fn power_in_out(t: f64, n: i32) -> f64 {
    if t < 0.5 {
        0.5 * (2.0 * t).powi(n)
    } else {
        1.0 - 0.5 * (2.0 - 2.0 * t).powi(n)
    }
}

// Exact at both ends so transitions land on their target.
fn expo_in(t: f64) -> f64 {
    if t <= 0.0 {
        0.0
    } else if t >= 1.0 {
        1.0
    } else {
        2.0_f64.powf(10.0 * (t - 1.0))
    }
}
