#![forbid(unsafe_code)]

//! Transition parameters and per-owner overrides.
//!
//! [`TransitionConfig`] is the fully resolved parameter set. Adapters,
//! layouts and individual transitionables carry a [`TransitionOptions`]
//! whose `Some` fields override the configuration they inherit from.

use serde::{Deserialize, Serialize};

use super::easing::Easing;

/// Resolved transition parameters. Times are in seconds of scaled delta time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Length of each committed transition.
    pub duration: f64,
    /// Progress curve of each committed transition.
    pub easing: Easing,
    /// Relative difference below which two values are considered equal.
    pub threshold: f64,
    /// Minimum time a change must persist before it commits.
    pub delay: f64,
    /// Minimum quiet time since the last change before it commits.
    pub debounce: f64,
    /// A pending change commits unconditionally after this long.
    pub max_wait: f64,
    /// Whether new transitions add onto in-flight ones.
    pub blend: bool,
    /// Time scale applied to every `delta_time`.
    pub multiplier: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            duration: 1.0,
            easing: Easing::default(),
            threshold: 0.05,
            delay: 0.5,
            debounce: 0.25,
            max_wait: 3.0,
            blend: true,
            multiplier: 1.0,
        }
    }
}

impl TransitionConfig {
    /// Configuration that commits every change on the frame it happens and
    /// completes it immediately.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            duration: 0.0,
            threshold: 0.0,
            delay: 0.0,
            debounce: 0.0,
            max_wait: 0.0,
            ..Self::default()
        }
    }

    /// Return a list of validation problems (empty if valid).
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let non_negative = [
            ("duration", self.duration),
            ("threshold", self.threshold),
            ("delay", self.delay),
            ("debounce", self.debounce),
            ("max_wait", self.max_wait),
            ("multiplier", self.multiplier),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!(
                    "transition.{name} must be finite and >= 0, got {value}"
                ));
            }
        }
        errors
    }
}

/// Optional overrides layered over a [`TransitionConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionOptions {
    /// Override for [`TransitionConfig::duration`].
    pub duration: Option<f64>,
    /// Override for [`TransitionConfig::easing`].
    pub easing: Option<Easing>,
    /// Override for [`TransitionConfig::threshold`].
    pub threshold: Option<f64>,
    /// Override for [`TransitionConfig::delay`].
    pub delay: Option<f64>,
    /// Override for [`TransitionConfig::debounce`].
    pub debounce: Option<f64>,
    /// Override for [`TransitionConfig::max_wait`].
    pub max_wait: Option<f64>,
    /// Override for [`TransitionConfig::blend`].
    pub blend: Option<bool>,
    /// Override for [`TransitionConfig::multiplier`].
    pub multiplier: Option<f64>,
}

impl TransitionOptions {
    /// Apply the set fields on top of `base`.
    #[must_use]
    pub fn resolve(&self, base: &TransitionConfig) -> TransitionConfig {
        TransitionConfig {
            duration: self.duration.unwrap_or(base.duration),
            easing: self.easing.unwrap_or(base.easing),
            threshold: self.threshold.unwrap_or(base.threshold),
            delay: self.delay.unwrap_or(base.delay),
            debounce: self.debounce.unwrap_or(base.debounce),
            max_wait: self.max_wait.unwrap_or(base.max_wait),
            blend: self.blend.unwrap_or(base.blend),
            multiplier: self.multiplier.unwrap_or(base.multiplier),
        }
    }

    /// Combine two override layers; fields set in `self` win.
    #[must_use]
    pub fn or(&self, fallback: &Self) -> Self {
        Self {
            duration: self.duration.or(fallback.duration),
            easing: self.easing.or(fallback.easing),
            threshold: self.threshold.or(fallback.threshold),
            delay: self.delay.or(fallback.delay),
            debounce: self.debounce.or(fallback.debounce),
            max_wait: self.max_wait.or(fallback.max_wait),
            blend: self.blend.or(fallback.blend),
            multiplier: self.multiplier.or(fallback.multiplier),
        }
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Builder: set duration.
    #[must_use]
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Builder: set easing.
    #[must_use]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    /// Builder: set threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Builder: set delay.
    #[must_use]
    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay = Some(seconds);
        self
    }

    /// Builder: set debounce.
    #[must_use]
    pub fn with_debounce(mut self, seconds: f64) -> Self {
        self.debounce = Some(seconds);
        self
    }

    /// Builder: set max wait.
    #[must_use]
    pub fn with_max_wait(mut self, seconds: f64) -> Self {
        self.max_wait = Some(seconds);
        self
    }

    /// Builder: set blend.
    #[must_use]
    pub fn with_blend(mut self, blend: bool) -> Self {
        self.blend = Some(blend);
        self
    }

    /// Builder: set multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }
}
