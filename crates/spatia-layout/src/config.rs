#![forbid(unsafe_code)]

//! Engine configuration as data.
//!
//! [`SpatialConfig`] gathers every tunable of the engine: transition
//! hysteresis, optimizer search parameters and the epsilons used by the
//! degenerate-geometry guards. Adapters and layouts carry optional
//! overrides ([`TransitionOptions`], [`OptimizeOptions`]) that are resolved
//! over these defaults each frame.
//!
//! # Loading
//!
//! ```toml
//! [transition]
//! duration = 0.8
//! easing = "cubic_in_out"
//!
//! [optimize]
//! swarm_size = 16
//! step_distribution = "gaussian"
//! ```
//!
//! ```rust,ignore
//! let config = SpatialConfig::from_toml_file("spatia.toml")?;
//! let config = SpatialConfig::from_json_str(json)?;
//! ```
//!
//! File loading requires the `config-files` feature. Loaded configurations
//! are validated; problems are reported together in
//! [`LayoutError::InvalidConfig`].

#[cfg(feature = "config-files")]
use std::path::Path;

use serde::{Deserialize, Serialize};
use spatia_core::{TransitionConfig, TransitionOptions};

use crate::error::{LayoutError, Result};

// ---------------------------------------------------------------------------
// SpatialConfig
// ---------------------------------------------------------------------------

/// Top-level engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Default transition parameters.
    pub transition: TransitionConfig,
    /// Default optimizer parameters.
    pub optimize: OptimizeConfig,
    /// Degenerate-geometry guards.
    pub epsilon: EpsilonConfig,
}

impl SpatialConfig {
    /// Return a list of validation problems (empty if valid).
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.transition.validate();
        errors.extend(self.optimize.validate());
        errors.extend(self.epsilon.validate());
        errors
    }

    /// `Ok(self)` if valid, otherwise every problem in one error.
    pub fn validated(self) -> Result<Self> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(LayoutError::InvalidConfig(errors))
        }
    }

    /// Load from a TOML string.
    #[cfg(feature = "config-files")]
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-files")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-files")]
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-files")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Serialize to TOML.
    #[cfg(feature = "config-files")]
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

// ---------------------------------------------------------------------------
// Epsilon
// ---------------------------------------------------------------------------

/// Thresholds below which a quantity is treated as degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpsilonConfig {
    /// Lengths (meters).
    pub meters: f64,
    /// Angles (radians).
    pub radians: f64,
    /// Screen distances (pixels).
    pub pixels: f64,
    /// Angles (degrees).
    pub degrees: f64,
}

impl Default for EpsilonConfig {
    fn default() -> Self {
        Self {
            meters: 1e-10,
            radians: 1e-10,
            pixels: 1e-3,
            degrees: 1e-8,
        }
    }
}

impl EpsilonConfig {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, value) in [
            ("meters", self.meters),
            ("radians", self.radians),
            ("pixels", self.pixels),
            ("degrees", self.degrees),
        ] {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("epsilon.{name} must be finite and > 0, got {value}"));
            }
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Distribution that mutation step lengths are drawn from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDistribution {
    /// Heavy-tailed Levy flight (Mantegna's algorithm).
    #[default]
    Levy,
    /// Standard normal.
    Gaussian,
    /// Levy or Gaussian with equal probability per step.
    Mixed,
}

/// Resolved optimizer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Population size per layout.
    pub swarm_size: usize,
    /// Population sweeps per frame.
    pub iterations_per_frame: usize,
    /// Probability of a directed pulse instead of a mutation.
    pub pulse_rate: f64,
    /// Lower bound of the pulse move fraction.
    pub pulse_frequency_min: f64,
    /// Upper bound of the pulse move fraction.
    pub pulse_frequency_max: f64,
    /// Step size floor of a mutation strategy.
    pub step_size_min: f64,
    /// Step size ceiling of a mutation strategy.
    pub step_size_max: f64,
    /// Initial step size of a mutation strategy.
    pub step_size_start: f64,
    /// Probability of restarting a stuck solution.
    pub stale_restart_rate: f64,
    /// Window (in trials) of the success-rate moving average.
    pub success_rate_window: usize,
    /// Floor of a strategy's selection weight.
    pub success_rate_min: f64,
    /// Default tolerance band of each objective.
    pub relative_tolerance: f64,
    /// Step growth on success; shrink on failure is its inverse fourth root.
    pub diversification_factor: f64,
    /// Distribution of mutation step lengths.
    pub step_distribution: StepDistribution,
    /// Smoothing of each objective's running best score.
    pub best_score_smoothing: f64,
    /// Seed of the optimizer's random number generator.
    pub seed: u64,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            swarm_size: 10,
            iterations_per_frame: 4,
            pulse_rate: 0.4,
            pulse_frequency_min: 0.0,
            pulse_frequency_max: 1.0,
            step_size_min: 1e-5,
            step_size_max: 5.0,
            step_size_start: 0.5,
            stale_restart_rate: 0.02,
            success_rate_window: 100,
            success_rate_min: 0.05,
            relative_tolerance: 0.001,
            diversification_factor: 1.5,
            step_distribution: StepDistribution::default(),
            best_score_smoothing: 0.1,
            seed: 0x5eed_1a70,
        }
    }
}

impl OptimizeConfig {
    /// Step shrink factor applied on failure.
    #[must_use]
    pub fn intensification_factor(&self) -> f64 {
        self.diversification_factor.powf(-0.25)
    }

    /// Return a list of validation problems (empty if valid).
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.swarm_size == 0 {
            errors.push("optimize.swarm_size must be > 0".into());
        }
        if self.success_rate_window == 0 {
            errors.push("optimize.success_rate_window must be > 0".into());
        }
        for (name, value) in [
            ("pulse_rate", self.pulse_rate),
            ("stale_restart_rate", self.stale_restart_rate),
            ("success_rate_min", self.success_rate_min),
            ("best_score_smoothing", self.best_score_smoothing),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("optimize.{name} must be in [0, 1], got {value}"));
            }
        }
        if !(0.0..=1.0).contains(&self.pulse_frequency_min)
            || !(0.0..=1.0).contains(&self.pulse_frequency_max)
            || self.pulse_frequency_min > self.pulse_frequency_max
        {
            errors.push(format!(
                "optimize.pulse_frequency must satisfy 0 <= min <= max <= 1, got {}..{}",
                self.pulse_frequency_min, self.pulse_frequency_max
            ));
        }
        if !(self.step_size_min > 0.0
            && self.step_size_min <= self.step_size_start
            && self.step_size_start <= self.step_size_max)
        {
            errors.push(format!(
                "optimize.step_size must satisfy 0 < min <= start <= max, got {} <= {} <= {}",
                self.step_size_min, self.step_size_start, self.step_size_max
            ));
        }
        if !(self.relative_tolerance >= 0.0) {
            errors.push(format!(
                "optimize.relative_tolerance must be >= 0, got {}",
                self.relative_tolerance
            ));
        }
        if !(self.diversification_factor > 1.0) {
            errors.push(format!(
                "optimize.diversification_factor must be > 1, got {}",
                self.diversification_factor
            ));
        }
        errors
    }
}

/// Optional overrides layered over an [`OptimizeConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    pub swarm_size: Option<usize>,
    pub iterations_per_frame: Option<usize>,
    pub pulse_rate: Option<f64>,
    pub pulse_frequency_min: Option<f64>,
    pub pulse_frequency_max: Option<f64>,
    pub step_size_min: Option<f64>,
    pub step_size_max: Option<f64>,
    pub step_size_start: Option<f64>,
    pub stale_restart_rate: Option<f64>,
    pub success_rate_window: Option<usize>,
    pub success_rate_min: Option<f64>,
    pub relative_tolerance: Option<f64>,
    pub diversification_factor: Option<f64>,
    pub step_distribution: Option<StepDistribution>,
    pub best_score_smoothing: Option<f64>,
}

impl OptimizeOptions {
    /// Apply the set fields on top of `base`. The seed is never overridden.
    #[must_use]
    pub fn resolve(&self, base: &OptimizeConfig) -> OptimizeConfig {
        OptimizeConfig {
            swarm_size: self.swarm_size.unwrap_or(base.swarm_size),
            iterations_per_frame: self
                .iterations_per_frame
                .unwrap_or(base.iterations_per_frame),
            pulse_rate: self.pulse_rate.unwrap_or(base.pulse_rate),
            pulse_frequency_min: self
                .pulse_frequency_min
                .unwrap_or(base.pulse_frequency_min),
            pulse_frequency_max: self
                .pulse_frequency_max
                .unwrap_or(base.pulse_frequency_max),
            step_size_min: self.step_size_min.unwrap_or(base.step_size_min),
            step_size_max: self.step_size_max.unwrap_or(base.step_size_max),
            step_size_start: self.step_size_start.unwrap_or(base.step_size_start),
            stale_restart_rate: self.stale_restart_rate.unwrap_or(base.stale_restart_rate),
            success_rate_window: self
                .success_rate_window
                .unwrap_or(base.success_rate_window),
            success_rate_min: self.success_rate_min.unwrap_or(base.success_rate_min),
            relative_tolerance: self.relative_tolerance.unwrap_or(base.relative_tolerance),
            diversification_factor: self
                .diversification_factor
                .unwrap_or(base.diversification_factor),
            step_distribution: self.step_distribution.unwrap_or(base.step_distribution),
            best_score_smoothing: self
                .best_score_smoothing
                .unwrap_or(base.best_score_smoothing),
            seed: base.seed,
        }
    }

    /// Combine two override layers; fields set in `self` win.
    #[must_use]
    pub fn or(&self, fallback: &Self) -> Self {
        Self {
            swarm_size: self.swarm_size.or(fallback.swarm_size),
            iterations_per_frame: self.iterations_per_frame.or(fallback.iterations_per_frame),
            pulse_rate: self.pulse_rate.or(fallback.pulse_rate),
            pulse_frequency_min: self.pulse_frequency_min.or(fallback.pulse_frequency_min),
            pulse_frequency_max: self.pulse_frequency_max.or(fallback.pulse_frequency_max),
            step_size_min: self.step_size_min.or(fallback.step_size_min),
            step_size_max: self.step_size_max.or(fallback.step_size_max),
            step_size_start: self.step_size_start.or(fallback.step_size_start),
            stale_restart_rate: self.stale_restart_rate.or(fallback.stale_restart_rate),
            success_rate_window: self.success_rate_window.or(fallback.success_rate_window),
            success_rate_min: self.success_rate_min.or(fallback.success_rate_min),
            relative_tolerance: self.relative_tolerance.or(fallback.relative_tolerance),
            diversification_factor: self
                .diversification_factor
                .or(fallback.diversification_factor),
            step_distribution: self.step_distribution.or(fallback.step_distribution),
            best_score_smoothing: self.best_score_smoothing.or(fallback.best_score_smoothing),
        }
    }
}

/// Resolve layered transition overrides (most specific first) over `base`.
#[must_use]
pub fn resolve_transition(
    layers: &[&TransitionOptions],
    base: &TransitionConfig,
) -> TransitionConfig {
    layers
        .iter()
        .fold(TransitionOptions::default(), |acc, layer| acc.or(layer))
        .resolve(base)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SpatialConfig::default().validate().is_empty());
    }

    #[test]
    fn default_matches_documented_values() {
        let c = OptimizeConfig::default();
        assert_eq!(c.swarm_size, 10);
        assert_eq!(c.iterations_per_frame, 4);
        assert_eq!(c.diversification_factor, 1.5);
        assert!((c.intensification_factor() - 1.5_f64.powf(-0.25)).abs() < 1e-15);
        assert_eq!(EpsilonConfig::default().meters, 1e-10);
    }

    #[test]
    fn invalid_values_are_collected() {
        let config = SpatialConfig {
            optimize: OptimizeConfig {
                swarm_size: 0,
                pulse_rate: 1.5,
                step_size_min: 2.0,
                ..OptimizeConfig::default()
            },
            ..SpatialConfig::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(matches!(
            config.validated(),
            Err(LayoutError::InvalidConfig(list)) if list.len() == 3
        ));
    }

    #[test]
    fn options_layer_most_specific_first() {
        let layout = OptimizeOptions {
            swarm_size: Some(3),
            ..OptimizeOptions::default()
        };
        let adapter = OptimizeOptions {
            swarm_size: Some(7),
            pulse_rate: Some(0.9),
            ..OptimizeOptions::default()
        };
        let resolved = layout.or(&adapter).resolve(&OptimizeConfig::default());
        assert_eq!(resolved.swarm_size, 3);
        assert_eq!(resolved.pulse_rate, 0.9);
        assert_eq!(resolved.iterations_per_frame, 4);
    }

    #[test]
    fn transition_layers_resolve_in_order() {
        let a = TransitionOptions::default().with_delay(0.1);
        let b = TransitionOptions::default().with_delay(0.9).with_duration(2.0);
        let cfg = resolve_transition(&[&a, &b], &TransitionConfig::default());
        assert_eq!(cfg.delay, 0.1);
        assert_eq!(cfg.duration, 2.0);
    }

    #[cfg(feature = "config-files")]
    #[test]
    fn toml_round_trip() {
        let text = r#"
            [transition]
            duration = 0.8
            easing = "cubic_in_out"

            [optimize]
            swarm_size = 16
            step_distribution = "gaussian"
        "#;
        let config = SpatialConfig::from_toml_str(text).unwrap();
        assert_eq!(config.transition.duration, 0.8);
        assert_eq!(config.optimize.swarm_size, 16);
        assert_eq!(config.optimize.step_distribution, StepDistribution::Gaussian);
        assert_eq!(config.optimize.pulse_rate, 0.4);
        let again = SpatialConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[cfg(feature = "config-files")]
    #[test]
    fn json_validation_errors_surface() {
        let err = SpatialConfig::from_json_str(r#"{"optimize":{"swarm_size":0}}"#).unwrap_err();
        assert!(err.to_string().contains("swarm_size"));
    }
}
