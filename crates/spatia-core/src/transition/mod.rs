#![forbid(unsafe_code)]

//! Hysteresis-filtered transitions.
//!
//! A [`Transitionable`] turns a noisy, discrete `target` (written every frame
//! by the optimizer) into smooth `current` motion. Changes must persist past
//! a `delay` and stay quiet for a `debounce` before they are *committed* as
//! a [`Transition`]; committed transitions are queued and eased in order.
//!
//! # State machine
//!
//! ```text
//!            target ~ committed
//!   ┌──────────────────────────────────────────────┐
//!   v                                              │
//! Unchanged ──diverge──> Changed <──diverge── Settling
//!                           │                   ^  │
//!                           └─────stable────────┘  │
//!                                                  │ delay && debounce
//!                                                  │ || max_wait || forced
//!                                                  v
//!                                             Committing
//! ```
//!
//! # Invariants
//!
//! 1. With a fixed target and a committed transition of positive duration,
//!    `current == target` once the transition's elapsed time reaches its
//!    duration.
//! 2. Completed transitions are removed from the front of the queue and
//!    folded into `start`.
//! 3. Timers only advance by `delta_time * multiplier`; there is no wall
//!    clock.

mod config;
mod easing;
mod sync;
mod transitionable;
mod value;

pub use config::{TransitionConfig, TransitionOptions};
pub use easing::Easing;
pub use sync::{SyncGroup, TransitionControl};
pub use transitionable::Transitionable;
pub use value::{Transitional, slerp};

/// Where a [`Transitionable`] is in its commit cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TransitionStatus {
    /// Target matches the last committed value.
    #[default]
    Unchanged,
    /// Target moved away from the reference value this frame.
    Changed,
    /// Target is stable but timers have not elapsed.
    Settling,
    /// Target will be pushed onto the queue this frame.
    Committing,
}

impl TransitionStatus {
    /// Changed or settling: a divergent target waiting to commit.
    #[inline]
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Changed | Self::Settling)
    }
}

/// A committed move toward `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<T> {
    /// Value reached when the transition completes.
    pub target: T,
    /// Length in scaled seconds.
    pub duration: f64,
    /// Progress curve.
    pub easing: Easing,
    /// Whether this transition adds onto the ones before it.
    pub blend: bool,
    /// Scaled seconds since commit.
    pub elapsed: f64,
}

impl<T> Transition<T> {
    /// Create a transition that has not started.
    #[must_use]
    pub fn new(target: T, config: &TransitionConfig) -> Self {
        Self {
            target,
            duration: config.duration,
            easing: config.easing,
            blend: config.blend,
            elapsed: 0.0,
        }
    }

    /// Linear progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    /// Eased progress in `[0, 1]`.
    #[must_use]
    pub fn eased(&self) -> f64 {
        self.easing.apply(self.progress())
    }

    /// Whether the transition has run its full duration.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }
}
