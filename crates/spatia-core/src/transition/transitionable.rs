#![forbid(unsafe_code)]

//! The hysteresis filter itself.
//!
//! A frame is split into two phases so that sync groups can intervene
//! between them:
//!
//! 1. [`Transitionable::evaluate`] classifies the target and advances the
//!    hysteresis timers.
//! 2. [`Transitionable::apply`] pushes a transition if committing, then
//!    advances and folds the queue and recomputes `current`.
//!
//! [`Transitionable::update`] runs both phases back to back.

use std::collections::VecDeque;

use tracing::trace;

use super::config::{TransitionConfig, TransitionOptions};
use super::sync::TransitionControl;
use super::value::Transitional;
use super::{Transition, TransitionStatus};

/// A value that follows its target through committed, eased transitions.
#[derive(Debug, Clone)]
pub struct Transitionable<T: Transitional> {
    start: T,
    current: T,
    target: T,
    reference: T,
    queue: VecDeque<Transition<T>>,
    status: TransitionStatus,
    options: TransitionOptions,
    delay_time: f64,
    debounce_time: f64,
    wait_time: f64,
    forced: bool,
}

impl<T: Transitional> Transitionable<T> {
    /// Create a settled transitionable at `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            start: value.clone(),
            current: value.clone(),
            target: value.clone(),
            reference: value,
            queue: VecDeque::new(),
            status: TransitionStatus::Unchanged,
            options: TransitionOptions::default(),
            delay_time: 0.0,
            debounce_time: 0.0,
            wait_time: 0.0,
            forced: false,
        }
    }

    /// Builder: set per-instance overrides.
    #[must_use]
    pub fn with_options(mut self, options: TransitionOptions) -> Self {
        self.options = options;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Value all queued transitions start from.
    #[must_use]
    pub fn start(&self) -> &T {
        &self.start
    }

    /// Smoothed value for rendering.
    #[must_use]
    pub fn current(&self) -> &T {
        &self.current
    }

    /// Desired value.
    #[must_use]
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Last target that was classified as a change.
    #[must_use]
    pub fn reference(&self) -> &T {
        &self.reference
    }

    /// Value the queue will settle on: the last committed target.
    #[must_use]
    pub fn committed(&self) -> &T {
        self.queue.back().map_or(&self.start, |t| &t.target)
    }

    /// Status from the last [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn status(&self) -> TransitionStatus {
        self.status
    }

    /// Queued transitions, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition<T>> {
        self.queue.iter()
    }

    /// Whether any transition is still running.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Settled: nothing queued and nothing pending.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.queue.is_empty() && self.status == TransitionStatus::Unchanged
    }

    /// Per-instance overrides.
    #[must_use]
    pub fn options(&self) -> &TransitionOptions {
        &self.options
    }

    /// Mutable per-instance overrides.
    pub fn options_mut(&mut self) -> &mut TransitionOptions {
        &mut self.options
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Stage a new target. Nothing moves until the target commits.
    pub fn set_target(&mut self, target: T) {
        self.target = target;
    }

    /// Commit the current target on the next evaluation regardless of
    /// timers.
    pub fn request_commit(&mut self) {
        self.forced = true;
    }

    /// Jump to `value` with no transition.
    pub fn jump_to(&mut self, value: T) {
        self.queue.clear();
        self.start = value.clone();
        self.current = value.clone();
        self.target = value.clone();
        self.reference = value;
        self.status = TransitionStatus::Unchanged;
        self.reset_timers();
        self.forced = false;
    }

    fn reset_timers(&mut self) {
        self.delay_time = 0.0;
        self.debounce_time = 0.0;
        self.wait_time = 0.0;
    }

    // -----------------------------------------------------------------------
    // Frame phases
    // -----------------------------------------------------------------------

    /// Phase 1: classify the target and advance hysteresis timers.
    pub fn evaluate(&mut self, delta_time: f64, base: &TransitionConfig) -> TransitionStatus {
        let config = self.options.resolve(base);
        let dt = (delta_time * config.multiplier).max(0.0);
        let diverged = self.target.relative_difference(self.committed()) > config.threshold;

        if !diverged {
            self.status = TransitionStatus::Unchanged;
            self.reference = self.target.clone();
            self.reset_timers();
            self.forced = false;
            return self.status;
        }

        if matches!(
            self.status,
            TransitionStatus::Unchanged | TransitionStatus::Committing
        ) {
            self.reference = self.target.clone();
            self.reset_timers();
            self.status = TransitionStatus::Changed;
        } else if self.target.relative_difference(&self.reference) > config.threshold {
            self.reference = self.target.clone();
            self.debounce_time = 0.0;
            self.delay_time += dt;
            self.wait_time += dt;
            self.status = TransitionStatus::Changed;
        } else {
            self.delay_time += dt;
            self.debounce_time += dt;
            self.wait_time += dt;
            self.status = TransitionStatus::Settling;
        }

        let timers_elapsed =
            self.delay_time >= config.delay && self.debounce_time >= config.debounce;
        if self.forced || timers_elapsed || self.wait_time >= config.max_wait {
            self.status = TransitionStatus::Committing;
        }
        self.status
    }

    /// Phase 2: commit if needed, then advance the queue and recompute
    /// `current`.
    pub fn apply(&mut self, delta_time: f64, base: &TransitionConfig) {
        let config = self.options.resolve(base);
        if self.status == TransitionStatus::Committing {
            trace!(queued = self.queue.len(), "transition committed");
            self.queue
                .push_back(Transition::new(self.target.clone(), &config));
            self.reference = self.target.clone();
            self.reset_timers();
            self.forced = false;
        }
        self.advance((delta_time * config.multiplier).max(0.0));
    }

    /// Run [`evaluate`](Self::evaluate) then [`apply`](Self::apply).
    pub fn update(&mut self, delta_time: f64, base: &TransitionConfig) -> TransitionStatus {
        let status = self.evaluate(delta_time, base);
        self.apply(delta_time, base);
        status
    }

    fn advance(&mut self, dt: f64) {
        for t in &mut self.queue {
            t.elapsed += dt;
        }

        // A completed non-blending transition overrides everything before it.
        if let Some(i) = self.queue.iter().rposition(|t| !t.blend && t.is_complete()) {
            if let Some(last) = self.queue.drain(..=i).last() {
                self.start = last.target;
            }
        }
        while self.queue.front().is_some_and(Transition::is_complete) {
            if let Some(done) = self.queue.pop_front() {
                self.start = done.target;
            }
        }

        self.current = self.accumulate();
    }

    fn accumulate(&self) -> T {
        let mut value = self.start.clone();
        let mut from = &self.start;
        for t in &self.queue {
            let e = t.eased();
            value = if t.blend {
                value.blend(from, &t.target, e)
            } else {
                value.lerp_to(&t.target, e)
            };
            from = &t.target;
        }
        value
    }
}

impl<T: Transitional> TransitionControl for Transitionable<T> {
    fn status(&self) -> TransitionStatus {
        self.status
    }

    fn force_commit(&mut self) {
        if self.status.is_pending() {
            self.status = TransitionStatus::Committing;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
