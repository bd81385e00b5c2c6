#![forbid(unsafe_code)]

//! Commit synchronization across transitionables.
//!
//! Members of a [`SyncGroup`] commit together: once one member decides to
//! commit, every member with a pending change commits on the same frame.
//! Run [`SyncGroup::update`] between the evaluate and apply phases.

use super::TransitionStatus;

/// The part of a transitionable that a sync group can see and drive.
pub trait TransitionControl {
    /// Status from the last evaluation.
    fn status(&self) -> TransitionStatus;

    /// Turn a pending change into a commit for this frame.
    fn force_commit(&mut self);
}

/// A set of transitionables that commit on the same frame.
pub struct SyncGroup<'a> {
    members: Vec<&'a mut dyn TransitionControl>,
}

impl<'a> SyncGroup<'a> {
    /// Empty group.
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Builder: add a member.
    #[must_use]
    pub fn with(mut self, member: &'a mut dyn TransitionControl) -> Self {
        self.members.push(member);
        self
    }

    /// Add a member.
    pub fn push(&mut self, member: &'a mut dyn TransitionControl) {
        self.members.push(member);
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Force pending members to commit if any member is committing.
    ///
    /// Returns the number of members that were forced.
    pub fn update(&mut self) -> usize {
        let any_committing = self
            .members
            .iter()
            .any(|m| m.status() == TransitionStatus::Committing);
        if !any_committing {
            return 0;
        }
        let mut forced = 0;
        for m in &mut self.members {
            if m.status().is_pending() {
                m.force_commit();
                forced += 1;
            }
        }
        forced
    }
}

impl Default for SyncGroup<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{TransitionConfig, Transitionable};

    fn slow() -> TransitionConfig {
        TransitionConfig {
            delay: 10.0,
            debounce: 10.0,
            max_wait: 10.0,
            ..TransitionConfig::default()
        }
    }

    #[test]
    fn committing_member_pulls_pending_members() {
        let cfg = slow();
        let mut a = Transitionable::new(0.0_f64);
        let mut b = Transitionable::new(0.0_f64);
        let mut c = Transitionable::new(0.0_f64);
        a.set_target(1.0);
        a.request_commit();
        b.set_target(2.0);

        a.evaluate(0.1, &cfg);
        b.evaluate(0.1, &cfg);
        c.evaluate(0.1, &cfg);
        assert_eq!(b.status(), TransitionStatus::Changed);

        let forced = SyncGroup::new().with(&mut a).with(&mut b).with(&mut c).update();
        assert_eq!(forced, 1);
        assert_eq!(b.status(), TransitionStatus::Committing);
        assert_eq!(c.status(), TransitionStatus::Unchanged);

        a.apply(0.1, &cfg);
        b.apply(0.1, &cfg);
        assert!(a.is_transitioning() && b.is_transitioning());
    }

    #[test]
    fn nothing_forced_without_a_committer() {
        let cfg = slow();
        let mut a = Transitionable::new(0.0_f64);
        a.set_target(1.0);
        a.evaluate(0.1, &cfg);
        let mut group = SyncGroup::new();
        group.push(&mut a);
        assert_eq!(group.update(), 0);
        drop(group);
        assert_eq!(a.status(), TransitionStatus::Changed);
    }
}
