//! # Transition Tables
//!
//! Both lifecycles share one shape: a closed enum of states, a static list of
//! targets reachable from each state, and the rule that re-applying the
//! current state is always permitted. [`LifecycleState`] captures that shape
//! so the chain and segment machines validate moves the same way.

use std::fmt;

use nexus_core::{NexusError, NexusResult};

/// A closed set of lifecycle states with a static transition table.
pub trait LifecycleState: Copy + Eq + fmt::Debug + fmt::Display + 'static {
    /// Entity kind named in `IllegalTransition` errors.
    const KIND: &'static str;

    /// Every state, in declaration order.
    const ALL: &'static [Self];

    /// Canonical state name.
    fn name(&self) -> &'static str;

    /// States reachable from `self`, excluding `self`.
    fn allowed_targets(&self) -> &'static [Self];

    /// Whether `self -> to` is permitted. Self-transitions always are.
    fn allows(&self, to: Self) -> bool {
        *self == to || self.allowed_targets().contains(&to)
    }

    /// Fail with `IllegalTransition` unless `self -> to` is permitted.
    fn require_transition(&self, to: Self) -> NexusResult<()> {
        if self.allows(to) {
            Ok(())
        } else {
            Err(NexusError::IllegalTransition {
                kind: Self::KIND,
                from: self.name().to_string(),
                to: to.name().to_string(),
            })
        }
    }
}

/// Pure table lookup: whether `from -> to` is permitted.
pub fn allowed<S: LifecycleState>(from: S, to: S) -> bool {
    from.allows(to)
}

/// Table lookup that fails with `IllegalTransition` naming both states.
pub fn require_transition<S: LifecycleState>(from: S, to: S) -> NexusResult<()> {
    from.require_transition(to)
}
