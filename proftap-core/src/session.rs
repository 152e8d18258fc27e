//! Session lifecycle state machine.
//!
//! The session moves through a strict cycle: `Idle` → `Waiting` (sinks
//! opened) → `Active` (capture running) → `Finished` (capture stopped) →
//! `Idle` (sinks released). [`SessionState::check_transition`] is the single
//! authority on which transitions are legal; every mutating operation calls
//! it before touching the session.

use std::fmt;
use std::mem;

use crate::{error::ProftapError, sink::SinkPair};

/// Discriminant of the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Waiting,
    Active,
    Finished,
    Idle,
}

impl SessionState {
    /// All states, in cycle order starting from the initial state.
    pub const ALL: [Self; 4] = [Self::Idle, Self::Waiting, Self::Active, Self::Finished];

    /// The one legal successor of this state.
    #[must_use]
    pub const fn next_in_cycle(self) -> Self {
        match self {
            Self::Idle => Self::Waiting,
            Self::Waiting => Self::Active,
            Self::Active => Self::Finished,
            Self::Finished => Self::Idle,
        }
    }

    /// Validate a proposed transition. Pure: no side effects, no mutation.
    ///
    /// Legal pairs are exactly the cycle `Waiting→Active`, `Active→Finished`,
    /// `Finished→Idle`, `Idle→Waiting`; everything else is rejected with an
    /// error naming both states.
    pub fn check_transition(self, next: Self) -> Result<(), ProftapError> {
        if matches!(
            (self, next),
            (Self::Idle, Self::Waiting)
                | (Self::Waiting, Self::Active)
                | (Self::Active, Self::Finished)
                | (Self::Finished, Self::Idle)
        ) {
            Ok(())
        } else {
            Err(ProftapError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Finished => "finished",
            Self::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// The single profiling session: lifecycle state plus the sink pair.
///
/// Sinks exist exactly in the non-`Idle` states; the enum payload makes a
/// partial sink state unrepresentable.
#[derive(Debug, Default)]
pub enum Session {
    #[default]
    Idle,
    Waiting(SinkPair),
    Active(SinkPair),
    Finished(SinkPair),
}

impl Session {
    /// A fresh session: `Idle`, no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self::Idle
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match self {
            Self::Idle => SessionState::Idle,
            Self::Waiting(_) => SessionState::Waiting,
            Self::Active(_) => SessionState::Active,
            Self::Finished(_) => SessionState::Finished,
        }
    }

    #[must_use]
    pub fn sinks(&self) -> Option<&SinkPair> {
        match self {
            Self::Idle => None,
            Self::Waiting(sinks) | Self::Active(sinks) | Self::Finished(sinks) => Some(sinks),
        }
    }

    /// Validate the transition to `next` and, if legal, take the sink pair
    /// out, leaving the session `Idle` until the caller commits the new
    /// state.
    ///
    /// Only meaningful for transitions out of a sink-holding state
    /// (`next` ∈ {Active, Finished, Idle}); the caller restores the prior
    /// variant on failure of the accompanying side effect.
    pub(crate) fn take_sinks(&mut self, next: SessionState) -> Result<SinkPair, ProftapError> {
        self.check_next(next)?;
        match mem::take(self) {
            Self::Waiting(sinks) | Self::Active(sinks) | Self::Finished(sinks) => Ok(sinks),
            Self::Idle => Err(ProftapError::InvalidTransition {
                from: SessionState::Idle,
                to: next,
            }),
        }
    }

    /// Validate the transition to `next` against the current state.
    pub(crate) fn check_next(&self, next: SessionState) -> Result<(), ProftapError> {
        self.state().check_transition(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_is_idle_without_sinks() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.sinks().is_none());
    }

    #[test]
    fn test_transition_table_is_exactly_the_cycle() {
        for current in SessionState::ALL {
            for proposed in SessionState::ALL {
                let result = current.check_transition(proposed);
                if proposed == current.next_in_cycle() {
                    assert!(result.is_ok(), "{current} -> {proposed} must be legal");
                } else {
                    let err = result.expect_err("off-cycle transition must be rejected");
                    let msg = err.to_string();
                    assert!(msg.contains(&current.to_string()), "error names current: {msg}");
                    assert!(msg.contains(&proposed.to_string()), "error names proposed: {msg}");
                }
            }
        }
    }

    #[test]
    fn test_take_sinks_rejects_off_cycle_and_keeps_state() {
        let mut session = Session::new();
        assert!(session.take_sinks(SessionState::Finished).is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }
}
