//! Phase Tracking
//!
//! A scope runs at most one top-level operation at a time. The phase names
//! the operation that currently owns the scope, and entering a second one
//! while the first is still running is a logical re-entrancy error (for
//! example a listener calling `digest` from inside a digest).
//!
//! # Implementation
//!
//! Entering a phase returns a [`PhaseGuard`]. Dropping the guard clears the
//! phase, so the scope returns to idle on every exit path: normal return,
//! early `?` return, and unwinding out of a panicking listener.

use std::fmt;

use super::Scope;
use crate::error::{ScopeError, ScopeResult};

/// The top-level operation that currently owns a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Digest,
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Digest => f.write_str("$digest"),
            Phase::Apply => f.write_str("$apply"),
        }
    }
}

/// Guard that clears the scope's phase when dropped.
#[must_use = "the phase is cleared as soon as the guard is dropped"]
pub struct PhaseGuard<'a> {
    scope: &'a Scope,
    phase: Phase,
}

impl PhaseGuard<'_> {
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.scope.clear_phase();
    }
}

impl Scope {
    /// Get the phase currently owning this scope, if any.
    pub fn phase(&self) -> Option<Phase> {
        self.inner.state.borrow().phase
    }

    /// Enter `phase`, failing if another phase is active.
    ///
    /// On failure nothing about the scope has changed.
    pub fn begin_phase(&self, phase: Phase) -> ScopeResult<PhaseGuard<'_>> {
        let mut state = self.inner.state.borrow_mut();
        if let Some(active) = state.phase {
            return Err(ScopeError::PhaseConflict {
                active,
                requested: phase,
            });
        }
        state.phase = Some(phase);
        Ok(PhaseGuard { scope: self, phase })
    }

    /// Return the scope to idle unconditionally.
    pub fn clear_phase(&self) {
        self.inner.state.borrow_mut().phase = None;
    }
}
