//! Error types for scope operations.

use thiserror::Error;

use crate::scope::Phase;

/// Errors that can occur while running top-level scope operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// A digest or apply was started while another one owned the scope.
    /// The scope is left exactly as it was before the call.
    #[error("{active} already in progress")]
    PhaseConflict { active: Phase, requested: Phase },

    /// The digest was still dirty, or still had queued tasks, when its
    /// iteration budget ran out. Usually a cycle between watchers.
    #[error("{ttl} digest iterations reached")]
    IterationLimitExceeded { ttl: u32 },
}

pub type ScopeResult<T> = Result<T, ScopeError>;
