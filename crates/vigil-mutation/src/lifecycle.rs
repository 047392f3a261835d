//! Mutation lifecycle state machine
//!
//! ```text
//! Issued ──► Optimistic ──► Succeeded
//!    │            │
//!    └────────────┴───────► Failed
//! ```

use crate::error::MutationError;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of one mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationPhase {
    /// Request received, identity not yet resolved
    Issued,
    /// Speculative overlay visible, remote call in flight
    Optimistic,
    /// Resolved: server accepted
    Succeeded,
    /// Resolved: rejected, unreachable or invalid
    Failed,
}

impl MutationPhase {
    /// Check if the phase is terminal
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Validates a lifecycle transition.
///
/// # Errors
/// `MutationError::IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: MutationPhase, to: MutationPhase) -> Result<(), MutationError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(MutationError::IllegalTransition { from, to })
    }
}

/// Phases reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: MutationPhase) -> Vec<MutationPhase> {
    use MutationPhase::*;
    match from {
        Issued => vec![Optimistic, Failed],
        Optimistic => vec![Succeeded, Failed],
        Succeeded | Failed => vec![],
    }
}
