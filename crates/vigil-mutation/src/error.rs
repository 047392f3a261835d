//! Error types for the mutation coordinator
//!
//! Provides error handling for:
//! - Remote API failures (transport, rejection, timeout)
//! - Lifecycle violations
//! - Cache errors surfaced through the coordinator

use crate::lifecycle::MutationPhase;
use serde::{Deserialize, Serialize};
use vigil_cache::CacheError;

/// Failure reported by the remote API boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum RemoteError {
    /// Request never reached the server or the connection dropped
    #[error("network error: {0}")]
    Network(String),

    /// Server processed the request and refused it
    #[error("mutation rejected: {}", .messages.join("; "))]
    Rejected { messages: Vec<String> },

    /// No answer within the configured deadline
    #[error("remote call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl RemoteError {
    /// Create rejection with a single server message
    #[inline]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            messages: vec![message.into()],
        }
    }

    /// Create network error
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }
}

/// Classification of a failed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed target identity; nothing was written or sent
    InvalidIdentity,
    /// Server rejected the mutation or the network failed
    RemoteMutation,
    /// Overlay bookkeeping defect
    CacheConsistency,
}

impl ErrorKind {
    /// Stable name for logs and reports
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidIdentity => "InvalidIdentityError",
            Self::RemoteMutation => "RemoteMutationError",
            Self::CacheConsistency => "CacheConsistencyError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main coordinator error type
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// Lifecycle transition not allowed
    #[error("illegal mutation transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: MutationPhase,
        to: MutationPhase,
    },

    /// Cache operation failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Remote call failed
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Settlement task ended without reporting
    #[error("settlement task aborted: {0}")]
    SettlementAborted(String),
}

impl MutationError {
    /// Classify for outcome reporting
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Cache(CacheError::InvalidIdentity(_)) => ErrorKind::InvalidIdentity,
            Self::Remote(_) => ErrorKind::RemoteMutation,
            Self::Cache(_) | Self::IllegalTransition { .. } | Self::SettlementAborted(_) => {
                ErrorKind::CacheConsistency
            }
        }
    }

    /// Notification description for this error
    ///
    /// Internal bookkeeping failures get a generic sentence; their details
    /// (mutation ids, identities) only go to the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match (self, self.kind()) {
            (Self::Remote(err), _) => extract_error_message(err),
            (_, ErrorKind::InvalidIdentity) => self.to_string(),
            _ => CONSISTENCY_MESSAGE.to_string(),
        }
    }
}

/// Description shown when the local copy could not be kept consistent
pub const CONSISTENCY_MESSAGE: &str =
    "The change could not be applied locally. Refresh to see the latest data";

/// Extract a human-readable description from a remote failure
///
/// Server messages are shown as-is (first one wins); transport problems get a
/// generic sentence so users are not shown socket errors.
#[must_use]
pub fn extract_error_message(error: &RemoteError) -> String {
    match error {
        RemoteError::Rejected { messages } => messages
            .iter()
            .map(|m| m.trim())
            .find(|m| !m.is_empty())
            .map_or_else(|| "An unknown error occurred".to_string(), str::to_string),
        RemoteError::Network(_) => {
            "Could not reach the server. Check your connection and try again".to_string()
        }
        RemoteError::Timeout { .. } => "The server took too long to respond".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_cache::IdentityError;

    #[test]
    fn remote_error_display() {
        let err = RemoteError::Rejected {
            messages: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "mutation rejected: a; b");
    }

    #[test]
    fn extract_prefers_first_server_message() {
        let err = RemoteError::Rejected {
            messages: vec!["  ".to_string(), "alert a1 does not exist".to_string()],
        };
        assert_eq!(extract_error_message(&err), "alert a1 does not exist");

        let err = RemoteError::Rejected { messages: vec![] };
        assert_eq!(extract_error_message(&err), "An unknown error occurred");
    }

    #[test]
    fn extract_hides_transport_details() {
        let msg = extract_error_message(&RemoteError::network("ECONNRESET 10.0.0.1:443"));
        assert!(!msg.contains("ECONNRESET"));
    }

    #[test]
    fn error_kind_classification() {
        let err: MutationError = CacheError::InvalidIdentity(IdentityError::EmptyTypeName).into();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentity);

        let err: MutationError = RemoteError::Timeout { after_ms: 5 }.into();
        assert_eq!(err.kind(), ErrorKind::RemoteMutation);

        let err = MutationError::SettlementAborted("panic".to_string());
        assert_eq!(err.kind(), ErrorKind::CacheConsistency);
    }

    #[test]
    fn consistency_message_hides_internals() {
        let mutation = vigil_cache::MutationId::new();
        let err: MutationError = CacheError::DuplicateOverlay {
            identity: "Alert:a1".to_string(),
            mutation,
        }
        .into();
        let message = err.user_message();
        assert_eq!(message, CONSISTENCY_MESSAGE);
        assert!(!message.contains(&mutation.to_string()));

        let err: MutationError = RemoteError::rejected("alert is archived").into();
        assert_eq!(err.user_message(), "alert is archived");

        let err: MutationError = CacheError::InvalidIdentity(IdentityError::EmptyTypeName).into();
        assert!(err.user_message().contains("entity type name is empty"));
    }
}
