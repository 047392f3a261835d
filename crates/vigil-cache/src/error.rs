//! Error types for the entity cache
//!
//! Provides error handling for:
//! - Identity normalization (malformed type names or keys)
//! - Overlay bookkeeping violations (consistency defects)
//! - Closed subscriptions

use crate::overlay::MutationId;

/// Errors raised while normalizing or resolving an entity identity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Type name is empty after trimming
    #[error("entity type name is empty")]
    EmptyTypeName,

    /// Type name contains characters outside `[A-Za-z0-9_]`
    #[error("invalid entity type name: '{0}'")]
    InvalidTypeName(String),

    /// Primary key is empty after trimming
    #[error("primary key of '{type_name}' is empty")]
    EmptyPrimaryKey { type_name: String },

    /// Object is missing its key field
    #[error("object of type '{type_name}' is missing key field '{field}'")]
    MissingKeyField { type_name: String, field: String },

    /// Key field holds a value that cannot be used as a key
    #[error("key field '{field}' of '{type_name}' must be a string or integer")]
    UnsupportedKeyValue { type_name: String, field: String },

    /// Textual identity did not have the `Type:key` shape
    #[error("malformed identity: '{0}'")]
    Malformed(String),
}

/// Errors during cache operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Identity failed normalization
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    /// A mutation tried to lay a second overlay for itself
    #[error("mutation {mutation} already holds an overlay on {identity}")]
    DuplicateOverlay {
        identity: String,
        mutation: MutationId,
    },

    /// Subscription sender side is gone
    #[error("subscription closed")]
    SubscriptionClosed,
}

impl CacheError {
    /// Check if error signals a broken overlay invariant
    #[inline]
    #[must_use]
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, Self::DuplicateOverlay { .. })
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
