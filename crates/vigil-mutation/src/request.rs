//! Mutation requests and outcomes

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_cache::{EntityIdentity, FieldMap, MutationId};

/// Notification titles for one kind of mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationLabels {
    /// Title shown after the server accepted the mutation
    pub success_title: String,
    /// Title shown after the mutation failed
    pub failure_title: String,
}

impl MutationLabels {
    /// Labels in the "Successfully updated {noun}" form
    #[must_use]
    pub fn for_entity(noun: &str) -> Self {
        Self {
            success_title: format!("Successfully updated {noun}"),
            failure_title: format!("Failed to update {noun}"),
        }
    }
}

impl Default for MutationLabels {
    fn default() -> Self {
        Self::for_entity("entity")
    }
}

/// A single state-changing operation
///
/// Immutable once built; consumed by one coordinator call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    target: EntityIdentity,
    field_patch: FieldMap,
    labels: MutationLabels,
}

impl MutationRequest {
    /// Create request for a target and field patch
    #[inline]
    #[must_use]
    pub fn new(target: EntityIdentity, field_patch: FieldMap) -> Self {
        Self {
            target,
            field_patch,
            labels: MutationLabels::default(),
        }
    }

    /// Add one requested field value
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field_patch.insert(field.into(), value.into());
        self
    }

    /// With notification labels
    #[inline]
    #[must_use]
    pub fn with_labels(mut self, labels: MutationLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Target identity as issued (not yet normalized)
    #[inline]
    #[must_use]
    pub fn target(&self) -> &EntityIdentity {
        &self.target
    }

    /// Requested field values
    #[inline]
    #[must_use]
    pub fn field_patch(&self) -> &FieldMap {
        &self.field_patch
    }

    /// Notification labels
    #[inline]
    #[must_use]
    pub fn labels(&self) -> &MutationLabels {
        &self.labels
    }

    /// Names of the fields this request touches
    pub fn touched_fields(&self) -> impl Iterator<Item = &str> {
        self.field_patch.keys().map(String::as_str)
    }
}

/// Final result of one mutation, produced exactly once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationOutcome {
    /// Server accepted; carries the authoritative fields it returned
    Success { authoritative_fields: FieldMap },
    /// Mutation failed; cache has been reverted
    Failure { reason: ErrorKind, message: String },
}

impl MutationOutcome {
    /// Check if outcome is a success
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure kind, if failed
    #[inline]
    #[must_use]
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failure { reason, .. } => Some(*reason),
            Self::Success { .. } => None,
        }
    }
}

/// Report handed back to the issuer once a mutation is resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationReport {
    /// Mutation identifier
    pub id: MutationId,
    /// Target as issued
    pub target: EntityIdentity,
    /// Final outcome
    pub outcome: MutationOutcome,
}

impl MutationReport {
    /// Check if the mutation succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}
