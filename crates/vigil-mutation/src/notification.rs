//! User-facing notifications emitted once per resolved mutation

use crate::request::{MutationLabels, MutationOutcome};
use serde::{Deserialize, Serialize};
use vigil_cache::MutationId;

/// Notification style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    /// Mutation accepted
    Success,
    /// Mutation failed
    Error,
}

/// Toast-style notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Mutation this notification resolves
    pub mutation: MutationId,
    /// Style
    pub variant: NotificationVariant,
    /// Title from the request labels
    pub title: String,
    /// Failure reason; empty on success
    pub description: String,
}

impl Notification {
    /// Build the notification for a resolved outcome
    #[must_use]
    pub fn for_outcome(mutation: MutationId, labels: &MutationLabels, outcome: &MutationOutcome) -> Self {
        match outcome {
            MutationOutcome::Success { .. } => Self {
                mutation,
                variant: NotificationVariant::Success,
                title: labels.success_title.clone(),
                description: String::new(),
            },
            MutationOutcome::Failure { message, .. } => Self {
                mutation,
                variant: NotificationVariant::Error,
                title: labels.failure_title.clone(),
                description: message.clone(),
            },
        }
    }

    /// Check if this is an error notification
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.variant == NotificationVariant::Error
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.description.is_empty() {
            write!(f, "[{:?}] {}", self.variant, self.title)
        } else {
            write!(f, "[{:?}] {}: {}", self.variant, self.title, self.description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn failure_notification_carries_reason() {
        let labels = MutationLabels::for_entity("alert");
        let outcome = MutationOutcome::Failure {
            reason: ErrorKind::RemoteMutation,
            message: "alert is locked".to_string(),
        };
        let n = Notification::for_outcome(MutationId::new(), &labels, &outcome);

        assert!(n.is_error());
        assert_eq!(n.title, "Failed to update alert");
        assert_eq!(n.description, "alert is locked");
        assert_eq!(n.to_string(), "[Error] Failed to update alert: alert is locked");
    }

    #[test]
    fn success_notification() {
        let labels = MutationLabels::for_entity("alert");
        let outcome = MutationOutcome::Success {
            authoritative_fields: Default::default(),
        };
        let n = Notification::for_outcome(MutationId::new(), &labels, &outcome);

        assert_eq!(n.variant, NotificationVariant::Success);
        assert_eq!(n.to_string(), "[Success] Successfully updated alert");
    }
}
