//! Alert status control
//!
//! Logic behind the status dropdown of an alert: lists the statuses, disables
//! the current one, and issues the optimistic status mutation on selection.

use crate::alert::{alert_identity, status_of};
use crate::error::{AlertError, AlertResult};
use crate::status::AlertStatus;
use serde::Serialize;
use std::sync::Arc;
use vigil_cache::{EntitySubscription, FieldMap};
use vigil_mutation::{MutationCoordinator, MutationHandle, MutationLabels, MutationRequest};

/// One entry of the status menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusOption {
    /// Status this entry selects
    pub status: AlertStatus,
    /// Display label
    pub label: &'static str,
    /// Whether the entry is disabled (it is the current status)
    pub disabled: bool,
}

/// Build the status mutation for one alert
#[must_use]
pub fn status_request(alert_id: &str, status: AlertStatus) -> MutationRequest {
    MutationRequest::new(alert_identity(alert_id), FieldMap::new())
        .with_field("status", status.as_str())
        .with_labels(MutationLabels::for_entity("alert"))
}

/// Status dropdown for one alert
///
/// Holds a subscription to the alert record, so the record stays cached for
/// as long as the control lives.
#[derive(Debug)]
pub struct AlertStatusControl {
    alert_id: String,
    coordinator: Arc<MutationCoordinator>,
    subscription: EntitySubscription,
}

impl AlertStatusControl {
    /// Attach a control to an alert
    ///
    /// # Errors
    /// `AlertError::Cache` if the alert id does not form a valid identity
    pub fn new(coordinator: Arc<MutationCoordinator>, alert_id: &str) -> AlertResult<Self> {
        let subscription = coordinator.cache().subscribe(&alert_identity(alert_id))?;
        Ok(Self {
            alert_id: alert_id.trim().to_string(),
            coordinator,
            subscription,
        })
    }

    /// Alert id
    #[inline]
    #[must_use]
    pub fn alert_id(&self) -> &str {
        &self.alert_id
    }

    /// Status currently shown (speculative while a mutation is in flight)
    #[must_use]
    pub fn current_status(&self) -> AlertStatus {
        self.subscription
            .peek()
            .map_or_else(AlertStatus::default, |record| status_of(&record))
    }

    /// Whether the shown status is unconfirmed
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.subscription
            .peek()
            .is_some_and(|record| record.is_speculative())
    }

    /// Menu entries in display order
    #[must_use]
    pub fn options(&self) -> Vec<StatusOption> {
        let current = self.current_status();
        AlertStatus::ALL
            .into_iter()
            .map(|status| StatusOption {
                status,
                label: status.label(),
                disabled: status == current,
            })
            .collect()
    }

    /// Select a status
    ///
    /// The new status is visible through [`Self::current_status`] as soon as
    /// this returns.
    ///
    /// # Errors
    /// `AlertError::StatusUnchanged` if `status` is the current status (the
    /// menu entry is disabled)
    pub fn select(&self, status: AlertStatus) -> AlertResult<MutationHandle> {
        if status == self.current_status() {
            return Err(AlertError::StatusUnchanged(status));
        }
        tracing::debug!(alert_id = %self.alert_id, %status, "alert status selected");
        Ok(self
            .coordinator
            .submit(status_request(&self.alert_id, status)))
    }

    /// Wait for the next change of the alert record and return its status
    ///
    /// # Errors
    /// `AlertError::Cache` once the cache is torn down
    pub async fn changed(&mut self) -> AlertResult<AlertStatus> {
        let record = self.subscription.changed().await?;
        Ok(record.as_ref().map(status_of).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_cache::fields;

    #[test]
    fn status_request_targets_alert_details() {
        let request = status_request("a1", AlertStatus::Closed);
        assert_eq!(request.target().type_name(), "AlertDetails");
        assert_eq!(request.target().primary_key(), "a1");
        assert_eq!(request.field_patch(), &fields([("status", "CLOSED")]));
        assert_eq!(request.labels().success_title, "Successfully updated alert");
    }
}
