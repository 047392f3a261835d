//! Alert entity model and cache mapping

use crate::error::{AlertError, AlertResult};
use crate::status::{AlertSeverity, AlertStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_cache::{EntityCache, EntityIdentity, EntityRecord, FieldMap, TypePolicies};

/// Cache type name of alert records
pub const ALERT_TYPE: &str = "AlertDetails";

/// Key field of alert records
pub const ALERT_KEY_FIELD: &str = "alertId";

/// Alert as listed by the console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    /// Alert identifier
    pub alert_id: String,
    /// Title
    pub title: String,
    /// Severity of the rule that fired
    pub severity: AlertSeverity,
    /// Triage status
    #[serde(default)]
    pub status: AlertStatus,
    /// First event time
    pub creation_time: DateTime<Utc>,
    /// Last matched event or status change
    pub update_time: DateTime<Utc>,
    /// Rule that produced the alert
    pub rule_id: String,
    /// Number of matched events
    #[serde(default)]
    pub event_count: u64,
}

impl AlertSummary {
    /// Create an open alert
    #[must_use]
    pub fn new(
        alert_id: impl Into<String>,
        title: impl Into<String>,
        severity: AlertSeverity,
        rule_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            alert_id: alert_id.into(),
            title: title.into(),
            severity,
            status: AlertStatus::Open,
            creation_time: now,
            update_time: now,
            rule_id: rule_id.into(),
            event_count: 1,
        }
    }

    /// With status
    #[must_use]
    pub fn with_status(mut self, status: AlertStatus) -> Self {
        self.status = status;
        self
    }

    /// Cache identity of this alert
    #[inline]
    #[must_use]
    pub fn identity(&self) -> EntityIdentity {
        alert_identity(&self.alert_id)
    }

    /// Encode as cache fields
    ///
    /// # Errors
    /// `AlertError::Decode` if serialization fails
    pub fn to_fields(&self) -> AlertResult<FieldMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(AlertError::Decode(serde::ser::Error::custom(format!(
                "expected object, got {other}"
            )))),
        }
    }

    /// Decode from cache fields
    ///
    /// # Errors
    /// `AlertError::Decode` if fields are missing or malformed
    pub fn from_fields(fields: &FieldMap) -> AlertResult<Self> {
        let object = fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        Ok(serde_json::from_value(Value::Object(object))?)
    }

    /// Decode from a cached record
    ///
    /// # Errors
    /// `AlertError::Decode` if fields are missing or malformed
    pub fn from_record(record: &EntityRecord) -> AlertResult<Self> {
        Self::from_fields(record.fields())
    }
}

/// Cache identity for an alert id
#[must_use]
pub fn alert_identity(alert_id: &str) -> EntityIdentity {
    EntityIdentity::new(ALERT_TYPE, alert_id)
}

/// Type policies resolving alert records by `alertId`
#[must_use]
pub fn type_policies() -> TypePolicies {
    TypePolicies::new().with_key_field(ALERT_TYPE, ALERT_KEY_FIELD)
}

/// Authoritative load of alert list results
///
/// Returns the number of alerts written.
///
/// # Errors
/// First encode or cache error; earlier alerts stay written
pub fn seed_alerts(cache: &EntityCache, alerts: &[AlertSummary]) -> AlertResult<usize> {
    for alert in alerts {
        cache.patch(&alert.identity(), &alert.to_fields()?)?;
    }
    tracing::debug!(count = alerts.len(), "seeded alerts");
    Ok(alerts.len())
}

/// Status of a cached alert record; missing or empty means `Open`
#[must_use]
pub fn status_of(record: &EntityRecord) -> AlertStatus {
    record
        .get_str("status")
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}
