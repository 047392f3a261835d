//! In-memory alert API standing in for the remote server

use crate::config::BackendConfig;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use vigil_alerts::{AlertError, AlertStatus, AlertSummary, ALERT_TYPE};
use vigil_cache::FieldMap;
use vigil_mutation::{MutationRequest, RemoteApi, RemoteError};

/// Simulated alert mutation endpoint
#[derive(Debug)]
pub struct SimulatedAlertApi {
    config: BackendConfig,
    alerts: Mutex<HashMap<String, AlertSummary>>,
}

impl SimulatedAlertApi {
    /// Create an empty backend
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            alerts: Mutex::new(HashMap::new()),
        }
    }

    /// Store an alert server-side
    pub fn insert(&self, alert: AlertSummary) {
        self.alerts.lock().insert(alert.alert_id.clone(), alert);
    }

    /// Server-side copy of an alert
    #[must_use]
    pub fn get(&self, alert_id: &str) -> Option<AlertSummary> {
        self.alerts.lock().get(alert_id).cloned()
    }

    fn apply(&self, request: &MutationRequest) -> Result<FieldMap, RemoteError> {
        let target = request.target();
        if target.type_name() != ALERT_TYPE {
            return Err(RemoteError::rejected(format!(
                "unsupported entity type {}",
                target.type_name()
            )));
        }

        let mut alerts = self.alerts.lock();
        let stored = alerts
            .get_mut(target.primary_key())
            .ok_or_else(|| RemoteError::rejected(format!("alert {} does not exist", target.primary_key())))?;
        let mut alert = stored.clone();

        for (field, value) in request.field_patch() {
            match field.as_str() {
                "status" => {
                    let raw = value.as_str().unwrap_or_default();
                    alert.status = raw
                        .parse()
                        .map_err(|err: AlertError| RemoteError::rejected(err.to_string()))?;
                }
                other => {
                    return Err(RemoteError::rejected(format!("field {other} is read-only")));
                }
            }
        }
        alert.update_time = Utc::now();

        let record = alert
            .to_fields()
            .map_err(|err| RemoteError::rejected(err.to_string()))?;
        *stored = alert;
        Ok(record)
    }
}

#[async_trait]
impl RemoteApi for SimulatedAlertApi {
    async fn execute(&self, request: &MutationRequest) -> Result<FieldMap, RemoteError> {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
        if self.config.fail {
            tracing::info!(entity = %request.target(), "simulated rejection");
            return Err(RemoteError::rejected(self.config.reject_message.clone()));
        }
        self.apply(request)
    }
}

/// Status the simulated server currently stores, if the alert exists
#[must_use]
pub fn server_status(api: &SimulatedAlertApi, alert_id: &str) -> Option<AlertStatus> {
    api.get(alert_id).map(|alert| alert.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_alerts::{status_request, AlertSeverity};
    use vigil_cache::{fields, EntityIdentity};

    fn backend() -> SimulatedAlertApi {
        let api = SimulatedAlertApi::new(BackendConfig {
            latency_ms: 0,
            ..BackendConfig::default()
        });
        api.insert(AlertSummary::new("a1", "t", AlertSeverity::Low, "r"));
        api
    }

    #[tokio::test]
    async fn applies_status_and_returns_full_record() {
        let api = backend();
        let record = api
            .execute(&status_request("a1", AlertStatus::Triaged))
            .await
            .unwrap();

        assert_eq!(record["status"], "TRIAGED");
        assert!(record.contains_key("updateTime"));
        assert_eq!(server_status(&api, "a1"), Some(AlertStatus::Triaged));
    }

    #[tokio::test]
    async fn rejects_unknown_alerts_and_fields() {
        let api = backend();
        let err = api
            .execute(&status_request("zz", AlertStatus::Closed))
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::rejected("alert zz does not exist"));

        let request = MutationRequest::new(
            EntityIdentity::new(ALERT_TYPE, "a1"),
            fields([("title", "renamed")]),
        );
        assert!(api.execute(&request).await.is_err());
        assert_eq!(api.get("a1").unwrap().title, "t");
    }
}
