//! Console config loading and demo runs against the simulated backend.

use pretty_assertions::assert_eq;
use std::io::Write;
use std::time::Duration;
use vigil_alerts::AlertStatus;
use vigil_console::{run_demo, ConfigError, ConsoleConfig, DemoOptions};
use vigil_mutation::NotificationVariant;

fn fast_config() -> ConsoleConfig {
    let mut config = ConsoleConfig::default();
    config.backend.latency_ms = 0;
    config
}

#[test]
fn loads_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
log_level = "debug"

[session.coordinator]
remote_timeout_ms = 2000
collect_after_settle = false

[session.cache.type_policies.key_fields]
Rule = "ruleId"

[backend]
latency_ms = 5
fail = true
"#
    )
    .unwrap();

    let config = ConsoleConfig::load(file.path()).unwrap();
    assert_eq!(config.log_level, "debug");
    assert_eq!(
        config.session.coordinator.remote_timeout(),
        Some(Duration::from_secs(2))
    );
    assert!(!config.session.coordinator.collect_after_settle);
    assert_eq!(config.backend.latency_ms, 5);
    assert!(config.backend.fail);

    let session = config.session_config();
    assert_eq!(session.cache.type_policies.key_field_for("Rule"), "ruleId");
    assert_eq!(session.cache.type_policies.key_field_for("AlertDetails"), "alertId");
    assert_eq!(session.cache.type_policies.key_field_for("Policy"), "id");
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConsoleConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[tokio::test]
async fn demo_success() {
    let options = DemoOptions {
        alert_id: "a1".to_string(),
        status: AlertStatus::Closed,
    };
    let report = run_demo(&fast_config(), &options).await.unwrap();

    assert_eq!(report.initial, AlertStatus::Open);
    assert_eq!(report.speculative, AlertStatus::Closed);
    assert_eq!(report.settled, AlertStatus::Closed);
    assert_eq!(report.server, Some(AlertStatus::Closed));
    assert!(report.success);
    let notification = report.notification.unwrap();
    assert_eq!(notification.variant, NotificationVariant::Success);
    assert_eq!(notification.title, "Successfully updated alert");
}

#[tokio::test]
async fn demo_failure_reverts() {
    let mut config = fast_config();
    config.backend.fail = true;
    config.backend.reject_message = "alert is archived".to_string();
    let options = DemoOptions {
        alert_id: "a1".to_string(),
        status: AlertStatus::Resolved,
    };
    let report = run_demo(&config, &options).await.unwrap();

    assert_eq!(report.speculative, AlertStatus::Resolved);
    assert_eq!(report.settled, AlertStatus::Open);
    assert_eq!(report.server, Some(AlertStatus::Open));
    assert!(!report.success);
    let notification = report.notification.unwrap();
    assert_eq!(notification.title, "Failed to update alert");
    assert_eq!(notification.description, "alert is archived");
}

#[tokio::test]
async fn demo_refuses_current_status() {
    let options = DemoOptions {
        alert_id: "a1".to_string(),
        status: AlertStatus::Open,
    };
    assert!(run_demo(&fast_config(), &options).await.is_err());
}
